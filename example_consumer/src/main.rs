//! Example consumer: a separate Rust project that uses pagekit-sdk as a dependency.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Reads the page document from `PAGEKIT_CONFIG` and optional seed data from `PAGEKIT_FIXTURES`,
//! e.g. `PAGEKIT_CONFIG=pagekit.json PAGEKIT_FIXTURES=fixtures.json cargo run` in this directory.

use pagekit_sdk::{
    app, bind_addr, config_path, fixtures_path, load_fixtures_from_path, load_from_path, resolve, AppState,
    InMemoryStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pagekit_sdk=info")),
        )
        .init();

    let config = load_from_path(config_path()).await?;
    let model = Arc::new(resolve(&config)?);
    tracing::info!(entity_types = model.entities.len(), pages = model.pages.len(), "config loaded");

    let store = match fixtures_path() {
        Some(path) => InMemoryStore::with_fixtures(model.clone(), load_fixtures_from_path(path).await?)?,
        None => InMemoryStore::new(model.clone()),
    };
    let state = AppState::new(model, Arc::new(store));

    let listener = TcpListener::bind(bind_addr()).await?;
    let addr = listener.local_addr()?;
    tracing::info!("Example consumer listening on http://{}", addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
