//! Liveness, readiness and build info.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Serialize)]
struct StatusBody {
    status: &'static str,
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    entity_types: usize,
    pages: usize,
}

async fn health() -> Json<StatusBody> {
    Json(StatusBody { status: "ok" })
}

async fn ready(State(state): State<AppState>) -> Json<ReadyBody> {
    Json(ReadyBody {
        status: "ok",
        entity_types: state.model.entities.len(),
        pages: state.model.pages.len(),
    })
}

async fn version() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Build info plus the url of every registered entity type.
async fn info(State(state): State<AppState>) -> Json<Value> {
    let mut urls: Vec<(&str, &str)> = state
        .model
        .entities
        .values()
        .map(|e| (e.identifier.as_str(), e.urlbase.as_str()))
        .collect();
    urls.sort_unstable();
    let resources: serde_json::Map<String, Value> = urls
        .into_iter()
        .map(|(id, url)| (id.to_string(), Value::String(format!("/{}", url))))
        .collect();
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "resources": resources,
    }))
}

/// GET /health, /ready, /version, /info.
pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .route("/info", get(info))
        .with_state(state)
}
