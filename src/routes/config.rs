//! Configuration document route.

use crate::handlers::config::get_config;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn config_routes(state: AppState) -> Router {
    Router::new()
        .route("/config", get(get_config))
        .with_state(state)
}
