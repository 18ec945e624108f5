//! Routers: common, configuration, resources.

mod common;
mod config;
mod entity;

pub use common::common_routes;
pub use config::config_routes;
pub use entity::{entity_routes, MAX_BODY_BYTES};

use crate::state::AppState;
use axum::Router;

/// Full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(config_routes(state.clone()))
        .merge(entity_routes(state))
}
