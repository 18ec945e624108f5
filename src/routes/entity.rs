//! Resource routes. Handlers resolve the entity type from the url segment.

use crate::handlers::entity::{
    create, create_root, list, list_root, nested, retrieve, update, update_root_item,
};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted save body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn entity_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_root).post(create_root))
        .route(
            "/:url",
            get(list).post(create).put(update_root_item).patch(update_root_item),
        )
        .route("/:url/:lookup", get(retrieve).put(update).patch(update).post(update))
        .route("/:url/:lookup/:tail", get(nested))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
