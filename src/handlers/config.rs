//! Serves the resolved configuration back in its page document shape.

use crate::config::FullConfig;
use crate::state::AppState;
use axum::{extract::State, Json};

pub async fn get_config(State(state): State<AppState>) -> Json<FullConfig> {
    Json(state.model.to_document())
}
