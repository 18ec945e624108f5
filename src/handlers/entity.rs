//! Resource handlers. Entity types are resolved from the first path segment; a type mounted
//! at the root url (`""`) is addressed by its lookup value alone.

use crate::config::EntityTypeConfig;
use crate::error::AppError;
use crate::extractors::SaveBody;
use crate::response::{ResourceResponse, ResponseKind};
use crate::service::ResourceRequest;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use std::collections::BTreeMap;

type QueryParams = BTreeMap<String, String>;

fn entity_for_url<'s>(state: &'s AppState, url: &str) -> Option<&'s EntityTypeConfig> {
    state.model.entity_by_url(url)
}

fn root_entity(state: &AppState) -> Option<&EntityTypeConfig> {
    state.model.entity_by_url("")
}

fn not_found(path: &str) -> AppError {
    AppError::NotFound(format!("no resource at /{}", path))
}

/// GET /:url
pub async fn list(
    State(state): State<AppState>,
    kind: ResponseKind,
    Path(url): Path<String>,
    Query(query): Query<QueryParams>,
) -> Result<ResourceResponse, AppError> {
    let req = ResourceRequest::new(kind).with_query(query);
    if let Some(entity) = entity_for_url(&state, &url) {
        return state.controller().list(&entity.identifier, &req);
    }
    match root_entity(&state) {
        Some(root) => state.controller().retrieve(&root.identifier, &url, &req),
        None => Err(not_found(&url)),
    }
}

/// POST /:url. Creates an entity of the type at `url`, or updates the root-url entity `url`.
pub async fn create(
    State(state): State<AppState>,
    kind: ResponseKind,
    Path(url): Path<String>,
    SaveBody(body): SaveBody,
) -> Result<ResourceResponse, AppError> {
    let req = ResourceRequest::new(kind);
    if let Some(entity) = entity_for_url(&state, &url) {
        return state.controller().create(&entity.identifier, body, &req);
    }
    match root_entity(&state) {
        Some(root) => state.controller().update(&root.identifier, &url, body, &req),
        None => Err(not_found(&url)),
    }
}

/// PUT or PATCH /:lookup on the root-url entity type.
pub async fn update_root_item(
    State(state): State<AppState>,
    kind: ResponseKind,
    Path(lookup): Path<String>,
    SaveBody(body): SaveBody,
) -> Result<ResourceResponse, AppError> {
    let root = root_entity(&state).ok_or_else(|| not_found(&lookup))?;
    state
        .controller()
        .update(&root.identifier, &lookup, body, &ResourceRequest::new(kind))
}

/// GET /
pub async fn list_root(
    State(state): State<AppState>,
    kind: ResponseKind,
    Query(query): Query<QueryParams>,
) -> Result<ResourceResponse, AppError> {
    let root = root_entity(&state).ok_or_else(|| not_found(""))?;
    state
        .controller()
        .list(&root.identifier, &ResourceRequest::new(kind).with_query(query))
}

/// POST /
pub async fn create_root(
    State(state): State<AppState>,
    kind: ResponseKind,
    SaveBody(body): SaveBody,
) -> Result<ResourceResponse, AppError> {
    let root = root_entity(&state).ok_or_else(|| not_found(""))?;
    state
        .controller()
        .create(&root.identifier, body, &ResourceRequest::new(kind))
}

/// GET /:url/:lookup
pub async fn retrieve(
    State(state): State<AppState>,
    kind: ResponseKind,
    Path((url, lookup)): Path<(String, String)>,
    Query(query): Query<QueryParams>,
) -> Result<ResourceResponse, AppError> {
    let req = ResourceRequest::new(kind).with_query(query);
    if let Some(entity) = entity_for_url(&state, &url) {
        return state.controller().retrieve(&entity.identifier, &lookup, &req);
    }
    match root_entity(&state) {
        Some(root) if lookup == "edit" => state.controller().edit(&root.identifier, &url, &req),
        _ => Err(not_found(&format!("{}/{}", url, lookup))),
    }
}

/// PUT, PATCH or POST /:url/:lookup, or a save posted to /:lookup/edit on the root-url type.
pub async fn update(
    State(state): State<AppState>,
    kind: ResponseKind,
    Path((url, lookup)): Path<(String, String)>,
    SaveBody(body): SaveBody,
) -> Result<ResourceResponse, AppError> {
    let req = ResourceRequest::new(kind);
    if let Some(entity) = entity_for_url(&state, &url) {
        return state.controller().update(&entity.identifier, &lookup, body, &req);
    }
    match root_entity(&state) {
        Some(root) if lookup == "edit" => state.controller().update(&root.identifier, &url, body, &req),
        _ => Err(not_found(&format!("{}/{}", url, lookup))),
    }
}

/// GET /:url/:lookup/edit, or GET /:parent_url/:parent_lookup/:url for a list nested under a parent.
pub async fn nested(
    State(state): State<AppState>,
    kind: ResponseKind,
    Path((url, lookup, tail)): Path<(String, String, String)>,
    Query(query): Query<QueryParams>,
) -> Result<ResourceResponse, AppError> {
    let path = format!("{}/{}/{}", url, lookup, tail);
    let mut req = ResourceRequest::new(kind).with_query(query);
    let parent = entity_for_url(&state, &url).ok_or_else(|| not_found(&path))?;
    if tail == "edit" {
        return state.controller().edit(&parent.identifier, &lookup, &req);
    }

    let child = entity_for_url(&state, &tail).ok_or_else(|| not_found(&path))?;
    let links: Vec<&str> = child
        .fields
        .iter()
        .filter(|f| f.foreign_key_target() == Some(parent.identifier.as_str()))
        .map(|f| f.name.as_str())
        .collect();
    if links.is_empty() {
        return Err(not_found(&path));
    }
    for name in links {
        req.path_params.insert(name.to_string(), lookup.clone());
    }
    state.controller().list(&child.identifier, &req)
}
