//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid identifier '{0}': must not contain path separators")]
    InvalidIdentifier(String),
    #[error("duplicate url: {0}")]
    DuplicateUrl(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Failures reported by a [`crate::store::Store`] implementation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{entity_type} with {lookup}={value} not found")]
    NotFound {
        entity_type: String,
        lookup: String,
        value: Value,
    },
    #[error("invalid {entity_type}: {message}")]
    Invalid { entity_type: String, message: String },
    #[error("store backend: {0}")]
    Backend(String),
}

/// Errors raised while enriching a response or planning navigation.
#[derive(Error, Debug)]
pub enum EnrichError {
    #[error("configuration: {0}")]
    Configuration(String),
    #[error("template '{template}' failed: {message}")]
    TemplateEvaluation { template: String, message: String },
    #[error("saved {entity_type} has no '{field}' to redirect to")]
    MissingIdentifier { entity_type: String, field: String },
    #[error("dangling reference: {entity_type} with {lookup}={value} does not exist")]
    DanglingReference {
        entity_type: String,
        lookup: String,
        value: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Enrich(#[from] EnrichError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => AppError::NotFound(e.to_string()),
            other => AppError::Enrich(EnrichError::Store(other)),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Enrich(e) => match e {
                EnrichError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
                EnrichError::TemplateEvaluation { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "template_error")
                }
                EnrichError::MissingIdentifier { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "missing_identifier")
                }
                EnrichError::DanglingReference { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "dangling_reference")
                }
                EnrichError::Store(StoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, "not_found"),
                EnrichError::Store(StoreError::Invalid { .. }) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "invalid_entity")
                }
                EnrichError::Store(StoreError::Backend(_)) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "store_error")
                }
            },
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
