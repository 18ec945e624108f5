//! Save bodies arrive as JSON objects or as urlencoded forms.

use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
    Form,
};
use serde_json::{Map, Value};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Body of a create or update. Form fields become strings; an empty body is an empty object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SaveBody(pub Map<String, Value>);

#[async_trait]
impl<S> FromRequest<S> for SaveBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().starts_with(FORM_CONTENT_TYPE))
            .unwrap_or(false);

        if is_form {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            let map = pairs
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            return Ok(SaveBody(map));
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(SaveBody(Map::new()));
        }
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(SaveBody(map)),
            Ok(_) => Err(AppError::BadRequest("body must be a JSON object".into()).into_response()),
            Err(e) => Err(AppError::BadRequest(format!("invalid JSON: {}", e)).into_response()),
        }
    }
}
