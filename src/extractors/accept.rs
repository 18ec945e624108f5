//! Response kind from `Accept` or `?format=`.

use crate::response::ResponseKind;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::{header::ACCEPT, request::Parts},
};
use std::collections::HashMap;

#[async_trait]
impl<S> FromRequestParts<S> for ResponseKind
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let accept = parts
            .headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok());
        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri).ok();
        let format = query.as_ref().and_then(|q| q.get("format")).map(String::as_str);
        Ok(ResponseKind::negotiate(accept, format))
    }
}
