//! Response kinds and the response value produced by the controller.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

/// Header carrying the template an HTML front end should render the body with.
pub const TEMPLATE_HEADER: &str = "x-template-name";

/// Which kind of client is on the other end. HTML clients cannot follow programmatic
/// redirects, so saves answer them with a 302 instead of the saved entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResponseKind {
    #[default]
    Json,
    Html,
}

impl ResponseKind {
    /// `format=html` in the query wins; otherwise any `text/html` in Accept selects HTML.
    pub fn negotiate(accept: Option<&str>, format: Option<&str>) -> Self {
        match format {
            Some(f) if f.eq_ignore_ascii_case("html") => return ResponseKind::Html,
            Some(f) if f.eq_ignore_ascii_case("json") => return ResponseKind::Json,
            _ => {}
        }
        let html = accept
            .map(|a| {
                a.split(',')
                    .any(|part| part.trim().to_ascii_lowercase().starts_with("text/html"))
            })
            .unwrap_or(false);
        if html {
            ResponseKind::Html
        } else {
            ResponseKind::Json
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResourceResponse {
    pub status: StatusCode,
    pub body: Value,
    pub location: Option<String>,
    pub template: Option<String>,
}

impl ResourceResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        ResourceResponse {
            status,
            body,
            location: None,
            template: None,
        }
    }

    pub fn ok(body: Value) -> Self {
        ResourceResponse::new(StatusCode::OK, body)
    }

    pub fn created(body: Value) -> Self {
        ResourceResponse::new(StatusCode::CREATED, body)
    }

    pub fn with_template(mut self, template: String) -> Self {
        self.template = Some(template);
        self
    }
}

impl IntoResponse for ResourceResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        let headers = response.headers_mut();
        if let Some(location) = self.location.and_then(|l| HeaderValue::from_str(&l).ok()) {
            headers.insert(header::LOCATION, location);
        }
        if let Some(template) = self.template.and_then(|t| HeaderValue::from_str(&t).ok()) {
            headers.insert(TEMPLATE_HEADER, template);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("text/html,application/xhtml+xml"), None, ResponseKind::Html)]
    #[case(Some("application/json"), None, ResponseKind::Json)]
    #[case(None, None, ResponseKind::Json)]
    #[case(Some("application/json"), Some("html"), ResponseKind::Html)]
    #[case(Some("text/html"), Some("json"), ResponseKind::Json)]
    fn negotiates_kind(#[case] accept: Option<&str>, #[case] format: Option<&str>, #[case] expected: ResponseKind) {
        assert_eq!(ResponseKind::negotiate(accept, format), expected);
    }

    #[test]
    fn sets_location_and_template_headers() {
        let mut r = ResourceResponse::new(StatusCode::FOUND, serde_json::json!({"detail": "Created"}));
        r.location = Some("/widgets/42".into());
        let r = r.with_template("widget_detail.html".into()).into_response();
        assert_eq!(r.status(), StatusCode::FOUND);
        assert_eq!(r.headers()[header::LOCATION], "/widgets/42");
        assert_eq!(r.headers()[TEMPLATE_HEADER], "widget_detail.html");
    }
}
