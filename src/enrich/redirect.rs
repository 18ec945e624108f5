//! Post-save navigation for clients that do not handle redirects themselves.

use crate::config::{EntityTypeConfig, PageConfig};
use crate::error::EnrichError;
use crate::store::scalar_to_string;
use axum::http::StatusCode;
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq)]
pub struct Redirect {
    pub url: String,
    pub status: StatusCode,
}

impl Redirect {
    /// Acknowledgment payload sent alongside the `Location` header.
    pub fn body(&self) -> Value {
        serde_json::json!({ "detail": "Created" })
    }
}

/// Splits a postsave directive on its first underscore; a bare page means `detail`.
pub fn split_directive(directive: &str) -> (&str, &str) {
    directive.split_once('_').unwrap_or((directive, "detail"))
}

/// Plans where to send the client after saving an entity of type `saved`.
///
/// `resolve_page` looks up the target page when the directive points away from the saved type;
/// when it is `None` the saved type's own page is always used.
pub fn plan_redirect(
    saved: &EntityTypeConfig,
    data: &Map<String, Value>,
    resolve_page: Option<&dyn Fn(&str) -> Option<PageConfig>>,
) -> Result<Redirect, EnrichError> {
    let directive = saved.postsave_directive();
    let (page, mode) = split_directive(&directive);

    let (page_conf, oid) = match resolve_page {
        Some(resolve) if page != saved.identifier => {
            let conf = resolve(page).ok_or_else(|| {
                EnrichError::Configuration(format!(
                    "postsave '{}' on {} names unknown page '{}'",
                    directive, saved.identifier, page
                ))
            })?;
            let oid = if conf.list && mode != "list" {
                data.get(&format!("{}_id", page)).and_then(present)
            } else {
                None
            };
            (conf, oid)
        }
        _ => {
            let oid = if mode != "list" {
                let id = data.get("id").and_then(present).ok_or_else(|| EnrichError::MissingIdentifier {
                    entity_type: saved.identifier.clone(),
                    field: "id".into(),
                })?;
                Some(id)
            } else {
                None
            };
            (saved.page_config(), oid)
        }
    };

    let mut url = format!("/{}", page_conf.url);
    if !page_conf.url.is_empty() && page_conf.list {
        url.push('/');
    }
    if let Some(oid) = oid {
        url.push_str(&oid);
        if mode == "edit" {
            url.push_str("/edit");
        }
    }
    tracing::debug!(entity_type = %saved.identifier, directive = %directive, url = %url, "planned redirect");
    Ok(Redirect {
        url,
        status: StatusCode::FOUND,
    })
}

fn present(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(scalar_to_string(other)).filter(|s| !s.is_empty()),
    }
}
