//! Template rendering collaborator used for filter values such as `"{{owner_id}}"`.

use serde_json::Value;
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{0}")]
pub struct RenderError(pub String);

/// Pure `render(template, context) -> string`.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, template: &str, context: &Value) -> Result<String, RenderError>;
}

/// Renders with Tera. Undefined variables are errors, output is not HTML-escaped.
#[derive(Clone, Copy, Debug, Default)]
pub struct TeraRenderer;

impl TemplateRenderer for TeraRenderer {
    fn render(&self, template: &str, context: &Value) -> Result<String, RenderError> {
        let ctx = Context::from_value(context.clone()).map_err(|e| RenderError(e.to_string()))?;
        Tera::one_off(template, &ctx, false).map_err(|e| RenderError(describe(&e)))
    }
}

/// Tera nests the useful part of the message in the error source chain.
fn describe(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(inner) = source {
        message = format!("{}: {}", message, inner);
        source = inner.source();
    }
    message
}
