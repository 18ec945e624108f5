//! Request validation from field configuration.

use crate::config::{EntityTypeConfig, FieldConfig, FieldKind};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Messages per offending field.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a create body. All required fields must be present and non-empty.
    pub fn validate(body: &Map<String, Value>, config: &EntityTypeConfig) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for field in &config.fields {
            let val = field_value(body, field);
            if field.required && val.map(is_blank).unwrap_or(true) {
                errors
                    .entry(field.name.clone())
                    .or_default()
                    .push("This field is required.".into());
                continue;
            }
            if let Some(v) = val {
                validate_field(field, v, &mut errors);
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate only the fields present in body (for updates). Required is not enforced for missing fields.
    pub fn validate_partial(body: &Map<String, Value>, config: &EntityTypeConfig) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for field in &config.fields {
            let Some(v) = field_value(body, field) else {
                continue;
            };
            if field.required && is_blank(v) {
                errors
                    .entry(field.name.clone())
                    .or_default()
                    .push("This field may not be blank.".into());
                continue;
            }
            validate_field(field, v, &mut errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Foreign keys may arrive as `<field>` or `<field>_id`.
fn field_value<'b>(body: &'b Map<String, Value>, field: &FieldConfig) -> Option<&'b Value> {
    match field.kind {
        FieldKind::ForeignKey { .. } => body.get(&field.id_key()).or_else(|| body.get(&field.name)),
        _ => body.get(&field.name),
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn validate_field(field: &FieldConfig, v: &Value, errors: &mut FieldErrors) {
    if is_blank(v) {
        return;
    }
    if let Some(max) = field.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                errors
                    .entry(field.name.clone())
                    .or_default()
                    .push(format!("Ensure this field has no more than {} characters.", max));
            }
        }
    }
    if let FieldKind::Choice(options) = &field.kind {
        let ok = v
            .as_str()
            .map(|s| options.iter().any(|o| o.name == s))
            .unwrap_or(false);
        if !ok {
            errors
                .entry(field.name.clone())
                .or_default()
                .push(format!("\"{}\" is not a valid choice.", crate::store::scalar_to_string(v)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config() -> EntityTypeConfig {
        let mut title = FieldConfig::plain("title");
        title.required = true;
        title.max_length = Some(5);
        let mut project = FieldConfig::foreign_key("project", "project", None);
        project.required = true;
        EntityTypeConfig::new("task", "tasks")
            .with_field(title)
            .with_field(FieldConfig::choice("status", &[("open", "Open")]))
            .with_field(project)
    }

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn accepts_valid_body() {
        let ok = RequestValidator::validate(
            &body(json!({"title": "Ship", "status": "open", "project_id": 3})),
            &config(),
        );
        assert!(ok.is_ok());
        let ok = RequestValidator::validate(&body(json!({"title": "Ship", "project": "3"})), &config());
        assert!(ok.is_ok());
    }

    #[test]
    fn collects_errors_per_field() {
        let errors = RequestValidator::validate(
            &body(json!({"title": "Too long", "status": "shut"})),
            &config(),
        )
        .unwrap_err();
        assert_eq!(
            errors.keys().cloned().collect::<Vec<_>>(),
            vec!["project".to_string(), "status".to_string(), "title".to_string()]
        );
        assert!(errors["status"][0].contains("not a valid choice"));
    }

    #[test]
    fn partial_skips_missing_required_fields() {
        assert!(RequestValidator::validate_partial(&body(json!({"status": "open"})), &config()).is_ok());
        let errors = RequestValidator::validate_partial(&body(json!({"title": " "})), &config()).unwrap_err();
        assert!(errors.contains_key("title"));
    }
}
