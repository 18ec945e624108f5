//! Config validation: identifiers, field-kind consistency, filter shape, url uniqueness.

use crate::config::{FieldEntry, FieldKindName, FullConfig};
use crate::error::ConfigError;
use serde_json::Value;
use std::collections::HashSet;

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut urls = HashSet::new();
    for (id, page) in &config.pages {
        if id.contains('/') || id.contains('\\') {
            return Err(ConfigError::InvalidIdentifier(id.clone()));
        }
        if let Some(name) = &page.name {
            if name != id {
                return Err(ConfigError::Validation(format!(
                    "page '{}' declares mismatched name '{}'",
                    id, name
                )));
            }
        }
        if !page.list {
            continue;
        }
        let url = page.url.clone().unwrap_or_else(|| default_url(id, true));
        if !urls.insert(url.clone()) {
            return Err(ConfigError::DuplicateUrl(url));
        }

        let mut names = HashSet::new();
        for field in &page.form {
            if !names.insert(field.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{}: duplicate field '{}'",
                    id, field.name
                )));
            }
            validate_field(id, field)?;
            if let Some(target) = &field.foreign_key {
                let registered = config.pages.get(target).map(|p| p.list).unwrap_or(false);
                if !registered {
                    tracing::warn!(
                        entity_type = %id,
                        field = %field.name,
                        target = %target,
                        "foreign key targets an unregistered type; lookups will be skipped"
                    );
                }
            }
        }
    }
    Ok(())
}

/// Url used when a page omits one: plural identifier for listings, identifier otherwise.
pub fn default_url(identifier: &str, list: bool) -> String {
    if list {
        format!("{}s", identifier)
    } else {
        identifier.to_string()
    }
}

/// Kind implied by which payload keys are populated.
pub fn inferred_kind(field: &FieldEntry) -> Result<FieldKindName, String> {
    match (&field.choices, &field.foreign_key) {
        (Some(_), Some(_)) => Err("declares both choices and a foreign key".into()),
        (Some(_), None) => Ok(FieldKindName::Choice),
        (None, Some(_)) => Ok(FieldKindName::ForeignKey),
        (None, None) => Ok(FieldKindName::Plain),
    }
}

fn validate_field(entity: &str, field: &FieldEntry) -> Result<(), ConfigError> {
    let invalid = |msg: String| ConfigError::Validation(format!("{}.{}: {}", entity, field.name, msg));

    let kind = inferred_kind(field).map_err(invalid)?;
    if let Some(declared) = field.kind {
        if declared != kind {
            return Err(invalid(format!(
                "kind {:?} does not match populated keys ({:?})",
                declared, kind
            )));
        }
    }

    let Some(filter) = &field.filter else {
        return Ok(());
    };
    if kind != FieldKindName::ForeignKey {
        return Err(invalid("filter is only allowed on foreign keys".into()));
    }
    for (key, values) in filter {
        match values {
            Value::Array(items) if items.is_empty() => {
                return Err(invalid(format!("filter '{}' has no values", key)));
            }
            Value::Array(items) if items.iter().any(|v| v.is_array() || v.is_object()) => {
                return Err(invalid(format!("filter '{}' values must be scalars", key)));
            }
            Value::Object(_) => {
                return Err(invalid(format!("filter '{}' values must be scalars", key)));
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(doc: Value) -> FullConfig {
        serde_json::from_value(doc).unwrap()
    }

    #[test]
    fn rejects_path_separators_in_identifiers() {
        let c = config(json!({"pages": {"a/b": {"list": true}}}));
        assert!(matches!(validate(&c), Err(ConfigError::InvalidIdentifier(_))));
    }

    #[test]
    fn rejects_choice_and_foreign_key_together() {
        let c = config(json!({"pages": {"task": {"list": true, "form": [
            {"name": "x", "choices": [], "wq:ForeignKey": "task"}
        ]}}}));
        assert!(matches!(validate(&c), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_mismatched_explicit_kind() {
        let c = config(json!({"pages": {"task": {"list": true, "form": [
            {"name": "x", "kind": "choice"}
        ]}}}));
        assert!(validate(&c).is_err());
    }

    #[test]
    fn rejects_empty_filter_values() {
        let c = config(json!({"pages": {
            "project": {"list": true},
            "task": {"list": true, "form": [
                {"name": "project", "wq:ForeignKey": "project", "filter": {"active": []}}
            ]}
        }}));
        let err = validate(&c).unwrap_err();
        assert!(err.to_string().contains("no values"));
    }

    #[test]
    fn rejects_filter_on_plain_field() {
        let c = config(json!({"pages": {"task": {"list": true, "form": [
            {"name": "title", "filter": {"a": 1}}
        ]}}}));
        assert!(validate(&c).is_err());
    }

    #[test]
    fn rejects_duplicate_urls() {
        let c = config(json!({"pages": {
            "a": {"list": true, "url": "things"},
            "b": {"list": true, "url": "things"}
        }}));
        assert!(matches!(validate(&c), Err(ConfigError::DuplicateUrl(_))));
    }

    #[test]
    fn allows_unregistered_foreign_key_targets() {
        let c = config(json!({"pages": {"task": {"list": true, "form": [
            {"name": "owner", "wq:ForeignKey": "person"}
        ]}}}));
        assert!(validate(&c).is_ok());
    }
}
