//! Load the page document from a JSON file or string and resolve it into a [`ResolvedModel`].

use crate::config::resolved::{
    EntityTypeConfig, FieldConfig, FieldKind, FilterSpec, PageConfig, ResolvedModel, DEFAULT_PER_PAGE,
    PRIMARY_LOOKUP,
};
use crate::config::types::*;
use crate::config::{default_url, validate};
use crate::error::ConfigError;
use crate::store::Fixtures;
use std::path::Path;

/// Path of the page document. From env `PAGEKIT_CONFIG`, default `pagekit.json`.
pub fn config_path() -> String {
    std::env::var("PAGEKIT_CONFIG").unwrap_or_else(|_| "pagekit.json".into())
}

/// Optional seed data for the in-memory store, from env `PAGEKIT_FIXTURES`.
pub fn fixtures_path() -> Option<String> {
    std::env::var("PAGEKIT_FIXTURES").ok().filter(|s| !s.is_empty())
}

/// Listen address, from env `BIND_ADDR`, default `127.0.0.1:3000`.
pub fn bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into())
}

pub fn load_from_str(raw: &str) -> Result<FullConfig, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))
}

pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading page config");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_from_str(&raw)
}

/// Seed data for the in-memory store: `{ "<entity type>": [ {id, label, fields}, ... ] }`.
pub async fn load_fixtures_from_path(path: impl AsRef<Path>) -> Result<Fixtures, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading fixtures");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

/// Build resolved model from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let mut model = ResolvedModel::default();
    for (id, page) in &config.pages {
        let url = page.url.clone().unwrap_or_else(|| default_url(id, page.list));
        if !page.list {
            model.insert_page(PageConfig {
                name: id.clone(),
                url,
                list: false,
            });
            continue;
        }

        let fields = page
            .form
            .iter()
            .map(resolve_field)
            .collect::<Vec<_>>();
        let entity = EntityTypeConfig {
            identifier: id.clone(),
            label: page.label.clone().unwrap_or_else(|| id.clone()),
            urlbase: url,
            lookup: page.lookup.clone().unwrap_or_else(|| PRIMARY_LOOKUP.to_string()),
            postsave: page.postsave.clone(),
            per_page: page.per_page.filter(|n| *n > 0).unwrap_or(DEFAULT_PER_PAGE),
            fields,
        };
        tracing::debug!(
            entity_type = %entity.identifier,
            url = %entity.urlbase,
            fields = entity.fields.len(),
            "registered entity type"
        );
        model.insert_entity(entity);
    }
    Ok(model)
}

fn resolve_field(field: &FieldEntry) -> FieldConfig {
    let kind = match (&field.choices, &field.foreign_key) {
        (Some(choices), _) => FieldKind::Choice(choices.clone()),
        (None, Some(target)) => FieldKind::ForeignKey {
            target: target.clone(),
            filter: field.filter.as_ref().map(FilterSpec::from_map),
        },
        (None, None) => FieldKind::Plain,
    };
    FieldConfig {
        name: field.name.clone(),
        label: field.label.clone(),
        type_: field.type_.clone(),
        kind,
        required: field
            .bind
            .as_ref()
            .and_then(|b| b.required)
            .unwrap_or(false),
        max_length: field.length,
    }
}
