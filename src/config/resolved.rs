//! Resolved configuration model: validated and flattened for runtime lookups.
//!
//! Built once at startup and shared read-only between request handlers.

use crate::config::types::{BindConfig, ChoiceEntry, FieldEntry, FieldKindName, FullConfig, PageEntry};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Primary identifier field. Lookups naming anything else go through `<field>__<lookup>`.
pub const PRIMARY_LOOKUP: &str = "id";

/// Marker that turns a filter value into a template.
pub const TEMPLATE_OPEN: &str = "{{";

pub const DEFAULT_PER_PAGE: u32 = 50;

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Literal(Value),
    Template(String),
}

impl FilterValue {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::String(s) if s.contains(TEMPLATE_OPEN) => FilterValue::Template(s),
            other => FilterValue::Literal(other),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FilterValue::Literal(v) => v.clone(),
            FilterValue::Template(t) => Value::String(t.clone()),
        }
    }
}

/// Declarative filter on a foreign-key option list. Entry order follows the document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterSpec {
    pub entries: Vec<(String, Vec<FilterValue>)>,
}

impl FilterSpec {
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let entries = map
            .iter()
            .map(|(key, raw)| {
                let values = match raw {
                    Value::Array(items) => items.iter().cloned().map(FilterValue::from_json).collect(),
                    scalar => vec![FilterValue::from_json(scalar.clone())],
                };
                (key.clone(), values)
            })
            .collect();
        FilterSpec { entries }
    }

    pub fn with(mut self, key: &str, values: Vec<Value>) -> Self {
        self.entries
            .push((key.to_string(), values.into_iter().map(FilterValue::from_json).collect()));
        self
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(key, values)| {
                let v = match values.as_slice() {
                    [single] => single.to_json(),
                    many => Value::Array(many.iter().map(FilterValue::to_json).collect()),
                };
                (key.clone(), v)
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    Plain,
    Choice(Vec<ChoiceEntry>),
    ForeignKey {
        target: String,
        filter: Option<FilterSpec>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldConfig {
    pub name: String,
    pub label: Option<String>,
    pub type_: Option<String>,
    pub kind: FieldKind,
    pub required: bool,
    pub max_length: Option<u32>,
}

impl FieldConfig {
    pub fn plain(name: &str) -> Self {
        FieldConfig {
            name: name.to_string(),
            label: None,
            type_: None,
            kind: FieldKind::Plain,
            required: false,
            max_length: None,
        }
    }

    pub fn choice(name: &str, choices: &[(&str, &str)]) -> Self {
        let choices = choices
            .iter()
            .map(|(n, l)| ChoiceEntry {
                name: n.to_string(),
                label: l.to_string(),
            })
            .collect();
        FieldConfig {
            kind: FieldKind::Choice(choices),
            ..FieldConfig::plain(name)
        }
    }

    pub fn foreign_key(name: &str, target: &str, filter: Option<FilterSpec>) -> Self {
        FieldConfig {
            kind: FieldKind::ForeignKey {
                target: target.to_string(),
                filter,
            },
            ..FieldConfig::plain(name)
        }
    }

    /// Target entity type when this is a foreign key.
    pub fn foreign_key_target(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::ForeignKey { target, .. } => Some(target.as_str()),
            _ => None,
        }
    }

    /// Key under which a foreign key value is stored and rendered.
    pub fn id_key(&self) -> String {
        format!("{}_id", self.name)
    }

    pub fn to_entry(&self) -> FieldEntry {
        let (kind, choices, foreign_key, filter) = match &self.kind {
            FieldKind::Plain => (FieldKindName::Plain, None, None, None),
            FieldKind::Choice(c) => (FieldKindName::Choice, Some(c.clone()), None, None),
            FieldKind::ForeignKey { target, filter } => (
                FieldKindName::ForeignKey,
                None,
                Some(target.clone()),
                filter.as_ref().map(FilterSpec::to_map),
            ),
        };
        FieldEntry {
            name: self.name.clone(),
            label: self.label.clone(),
            type_: self.type_.clone(),
            kind: Some(kind),
            choices,
            foreign_key,
            filter,
            bind: self.required.then(|| BindConfig { required: Some(true) }),
            length: self.max_length,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PageConfig {
    pub name: String,
    pub url: String,
    pub list: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntityTypeConfig {
    pub identifier: String,
    pub label: String,
    pub urlbase: String,
    pub lookup: String,
    pub postsave: Option<String>,
    pub per_page: u32,
    pub fields: Vec<FieldConfig>,
}

impl EntityTypeConfig {
    pub fn new(identifier: &str, urlbase: &str) -> Self {
        EntityTypeConfig {
            identifier: identifier.to_string(),
            label: identifier.to_string(),
            urlbase: urlbase.to_string(),
            lookup: PRIMARY_LOOKUP.to_string(),
            postsave: None,
            per_page: DEFAULT_PER_PAGE,
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: FieldConfig) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_postsave(mut self, directive: &str) -> Self {
        self.postsave = Some(directive.to_string());
        self
    }

    pub fn with_lookup(mut self, lookup: &str) -> Self {
        self.lookup = lookup.to_string();
        self
    }

    /// Configured postsave directive, or `<identifier>_detail`.
    pub fn postsave_directive(&self) -> String {
        self.postsave
            .clone()
            .unwrap_or_else(|| format!("{}_detail", self.identifier))
    }

    pub fn field(&self, name: &str) -> Option<&FieldConfig> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every entity type is served as a listing page at its urlbase.
    pub fn page_config(&self) -> PageConfig {
        PageConfig {
            name: self.identifier.clone(),
            url: self.urlbase.clone(),
            list: true,
        }
    }

    /// Foreign-key fields grouped by target, targets in order of first appearance.
    pub fn foreign_keys_by_target(&self) -> Vec<(&str, Vec<&FieldConfig>)> {
        let mut grouped: Vec<(&str, Vec<&FieldConfig>)> = Vec::new();
        for field in &self.fields {
            let Some(target) = field.foreign_key_target() else {
                continue;
            };
            match grouped.iter_mut().find(|(t, _)| *t == target) {
                Some((_, fields)) => fields.push(field),
                None => grouped.push((target, vec![field])),
            }
        }
        grouped
    }

    pub fn to_entry(&self) -> PageEntry {
        PageEntry {
            name: Some(self.identifier.clone()),
            url: Some(self.urlbase.clone()),
            list: true,
            label: Some(self.label.clone()),
            lookup: Some(self.lookup.clone()),
            postsave: self.postsave.clone(),
            per_page: Some(self.per_page),
            form: self.fields.iter().map(FieldConfig::to_entry).collect(),
        }
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self.to_entry())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub entities: HashMap<String, EntityTypeConfig>,
    pub pages: HashMap<String, PageConfig>,
    pub entity_by_url: HashMap<String, String>,
}

impl ResolvedModel {
    /// Builds a model directly from entity types (no plain pages).
    pub fn from_entities(entities: Vec<EntityTypeConfig>) -> Self {
        let mut model = ResolvedModel::default();
        for entity in entities {
            model.insert_entity(entity);
        }
        model
    }

    pub fn insert_entity(&mut self, entity: EntityTypeConfig) {
        self.pages
            .insert(entity.identifier.clone(), entity.page_config());
        self.entity_by_url
            .insert(entity.urlbase.clone(), entity.identifier.clone());
        self.entities.insert(entity.identifier.clone(), entity);
    }

    pub fn insert_page(&mut self, page: PageConfig) {
        self.pages.insert(page.name.clone(), page);
    }

    pub fn config_for(&self, entity_type: &str) -> Option<&EntityTypeConfig> {
        self.entities.get(entity_type)
    }

    pub fn page_config_for(&self, page: &str) -> Option<&PageConfig> {
        self.pages.get(page)
    }

    /// Lookup field of a registered entity type; `None` when the type is unknown.
    pub fn lookup_field_for(&self, entity_type: &str) -> Option<&str> {
        self.entities.get(entity_type).map(|e| e.lookup.as_str())
    }

    pub fn entity_by_url(&self, url: &str) -> Option<&EntityTypeConfig> {
        self.entity_by_url
            .get(url)
            .and_then(|id| self.entities.get(id))
    }

    /// Serializes the model back into the page document shape.
    pub fn to_document(&self) -> FullConfig {
        let mut config = FullConfig::default();
        for entity in self.entities.values() {
            config
                .pages
                .insert(entity.identifier.clone(), entity.to_entry());
        }
        for page in self.pages.values() {
            if self.entities.contains_key(&page.name) {
                continue;
            }
            config.pages.insert(
                page.name.clone(),
                PageEntry {
                    name: Some(page.name.clone()),
                    url: Some(page.url.clone()),
                    list: page.list,
                    ..PageEntry::default()
                },
            );
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_config_serializes_as_page_entry() {
        let task = EntityTypeConfig::new("task", "tasks")
            .with_field(FieldConfig::foreign_key("project", "project", None));
        let value = task.to_json().unwrap();
        assert_eq!(value["name"], json!("task"));
        assert_eq!(value["url"], json!("tasks"));
        assert_eq!(value["list"], json!(true));
        assert_eq!(value["form"][0]["wq:ForeignKey"], json!("project"));
    }

    #[test]
    fn postsave_defaults_to_detail() {
        let widget = EntityTypeConfig::new("widget", "widgets");
        assert_eq!(widget.postsave_directive(), "widget_detail");
        assert_eq!(widget.with_postsave("parent_list").postsave_directive(), "parent_list");
    }

    #[test]
    fn groups_foreign_keys_by_target() {
        let entity = EntityTypeConfig::new("transfer", "transfers")
            .with_field(FieldConfig::foreign_key("source", "account", None))
            .with_field(FieldConfig::plain("amount"))
            .with_field(FieldConfig::foreign_key("owner", "person", None))
            .with_field(FieldConfig::foreign_key("dest", "account", None));
        let grouped = entity.foreign_keys_by_target();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, "account");
        assert_eq!(grouped[0].1.len(), 2);
        assert_eq!(grouped[1].0, "person");
    }

    #[test]
    fn filter_spec_classifies_templates() {
        let spec = FilterSpec::from_map(
            json!({"owner_id": "{{owner_id}}", "state": ["a", "b"], "active": 1})
                .as_object()
                .unwrap(),
        );
        let owner = spec.entries.iter().find(|(k, _)| k == "owner_id").unwrap();
        assert_eq!(owner.1, vec![FilterValue::Template("{{owner_id}}".into())]);
        let state = spec.entries.iter().find(|(k, _)| k == "state").unwrap();
        assert_eq!(state.1.len(), 2);
        assert_eq!(spec.to_map()["state"], json!(["a", "b"]));
    }

    #[test]
    fn lookup_field_is_absent_for_unknown_types() {
        let model = ResolvedModel::from_entities(vec![
            EntityTypeConfig::new("item", "items").with_lookup("slug")
        ]);
        assert_eq!(model.lookup_field_for("item"), Some("slug"));
        assert_eq!(model.lookup_field_for("ghost"), None);
        assert_eq!(model.entity_by_url("items").map(|e| e.identifier.as_str()), Some("item"));
    }
}
