//! Storage collaborator: the [`Store`] trait the engine queries, plus an in-memory implementation.
//!
//! The engine never owns rows. It builds a [`Queryable`] (entity type plus concrete filters) and
//! asks the store to iterate it, or fetches single entities by their lookup field.

use crate::config::{ResolvedModel, PRIMARY_LOOKUP};
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// A stored entity as handed back by the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: Value,
    /// String representation used for option lists and parent summaries.
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<Value>, label: &str) -> Self {
        Entity {
            id: id.into(),
            label: label.to_string(),
            fields: Map::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        if field == PRIMARY_LOOKUP || field == "pk" {
            Some(&self.id)
        } else {
            self.fields.get(field)
        }
    }

    /// Value of the lookup field, i.e. the id clients use to address this entity.
    pub fn object_id(&self, lookup: &str) -> Value {
        self.get(lookup).cloned().unwrap_or(Value::Null)
    }
}

/// One concrete constraint produced by filter evaluation.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterTerm {
    Exact(Value),
    /// Set membership; the key carries the `__in` suffix.
    In(Vec<Value>),
}

pub type ConcreteFilter = BTreeMap<String, FilterTerm>;

/// Lazily filtered collection of one entity type.
#[derive(Clone, Debug, PartialEq)]
pub struct Queryable {
    pub entity_type: String,
    pub filters: Vec<ConcreteFilter>,
}

impl Queryable {
    pub fn new(entity_type: &str) -> Self {
        Queryable {
            entity_type: entity_type.to_string(),
            filters: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: ConcreteFilter) -> Self {
        if !filter.is_empty() {
            self.filters.push(filter);
        }
        self
    }
}

/// Storage collaborator. Calls are synchronous; callers decide where they run.
pub trait Store: Send + Sync {
    fn queryable(&self, entity_type: &str) -> Queryable {
        Queryable::new(entity_type)
    }

    fn iterate(&self, query: &Queryable) -> Result<Vec<Entity>, StoreError>;

    fn fetch_by_lookup(&self, entity_type: &str, lookup_field: &str, value: &Value) -> Result<Entity, StoreError>;

    fn create(&self, entity_type: &str, data: Map<String, Value>) -> Result<Entity, StoreError>;

    fn update(
        &self,
        entity_type: &str,
        lookup_field: &str,
        value: &Value,
        data: Map<String, Value>,
    ) -> Result<Entity, StoreError>;
}

/// Seed data keyed by entity type.
pub type Fixtures = BTreeMap<String, Vec<Entity>>;

#[derive(Default)]
struct Table {
    rows: Vec<Entity>,
    next_id: u64,
}

impl Table {
    fn push(&mut self, entity: Entity) {
        if let Some(n) = entity.id.as_u64() {
            self.next_id = self.next_id.max(n + 1);
        }
        self.rows.push(entity);
    }
}

/// Process-local store. Foreign keys are stored as `<field>_id` holding the target's object id
/// (its lookup value); filter keys of the form `<field>__<lookup>` follow that link.
pub struct InMemoryStore {
    model: Arc<ResolvedModel>,
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryStore {
    pub fn new(model: Arc<ResolvedModel>) -> Self {
        InMemoryStore {
            model,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_fixtures(model: Arc<ResolvedModel>, fixtures: Fixtures) -> Result<Self, StoreError> {
        let store = InMemoryStore::new(model);
        for (entity_type, rows) in fixtures {
            for row in rows {
                store.insert(&entity_type, row)?;
            }
        }
        Ok(store)
    }

    /// Inserts a fully formed entity. An empty label is derived from the fields.
    pub fn insert(&self, entity_type: &str, mut entity: Entity) -> Result<(), StoreError> {
        if entity.label.is_empty() {
            entity.label = default_label(&entity.id, &entity.fields);
        }
        let mut tables = self.write()?;
        tables.entry(entity_type.to_string()).or_default().push(entity);
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Table>>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Table>>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))
    }

    /// Resolves a filter key (without `__in`) to the entity's value, following one foreign-key hop.
    fn resolve_path(
        &self,
        tables: &HashMap<String, Table>,
        entity_type: &str,
        entity: &Entity,
        key: &str,
    ) -> Result<Option<Value>, StoreError> {
        let parts: Vec<&str> = key.split("__").collect();
        match parts.as_slice() {
            [field] => Ok(entity.get(field).cloned()),
            [fk, lookup] => {
                let target = self
                    .model
                    .config_for(entity_type)
                    .and_then(|c| c.field(fk))
                    .and_then(|f| f.foreign_key_target())
                    .ok_or_else(|| StoreError::Invalid {
                        entity_type: entity_type.to_string(),
                        message: format!("'{}' is not a foreign key", fk),
                    })?;
                let Some(related_id) = entity.fields.get(&format!("{}_id", fk)) else {
                    return Ok(None);
                };
                let target_lookup = self.model.lookup_field_for(target).unwrap_or(PRIMARY_LOOKUP);
                let related = tables.get(target).and_then(|t| {
                    t.rows
                        .iter()
                        .find(|r| r.get(target_lookup).map(|v| loose_eq(v, related_id)).unwrap_or(false))
                });
                Ok(related.and_then(|r| r.get(lookup).cloned()))
            }
            _ => Err(StoreError::Invalid {
                entity_type: entity_type.to_string(),
                message: format!("unsupported filter key '{}'", key),
            }),
        }
    }

    fn matches(
        &self,
        tables: &HashMap<String, Table>,
        entity_type: &str,
        entity: &Entity,
        filter: &ConcreteFilter,
    ) -> Result<bool, StoreError> {
        for (key, term) in filter {
            let ok = match term {
                FilterTerm::Exact(expected) => self
                    .resolve_path(tables, entity_type, entity, key)?
                    .map(|v| loose_eq(&v, expected))
                    .unwrap_or(false),
                FilterTerm::In(options) => {
                    let field = key.strip_suffix("__in").unwrap_or(key);
                    self.resolve_path(tables, entity_type, entity, field)?
                        .map(|v| options.iter().any(|o| loose_eq(&v, o)))
                        .unwrap_or(false)
                }
            };
            if !ok {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Store for InMemoryStore {
    fn iterate(&self, query: &Queryable) -> Result<Vec<Entity>, StoreError> {
        tracing::debug!(entity_type = %query.entity_type, filters = ?query.filters, "query");
        let tables = self.read()?;
        let Some(table) = tables.get(&query.entity_type) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for row in &table.rows {
            let mut keep = true;
            for filter in &query.filters {
                if !self.matches(&tables, &query.entity_type, row, filter)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                out.push(row.clone());
            }
        }
        Ok(out)
    }

    fn fetch_by_lookup(&self, entity_type: &str, lookup_field: &str, value: &Value) -> Result<Entity, StoreError> {
        tracing::debug!(entity_type, lookup_field, value = %value, "fetch");
        let tables = self.read()?;
        tables
            .get(entity_type)
            .and_then(|t| {
                t.rows
                    .iter()
                    .find(|r| r.get(lookup_field).map(|v| loose_eq(v, value)).unwrap_or(false))
            })
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity_type: entity_type.to_string(),
                lookup: lookup_field.to_string(),
                value: value.clone(),
            })
    }

    fn create(&self, entity_type: &str, mut data: Map<String, Value>) -> Result<Entity, StoreError> {
        let mut tables = self.write()?;
        let table = tables.entry(entity_type.to_string()).or_default();
        let id = match data.remove(PRIMARY_LOOKUP) {
            Some(id) if !id.is_null() => {
                if table.rows.iter().any(|r| loose_eq(&r.id, &id)) {
                    return Err(StoreError::Invalid {
                        entity_type: entity_type.to_string(),
                        message: format!("id {} already exists", id),
                    });
                }
                id
            }
            _ => Value::from(table.next_id.max(1)),
        };
        let entity = Entity {
            label: default_label(&id, &data),
            id,
            fields: data,
        };
        table.push(entity.clone());
        tracing::debug!(entity_type, id = %entity.id, "created");
        Ok(entity)
    }

    fn update(
        &self,
        entity_type: &str,
        lookup_field: &str,
        value: &Value,
        mut data: Map<String, Value>,
    ) -> Result<Entity, StoreError> {
        data.remove(PRIMARY_LOOKUP);
        let mut tables = self.write()?;
        let row = tables
            .get_mut(entity_type)
            .and_then(|t| {
                t.rows
                    .iter_mut()
                    .find(|r| r.get(lookup_field).map(|v| loose_eq(v, value)).unwrap_or(false))
            })
            .ok_or_else(|| StoreError::NotFound {
                entity_type: entity_type.to_string(),
                lookup: lookup_field.to_string(),
                value: value.clone(),
            })?;
        row.fields.extend(data);
        row.label = default_label(&row.id, &row.fields);
        tracing::debug!(entity_type, id = %row.id, "updated");
        Ok(row.clone())
    }
}

fn default_label(id: &Value, fields: &Map<String, Value>) -> String {
    for key in ["label", "name", "title"] {
        if let Some(Value::String(s)) = fields.get(key) {
            if !s.is_empty() {
                return s.clone();
            }
        }
    }
    scalar_to_string(id)
}

/// Renders a scalar the way it appears in a URL path.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Equality that treats a number and its decimal string form as equal (path and form values arrive as strings).
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => n.to_string() == *s,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntityTypeConfig, FieldConfig};
    use serde_json::json;

    fn store() -> InMemoryStore {
        let model = ResolvedModel::from_entities(vec![
            EntityTypeConfig::new("project", "projects").with_lookup("slug"),
            EntityTypeConfig::new("task", "tasks")
                .with_field(FieldConfig::foreign_key("project", "project", None)),
        ]);
        let store = InMemoryStore::new(Arc::new(model));
        store
            .insert("project", Entity::new(1, "Apollo").with("slug", "apollo"))
            .unwrap();
        store
            .insert("project", Entity::new(2, "Gemini").with("slug", "gemini"))
            .unwrap();
        store
            .insert("task", Entity::new(10, "Launch").with("project_id", "apollo").with("state", "open"))
            .unwrap();
        store
            .insert("task", Entity::new(11, "Dock").with("project_id", "gemini").with("state", "done"))
            .unwrap();
        store
    }

    #[test]
    fn filters_exact_and_membership() {
        let store = store();
        let q = store
            .queryable("task")
            .filter(ConcreteFilter::from([("state".into(), FilterTerm::Exact(json!("open")))]));
        let rows = store.iterate(&q).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, json!(10));

        let q = store.queryable("task").filter(ConcreteFilter::from([(
            "state__in".into(),
            FilterTerm::In(vec![json!("open"), json!("done")]),
        )]));
        assert_eq!(store.iterate(&q).unwrap().len(), 2);
    }

    #[test]
    fn follows_foreign_key_lookups() {
        let store = store();
        let q = store.queryable("task").filter(ConcreteFilter::from([(
            "project__slug".into(),
            FilterTerm::Exact(json!("gemini")),
        )]));
        let rows = store.iterate(&q).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "Dock");
    }

    #[test]
    fn string_path_values_match_numeric_ids() {
        let store = store();
        let task = store.fetch_by_lookup("task", "id", &json!("11")).unwrap();
        assert_eq!(task.label, "Dock");
        let project = store.fetch_by_lookup("project", "slug", &json!("apollo")).unwrap();
        assert_eq!(project.object_id("slug"), json!("apollo"));
    }

    #[test]
    fn missing_rows_are_not_found() {
        let err = store().fetch_by_lookup("project", "id", &json!(99)).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn create_assigns_ids_and_update_merges() {
        let store = store();
        let mut data = Map::new();
        data.insert("title".into(), json!("Orbit"));
        let created = store.create("task", data).unwrap();
        assert_eq!(created.id, json!(12));
        assert_eq!(created.label, "Orbit");

        let mut patch = Map::new();
        patch.insert("state".into(), json!("done"));
        let updated = store.update("task", "id", &json!(12), patch).unwrap();
        assert_eq!(updated.fields["state"], json!("done"));
        assert_eq!(updated.fields["title"], json!("Orbit"));
    }
}
