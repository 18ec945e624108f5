//! Serialization collaborator: turns stored entities into response mappings.

use crate::config::EntityTypeConfig;
use crate::store::Entity;
use serde_json::{Map, Value};

pub trait Serializer: Send + Sync {
    fn serialize(&self, config: &EntityTypeConfig, entity: &Entity) -> Map<String, Value>;

    /// String representation of an entity.
    fn label(&self, entity: &Entity) -> String {
        entity.label.clone()
    }
}

/// Flattens an entity into `{id, label, ...fields}`, exposing the lookup field as `id`
/// when the type is addressed by something other than its primary key.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfigSerializer;

impl Serializer for ConfigSerializer {
    fn serialize(&self, config: &EntityTypeConfig, entity: &Entity) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("id".into(), entity.object_id(&config.lookup));
        out.insert("label".into(), Value::String(self.label(entity)));
        for (k, v) in &entity.fields {
            out.entry(k.clone()).or_insert_with(|| v.clone());
        }
        out
    }
}
