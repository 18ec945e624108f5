//! Parent summaries for list responses nested under a foreign-key parent.

use crate::config::ResolvedModel;
use crate::error::{EnrichError, StoreError};
use crate::serializer::Serializer;
use crate::store::{scalar_to_string, Store};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub struct ParentEnricher<'a> {
    model: &'a ResolvedModel,
    store: &'a dyn Store,
    serializer: Option<&'a dyn Serializer>,
}

impl<'a> ParentEnricher<'a> {
    pub fn new(model: &'a ResolvedModel, store: &'a dyn Store, serializer: Option<&'a dyn Serializer>) -> Self {
        ParentEnricher {
            model,
            store,
            serializer,
        }
    }

    /// Returns a copy of `data` with `parent_*` keys for every target type that `entity_type`
    /// references through exactly one field whose value is present in `path_params`.
    pub fn enrich_list(
        &self,
        data: &Map<String, Value>,
        entity_type: &str,
        path_params: &BTreeMap<String, String>,
    ) -> Result<Map<String, Value>, EnrichError> {
        let mut out = data.clone();
        let Some(config) = self.model.config_for(entity_type) else {
            return Ok(out);
        };

        for (target, fields) in config.foreign_keys_by_target() {
            let [field] = fields.as_slice() else {
                tracing::debug!(entity_type, target, count = fields.len(), "ambiguous parent relation, skipping");
                continue;
            };
            let Some(pid) = path_params.get(&field.name).filter(|p| !p.is_empty()) else {
                continue;
            };
            let Some(target_conf) = self.model.config_for(target) else {
                tracing::debug!(entity_type, target, "unregistered parent type, skipping");
                continue;
            };

            let parent = self
                .store
                .fetch_by_lookup(target, &target_conf.lookup, &Value::String(pid.clone()))
                .map_err(|e| match e {
                    StoreError::NotFound { entity_type, lookup, value } => EnrichError::DanglingReference {
                        entity_type,
                        lookup,
                        value: scalar_to_string(&value),
                    },
                    other => EnrichError::Store(other),
                })?;

            let oid_value = parent.object_id(&target_conf.lookup);
            let oid = scalar_to_string(&oid_value);
            let label = match self.serializer {
                Some(s) => s.label(&parent),
                None => parent.label.clone(),
            };
            let url = if target_conf.urlbase.is_empty() {
                oid.clone()
            } else {
                format!("{}/{}", target_conf.urlbase, oid)
            };
            out.insert("parent_label".into(), Value::String(label));
            out.insert("parent_id".into(), oid_value);
            out.insert("parent_url".into(), Value::String(url));
            out.insert(format!("parent_is_{}", target), Value::Bool(true));
            out.insert("parent_page".into(), Value::String(target.to_string()));
            let page_config = target_conf.to_json().map_err(|e| {
                EnrichError::Configuration(format!("page config for {}: {}", target, e))
            })?;
            out.insert("page_config".into(), page_config);
            if let Some(serializer) = self.serializer {
                out.insert(
                    "parent".into(),
                    Value::Object(serializer.serialize(target_conf, &parent)),
                );
            }
        }
        Ok(out)
    }
}
