//! Selectable option lists for choice and foreign-key fields.

use crate::config::{FieldConfig, FieldKind, ResolvedModel};
use crate::enrich::FilterEvaluator;
use crate::error::EnrichError;
use crate::serializer::Serializer;
use crate::store::Store;
use crate::template::TemplateRenderer;
use serde::Serialize;
use serde_json::{json, Map, Value};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Choice {
    pub id: Value,
    pub label: String,
    pub selected: bool,
}

pub struct ChoiceEnricher<'a> {
    model: &'a ResolvedModel,
    store: &'a dyn Store,
    serializer: &'a dyn Serializer,
    renderer: &'a dyn TemplateRenderer,
}

impl<'a> ChoiceEnricher<'a> {
    pub fn new(
        model: &'a ResolvedModel,
        store: &'a dyn Store,
        serializer: &'a dyn Serializer,
        renderer: &'a dyn TemplateRenderer,
    ) -> Self {
        ChoiceEnricher {
            model,
            store,
            serializer,
            renderer,
        }
    }

    /// Options for one field, or `None` when the field has none to offer (plain fields and
    /// foreign keys to unregistered types).
    pub fn choices_for_field(
        &self,
        field: &FieldConfig,
        context: &Map<String, Value>,
    ) -> Result<Option<Vec<Choice>>, EnrichError> {
        match &field.kind {
            FieldKind::Plain => Ok(None),
            FieldKind::Choice(options) => {
                let current = context
                    .get(&field.name)
                    .cloned()
                    .unwrap_or_else(|| Value::String(String::new()));
                Ok(Some(
                    options
                        .iter()
                        .map(|o| Choice {
                            id: Value::String(o.name.clone()),
                            label: o.label.clone(),
                            selected: current.as_str() == Some(o.name.as_str()),
                        })
                        .collect(),
                ))
            }
            FieldKind::ForeignKey { target, filter } => {
                let Some(target_conf) = self.model.config_for(target) else {
                    tracing::debug!(field = %field.name, target = %target, "unregistered foreign key target, skipping");
                    return Ok(None);
                };
                let mut query = self.store.queryable(target);
                if let Some(spec) = filter {
                    let computed =
                        FilterEvaluator::new(self.model, self.renderer).evaluate(spec, target_conf, context)?;
                    query = query.filter(computed);
                }
                let current = context.get(&field.id_key());
                let choices = self
                    .store
                    .iterate(&query)?
                    .iter()
                    .map(|entity| {
                        let data = self.serializer.serialize(target_conf, entity);
                        let id = data.get("id").cloned().unwrap_or(Value::Null);
                        let label = match data.get("label") {
                            Some(Value::String(s)) => s.clone(),
                            _ => self.serializer.label(entity),
                        };
                        Choice {
                            selected: current == Some(&id),
                            id,
                            label,
                        }
                    })
                    .collect();
                Ok(Some(choices))
            }
        }
    }

    /// Copy of `context` marked for editing, with `<field>_choices` and `<field>_list` added.
    pub fn add_lookups(&self, entity_type: &str, context: &Map<String, Value>) -> Result<Map<String, Value>, EnrichError> {
        let mut out = context.clone();
        out.insert("edit".into(), Value::Bool(true));

        let Some(config) = self.model.config_for(entity_type) else {
            return Ok(out);
        };
        for field in &config.fields {
            let Some(choices) = self.choices_for_field(field, context)? else {
                continue;
            };
            match &field.kind {
                FieldKind::Choice(_) => {
                    let named: Vec<Value> = choices
                        .into_iter()
                        .map(|c| json!({"name": c.id, "label": c.label, "selected": c.selected}))
                        .collect();
                    out.insert(format!("{}_choices", field.name), Value::Array(named));
                }
                FieldKind::ForeignKey { .. } if !choices.is_empty() => {
                    let listed: Vec<Value> = choices
                        .into_iter()
                        .map(|c| json!({"id": c.id, "label": c.label, "selected": c.selected}))
                        .collect();
                    out.insert(format!("{}_list", field.name), Value::Array(listed));
                }
                _ => {}
            }
        }
        Ok(out)
    }
}
