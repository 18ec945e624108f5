//! Evaluates a declarative [`FilterSpec`] against the entity being rendered.

use crate::config::{EntityTypeConfig, FilterSpec, FilterValue, ResolvedModel, PRIMARY_LOOKUP};
use crate::error::EnrichError;
use crate::store::{ConcreteFilter, FilterTerm};
use crate::template::TemplateRenderer;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Maps `<field>_id` to `<field>__<lookup>` for every foreign key of `config` whose target
/// is addressed by something other than its primary id.
pub fn foreign_key_lookups(model: &ResolvedModel, config: &EntityTypeConfig) -> HashMap<String, String> {
    config
        .fields
        .iter()
        .filter_map(|field| {
            let target = field.foreign_key_target()?;
            let lookup = model.lookup_field_for(target)?;
            (lookup != PRIMARY_LOOKUP).then(|| (field.id_key(), format!("{}__{}", field.name, lookup)))
        })
        .collect()
}

pub struct FilterEvaluator<'a> {
    model: &'a ResolvedModel,
    renderer: &'a dyn TemplateRenderer,
}

impl<'a> FilterEvaluator<'a> {
    pub fn new(model: &'a ResolvedModel, renderer: &'a dyn TemplateRenderer) -> Self {
        FilterEvaluator { model, renderer }
    }

    /// `parent` is the configuration of the entity type being filtered (the foreign-key target),
    /// `context` the response data of the entity being edited. `context` is only read.
    pub fn evaluate(
        &self,
        spec: &FilterSpec,
        parent: &EntityTypeConfig,
        context: &Map<String, Value>,
    ) -> Result<ConcreteFilter, EnrichError> {
        let fk_lookups = foreign_key_lookups(self.model, parent);
        let mut render_ctx: Option<Value> = None;
        let mut computed = ConcreteFilter::new();

        for (key, values) in &spec.entries {
            if values.is_empty() {
                return Err(EnrichError::Configuration(format!(
                    "filter '{}' on {} has no values",
                    key, parent.identifier
                )));
            }
            let mut evaluated = Vec::with_capacity(values.len());
            for value in values {
                evaluated.push(match value {
                    FilterValue::Literal(v) => v.clone(),
                    FilterValue::Template(t) => {
                        let ctx = render_ctx.get_or_insert_with(|| Value::Object(context.clone()));
                        let rendered = self.renderer.render(t, ctx).map_err(|e| {
                            EnrichError::TemplateEvaluation {
                                template: t.clone(),
                                message: e.to_string(),
                            }
                        })?;
                        coerce(rendered)
                    }
                });
            }

            let key = fk_lookups.get(key).cloned().unwrap_or_else(|| key.clone());
            if evaluated.len() > 1 {
                computed.insert(format!("{}__in", key), FilterTerm::In(evaluated));
            } else if let Some(single) = evaluated.pop() {
                computed.insert(key, FilterTerm::Exact(single));
            }
        }
        tracing::debug!(target_type = %parent.identifier, filter = ?computed, "evaluated filter");
        Ok(computed)
    }
}

/// Rendered strings made only of ASCII digits become integers. Digit strings beyond the
/// `u64` range stay strings; the store compares them loosely against numbers anyway.
fn coerce(rendered: String) -> Value {
    if !rendered.is_empty() && rendered.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = rendered.parse::<u64>() {
            return Value::from(n);
        }
    }
    Value::String(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldConfig;
    use crate::template::TeraRenderer;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn model() -> ResolvedModel {
        ResolvedModel::from_entities(vec![
            EntityTypeConfig::new("owner", "owners").with_lookup("slug"),
            EntityTypeConfig::new("region", "regions"),
            EntityTypeConfig::new("site", "sites")
                .with_field(FieldConfig::foreign_key("owner", "owner", None))
                .with_field(FieldConfig::foreign_key("region", "region", None)),
        ])
    }

    fn ctx(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn eval(spec: FilterSpec, context: Value) -> Result<ConcreteFilter, EnrichError> {
        let model = model();
        let site = model.config_for("site").unwrap().clone();
        FilterEvaluator::new(&model, &TeraRenderer).evaluate(&spec, &site, &ctx(context))
    }

    #[rstest]
    #[case(json!("north"))]
    #[case(json!(7))]
    #[case(json!(true))]
    fn single_literal_passes_through(#[case] value: Value) {
        let out = eval(FilterSpec::default().with("zone", vec![value.clone()]), json!({})).unwrap();
        assert_eq!(out, ConcreteFilter::from([("zone".into(), FilterTerm::Exact(value))]));
    }

    #[test]
    fn multiple_values_become_membership_in_order() {
        let out = eval(
            FilterSpec::default().with("state", vec![json!("b"), json!("a"), json!("c")]),
            json!({}),
        )
        .unwrap();
        assert_eq!(
            out["state__in"],
            FilterTerm::In(vec![json!("b"), json!("a"), json!("c")])
        );
        assert!(!out.contains_key("state"));
    }

    #[test]
    fn digit_templates_coerce_to_integers() {
        let out = eval(FilterSpec::default().with("age", vec![json!("{{n}}")]), json!({"n": "5"})).unwrap();
        assert_eq!(out["age"], FilterTerm::Exact(json!(5)));

        let out = eval(FilterSpec::default().with("code", vec![json!("{{n}}")]), json!({"n": "5a"})).unwrap();
        assert_eq!(out["code"], FilterTerm::Exact(json!("5a")));
    }

    #[test]
    fn digits_beyond_u64_stay_strings() {
        let big = "18446744073709551616";
        let out = eval(FilterSpec::default().with("serial", vec![json!("{{n}}")]), json!({"n": big})).unwrap();
        assert_eq!(out["serial"], FilterTerm::Exact(json!(big)));
    }

    #[test]
    fn rewrites_keys_for_non_primary_lookups() {
        let out = eval(
            FilterSpec::default()
                .with("owner_id", vec![json!("{{owner_id}}")])
                .with("region_id", vec![json!(3)]),
            json!({"owner_id": "acme"}),
        )
        .unwrap();
        assert_eq!(out["owner__slug"], FilterTerm::Exact(json!("acme")));
        assert_eq!(out["region_id"], FilterTerm::Exact(json!(3)));
    }

    #[test]
    fn rewritten_keys_keep_membership_suffix() {
        let out = eval(
            FilterSpec::default().with("owner_id", vec![json!("a"), json!("b")]),
            json!({}),
        )
        .unwrap();
        assert!(out.contains_key("owner__slug__in"));
    }

    #[test]
    fn empty_entry_is_a_configuration_error() {
        let spec = FilterSpec {
            entries: vec![("state".into(), Vec::new())],
        };
        assert!(matches!(eval(spec, json!({})), Err(EnrichError::Configuration(_))));
    }

    #[test]
    fn unknown_template_variable_propagates() {
        let err = eval(FilterSpec::default().with("age", vec![json!("{{nope}}")]), json!({})).unwrap_err();
        assert!(matches!(err, EnrichError::TemplateEvaluation { .. }));
    }

    #[test]
    fn context_is_left_untouched() {
        let model = model();
        let site = model.config_for("site").unwrap().clone();
        let context = ctx(json!({"n": "5"}));
        let before = context.clone();
        FilterEvaluator::new(&model, &TeraRenderer)
            .evaluate(&FilterSpec::default().with("age", vec![json!("{{n}}")]), &site, &context)
            .unwrap();
        assert_eq!(context, before);
    }
}
