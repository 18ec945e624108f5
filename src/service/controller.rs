//! Resource operations: list, retrieve, edit, new, create, update.

use crate::config::{EntityTypeConfig, FieldKind, ResolvedModel};
use crate::enrich::{foreign_key_lookups, plan_redirect, ChoiceEnricher, ParentEnricher};
use crate::error::{AppError, StoreError};
use crate::response::{ResourceResponse, ResponseKind};
use crate::serializer::Serializer;
use crate::service::validation::{FieldErrors, RequestValidator};
use crate::store::{scalar_to_string, ConcreteFilter, Entity, FilterTerm, Store};
use crate::template::TemplateRenderer;
use axum::http::StatusCode;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Query keys that control the response rather than filter it.
const RESERVED_PARAMS: &[&str] = &["page", "per_page", "format"];
const MAX_PER_PAGE: u64 = 1000;

/// What a request carries besides its body.
#[derive(Clone, Debug, Default)]
pub struct ResourceRequest {
    /// Path parameters keyed by foreign-key field name.
    pub path_params: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub kind: ResponseKind,
}

impl ResourceRequest {
    pub fn new(kind: ResponseKind) -> Self {
        ResourceRequest {
            kind,
            ..ResourceRequest::default()
        }
    }

    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = query;
        self
    }

    pub fn with_path_param(mut self, name: &str, value: &str) -> Self {
        self.path_params.insert(name.to_string(), value.to_string());
        self
    }
}

pub struct ResourceController<'a> {
    model: &'a ResolvedModel,
    store: &'a dyn Store,
    serializer: &'a dyn Serializer,
    renderer: &'a dyn TemplateRenderer,
}

impl<'a> ResourceController<'a> {
    pub fn new(
        model: &'a ResolvedModel,
        store: &'a dyn Store,
        serializer: &'a dyn Serializer,
        renderer: &'a dyn TemplateRenderer,
    ) -> Self {
        ResourceController {
            model,
            store,
            serializer,
            renderer,
        }
    }

    fn config(&self, entity_type: &str) -> Result<&'a EntityTypeConfig, AppError> {
        self.model
            .config_for(entity_type)
            .ok_or_else(|| AppError::NotFound(format!("entity type '{}'", entity_type)))
    }

    pub fn list(&self, entity_type: &str, req: &ResourceRequest) -> Result<ResourceResponse, AppError> {
        let config = self.config(entity_type)?;
        let filter = self.list_filter(config, req);
        let query = self.store.queryable(entity_type).filter(filter);
        let rows = self.store.iterate(&query)?;

        let per_page = req
            .query
            .get("per_page")
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(u64::from(config.per_page))
            .clamp(1, MAX_PER_PAGE);
        let count = rows.len() as u64;
        let pages = count.div_ceil(per_page).max(1);
        let page = req
            .query
            .get("page")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1)
            .max(1);
        let offset = page.saturating_sub(1).saturating_mul(per_page);
        let list: Vec<Value> = rows
            .iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(per_page).unwrap_or(usize::MAX))
            .map(|e| Value::Object(self.serializer.serialize(config, e)))
            .collect();

        let mut data = Map::new();
        data.insert("list".into(), Value::Array(list));
        data.insert("count".into(), json!(count));
        data.insert("page".into(), json!(page));
        data.insert("pages".into(), json!(pages));
        data.insert("per_page".into(), json!(per_page));

        let data = ParentEnricher::new(self.model, self.store, Some(self.serializer)).enrich_list(
            &data,
            entity_type,
            &req.path_params,
        )?;
        Ok(ResourceResponse::ok(Value::Object(data)).with_template(template_name(config, "list")))
    }

    /// Path parameters name foreign-key parents; query parameters may name any field.
    fn list_filter(&self, config: &EntityTypeConfig, req: &ResourceRequest) -> ConcreteFilter {
        let fk_lookups = foreign_key_lookups(self.model, config);
        let fk_key = |id_key: String| fk_lookups.get(&id_key).cloned().unwrap_or(id_key);
        let mut filter = ConcreteFilter::new();

        for field in &config.fields {
            if !matches!(field.kind, FieldKind::ForeignKey { .. }) {
                continue;
            }
            if let Some(value) = req.path_params.get(&field.name) {
                filter.insert(fk_key(field.id_key()), FilterTerm::Exact(Value::String(value.clone())));
            }
        }
        for (key, value) in &req.query {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            let term = FilterTerm::Exact(Value::String(value.clone()));
            if let Some(field) = config.field(key) {
                match field.kind {
                    FieldKind::ForeignKey { .. } => filter.insert(fk_key(field.id_key()), term),
                    _ => filter.insert(key.clone(), term),
                };
            } else if let Some(field) = config.fields.iter().find(|f| {
                matches!(f.kind, FieldKind::ForeignKey { .. }) && f.id_key() == *key
            }) {
                filter.insert(fk_key(field.id_key()), term);
            } else {
                tracing::debug!(entity_type = %config.identifier, key = %key, "ignoring unknown query parameter");
            }
        }
        filter
    }

    pub fn retrieve(&self, entity_type: &str, lookup: &str, req: &ResourceRequest) -> Result<ResourceResponse, AppError> {
        if lookup == "new" {
            return self.new_form(entity_type, req);
        }
        let config = self.config(entity_type)?;
        let data = self.fetch_serialized(config, lookup)?;
        Ok(ResourceResponse::ok(Value::Object(data)).with_template(template_name(config, "detail")))
    }

    pub fn edit(&self, entity_type: &str, lookup: &str, req: &ResourceRequest) -> Result<ResourceResponse, AppError> {
        if lookup == "new" {
            return self.new_form(entity_type, req);
        }
        let config = self.config(entity_type)?;
        let data = self.fetch_serialized(config, lookup)?;
        let data = self.choices().add_lookups(entity_type, &data)?;
        Ok(ResourceResponse::ok(Value::Object(data)).with_template(template_name(config, "edit")))
    }

    /// Blank edit form, seeded from the query string. Foreign-key seeds that do not resolve are dropped.
    pub fn new_form(&self, entity_type: &str, req: &ResourceRequest) -> Result<ResourceResponse, AppError> {
        let config = self.config(entity_type)?;
        let mut seed = Map::new();
        for (key, value) in &req.query {
            let Some(field) = config.field(key) else {
                continue;
            };
            let Some(target) = field.foreign_key_target() else {
                seed.insert(key.clone(), Value::String(value.clone()));
                continue;
            };
            let Some(target_conf) = self.model.config_for(target) else {
                continue;
            };
            match self
                .store
                .fetch_by_lookup(target, &target_conf.lookup, &Value::String(value.clone()))
            {
                Ok(parent) => {
                    seed.insert(field.id_key(), parent.object_id(&target_conf.lookup));
                }
                Err(StoreError::NotFound { .. }) => {
                    tracing::debug!(entity_type, field = %field.name, value = %value, "dropping unresolved seed");
                }
                Err(other) => return Err(other.into()),
            }
        }

        let blank = Entity {
            id: Value::Null,
            label: String::new(),
            fields: seed,
        };
        let data = self.serializer.serialize(config, &blank);
        let data = self.choices().add_lookups(entity_type, &data)?;
        Ok(ResourceResponse::ok(Value::Object(data)).with_template(template_name(config, "edit")))
    }

    pub fn create(
        &self,
        entity_type: &str,
        body: Map<String, Value>,
        req: &ResourceRequest,
    ) -> Result<ResourceResponse, AppError> {
        let config = self.config(entity_type)?;
        let (body, mut errors) = self.normalize_body(config, body)?;
        if let Err(invalid) = RequestValidator::validate(&body, config) {
            for (field, messages) in invalid {
                errors.entry(field).or_default().extend(messages);
            }
        }
        if !errors.is_empty() {
            return Ok(save_error(config, errors, body, req.kind));
        }
        let saved = self.store.create(entity_type, body)?;
        tracing::info!(entity_type, id = %saved.id, "created");
        let data = self.serializer.serialize(config, &saved);
        match req.kind {
            ResponseKind::Json => {
                Ok(ResourceResponse::created(Value::Object(data)).with_template(template_name(config, "detail")))
            }
            ResponseKind::Html => self.postsave(config, &data),
        }
    }

    pub fn update(
        &self,
        entity_type: &str,
        lookup: &str,
        body: Map<String, Value>,
        req: &ResourceRequest,
    ) -> Result<ResourceResponse, AppError> {
        let config = self.config(entity_type)?;
        let (body, mut errors) = self.normalize_body(config, body)?;
        if let Err(invalid) = RequestValidator::validate_partial(&body, config) {
            for (field, messages) in invalid {
                errors.entry(field).or_default().extend(messages);
            }
        }
        if !errors.is_empty() {
            return Ok(save_error(config, errors, body, req.kind));
        }
        let saved = self
            .store
            .update(entity_type, &config.lookup, &Value::String(lookup.to_string()), body)?;
        tracing::info!(entity_type, id = %saved.id, "updated");
        let data = self.serializer.serialize(config, &saved);
        match req.kind {
            ResponseKind::Json => {
                Ok(ResourceResponse::ok(Value::Object(data)).with_template(template_name(config, "detail")))
            }
            ResponseKind::Html => self.postsave(config, &data),
        }
    }

    fn postsave(&self, config: &EntityTypeConfig, data: &Map<String, Value>) -> Result<ResourceResponse, AppError> {
        let resolve = |page: &str| self.model.page_config_for(page).cloned();
        let redirect = plan_redirect(config, data, Some(&resolve))?;
        let mut response = ResourceResponse::new(redirect.status, redirect.body());
        response.location = Some(redirect.url);
        Ok(response)
    }

    fn fetch_serialized(&self, config: &EntityTypeConfig, lookup: &str) -> Result<Map<String, Value>, AppError> {
        let entity = self
            .store
            .fetch_by_lookup(&config.identifier, &config.lookup, &Value::String(lookup.to_string()))?;
        Ok(self.serializer.serialize(config, &entity))
    }

    /// Stores foreign keys under `<field>_id` as the target's object id, so saved values compare
    /// equal to option ids. Values naming no existing target become field errors.
    fn normalize_body(
        &self,
        config: &EntityTypeConfig,
        mut body: Map<String, Value>,
    ) -> Result<(Map<String, Value>, FieldErrors), AppError> {
        let mut errors = FieldErrors::new();
        for field in &config.fields {
            let Some(target) = field.foreign_key_target() else {
                continue;
            };
            let key = field.id_key();
            if let Some(v) = body.remove(&field.name) {
                body.entry(key.clone()).or_insert(v);
            }
            let value = match body.get(&key) {
                None | Some(Value::Null) => continue,
                Some(v) => v.clone(),
            };
            if matches!(&value, Value::String(s) if s.is_empty()) {
                body.insert(key, Value::Null);
                continue;
            }
            let Some(target_conf) = self.model.config_for(target) else {
                continue;
            };
            match self.store.fetch_by_lookup(target, &target_conf.lookup, &value) {
                Ok(parent) => {
                    body.insert(key, parent.object_id(&target_conf.lookup));
                }
                Err(StoreError::NotFound { .. }) => {
                    errors.entry(field.name.clone()).or_default().push(format!(
                        "Invalid {} \"{}\" - object does not exist.",
                        target_conf.lookup,
                        scalar_to_string(&value)
                    ));
                }
                Err(other) => return Err(other.into()),
            }
        }
        Ok((body, errors))
    }

    fn choices(&self) -> ChoiceEnricher<'a> {
        ChoiceEnricher::new(self.model, self.store, self.serializer, self.renderer)
    }
}

pub fn template_name(config: &EntityTypeConfig, suffix: &str) -> String {
    format!("{}_{}.html", config.identifier, suffix)
}

fn save_error(config: &EntityTypeConfig, errors: FieldErrors, body: Map<String, Value>, kind: ResponseKind) -> ResourceResponse {
    tracing::debug!(entity_type = %config.identifier, fields = ?errors.keys().collect::<Vec<_>>(), "validation failed");
    match kind {
        ResponseKind::Json => {
            ResourceResponse::new(StatusCode::BAD_REQUEST, json!(errors))
        }
        ResponseKind::Html => {
            let errors: Vec<Value> = errors
                .into_iter()
                .map(|(field, errors)| json!({ "field": field, "errors": errors }))
                .collect();
            ResourceResponse::new(
                StatusCode::BAD_REQUEST,
                json!({ "errors": errors, "post": Value::Object(body) }),
            )
            .with_template(template_name(config, "error"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FieldConfig, FilterSpec};
    use crate::serializer::ConfigSerializer;
    use crate::store::InMemoryStore;
    use crate::template::TeraRenderer;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn model() -> Arc<ResolvedModel> {
        let mut title = FieldConfig::plain("title");
        title.required = true;
        let open_only = FilterSpec::default().with("status", vec![json!("open")]);
        Arc::new(ResolvedModel::from_entities(vec![
            EntityTypeConfig::new("project", "projects")
                .with_field(FieldConfig::choice("status", &[("open", "Open"), ("closed", "Closed")])),
            EntityTypeConfig::new("task", "tasks")
                .with_field(title)
                .with_field(FieldConfig::foreign_key("project", "project", Some(open_only)))
                .with_postsave("project_detail"),
        ]))
    }

    fn store(model: &Arc<ResolvedModel>) -> InMemoryStore {
        let store = InMemoryStore::new(model.clone());
        store.insert("project", Entity::new(3, "Apollo").with("status", "open")).unwrap();
        store.insert("project", Entity::new(4, "Gemini").with("status", "closed")).unwrap();
        for (id, title, project) in [(1, "Launch", 3), (2, "Orbit", 3), (3, "Dock", 4)] {
            store
                .insert("task", Entity::new(id, title).with("title", title).with("project_id", project))
                .unwrap();
        }
        store
    }

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn nested_list_filters_and_attaches_parent() {
        let model = model();
        let store = store(&model);
        let ctl = ResourceController::new(&model, &store, &ConfigSerializer, &TeraRenderer);
        let req = ResourceRequest::new(ResponseKind::Json).with_path_param("project", "3");
        let r = ctl.list("task", &req).unwrap();
        assert_eq!(r.body["count"], json!(2));
        assert_eq!(r.body["parent_id"], json!(3));
        assert_eq!(r.body["parent_is_project"], json!(true));
        assert_eq!(r.template.as_deref(), Some("task_list.html"));
    }

    #[test]
    fn list_pages_results() {
        let model = model();
        let store = store(&model);
        let ctl = ResourceController::new(&model, &store, &ConfigSerializer, &TeraRenderer);
        let query = [("per_page", "2"), ("page", "2")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let r = ctl.list("task", &ResourceRequest::default().with_query(query)).unwrap();
        assert_eq!(r.body["count"], json!(3));
        assert_eq!(r.body["pages"], json!(2));
        assert_eq!(r.body["list"].as_array().unwrap().len(), 1);
        assert_eq!(r.body["list"][0]["title"], json!("Dock"));
    }

    #[test]
    fn new_form_seeds_and_drops_unknown_parent() {
        let model = model();
        let store = store(&model);
        let ctl = ResourceController::new(&model, &store, &ConfigSerializer, &TeraRenderer);
        let query: BTreeMap<String, String> = [("project", "3"), ("bogus", "x")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let r = ctl.retrieve("task", "new", &ResourceRequest::default().with_query(query)).unwrap();
        assert_eq!(r.body["project_id"], json!(3));
        assert!(r.body.get("bogus").is_none());
        assert_eq!(r.template.as_deref(), Some("task_edit.html"));
        let choices = r.body["project_list"].as_array().unwrap();
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0]["selected"], json!(true));

        let query = [("project".to_string(), "99".to_string())].into_iter().collect();
        let r = ctl.new_form("task", &ResourceRequest::default().with_query(query)).unwrap();
        assert!(r.body.get("project_id").is_none());
    }

    #[test]
    fn html_create_redirects_to_postsave_page() {
        let model = model();
        let store = store(&model);
        let ctl = ResourceController::new(&model, &store, &ConfigSerializer, &TeraRenderer);
        let r = ctl
            .create("task", body(json!({"title": "Land", "project": "3"})), &ResourceRequest::new(ResponseKind::Html))
            .unwrap();
        assert_eq!(r.status, StatusCode::FOUND);
        assert_eq!(r.location.as_deref(), Some("/projects/3"));
    }

    #[test]
    fn json_create_returns_entity() {
        let model = model();
        let store = store(&model);
        let ctl = ResourceController::new(&model, &store, &ConfigSerializer, &TeraRenderer);
        let r = ctl
            .create("task", body(json!({"title": "Land", "project_id": 4})), &ResourceRequest::default())
            .unwrap();
        assert_eq!(r.status, StatusCode::CREATED);
        assert_eq!(r.body["title"], json!("Land"));
        assert_eq!(r.body["id"], json!(4));
    }

    #[test]
    fn validation_failure_shapes_depend_on_kind() {
        let model = model();
        let store = store(&model);
        let ctl = ResourceController::new(&model, &store, &ConfigSerializer, &TeraRenderer);
        let r = ctl.create("task", Map::new(), &ResourceRequest::default()).unwrap();
        assert_eq!(r.status, StatusCode::BAD_REQUEST);
        assert_eq!(r.body, json!({"title": ["This field is required."]}));

        let r = ctl
            .create("task", body(json!({"title": ""})), &ResourceRequest::new(ResponseKind::Html))
            .unwrap();
        assert_eq!(r.status, StatusCode::BAD_REQUEST);
        assert_eq!(r.template.as_deref(), Some("task_error.html"));
        assert_eq!(r.body["errors"][0]["field"], json!("title"));
        assert_eq!(r.body["post"], json!({"title": ""}));
    }

    #[test]
    fn update_missing_entity_is_not_found() {
        let model = model();
        let store = store(&model);
        let ctl = ResourceController::new(&model, &store, &ConfigSerializer, &TeraRenderer);
        let err = ctl
            .update("task", "404", body(json!({"title": "x"})), &ResourceRequest::default())
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn form_saved_parent_is_selected_on_edit() {
        let model = model();
        let store = store(&model);
        let ctl = ResourceController::new(&model, &store, &ConfigSerializer, &TeraRenderer);
        let form = body(json!({"title": "Land", "project": "3"}));
        let saved = ctl.create("task", form, &ResourceRequest::default()).unwrap();
        assert_eq!(saved.body["project_id"], json!(3));

        let id = saved.body["id"].to_string();
        let r = ctl.edit("task", &id, &ResourceRequest::default()).unwrap();
        assert_eq!(
            r.body["project_list"],
            json!([{"id": 3, "label": "Apollo", "selected": true}])
        );
    }

    #[test]
    fn unknown_parent_on_save_is_a_field_error() {
        let model = model();
        let store = store(&model);
        let ctl = ResourceController::new(&model, &store, &ConfigSerializer, &TeraRenderer);
        let r = ctl
            .create("task", body(json!({"title": "Land", "project_id": "99"})), &ResourceRequest::default())
            .unwrap();
        assert_eq!(r.status, StatusCode::BAD_REQUEST);
        assert_eq!(r.body, json!({"project": ["Invalid id \"99\" - object does not exist."]}));

        let r = ctl
            .update("task", "1", body(json!({"project": "99"})), &ResourceRequest::default())
            .unwrap();
        assert_eq!(r.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn page_far_past_the_end_is_empty() {
        let model = model();
        let store = store(&model);
        let ctl = ResourceController::new(&model, &store, &ConfigSerializer, &TeraRenderer);
        let query = [("page".to_string(), u64::MAX.to_string())].into_iter().collect();
        let r = ctl.list("task", &ResourceRequest::default().with_query(query)).unwrap();
        assert_eq!(r.body["list"], json!([]));
        assert_eq!(r.body["count"], json!(3));
        assert_eq!(r.body["page"], json!(u64::MAX));
    }
}
