//! Pagekit SDK: configuration-driven enrichment for REST resources.
//!
//! A page document declares entity types, their fields and how related records are
//! presented. The SDK serves those types over axum and enriches responses with option
//! lists for edit forms, parent summaries for nested lists and post-save redirects.

pub mod config;
pub mod enrich;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod routes;
pub mod serializer;
pub mod service;
pub mod state;
pub mod store;
pub mod template;

pub use config::{
    bind_addr, config_path, fixtures_path, load_fixtures_from_path, load_from_path, load_from_str, resolve, EntityTypeConfig, FieldConfig,
    FieldKind, FilterSpec, FullConfig, ResolvedModel,
};
pub use enrich::{ChoiceEnricher, FilterEvaluator, ParentEnricher, Redirect};
pub use error::{AppError, ConfigError, EnrichError, StoreError};
pub use response::{ResourceResponse, ResponseKind};
pub use routes::{app, common_routes, config_routes, entity_routes};
pub use serializer::{ConfigSerializer, Serializer};
pub use service::{RequestValidator, ResourceController, ResourceRequest};
pub use state::AppState;
pub use store::{Entity, Fixtures, InMemoryStore, Store};
pub use template::{TemplateRenderer, TeraRenderer};
