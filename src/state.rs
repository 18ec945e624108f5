//! Shared application state for all routes.

use crate::config::ResolvedModel;
use crate::serializer::{ConfigSerializer, Serializer};
use crate::service::ResourceController;
use crate::store::Store;
use crate::template::{TemplateRenderer, TeraRenderer};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Immutable after startup.
    pub model: Arc<ResolvedModel>,
    pub store: Arc<dyn Store>,
    pub serializer: Arc<dyn Serializer>,
    pub renderer: Arc<dyn TemplateRenderer>,
}

impl AppState {
    /// State with the config-driven serializer and the Tera renderer.
    pub fn new(model: Arc<ResolvedModel>, store: Arc<dyn Store>) -> Self {
        AppState {
            model,
            store,
            serializer: Arc::new(ConfigSerializer),
            renderer: Arc::new(TeraRenderer),
        }
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn controller(&self) -> ResourceController<'_> {
        ResourceController::new(&self.model, &*self.store, &*self.serializer, &*self.renderer)
    }
}
