//! MultiModelStore - one façade over several backends.
//!
//! Every model id is routed to the backend that first reported it. The first
//! time an unknown id of some type is resolved, all backends are listed for
//! that type and every id found is claimed; later unknown ids fall back to
//! the default (first) backend. Models added to a backend after its type was
//! scanned are not noticed.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use model_vault::{ClassPathModelStore, FileSystemModelStore, ModelStore, MultiModelStore};
//!
//! let store = MultiModelStore::new(vec![
//!     Arc::new(FileSystemModelStore::new("/var/models")),
//!     Arc::new(ClassPathModelStore::new(vec!["/opt/app/models.jar".into()], "models")),
//! ]);
//! let model = store.get_model("{bpmn-order-process}")?;
//! ```

mod routing;

pub use routing::RoutingTable;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ModelError;
use crate::model::{
    DeleteOptions, Model, ModelHistory, ModelId, ModelKeyCheck, ModelStore, ModelType, User,
};

/// Routes each model to one of several backends.
#[derive(Clone)]
pub struct MultiModelStore {
    backends: Vec<Arc<dyn ModelStore>>,
    routing: Arc<RoutingTable>,
}

impl MultiModelStore {
    /// Backends in priority order; the first one is the default.
    pub fn new(backends: Vec<Arc<dyn ModelStore>>) -> Self {
        Self::with_routing_table(backends, Arc::new(RoutingTable::new()))
    }

    pub fn with_routing_table(backends: Vec<Arc<dyn ModelStore>>, routing: Arc<RoutingTable>) -> Self {
        Self { backends, routing }
    }

    pub fn backends(&self) -> &[Arc<dyn ModelStore>] {
        &self.backends
    }

    pub fn routing_table(&self) -> &Arc<RoutingTable> {
        &self.routing
    }

    fn default_index(&self) -> Result<usize, ModelError> {
        if self.backends.is_empty() {
            Err(ModelError::NoBackend)
        } else {
            Ok(0)
        }
    }

    fn backend(&self, index: usize) -> Result<&Arc<dyn ModelStore>, ModelError> {
        self.backends.get(index).ok_or(ModelError::NoBackend)
    }

    /// Backend for a model being written.
    fn backend_for_model(&self, model: &Model) -> Result<usize, ModelError> {
        match &model.id {
            Some(id) => self.resolve(id, Some(model.model_type)),
            None => self.default_index(),
        }
    }

    /// Backend for an id. History ids route like the model they belong to.
    fn backend_for_id(&self, id: &str) -> Result<usize, ModelError> {
        match ModelId::parse(id).or_else(|_| ModelId::parse_history(id)) {
            Ok(parsed) => {
                let current = parsed.to_current().to_string();
                self.resolve(&current, Some(parsed.model_type()))
            }
            Err(_) => self.resolve(id, None),
        }
    }

    fn resolve(&self, id: &str, model_type: Option<ModelType>) -> Result<usize, ModelError> {
        let default = self.default_index()?;
        if let Some(index) = self.routing.route(id)? {
            return Ok(index);
        }

        if let Some(model_type) = model_type {
            let _scan = self.routing.lock_scan()?;
            if !self.routing.is_loaded(model_type)? {
                self.scan(model_type)?;
            }
        }

        self.routing.claim(id, default)
    }

    /// List `model_type` on every backend and claim each id found. Called
    /// with the scan lock held.
    fn scan(&self, model_type: ModelType) -> Result<(), ModelError> {
        debug!(model_type = ?model_type, "scanning all backends");
        for (index, backend) in self.backends.iter().enumerate() {
            match backend.get_models_by_type(model_type, None) {
                Ok(models) => {
                    let mut routes = self.routing.lock()?;
                    for id in models.iter().filter_map(Model::id) {
                        routes.claim(id, index);
                    }
                }
                Err(e) => warn!(backend = backend.name(), error = %e, "backend scan failed"),
            }
        }
        self.routing.lock()?.mark_loaded(model_type);
        Ok(())
    }

    fn claim(&self, model: &Model, index: usize) -> Result<(), ModelError> {
        if let Some(id) = model.id() {
            self.routing.claim(id, index)?;
        }
        Ok(())
    }
}

impl ModelStore for MultiModelStore {
    fn name(&self) -> &'static str {
        "multi"
    }

    fn get_model(&self, id: &str) -> Result<Model, ModelError> {
        let index = self.backend_for_id(id)?;
        self.backend(index)?.get_model(id)
    }

    fn get_models_by_type(
        &self,
        model_type: ModelType,
        filter: Option<&str>,
    ) -> Result<Vec<Model>, ModelError> {
        let mut all = Vec::new();
        for (index, backend) in self.backends.iter().enumerate() {
            match backend.get_models_by_type(model_type, filter) {
                Ok(models) => {
                    for model in &models {
                        self.claim(model, index)?;
                    }
                    all.extend(models);
                }
                Err(e) => warn!(backend = backend.name(), error = %e, "listing failed"),
            }
        }
        Ok(all)
    }

    fn model_count(&self, model_type: ModelType) -> Result<u64, ModelError> {
        let mut count = 0;
        for backend in &self.backends {
            count += backend.model_count(model_type)?;
        }
        Ok(count)
    }

    fn validate_model_key(
        &self,
        existing: Option<&Model>,
        model_type: ModelType,
        key: &str,
    ) -> Result<ModelKeyCheck, ModelError> {
        let mut last = None;
        for backend in &self.backends {
            let check = backend.validate_model_key(existing, model_type, key)?;
            if check.key_already_exists {
                return Ok(check);
            }
            last = Some(check);
        }
        last.ok_or(ModelError::NoBackend)
    }

    fn create_model(&self, model: Model, created_by: &User) -> Result<Model, ModelError> {
        let index = self.backend_for_model(&model)?;
        let created = self.backend(index)?.create_model(model, created_by)?;
        self.claim(&created, index)?;
        Ok(created)
    }

    fn save_model(&self, model: Model) -> Result<Model, ModelError> {
        let index = self.backend_for_model(&model)?;
        let saved = self.backend(index)?.save_model(model)?;
        self.claim(&saved, index)?;
        Ok(saved)
    }

    fn create_new_model_version(
        &self,
        model: Model,
        comment: &str,
        updated_by: &User,
    ) -> Result<Model, ModelError> {
        let index = self.backend_for_model(&model)?;
        let saved = self
            .backend(index)?
            .create_new_model_version(model, comment, updated_by)?;
        self.claim(&saved, index)?;
        Ok(saved)
    }

    fn delete_model(
        &self,
        id: &str,
        options: &DeleteOptions,
        deleted_by: &User,
    ) -> Result<(), ModelError> {
        let index = self.backend_for_id(id)?;
        self.backend(index)?.delete_model(id, options, deleted_by)
    }

    fn get_model_history(&self, model: &Model) -> Result<Vec<ModelHistory>, ModelError> {
        let index = self.backend_for_model(model)?;
        self.backend(index)?.get_model_history(model)
    }

    fn get_model_history_entry(
        &self,
        history_id: &str,
    ) -> Result<Option<ModelHistory>, ModelError> {
        let index = self.backend_for_id(history_id)?;
        self.backend(index)?.get_model_history_entry(history_id)
    }

    fn get_model_history_for_type(
        &self,
        user: Option<&User>,
        model_type: ModelType,
    ) -> Result<Vec<ModelHistory>, ModelError> {
        let mut all = Vec::new();
        for backend in &self.backends {
            all.extend(backend.get_model_history_for_type(user, model_type)?);
        }
        Ok(all)
    }

    fn load_editor_json(&self, id: &str) -> Result<Value, ModelError> {
        let index = self.backend_for_id(id)?;
        self.backend(index)?.load_editor_json(id)
    }
}
