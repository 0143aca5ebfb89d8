//! InMemoryModelStore - HashMap-backed model store for testing and development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use uuid::Uuid;

use super::{key_check, normalize_filter};
use crate::error::ModelError;
use crate::model::{DeleteOptions, Model, ModelKeyCheck, ModelStore, ModelType, User};

/// In-memory model store backed by a HashMap keyed by model id.
///
/// Models without an id get a random UUID. There is no history: a new
/// version simply bumps `version` and overwrites the record. Clone-friendly
/// via Arc.
#[derive(Clone)]
pub struct InMemoryModelStore {
    storage: Arc<RwLock<HashMap<String, Model>>>,
}

impl Default for InMemoryModelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryModelStore {
    /// Create a new empty model store.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of stored models across all types.
    pub fn len(&self) -> Result<usize, ModelError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| ModelError::LockPoisoned("len"))?;
        Ok(storage.len())
    }

    pub fn is_empty(&self) -> Result<bool, ModelError> {
        Ok(self.len()? == 0)
    }

    fn put(&self, mut model: Model) -> Result<Model, ModelError> {
        let id = model
            .id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();

        let mut storage = self
            .storage
            .write()
            .map_err(|_| ModelError::LockPoisoned("save"))?;
        storage.insert(id, model.clone());
        Ok(model)
    }

    fn find_by_key(&self, model_type: ModelType, key: &str) -> Result<Option<Model>, ModelError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| ModelError::LockPoisoned("find by key"))?;
        Ok(storage
            .values()
            .find(|m| m.model_type == model_type && m.key == key)
            .cloned())
    }
}

impl ModelStore for InMemoryModelStore {
    fn name(&self) -> &'static str {
        "in memory"
    }

    fn get_model(&self, id: &str) -> Result<Model, ModelError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| ModelError::LockPoisoned("get"))?;
        storage.get(id).cloned().ok_or_else(|| ModelError::not_found(id))
    }

    fn get_models_by_type(
        &self,
        model_type: ModelType,
        filter: Option<&str>,
    ) -> Result<Vec<Model>, ModelError> {
        let filter = normalize_filter(filter);
        let storage = self
            .storage
            .read()
            .map_err(|_| ModelError::LockPoisoned("list"))?;

        let mut results: Vec<Model> = storage
            .values()
            .filter(|m| m.model_type == model_type)
            .filter(|m| match &filter {
                Some(f) => m.key.to_lowercase().contains(f) || m.name.to_lowercase().contains(f),
                None => true,
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }

    fn validate_model_key(
        &self,
        existing: Option<&Model>,
        model_type: ModelType,
        key: &str,
    ) -> Result<ModelKeyCheck, ModelError> {
        let holder = self.find_by_key(model_type, key)?;
        Ok(key_check(existing, key, holder.as_ref()))
    }

    fn create_model(&self, mut model: Model, created_by: &User) -> Result<Model, ModelError> {
        let now = Utc::now();
        model.created = Some(now);
        model.created_by = Some(created_by.id.clone());
        model.last_updated = Some(now);
        model.last_updated_by = Some(created_by.id.clone());
        self.put(model)
    }

    fn save_model(&self, model: Model) -> Result<Model, ModelError> {
        self.put(model)
    }

    fn create_new_model_version(
        &self,
        mut model: Model,
        comment: &str,
        updated_by: &User,
    ) -> Result<Model, ModelError> {
        model.version = model.version.max(0) + 1;
        model.comment = Some(comment.to_string());
        model.last_updated = Some(Utc::now());
        model.last_updated_by = Some(updated_by.id.clone());
        self.put(model)
    }

    fn delete_model(
        &self,
        id: &str,
        _options: &DeleteOptions,
        _deleted_by: &User,
    ) -> Result<(), ModelError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| ModelError::LockPoisoned("delete"))?;
        storage
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ModelError::not_found(id))
    }
}
