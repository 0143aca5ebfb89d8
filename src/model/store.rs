//! ModelStore - the capability interface every backend implements.

use serde_json::Value;

use super::{DeleteOptions, Model, ModelHistory, ModelKeyCheck, ModelType, User};
use crate::error::ModelError;

/// Abstract storage for models.
///
/// The trait is object safe so backends can be combined behind
/// `Arc<dyn ModelStore>` (see `MultiModelStore`). Backends without version
/// control keep the default history methods, which report no history.
pub trait ModelStore: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Get the current version of a model.
    fn get_model(&self, id: &str) -> Result<Model, ModelError>;

    /// List models of one type. `filter` is a case-insensitive substring.
    fn get_models_by_type(
        &self,
        model_type: ModelType,
        filter: Option<&str>,
    ) -> Result<Vec<Model>, ModelError>;

    /// Number of models of one type.
    fn model_count(&self, model_type: ModelType) -> Result<u64, ModelError> {
        Ok(self.get_models_by_type(model_type, None)?.len() as u64)
    }

    /// Check whether `key` is still free for `model_type`.
    ///
    /// `existing` is the model being renamed, if any; keeping its own key is
    /// never reported as a conflict.
    fn validate_model_key(
        &self,
        existing: Option<&Model>,
        model_type: ModelType,
        key: &str,
    ) -> Result<ModelKeyCheck, ModelError>;

    /// Store a new model, stamping creation audit fields. Assigns an id when absent.
    fn create_model(&self, model: Model, created_by: &User) -> Result<Model, ModelError>;

    /// Overwrite the current version without creating a new one.
    fn save_model(&self, model: Model) -> Result<Model, ModelError>;

    /// Store the model as a new version with a comment.
    fn create_new_model_version(
        &self,
        model: Model,
        comment: &str,
        updated_by: &User,
    ) -> Result<Model, ModelError>;

    fn delete_model(
        &self,
        id: &str,
        options: &DeleteOptions,
        deleted_by: &User,
    ) -> Result<(), ModelError>;

    /// Earlier versions of a model, newest first.
    fn get_model_history(&self, _model: &Model) -> Result<Vec<ModelHistory>, ModelError> {
        Ok(Vec::new())
    }

    /// A single historical snapshot by history id.
    fn get_model_history_entry(
        &self,
        _history_id: &str,
    ) -> Result<Option<ModelHistory>, ModelError> {
        Ok(None)
    }

    /// All history entries of one model type.
    fn get_model_history_for_type(
        &self,
        _user: Option<&User>,
        _model_type: ModelType,
    ) -> Result<Vec<ModelHistory>, ModelError> {
        Ok(Vec::new())
    }

    /// The editor JSON of a model.
    fn load_editor_json(&self, id: &str) -> Result<Value, ModelError> {
        Ok(self.get_model(id)?.editor_json.unwrap_or(Value::Null))
    }
}

impl<S: ModelStore + ?Sized> ModelStore for std::sync::Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn get_model(&self, id: &str) -> Result<Model, ModelError> {
        (**self).get_model(id)
    }

    fn get_models_by_type(
        &self,
        model_type: ModelType,
        filter: Option<&str>,
    ) -> Result<Vec<Model>, ModelError> {
        (**self).get_models_by_type(model_type, filter)
    }

    fn model_count(&self, model_type: ModelType) -> Result<u64, ModelError> {
        (**self).model_count(model_type)
    }

    fn validate_model_key(
        &self,
        existing: Option<&Model>,
        model_type: ModelType,
        key: &str,
    ) -> Result<ModelKeyCheck, ModelError> {
        (**self).validate_model_key(existing, model_type, key)
    }

    fn create_model(&self, model: Model, created_by: &User) -> Result<Model, ModelError> {
        (**self).create_model(model, created_by)
    }

    fn save_model(&self, model: Model) -> Result<Model, ModelError> {
        (**self).save_model(model)
    }

    fn create_new_model_version(
        &self,
        model: Model,
        comment: &str,
        updated_by: &User,
    ) -> Result<Model, ModelError> {
        (**self).create_new_model_version(model, comment, updated_by)
    }

    fn delete_model(
        &self,
        id: &str,
        options: &DeleteOptions,
        deleted_by: &User,
    ) -> Result<(), ModelError> {
        (**self).delete_model(id, options, deleted_by)
    }

    fn get_model_history(&self, model: &Model) -> Result<Vec<ModelHistory>, ModelError> {
        (**self).get_model_history(model)
    }

    fn get_model_history_entry(
        &self,
        history_id: &str,
    ) -> Result<Option<ModelHistory>, ModelError> {
        (**self).get_model_history_entry(history_id)
    }

    fn get_model_history_for_type(
        &self,
        user: Option<&User>,
        model_type: ModelType,
    ) -> Result<Vec<ModelHistory>, ModelError> {
        (**self).get_model_history_for_type(user, model_type)
    }

    fn load_editor_json(&self, id: &str) -> Result<Value, ModelError> {
        (**self).load_editor_json(id)
    }
}
