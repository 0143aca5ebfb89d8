//! FileSystemModelStore - one pretty-printed JSON file per model.
//!
//! Layout: `<root>/<type-dir>/<key>.json`, e.g. `{bpmn-order}` lives in
//! `<root>/bpmn/order.json`. There is no history; every save overwrites the
//! current file.
//!
//! File names must be valid keys. A file whose name ends in a numeric `-`
//! segment (`invoice-2024.json`) reads like a history id; it is skipped in
//! listings with a warning and cannot be opened by id.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use super::{key_check, normalize_filter};
use crate::deploy::DeploymentService;
use crate::error::ModelError;
use crate::model::{
    DateFormat, DeleteOptions, Model, ModelDocument, ModelId, ModelKeyCheck, ModelStore,
    ModelType, User, UNVERSIONED,
};

pub(crate) const EXTENSION: &str = ".json";

/// Model store writing JSON files below a root directory.
#[derive(Clone)]
pub struct FileSystemModelStore {
    root: PathBuf,
    dates: DateFormat,
    deployments: Option<Arc<dyn DeploymentService>>,
}

impl FileSystemModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dates: DateFormat::default(),
            deployments: None,
        }
    }

    /// Use a custom date pattern for the date fields of model files.
    pub fn with_date_format(mut self, dates: DateFormat) -> Self {
        self.dates = dates;
        self
    }

    /// Runtime used to undeploy apps when an app model is deleted with
    /// `delete_runtime_app`.
    pub fn with_deployment_service(mut self, deployments: Arc<dyn DeploymentService>) -> Self {
        self.deployments = Some(deployments);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn date_format(&self) -> &DateFormat {
        &self.dates
    }

    pub fn type_dir(&self, model_type: ModelType) -> PathBuf {
        self.root.join(model_type.dir_name())
    }

    pub fn file_for(&self, id: &ModelId) -> PathBuf {
        self.type_dir(id.model_type())
            .join(format!("{}{}", id.key(), EXTENSION))
    }

    /// The id a model is stored under: its own id when set, else derived
    /// from type and key.
    pub(crate) fn target_id(model: &Model) -> Result<ModelId, ModelError> {
        match &model.id {
            Some(id) => ModelId::parse(id),
            None => ModelId::current(model.model_type, &model.key),
        }
    }

    /// Write `model` to its file without touching version control.
    ///
    /// `version` is written as given. Creation fields default to the
    /// updating user and now. `lastUpdated` becomes now unless the model
    /// carries one and no updating user is given.
    pub(crate) fn persist(
        &self,
        model: &Model,
        updated_by: Option<&User>,
    ) -> Result<ModelId, ModelError> {
        let id = Self::target_id(model)?;
        let now = Utc::now();

        let mut doc = ModelDocument::from_model(model, &self.dates)?;
        if doc.created_by.is_none() {
            doc.created_by = updated_by.map(|u| u.id.clone());
        }
        if doc.created.is_none() {
            doc.created = Some(self.dates.format(&now)?);
        }
        if let Some(user) = updated_by {
            doc.last_updated_by = Some(user.id.clone());
        }
        if updated_by.is_some() || doc.last_updated.is_none() {
            doc.last_updated = Some(self.dates.format(&now)?);
        }

        if model.model_type != ModelType::App {
            if let Value::Object(editor) = &mut doc.model_editor_json {
                editor.insert("name".into(), Value::String(model.name.clone()));
                editor.insert(
                    "description".into(),
                    model
                        .description
                        .clone()
                        .map(Value::String)
                        .unwrap_or(Value::Null),
                );
            }
        }

        let path = self.file_for(&id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ModelError::io(parent.display(), e))?;
        }
        fs::write(&path, doc.to_pretty_vec()?).map_err(|e| ModelError::io(path.display(), e))?;
        debug!(model_id = %id, path = %path.display(), "model file written");
        Ok(id)
    }

    /// Read the current file of a model.
    pub(crate) fn load(&self, id: &ModelId) -> Result<Model, ModelError> {
        let path = self.file_for(id);
        let bytes = read_model_file(&path, id)?;
        let mut model = self.parse(id, &bytes, &path.display().to_string())?;
        if model.last_updated.is_none() {
            model.last_updated = modified(&path);
        }
        Ok(model)
    }

    /// Parse model file content for `id`.
    pub(crate) fn parse(&self, id: &ModelId, bytes: &[u8], source: &str) -> Result<Model, ModelError> {
        ModelDocument::from_slice(bytes, source)?.into_model(id, &self.dates)
    }

    /// Undeploy the runtime app when deleting an app model asks for it.
    pub(crate) fn undeploy_if_requested(
        &self,
        id: &ModelId,
        options: &DeleteOptions,
    ) -> Result<(), ModelError> {
        if !options.delete_runtime_app || id.model_type() != ModelType::App {
            return Ok(());
        }
        match &self.deployments {
            Some(deployments) => deployments
                .delete_app_definition(id.key())
                .map_err(|e| ModelError::Deployment(e.to_string())),
            None => {
                warn!(model_id = %id, "no deployment service configured, runtime app kept");
                Ok(())
            }
        }
    }

    fn model_files(&self, model_type: ModelType) -> Result<Vec<PathBuf>, ModelError> {
        let dir = self.type_dir(model_type);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ModelError::io(dir.display(), e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ModelError::io(dir.display(), e))?.path();
            let is_model = path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.ends_with(EXTENSION));
            if is_model {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

pub(crate) fn read_model_file(path: &Path, id: &ModelId) -> Result<Vec<u8>, ModelError> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ModelError::not_found(id.to_string()),
        _ => ModelError::io(path.display(), e),
    })
}

fn modified(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn key_of(path: &Path) -> Option<&str> {
    path.file_name()?.to_str()?.strip_suffix(EXTENSION)
}

impl ModelStore for FileSystemModelStore {
    fn name(&self) -> &'static str {
        "file system"
    }

    fn get_model(&self, id: &str) -> Result<Model, ModelError> {
        self.load(&ModelId::parse(id)?)
    }

    fn get_models_by_type(
        &self,
        model_type: ModelType,
        filter: Option<&str>,
    ) -> Result<Vec<Model>, ModelError> {
        let filter = normalize_filter(filter);
        let mut models = Vec::new();

        for path in self.model_files(model_type)? {
            let Some(key) = key_of(&path) else { continue };
            if let Some(f) = &filter {
                if !key.to_lowercase().contains(f.as_str()) {
                    continue;
                }
            }
            match ModelId::current(model_type, key).and_then(|id| self.load(&id)) {
                Ok(model) => models.push(model),
                Err(e) => warn!(path = %path.display(), error = %e, "unable to load model file"),
            }
        }
        Ok(models)
    }

    fn model_count(&self, model_type: ModelType) -> Result<u64, ModelError> {
        Ok(self.model_files(model_type)?.len() as u64)
    }

    fn validate_model_key(
        &self,
        existing: Option<&Model>,
        model_type: ModelType,
        key: &str,
    ) -> Result<ModelKeyCheck, ModelError> {
        let holder = match ModelId::current(model_type, key) {
            Ok(id) if self.file_for(&id).is_file() => {
                Some(Model::new(model_type, key, key).with_id(id.to_string()))
            }
            _ => None,
        };
        Ok(key_check(existing, key, holder.as_ref()))
    }

    fn create_model(&self, mut model: Model, created_by: &User) -> Result<Model, ModelError> {
        model.version = UNVERSIONED;
        let id = self.persist(&model, Some(created_by))?;
        self.load(&id)
    }

    fn save_model(&self, mut model: Model) -> Result<Model, ModelError> {
        model.version = UNVERSIONED;
        let id = self.persist(&model, None)?;
        self.load(&id)
    }

    fn create_new_model_version(
        &self,
        mut model: Model,
        comment: &str,
        updated_by: &User,
    ) -> Result<Model, ModelError> {
        model.version = UNVERSIONED;
        model.comment = Some(comment.to_string());
        let id = self.persist(&model, Some(updated_by))?;
        self.load(&id)
    }

    fn delete_model(
        &self,
        id: &str,
        options: &DeleteOptions,
        _deleted_by: &User,
    ) -> Result<(), ModelError> {
        let id = ModelId::parse(id)?;
        let path = self.file_for(&id);
        if !path.is_file() {
            return Err(ModelError::not_found(id.to_string()));
        }
        self.undeploy_if_requested(&id, options)?;
        fs::remove_file(&path).map_err(|e| ModelError::io(path.display(), e))
    }

    fn load_editor_json(&self, id: &str) -> Result<Value, ModelError> {
        let id = ModelId::parse(id)?;
        let path = self.file_for(&id);
        let bytes = read_model_file(&path, &id)?;
        Ok(ModelDocument::from_slice(&bytes, &path.display().to_string())?.model_editor_json)
    }
}
