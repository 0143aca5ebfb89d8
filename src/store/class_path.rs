//! ClassPathModelStore - read-only models bundled with the application.
//!
//! Each root is either a directory, scanned as `<root>/<base>/<type-dir>/*.json`,
//! or a zip/jar archive whose entries below `<base>` ending in `.json` are
//! read. The scan happens once, on first access. Entries whose file name is
//! not a valid key (for example one ending in a numeric `-` segment) are
//! skipped with a warning.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Once;

use serde_json::Value;
use tracing::{debug, warn};
use zip::ZipArchive;

use super::file_system::EXTENSION;
use super::InMemoryModelStore;
use crate::error::ModelError;
use crate::model::{
    DateFormat, DeleteOptions, Model, ModelDocument, ModelId, ModelKeyCheck, ModelStore,
    ModelType, User,
};

const STORE_NAME: &str = "class path";

pub struct ClassPathModelStore {
    roots: Vec<PathBuf>,
    base_path: String,
    dates: DateFormat,
    models: InMemoryModelStore,
    init: Once,
}

impl ClassPathModelStore {
    pub fn new(roots: Vec<PathBuf>, base_path: impl Into<String>) -> Self {
        Self {
            roots,
            base_path: base_path.into().trim_matches('/').to_string(),
            dates: DateFormat::default(),
            models: InMemoryModelStore::new(),
            init: Once::new(),
        }
    }

    pub fn with_date_format(mut self, dates: DateFormat) -> Self {
        self.dates = dates;
        self
    }

    fn models(&self) -> &InMemoryModelStore {
        self.init.call_once(|| self.scan());
        &self.models
    }

    fn scan(&self) {
        for root in &self.roots {
            let result = if root.is_dir() {
                self.scan_dir(root)
            } else if root.is_file() {
                self.scan_archive(root)
            } else {
                debug!(root = %root.display(), "class path root does not exist");
                Ok(())
            };
            if let Err(e) = result {
                warn!(root = %root.display(), error = %e, "error reading models from class path");
            }
        }
    }

    fn scan_dir(&self, root: &Path) -> Result<(), ModelError> {
        let base = root.join(&self.base_path);
        if !base.is_dir() {
            return Ok(());
        }
        for model_type in ModelType::ALL {
            let dir = base.join(model_type.dir_name());
            let Ok(entries) = fs::read_dir(&dir) else { continue };
            for entry in entries {
                let path = entry.map_err(|e| ModelError::io(dir.display(), e))?.path();
                let name = path.to_string_lossy().replace('\\', "/");
                if !path.is_file() || !name.ends_with(EXTENSION) {
                    continue;
                }
                match fs::read(&path) {
                    Ok(bytes) => self.load(&name, &bytes),
                    Err(e) => warn!(path = %name, error = %e, "unable to read model file"),
                }
            }
        }
        Ok(())
    }

    fn scan_archive(&self, archive: &Path) -> Result<(), ModelError> {
        let file = File::open(archive).map_err(|e| ModelError::io(archive.display(), e))?;
        let mut zip = ZipArchive::new(file)
            .map_err(|e| ModelError::Io(format!("{}: {}", archive.display(), e)))?;

        for index in 0..zip.len() {
            let mut entry = match zip.by_index(index) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(archive = %archive.display(), index, error = %e, "unreadable archive entry");
                    continue;
                }
            };
            let name = entry.name().to_string();
            if !name.starts_with(&self.base_path) || !name.ends_with(EXTENSION) {
                continue;
            }
            let mut bytes = Vec::new();
            match entry.read_to_end(&mut bytes) {
                Ok(_) => self.load(&name, &bytes),
                Err(e) => warn!(entry = %name, error = %e, "unable to read archive entry"),
            }
        }
        Ok(())
    }

    /// Register one model file. `name` is a `/` separated path ending in
    /// `<type-dir>/<key>.json`.
    fn load(&self, name: &str, bytes: &[u8]) {
        let result = model_id_for(name).and_then(|id| {
            let model = ModelDocument::from_slice(bytes, name)?.into_model(&id, &self.dates)?;
            self.models.save_model(model)
        });
        match result {
            Ok(model) => debug!(model_id = ?model.id, source = name, "class path model loaded"),
            Err(e) => warn!(source = name, error = %e, "skipping class path model"),
        }
    }
}

fn model_id_for(name: &str) -> Result<ModelId, ModelError> {
    let (parent, file) = name
        .rsplit_once('/')
        .ok_or_else(|| ModelError::InvalidId(name.to_string()))?;
    let type_dir = parent.rsplit('/').next().unwrap_or(parent);
    let key = file
        .strip_suffix(EXTENSION)
        .ok_or_else(|| ModelError::InvalidId(name.to_string()))?;
    ModelId::current(ModelType::from_dir_name(type_dir).unwrap_or_default(), key)
}

impl ModelStore for ClassPathModelStore {
    fn name(&self) -> &'static str {
        STORE_NAME
    }

    fn get_model(&self, id: &str) -> Result<Model, ModelError> {
        self.models().get_model(id)
    }

    fn get_models_by_type(
        &self,
        model_type: ModelType,
        filter: Option<&str>,
    ) -> Result<Vec<Model>, ModelError> {
        self.models().get_models_by_type(model_type, filter)
    }

    fn validate_model_key(
        &self,
        existing: Option<&Model>,
        model_type: ModelType,
        key: &str,
    ) -> Result<ModelKeyCheck, ModelError> {
        self.models().validate_model_key(existing, model_type, key)
    }

    fn create_model(&self, _model: Model, _created_by: &User) -> Result<Model, ModelError> {
        Err(ModelError::ReadOnly { store: STORE_NAME })
    }

    fn save_model(&self, _model: Model) -> Result<Model, ModelError> {
        Err(ModelError::ReadOnly { store: STORE_NAME })
    }

    fn create_new_model_version(
        &self,
        _model: Model,
        _comment: &str,
        _updated_by: &User,
    ) -> Result<Model, ModelError> {
        Err(ModelError::ReadOnly { store: STORE_NAME })
    }

    fn delete_model(
        &self,
        _id: &str,
        _options: &DeleteOptions,
        _deleted_by: &User,
    ) -> Result<(), ModelError> {
        Err(ModelError::ReadOnly { store: STORE_NAME })
    }

    fn load_editor_json(&self, id: &str) -> Result<Value, ModelError> {
        self.models().load_editor_json(id)
    }
}
