//! SvnModelStore - a file-system store whose files live in an svn working copy.
//!
//! Plain saves only rewrite the model file. A new version additionally
//! schedules the file (and any untracked parent directories) for addition,
//! commits it, reads the new revision back with `svn info` and stores it in
//! the file. History comes from `svn log`, historical content from `svn cat`.
//!
//! ## Example
//!
//! ```ignore
//! use model_vault::{FileSystemModelStore, ModelStore, ProcessSvnExecutor, SvnModelStore, User};
//!
//! let store = SvnModelStore::new(
//!     FileSystemModelStore::new("/var/models-wc"),
//!     ProcessSvnExecutor::default(),
//! );
//! let alice = User::new("alice").with_password("secret");
//! let saved = store.create_new_model_version(model, "first draft", &alice)?;
//! let history = store.get_model_history(&saved)?;
//! ```

mod executor;
mod log;

pub use executor::{CancelHandle, CommandRunner, ProcessSvnExecutor, SvnExecutor};
pub use log::{parse_info, parse_log, ChangedPath, LogEntry, SvnStatus};

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ModelError;
use crate::model::{
    id, DeleteOptions, Model, ModelHistory, ModelId, ModelKeyCheck, ModelStore, ModelType, User,
};
use crate::store::FileSystemModelStore;

/// svn error codes meaning "this path is not under version control".
const UNVERSIONED_CODES: [&str; 6] = [
    "E155010",
    "W155010",
    "E200009",
    "E155007",
    "not under version control",
    "not a working copy",
];

/// svn error codes meaning "no such path in that revision".
const MISSING_REVISION_CODES: [&str; 3] = ["E160013", "E195012", "E200009"];

fn stderr_matches(err: &ModelError, codes: &[&str]) -> bool {
    match err {
        ModelError::Command { stderr, .. } => codes.iter().any(|code| stderr.contains(code)),
        _ => false,
    }
}

/// A [`FileSystemModelStore`] under svn version control.
pub struct SvnModelStore<E = ProcessSvnExecutor> {
    files: FileSystemModelStore,
    svn: E,
    tracked: Mutex<HashSet<PathBuf>>,
}

impl<E: SvnExecutor> SvnModelStore<E> {
    /// `files` must be rooted inside an svn working copy.
    pub fn new(files: FileSystemModelStore, svn: E) -> Self {
        Self {
            files,
            svn,
            tracked: Mutex::new(HashSet::new()),
        }
    }

    /// Access the wrapped file store.
    pub fn inner(&self) -> &FileSystemModelStore {
        &self.files
    }

    pub fn executor(&self) -> &E {
        &self.svn
    }

    /// Working copy status of one path.
    pub fn status(&self, path: &Path) -> Result<SvnStatus, ModelError> {
        match self.svn.execute(None, "stat", path, &["--depth", "empty"]) {
            Ok(output) => Ok(SvnStatus::parse(&output)),
            Err(e) if stderr_matches(&e, &UNVERSIONED_CODES) => Ok(SvnStatus::NotAdded),
            Err(e) => Err(e),
        }
    }

    fn is_tracked(&self, path: &Path) -> Result<bool, ModelError> {
        {
            let tracked = self
                .tracked
                .lock()
                .map_err(|_| ModelError::LockPoisoned("tracked paths"))?;
            if tracked.contains(path) {
                return Ok(true);
            }
        }
        let is_tracked = self.status(path)?.is_tracked();
        if is_tracked {
            self.remember(path)?;
        }
        Ok(is_tracked)
    }

    fn remember(&self, path: &Path) -> Result<(), ModelError> {
        self.tracked
            .lock()
            .map_err(|_| ModelError::LockPoisoned("tracked paths"))?
            .insert(path.to_path_buf());
        Ok(())
    }

    fn forget(&self, path: &Path) -> Result<(), ModelError> {
        self.tracked
            .lock()
            .map_err(|_| ModelError::LockPoisoned("tracked paths"))?
            .remove(path);
        Ok(())
    }

    /// Schedule `path` for addition, adding untracked parents first.
    ///
    /// Returns the topmost path that was added, which is what has to be
    /// committed, or `None` when `path` was already tracked. The store root
    /// itself is never added.
    fn add(&self, path: &Path) -> Result<Option<PathBuf>, ModelError> {
        if path == self.files.root() || self.is_tracked(path)? {
            return Ok(None);
        }

        let parent_added = match path.parent() {
            Some(parent) if parent.starts_with(self.files.root()) => self.add(parent)?,
            _ => None,
        };
        if parent_added.is_some() {
            // `svn add` on a directory adds its content as well
            self.remember(path)?;
            return Ok(parent_added);
        }

        self.svn.execute(None, "add", path, &[])?;
        self.remember(path)?;
        Ok(Some(path.to_path_buf()))
    }

    fn commit(&self, user: &User, path: &Path, comment: &str) -> Result<(), ModelError> {
        let output = self
            .svn
            .execute(Some(user), "commit", path, &["--message", comment])?;
        info!(path = %path.display(), user = %user.id, output = %output.trim(), "committed");
        Ok(())
    }

    /// Last commit of a path according to `svn info`.
    fn last_commit(&self, path: &Path) -> Result<Option<LogEntry>, ModelError> {
        let output = self.svn.execute(None, "info", path, &["--xml"])?;
        if log::is_xml(&output) {
            parse_info(&output)
        } else {
            Ok(None)
        }
    }

    /// Run `svn log`, treating unversioned paths as having no history.
    fn log(
        &self,
        user: Option<&User>,
        path: &Path,
        params: &[&str],
    ) -> Result<Vec<LogEntry>, ModelError> {
        match self.svn.execute(user, "log", path, params) {
            Ok(output) if log::is_xml(&output) => parse_log(&output),
            Ok(_) => Ok(Vec::new()),
            Err(e) if stderr_matches(&e, &UNVERSIONED_CODES) => {
                debug!(path = %path.display(), "no history for unversioned path");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn history_record(
        &self,
        model_type: ModelType,
        key: &str,
        name: &str,
        entry: &LogEntry,
    ) -> Result<ModelHistory, ModelError> {
        let history_id = id::history_id(model_type, key, entry.revision)?;
        let model_id = id::model_id(model_type, key)?;

        let mut snapshot = Model::new(model_type, key, name).with_id(model_id.clone());
        snapshot.version = entry.revision;
        snapshot.last_updated = entry.date;
        snapshot.last_updated_by = entry.author.clone();
        snapshot.comment = entry.message.clone();
        Ok(ModelHistory::new(history_id, model_id, snapshot))
    }
}

impl<E: SvnExecutor> ModelStore for SvnModelStore<E> {
    fn name(&self) -> &'static str {
        "svn"
    }

    fn get_model(&self, id: &str) -> Result<Model, ModelError> {
        self.files.get_model(id)
    }

    fn get_models_by_type(
        &self,
        model_type: ModelType,
        filter: Option<&str>,
    ) -> Result<Vec<Model>, ModelError> {
        self.files.get_models_by_type(model_type, filter)
    }

    fn model_count(&self, model_type: ModelType) -> Result<u64, ModelError> {
        self.files.model_count(model_type)
    }

    fn validate_model_key(
        &self,
        existing: Option<&Model>,
        model_type: ModelType,
        key: &str,
    ) -> Result<ModelKeyCheck, ModelError> {
        self.files.validate_model_key(existing, model_type, key)
    }

    fn create_model(&self, model: Model, created_by: &User) -> Result<Model, ModelError> {
        self.files.create_model(model, created_by)
    }

    /// Rewrites the file and keeps the last committed revision.
    fn save_model(&self, model: Model) -> Result<Model, ModelError> {
        let id = self.files.persist(&model, None)?;
        self.files.load(&id)
    }

    fn create_new_model_version(
        &self,
        mut model: Model,
        comment: &str,
        updated_by: &User,
    ) -> Result<Model, ModelError> {
        model.comment = Some(comment.to_string());
        let id = self.files.persist(&model, Some(updated_by))?;
        let file = self.files.file_for(&id);

        let to_commit = self.add(&file)?.unwrap_or_else(|| file.clone());
        self.commit(updated_by, &to_commit, comment)?;

        let mut committed = self.files.load(&id)?;
        match self.last_commit(&file)? {
            Some(info) => {
                committed.version = info.revision;
                committed.last_updated = info.date.or(committed.last_updated);
                committed.last_updated_by = info.author.clone().or(committed.last_updated_by);
                if info.message.is_some() {
                    committed.comment = info.message.clone();
                }
                if committed.created.is_none() {
                    committed.created = info.date;
                }
                if committed.created_by.is_none() {
                    committed.created_by = info.author;
                }
            }
            None => {
                committed.last_updated.get_or_insert_with(Utc::now);
                committed
                    .last_updated_by
                    .get_or_insert_with(|| updated_by.id.clone());
            }
        }

        self.files.persist(&committed, None)?;
        self.files.load(&id)
    }

    fn delete_model(
        &self,
        id: &str,
        options: &DeleteOptions,
        deleted_by: &User,
    ) -> Result<(), ModelError> {
        let id = ModelId::parse(id)?;
        let file = self.files.file_for(&id);
        if !file.is_file() {
            return Err(ModelError::not_found(id.to_string()));
        }
        self.files.undeploy_if_requested(&id, options)?;

        if !self.is_tracked(&file)? {
            return fs::remove_file(&file).map_err(|e| ModelError::io(file.display(), e));
        }

        let comment = options
            .comment
            .clone()
            .unwrap_or_else(|| format!("Deleted {}", id));
        self.svn.execute(None, "delete", &file, &[])?;
        self.forget(&file)?;
        self.commit(deleted_by, &file, &comment)
    }

    /// Earlier revisions of the model file, newest first.
    fn get_model_history(&self, model: &Model) -> Result<Vec<ModelHistory>, ModelError> {
        let id = FileSystemModelStore::target_id(model)?;
        let file = self.files.file_for(&id);
        if !file.is_file() {
            return Ok(Vec::new());
        }

        self.log(None, &file, &["-r", "PREV:0", "--xml"])?
            .iter()
            .filter(|entry| entry.revision > 0)
            .map(|entry| self.history_record(id.model_type(), id.key(), &model.name, entry))
            .collect()
    }

    fn get_model_history_entry(
        &self,
        history_id: &str,
    ) -> Result<Option<ModelHistory>, ModelError> {
        let history = ModelId::parse_history(history_id)?;
        let current = history.to_current();
        let file = self.files.file_for(&current);
        let revision = history.revision().unwrap_or_default().to_string();

        let content = match self.svn.execute(None, "cat", &file, &["-r", &revision]) {
            Ok(content) => content,
            Err(e) if stderr_matches(&e, &MISSING_REVISION_CODES) => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut snapshot = self
            .files
            .parse(&current, content.as_bytes(), history_id)?;
        snapshot.version = history.revision().unwrap_or_default();

        if let Some(entry) = self
            .log(None, &file, &["-r", &revision, "--xml"])?
            .into_iter()
            .next()
        {
            snapshot.last_updated = entry.date.or(snapshot.last_updated);
            snapshot.last_updated_by = entry.author.or(snapshot.last_updated_by);
            snapshot.comment = entry.message.or(snapshot.comment);
        }

        Ok(Some(ModelHistory::new(
            history.to_string(),
            current.to_string(),
            snapshot,
        )))
    }

    /// One entry per changed model file of the type directory, newest first.
    fn get_model_history_for_type(
        &self,
        user: Option<&User>,
        model_type: ModelType,
    ) -> Result<Vec<ModelHistory>, ModelError> {
        let dir = self.files.type_dir(model_type);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut res = Vec::new();
        for entry in self.log(user, &dir, &["-v", "--xml"])? {
            if entry.revision <= 0 {
                continue;
            }
            for path in &entry.paths {
                if path.parent_dir() != Some(model_type.dir_name()) {
                    continue;
                }
                let Some(key) = path.model_key() else { continue };
                if id::validate_key(key).is_err() {
                    continue;
                }
                let name = self
                    .files
                    .get_model(&id::model_id(model_type, key)?)
                    .map(|m| m.name)
                    .unwrap_or_else(|_| key.to_string());
                res.push(self.history_record(model_type, key, &name, &entry)?);
            }
        }
        Ok(res)
    }

    fn load_editor_json(&self, id: &str) -> Result<Value, ModelError> {
        self.files.load_editor_json(id)
    }
}
