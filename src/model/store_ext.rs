//! ModelStoreExt - higher level operations shared by every store.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::{Model, ModelHistory, ModelStore, ModelType, User};
use crate::bpmn::{self, BpmnModel, ReferenceKeys};
use crate::deploy::AppDefinition;
use crate::error::ModelError;

/// An editor save: field updates plus versioning instructions.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub name: Option<String>,
    pub key: Option<String>,
    pub description: Option<String>,
    pub editor_json: Option<Value>,
    pub thumbnail: Option<Vec<u8>>,
    pub new_version: bool,
    pub comment: Option<String>,
    pub updated_by: User,
}

impl SaveRequest {
    pub fn new(updated_by: User) -> Self {
        Self {
            name: None,
            key: None,
            description: None,
            editor_json: None,
            thumbnail: None,
            new_version: false,
            comment: None,
            updated_by,
        }
    }

    pub fn editor_json(mut self, editor_json: Value) -> Self {
        self.editor_json = Some(editor_json);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn thumbnail(mut self, thumbnail: Vec<u8>) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    /// Store the save as a new version with `comment`.
    pub fn new_version(mut self, comment: impl Into<String>) -> Self {
        self.new_version = true;
        self.comment = Some(comment.into());
        self
    }
}

/// An app definition that can be deployed: the newest committed version of
/// an app model that still exists. `definition` is the app JSON of that
/// version, or the current one when the store cannot read old content.
#[derive(Debug, Clone, PartialEq)]
pub struct DeployableApp {
    pub model_id: String,
    pub history_id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: i32,
    pub last_updated_by: Option<String>,
    pub definition: Value,
}

impl DeployableApp {
    fn from_history(history: ModelHistory) -> Self {
        let history_id = history.id().to_string();
        let model_id = history.model_id().to_string();
        let snapshot = history.into_snapshot();
        Self {
            model_id,
            history_id,
            name: snapshot.name,
            description: snapshot.description,
            version: snapshot.version,
            last_updated_by: snapshot.last_updated_by,
            definition: snapshot.editor_json.unwrap_or(Value::Null),
        }
    }
}

/// Extension operations available on every [`ModelStore`].
pub trait ModelStoreExt: ModelStore {
    /// Apply an editor save to `model` and persist it.
    fn save_model_with(&self, mut model: Model, request: SaveRequest) -> Result<Model, ModelError> {
        if let Some(name) = request.name {
            model.name = name;
        }
        if let Some(key) = request.key {
            model.key = key;
        }
        if let Some(description) = request.description {
            model.description = Some(description);
        }
        if let Some(editor_json) = request.editor_json {
            model.editor_json = Some(editor_json);
        }
        if let Some(thumbnail) = request.thumbnail {
            model.thumbnail = Some(thumbnail);
        }
        model.last_updated_by = Some(request.updated_by.id.clone());
        model.last_updated = Some(Utc::now());

        if request.new_version {
            let comment = request.comment.unwrap_or_default();
            self.create_new_model_version(model, &comment, &request.updated_by)
        } else {
            self.save_model(model)
        }
    }

    /// Load a model by id, then apply an editor save to it.
    fn save_model_by_id(&self, id: &str, request: SaveRequest) -> Result<Model, ModelError> {
        let model = self.get_model(id)?;
        self.save_model_with(model, request)
    }

    /// Create a new version and describe it as a history entry.
    fn create_new_version_with_history(
        &self,
        model: Model,
        comment: &str,
        updated_by: &User,
    ) -> Result<ModelHistory, ModelError> {
        let saved = self.create_new_model_version(model, comment, updated_by)?;
        Ok(ModelHistory::of(&saved))
    }

    /// Models referenced by an app (its processes) or a process (its forms
    /// and decision tables). Other model types reference nothing.
    fn get_referenced_models(&self, id: &str) -> Result<Vec<Model>, ModelError> {
        let model = self.get_model(id)?;
        let json = match model.editor_json {
            Some(json) => json,
            None => self.load_editor_json(id)?,
        };
        let ids = match model.model_type {
            ModelType::App => AppDefinition::from_json(&json)?.model_ids(),
            ModelType::Process => {
                let mut ids = bpmn::form_reference_ids(&json);
                for id in bpmn::decision_table_reference_ids(&json) {
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                ids
            }
            _ => Vec::new(),
        };
        ids.iter().map(|id| self.get_model(id)).collect()
    }

    /// Convert a process model into a BPMN graph, resolving its form and
    /// decision table references through this store.
    fn get_bpmn_model(&self, model: &Model) -> Result<BpmnModel, ModelError> {
        let json = match &model.editor_json {
            Some(json) => json.clone(),
            None => self.load_editor_json(&model.id_or_derived()?)?,
        };

        let mut forms = HashMap::new();
        for id in bpmn::form_reference_ids(&json) {
            forms.insert(id.clone(), self.get_model(&id)?);
        }
        let mut decision_tables = HashMap::new();
        for id in bpmn::decision_table_reference_ids(&json) {
            decision_tables.insert(id.clone(), self.get_model(&id)?);
        }

        let refs = ReferenceKeys::from_models(forms.values(), decision_tables.values());
        Ok(bpmn::convert_to_bpmn(&json, &refs)?)
    }

    /// Serialize a BPMN graph to XML. Process ids may not start with a digit
    /// and get an `a` prefix when they do.
    fn get_bpmn_xml(&self, bpmn_model: &mut BpmnModel) -> Result<Vec<u8>, ModelError> {
        for process in &mut bpmn_model.processes {
            if process.id.starts_with(|c: char| c.is_ascii_digit()) {
                process.id = format!("a{}", process.id);
            }
        }
        Ok(bpmn::to_bpmn_xml(bpmn_model)?)
    }

    /// The newest history entry of every app model that still exists.
    fn get_deployable_app_definitions(
        &self,
        user: Option<&User>,
    ) -> Result<Vec<DeployableApp>, ModelError> {
        let mut latest: HashMap<String, ModelHistory> = HashMap::new();
        for entry in self.get_model_history_for_type(user, ModelType::App)? {
            match latest.get(entry.model_id()) {
                Some(known) if known.revision() >= entry.revision() => {}
                _ => {
                    latest.insert(entry.model_id().to_string(), entry);
                }
            }
        }

        let mut apps = Vec::with_capacity(latest.len());
        for (model_id, entry) in latest {
            match self.get_model(&model_id) {
                Ok(current) => {
                    let entry = self.get_model_history_entry(entry.id())?.unwrap_or(entry);
                    let mut app = DeployableApp::from_history(entry);
                    if app.definition.is_null() {
                        app.definition = current.editor_json.unwrap_or(Value::Null);
                    }
                    apps.push(app);
                }
                Err(e) if e.is_not_found() => {
                    debug!(model_id = %model_id, "app model no longer exists");
                }
                Err(e) => return Err(e),
            }
        }
        apps.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.model_id.cmp(&b.model_id)));
        Ok(apps)
    }
}

impl<S: ModelStore + ?Sized> ModelStoreExt for S {}
