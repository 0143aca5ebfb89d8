//! Models - the versioned editor artifacts of a process suite.
//!
//! A model is a named JSON document (process diagram, form, decision table,
//! app definition, translation bundle or template) plus audit metadata. Every
//! backend implements [`ModelStore`]; the convenience operations layered on
//! top live in [`ModelStoreExt`].
//!
//! ## Example
//!
//! ```ignore
//! use model_vault::{InMemoryModelStore, Model, ModelStore, ModelType, User};
//!
//! let store = InMemoryModelStore::new();
//! let admin = User::new("admin");
//! let model = Model::new(ModelType::Process, "order-process", "Order")
//!     .with_editor_json(serde_json::json!({"a": 1}));
//! let saved = store.create_model(model, &admin)?;
//! let loaded = store.get_model(saved.id().unwrap())?;
//! ```

mod document;
mod history;
pub mod id;
mod store;
mod store_ext;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use document::{DateFormat, ModelDocument};
pub use history::ModelHistory;
pub use id::ModelId;
pub use store::ModelStore;
pub use store_ext::{DeployableApp, ModelStoreExt, SaveRequest};

/// Version number of a model that is not under version control.
pub const UNVERSIONED: i32 = -1;

/// The kind of a model. Each kind is stored in its own directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    #[default]
    Process,
    Template,
    Form,
    App,
    DecisionTable,
    Translation,
}

impl ModelType {
    pub const ALL: [ModelType; 6] = [
        ModelType::Process,
        ModelType::Template,
        ModelType::Form,
        ModelType::App,
        ModelType::DecisionTable,
        ModelType::Translation,
    ];

    /// Directory name used in paths and ids.
    pub fn dir_name(self) -> &'static str {
        match self {
            ModelType::Process => "bpmn",
            ModelType::Template => "template",
            ModelType::Form => "form",
            ModelType::App => "app",
            ModelType::DecisionTable => "decisiontable",
            ModelType::Translation => "translation",
        }
    }

    pub fn from_dir_name(name: &str) -> Option<ModelType> {
        ModelType::ALL
            .into_iter()
            .find(|model_type| model_type.dir_name() == name)
    }
}

/// The acting user. Passed through to version control as credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub password: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

/// A model record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: Option<String>,
    pub key: String,
    pub model_type: ModelType,
    pub name: String,
    pub description: Option<String>,
    pub editor_json: Option<Value>,
    pub version: i32,
    pub created_by: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub last_updated_by: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub comment: Option<String>,
    pub thumbnail: Option<Vec<u8>>,
}

impl Model {
    pub fn new(model_type: ModelType, key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            key: key.into(),
            model_type,
            name: name.into(),
            description: None,
            editor_json: None,
            version: UNVERSIONED,
            created_by: None,
            created: None,
            last_updated_by: None,
            last_updated: None,
            comment: None,
            thumbnail: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_editor_json(mut self, editor_json: Value) -> Self {
        self.editor_json = Some(editor_json);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// The id derived from type and key, ignoring any id already assigned.
    pub fn derived_id(&self) -> Result<String, crate::ModelError> {
        id::model_id(self.model_type, &self.key)
    }

    /// The assigned id, or the one derived from type and key.
    pub fn id_or_derived(&self) -> Result<String, crate::ModelError> {
        match &self.id {
            Some(id) => Ok(id.clone()),
            None => self.derived_id(),
        }
    }

    /// The editor JSON, or `Value::Null` when absent.
    pub fn editor_json_or_null(&self) -> &Value {
        static NULL: Value = Value::Null;
        self.editor_json.as_ref().unwrap_or(&NULL)
    }

    pub fn is_versioned(&self) -> bool {
        self.version != UNVERSIONED
    }
}

/// Result of checking whether a key is still free for a model type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelKeyCheck {
    pub key: String,
    pub key_already_exists: bool,
    /// False when the key cannot be encoded into an id at all.
    pub valid: bool,
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Options for [`ModelStore::delete_model`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub cascade_history: bool,
    /// Also undeploy the runtime app when deleting an app definition.
    pub delete_runtime_app: bool,
    pub comment: Option<String>,
}

impl DeleteOptions {
    pub fn with_comment(comment: impl Into<String>) -> Self {
        Self {
            comment: Some(comment.into()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_names_round_trip() {
        for model_type in ModelType::ALL {
            assert_eq!(ModelType::from_dir_name(model_type.dir_name()), Some(model_type));
        }
        assert_eq!(ModelType::from_dir_name("nope"), None);
    }

    #[test]
    fn new_model_is_unversioned() {
        let model = Model::new(ModelType::Form, "invoice", "Invoice");
        assert!(!model.is_versioned());
        assert_eq!(model.id_or_derived().unwrap(), "{form-invoice}");
        assert_eq!(model.editor_json_or_null(), &Value::Null);
    }
}
