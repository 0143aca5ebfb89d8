use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;

/// The editor JSON of an app model: the processes it bundles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDefinition {
    #[serde(default)]
    pub models: Vec<AppModelDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppModelDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

impl AppDefinition {
    /// Parse an app editor JSON. `null` is an app without models.
    pub fn from_json(editor_json: &Value) -> Result<Self, ModelError> {
        if editor_json.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(editor_json.clone())
            .map_err(|e| ModelError::serde("app definition", e))
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.models.iter().map(|m| m.id.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
