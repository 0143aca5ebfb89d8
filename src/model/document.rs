//! On-disk JSON representation of a model.
//!
//! ```text
//! {
//!   "name": "...", "description": "...", "version": 12,
//!   "createdBy": "...", "created": "...",
//!   "lastUpdatedBy": "...", "lastUpdated": "...",
//!   "comment": "...", "thumbnail": "<base64>",
//!   "modelEditorJson": { ... }
//! }
//! ```

use std::fmt::Write;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Model, ModelId, UNVERSIONED};
use crate::error::ModelError;

/// Pattern used for date fields in model files.
///
/// Patterns without an offset are written and read as UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    pattern: String,
}

impl DateFormat {
    /// `2017-10-03T15:50:34.000+0000`
    pub const DEFAULT_PATTERN: &'static str = "%Y-%m-%dT%H:%M:%S%.3f%z";

    /// A strftime pattern. Unknown or malformed specifiers are rejected.
    pub fn new(pattern: impl Into<String>) -> Result<Self, ModelError> {
        let pattern = pattern.into();
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(ModelError::Config(format!(
                "invalid date format pattern: {}",
                pattern
            )));
        }
        Ok(Self { pattern })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn format(&self, date: &DateTime<Utc>) -> Result<String, ModelError> {
        let mut text = String::new();
        write!(text, "{}", date.format(&self.pattern)).map_err(|_| {
            ModelError::Serde(format!("could not format date with {}", self.pattern))
        })?;
        Ok(text)
    }

    /// Parse with the configured pattern, falling back to RFC 3339.
    pub fn parse(&self, text: &str) -> Result<DateTime<Utc>, ModelError> {
        DateTime::parse_from_str(text, &self.pattern)
            .map(|date| date.with_timezone(&Utc))
            .or_else(|_| NaiveDateTime::parse_from_str(text, &self.pattern).map(|date| date.and_utc()))
            .or_else(|_| DateTime::parse_from_rfc3339(text).map(|date| date.with_timezone(&Utc)))
            .map_err(|e| ModelError::Serde(format!("could not parse date {}: {}", text, e)))
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self {
            pattern: Self::DEFAULT_PATTERN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDocument {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub model_editor_json: Value,
}

impl ModelDocument {
    pub fn from_slice(bytes: &[u8], source: &str) -> Result<Self, ModelError> {
        serde_json::from_slice(bytes).map_err(|e| ModelError::serde(source, e))
    }

    pub fn to_pretty_vec(&self) -> Result<Vec<u8>, ModelError> {
        serde_json::to_vec_pretty(self).map_err(|e| ModelError::serde("model document", e))
    }

    pub fn from_model(model: &Model, dates: &DateFormat) -> Result<Self, ModelError> {
        let format_date = |date: Option<&DateTime<Utc>>| date.map(|d| dates.format(d)).transpose();
        Ok(Self {
            name: Some(model.name.clone()),
            description: model.description.clone(),
            version: Some(model.version),
            created_by: model.created_by.clone(),
            created: format_date(model.created.as_ref())?,
            last_updated_by: model.last_updated_by.clone(),
            last_updated: format_date(model.last_updated.as_ref())?,
            comment: model.comment.clone(),
            thumbnail: model.thumbnail.as_ref().map(|bytes| BASE64.encode(bytes)),
            model_editor_json: model.editor_json.clone().unwrap_or(Value::Null),
        })
    }

    /// Build a model whose id, key and type come from `id`.
    pub fn into_model(self, id: &ModelId, dates: &DateFormat) -> Result<Model, ModelError> {
        let parse_date = |text: Option<String>| text.map(|t| dates.parse(&t)).transpose();
        let thumbnail = self
            .thumbnail
            .map(|text| {
                BASE64
                    .decode(text.as_bytes())
                    .map_err(|e| ModelError::Serde(format!("thumbnail of {}: {}", id, e)))
            })
            .transpose()?;

        Ok(Model {
            id: Some(id.to_current().to_string()),
            key: id.key().to_string(),
            model_type: id.model_type(),
            name: self.name.unwrap_or_default(),
            description: self.description,
            editor_json: match self.model_editor_json {
                Value::Null => None,
                json => Some(json),
            },
            version: self.version.unwrap_or(UNVERSIONED),
            created_by: self.created_by,
            created: parse_date(self.created)?,
            last_updated_by: self.last_updated_by,
            last_updated: parse_date(self.last_updated)?,
            comment: self.comment,
            thumbnail,
        })
    }
}
