//! Model id encoding.
//!
//! Current-version ids look like `{bpmn-order-process}`, history ids carry the
//! revision as an extra trailing segment: `{bpmn-order-process-12}`. Keys whose
//! last `-` segment is purely numeric are rejected so the two shapes can never
//! collide.

use std::fmt;

use super::ModelType;
use crate::error::ModelError;

/// A parsed model id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelId {
    model_type: ModelType,
    key: String,
    revision: Option<i32>,
}

impl ModelId {
    /// Id of the current version of a model.
    pub fn current(model_type: ModelType, key: &str) -> Result<Self, ModelError> {
        validate_key(key)?;
        Ok(Self {
            model_type,
            key: key.to_string(),
            revision: None,
        })
    }

    /// Id of a historical snapshot.
    pub fn history(model_type: ModelType, key: &str, revision: i32) -> Result<Self, ModelError> {
        validate_key(key)?;
        Ok(Self {
            model_type,
            key: key.to_string(),
            revision: Some(revision),
        })
    }

    /// Parse a current-version id.
    pub fn parse(id: &str) -> Result<Self, ModelError> {
        let (model_type, key) = split(id)?;
        Self::current(model_type, key)
    }

    /// Parse a history id, taking the revision from the last `-` segment.
    pub fn parse_history(id: &str) -> Result<Self, ModelError> {
        let (model_type, rest) = split(id)?;
        let (key, revision) = rest
            .rsplit_once('-')
            .ok_or_else(|| ModelError::InvalidId(id.to_string()))?;
        let revision = revision
            .parse::<i32>()
            .map_err(|_| ModelError::InvalidId(id.to_string()))?;
        Self::history(model_type, key, revision)
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn revision(&self) -> Option<i32> {
        self.revision
    }

    /// The current-version id of the same model.
    pub fn to_current(&self) -> ModelId {
        ModelId {
            model_type: self.model_type,
            key: self.key.clone(),
            revision: None,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision {
            Some(revision) => write!(
                f,
                "{{{}-{}-{}}}",
                self.model_type.dir_name(),
                self.key,
                revision
            ),
            None => write!(f, "{{{}-{}}}", self.model_type.dir_name(), self.key),
        }
    }
}

/// `{type-key}` for a type and key.
pub fn model_id(model_type: ModelType, key: &str) -> Result<String, ModelError> {
    Ok(ModelId::current(model_type, key)?.to_string())
}

/// `{type-key-revision}` for a type, key and revision.
pub fn history_id(model_type: ModelType, key: &str, revision: i32) -> Result<String, ModelError> {
    Ok(ModelId::history(model_type, key, revision)?.to_string())
}

/// Key part of a current-version id.
pub fn model_key(id: &str) -> Result<String, ModelError> {
    Ok(split(id)?.1.to_string())
}

/// Type part of an id. Unknown type directories fall back to `Process`.
pub fn model_type(id: &str) -> Result<ModelType, ModelError> {
    Ok(split(id)?.0)
}

/// Check that a key can be embedded in an id without ambiguity.
pub fn validate_key(key: &str) -> Result<(), ModelError> {
    if key.is_empty() {
        return Err(ModelError::InvalidKey("key must not be empty".into()));
    }
    if key.contains(&['/', '\\', '{', '}'][..]) {
        return Err(ModelError::InvalidKey(format!(
            "{} contains a reserved character",
            key
        )));
    }
    if let Some((_, last)) = key.rsplit_once('-') {
        if !last.is_empty() && last.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ModelError::InvalidKey(format!(
                "{} ends with a numeric segment reserved for revisions",
                key
            )));
        }
    }
    Ok(())
}

fn split(id: &str) -> Result<(ModelType, &str), ModelError> {
    let inner = id
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| ModelError::InvalidId(id.to_string()))?;
    let (dir, key) = inner
        .split_once('-')
        .ok_or_else(|| ModelError::InvalidId(id.to_string()))?;
    if key.is_empty() {
        return Err(ModelError::InvalidId(id.to_string()));
    }
    Ok((ModelType::from_dir_name(dir).unwrap_or_default(), key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_id_round_trips_type_and_key() {
        for model_type in ModelType::ALL {
            for key in ["order-process", "invoice", "a-b-c", "v2-draft"] {
                let id = model_id(model_type, key).unwrap();
                assert_eq!(model_key(&id).unwrap(), key);
                assert_eq!(super::model_type(&id).unwrap(), model_type);
            }
        }
    }

    #[test]
    fn process_id_uses_bpmn_directory() {
        assert_eq!(
            model_id(ModelType::Process, "order-process").unwrap(),
            "{bpmn-order-process}"
        );
    }

    #[test]
    fn history_id_parses_from_the_right() {
        let id = history_id(ModelType::Form, "invoice-form", 17).unwrap();
        assert_eq!(id, "{form-invoice-form-17}");

        let parsed = ModelId::parse_history(&id).unwrap();
        assert_eq!(parsed.model_type(), ModelType::Form);
        assert_eq!(parsed.key(), "invoice-form");
        assert_eq!(parsed.revision(), Some(17));
        assert_eq!(parsed.to_current().to_string(), "{form-invoice-form}");
    }

    #[test]
    fn keys_ending_in_numbers_are_rejected() {
        assert!(matches!(
            model_id(ModelType::Process, "order-3"),
            Err(ModelError::InvalidKey(_))
        ));
        // a purely numeric key without a dash cannot look like a revision
        assert!(model_id(ModelType::Process, "2024").is_ok());
    }

    #[test]
    fn unknown_type_directory_defaults_to_process() {
        assert_eq!(super::model_type("{widgets-thing}").unwrap(), ModelType::Process);
    }

    #[test]
    fn malformed_ids_are_rejected() {
        for id in ["bpmn-order", "{bpmnorder}", "{bpmn-}", ""] {
            assert!(matches!(ModelId::parse(id), Err(ModelError::InvalidId(_))), "{}", id);
        }
    }
}
