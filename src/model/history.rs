use super::Model;

/// Immutable point-in-time snapshot of a model.
///
/// The snapshot's `version` is the revision that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelHistory {
    id: String,
    model_id: String,
    snapshot: Model,
}

impl ModelHistory {
    pub(crate) fn new(id: String, model_id: String, snapshot: Model) -> Self {
        Self {
            id,
            model_id,
            snapshot,
        }
    }

    /// A history entry mirroring the current state of `model`.
    ///
    /// Stores without real history use the model id as history id.
    pub fn of(model: &Model) -> Self {
        let id = model.id.clone().unwrap_or_default();
        Self::new(id.clone(), id, model.clone())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn revision(&self) -> i32 {
        self.snapshot.version
    }

    pub fn snapshot(&self) -> &Model {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> Model {
        self.snapshot
    }
}
