//! RoutingTable - which backend owns which model id.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::error::ModelError;
use crate::model::ModelType;

/// First-writer-wins map from model id to backend index, plus the set of
/// model types whose ids have all been claimed by an eager scan.
///
/// Eager scans are serialized by a scan lock held for the whole scan, so two
/// first accesses never race. The map itself is only locked for lookups and
/// claims, never while a backend is called, which keeps a table shared by
/// nested stores (via `Arc`) free of lock cycles.
#[derive(Debug, Default)]
pub struct RoutingTable {
    state: Mutex<RoutingState>,
    scan: Mutex<()>,
}

#[derive(Debug, Default)]
pub(crate) struct RoutingState {
    routes: HashMap<String, usize>,
    loaded_types: HashSet<ModelType>,
}

impl RoutingState {
    pub(crate) fn route(&self, id: &str) -> Option<usize> {
        self.routes.get(id).copied()
    }

    /// Record `backend` for `id` unless another backend already owns it.
    /// Returns the owning backend.
    pub(crate) fn claim(&mut self, id: &str, backend: usize) -> usize {
        *self.routes.entry(id.to_string()).or_insert(backend)
    }

    pub(crate) fn is_loaded(&self, model_type: ModelType) -> bool {
        self.loaded_types.contains(&model_type)
    }

    pub(crate) fn mark_loaded(&mut self, model_type: ModelType) {
        self.loaded_types.insert(model_type);
    }
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, RoutingState>, ModelError> {
        self.state
            .lock()
            .map_err(|_| ModelError::LockPoisoned("routing"))
    }

    /// Serializes eager scans.
    pub(crate) fn lock_scan(&self) -> Result<MutexGuard<'_, ()>, ModelError> {
        self.scan
            .lock()
            .map_err(|_| ModelError::LockPoisoned("routing scan"))
    }

    /// Backend index an id is routed to, if any.
    pub fn route(&self, id: &str) -> Result<Option<usize>, ModelError> {
        Ok(self.lock()?.route(id))
    }

    /// Claim `id` for `backend`; an existing claim wins.
    pub fn claim(&self, id: &str, backend: usize) -> Result<usize, ModelError> {
        Ok(self.lock()?.claim(id, backend))
    }

    /// Whether every backend has been scanned for `model_type`.
    pub fn is_loaded(&self, model_type: ModelType) -> Result<bool, ModelError> {
        Ok(self.lock()?.is_loaded(model_type))
    }

    /// Number of routed ids.
    pub fn len(&self) -> Result<usize, ModelError> {
        Ok(self.lock()?.routes.len())
    }

    pub fn is_empty(&self) -> Result<bool, ModelError> {
        Ok(self.len()? == 0)
    }
}
