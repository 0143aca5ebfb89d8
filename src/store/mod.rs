//! Model store backends.
//!
//! - [`InMemoryModelStore`]: HashMap-backed store for tests and development
//! - [`FileSystemModelStore`]: one JSON file per model under `root/<type-dir>/`
//! - [`ClassPathModelStore`]: read-only models bundled in directories or archives
//! - [`MultiModelStore`]: routes each id to the backend that first served it
//!
//! The SVN store lives in [`crate::svn`] and decorates the file-system store.

mod class_path;
mod file_system;
mod in_memory;
mod multi;

pub use class_path::ClassPathModelStore;
pub use file_system::FileSystemModelStore;
pub use in_memory::InMemoryModelStore;
pub use multi::{MultiModelStore, RoutingTable};

use crate::model::{id, Model, ModelKeyCheck};

/// Normalize a listing filter: `%` wildcards are dropped and matching is
/// case-insensitive. Returns `None` when nothing is left to match.
pub(crate) fn normalize_filter(filter: Option<&str>) -> Option<String> {
    filter
        .map(|f| f.replace('%', "").to_lowercase())
        .filter(|f| !f.is_empty())
}

/// Build the answer to a key check from the model currently holding `key`.
pub(crate) fn key_check(
    existing: Option<&Model>,
    key: &str,
    holder: Option<&Model>,
) -> ModelKeyCheck {
    let mut check = ModelKeyCheck {
        key: key.to_string(),
        valid: id::validate_key(key).is_ok(),
        ..ModelKeyCheck::default()
    };

    let holder = holder.filter(|holder| match existing {
        Some(existing) => existing.id() != holder.id() || existing.key != holder.key,
        None => true,
    });
    if let Some(holder) = holder {
        check.key_already_exists = true;
        check.id = holder.id.clone();
        check.name = Some(holder.name.clone());
    }
    check
}
