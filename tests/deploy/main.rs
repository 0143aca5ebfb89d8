//! Deployment suite: bundles built from a file system store.

#[path = "../support/mod.rs"]
mod support;

mod archive;
mod bundle;
mod texts;

use std::path::Path;
use std::sync::Arc;

use model_vault::{Deployer, FileSystemModelStore, InMemoryDeploymentService};

pub fn deployer(root: &Path) -> (Deployer<Arc<FileSystemModelStore>>, InMemoryDeploymentService) {
    support::fixtures::init_tracing();
    let service = InMemoryDeploymentService::new();
    let store = Arc::new(FileSystemModelStore::new(root));
    (Deployer::new(store, Arc::new(service.clone())), service)
}
