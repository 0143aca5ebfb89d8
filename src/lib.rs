//! Versioned storage for the editor models of a BPMN process suite.
//!
//! Models (process diagrams, forms, decision tables, app definitions,
//! translation bundles and templates) are stored behind the [`ModelStore`]
//! trait. Backends: [`InMemoryModelStore`], [`FileSystemModelStore`],
//! [`SvnModelStore`], [`ClassPathModelStore`] and the routing
//! [`MultiModelStore`]. The [`deploy`] module bundles app definitions for
//! the process runtime.

pub mod bpmn;
mod config;
pub mod deploy;
pub mod dmn;
mod error;
pub mod model;
pub mod store;
pub mod svn;

pub use config::{ClassPathConfig, FileSystemConfig, StoreConfig, SvnConfig};
pub use deploy::{
    gather_texts, ArchiveDeploymentService, DeployError, Deployer, Deployment, DeploymentBundle,
    DeploymentService, InMemoryDeploymentService,
};
pub use error::ModelError;
pub use model::{
    DateFormat, DeleteOptions, DeployableApp, Model, ModelHistory, ModelId, ModelKeyCheck,
    ModelStore, ModelStoreExt, ModelType, SaveRequest, User, UNVERSIONED,
};
pub use store::{
    ClassPathModelStore, FileSystemModelStore, InMemoryModelStore, MultiModelStore, RoutingTable,
};
pub use svn::{CancelHandle, CommandRunner, ProcessSvnExecutor, SvnExecutor, SvnModelStore};
