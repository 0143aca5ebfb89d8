//! Deployment of app definitions.
//!
//! [`Deployer::deploy`] turns one app model into a [`DeploymentBundle`]:
//! one `.bpmn` file per process, the referenced forms and decision tables,
//! and the app's `translations.json`. Every referenced model is loaded and
//! converted before the bundle is handed to the [`DeploymentService`], so a
//! missing model never produces a partial deployment.

mod app;
mod service;
mod texts;

pub use app::{AppDefinition, AppModelDefinition};
pub use service::{ArchiveDeploymentService, InMemoryDeploymentService};
pub use texts::{gather_texts, TEXTS_VERIFICATION};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bpmn::{self, for_each_user_task, ReferenceKeys};
use crate::dmn;
use crate::error::ModelError;
use crate::model::{Model, ModelStore, ModelStoreExt, ModelType, User};

/// Initiator variable given to none start events that declare none.
pub const DEFAULT_INITIATOR: &str = "initiator";

/// Assignee placeholder replaced by the start event's initiator variable.
pub const INITIATOR_PLACEHOLDER: &str = "$INITIATOR";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model {model_id} for app definition {app_id} could not be found")]
    MissingModel { model_id: String, app_id: String },

    #[error("could not convert model {model_id}: {message}")]
    Conversion { model_id: String, message: String },

    /// Two models of one app map to the same bundle file.
    #[error("app bundle {app_key} contains {name} twice")]
    DuplicateResource { app_key: String, name: String },

    /// The deployment target refused the bundle.
    #[error("deployment failed: {0}")]
    Sink(String),
}

impl DeployError {
    /// Report a model the app needs as missing, keep other failures.
    pub(crate) fn missing(err: ModelError, app_id: &str) -> Self {
        match err {
            ModelError::NotFound { id } => DeployError::MissingModel {
                model_id: id,
                app_id: app_id.to_string(),
            },
            other => DeployError::Model(other),
        }
    }
}

/// A named file of a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentResource {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Everything deployed for one app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentBundle {
    pub name: String,
    pub key: String,
    pub resources: Vec<DeploymentResource>,
}

impl DeploymentBundle {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            resources: Vec::new(),
        }
    }

    /// Add a file. Names are unique within a bundle.
    pub fn add(&mut self, name: impl Into<String>, bytes: Vec<u8>) -> Result<(), DeployError> {
        let name = name.into();
        if self.resource(&name).is_some() {
            return Err(DeployError::DuplicateResource {
                app_key: self.key.clone(),
                name,
            });
        }
        self.resources.push(DeploymentResource { name, bytes });
        Ok(())
    }

    pub fn resource(&self, name: &str) -> Option<&DeploymentResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.name.as_str()).collect()
    }
}

/// Receipt of an accepted bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub id: String,
    pub name: String,
    pub key: String,
    pub resources: Vec<String>,
    pub deployed_at: DateTime<Utc>,
}

impl Deployment {
    pub(crate) fn of(id: String, bundle: &DeploymentBundle) -> Self {
        Self {
            id,
            name: bundle.name.clone(),
            key: bundle.key.clone(),
            resources: bundle.resources.iter().map(|r| r.name.clone()).collect(),
            deployed_at: Utc::now(),
        }
    }
}

/// The process runtime that receives deployments.
pub trait DeploymentService: Send + Sync {
    fn deploy(&self, bundle: DeploymentBundle) -> Result<Deployment, DeployError>;

    /// Remove every deployment of the app with `app_key`.
    fn delete_app_definition(&self, app_key: &str) -> Result<(), DeployError>;
}

impl<D: DeploymentService + ?Sized> DeploymentService for Arc<D> {
    fn deploy(&self, bundle: DeploymentBundle) -> Result<Deployment, DeployError> {
        (**self).deploy(bundle)
    }

    fn delete_app_definition(&self, app_key: &str) -> Result<(), DeployError> {
        (**self).delete_app_definition(app_key)
    }
}

/// The editor JSON of `model`, read through `store` when the record does not
/// carry it (listings and history snapshots).
pub(crate) fn editor_json<S>(store: &S, model: &Model) -> Result<serde_json::Value, ModelError>
where
    S: ModelStore + ?Sized,
{
    match &model.editor_json {
        Some(json) => Ok(json.clone()),
        None => store.load_editor_json(&model.id_or_derived()?),
    }
}

/// Deploys app models read from a store.
pub struct Deployer<S> {
    store: S,
    service: Arc<dyn DeploymentService>,
}

impl<S: ModelStore> Deployer<S> {
    pub fn new(store: S, service: Arc<dyn DeploymentService>) -> Self {
        Self { store, service }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Assemble the bundle of `app` without handing it to the deployment
    /// service. `None` when the app has no models.
    ///
    /// The bundle's `translations.json` comes from [`gather_texts`], so the
    /// app's translation model is created or versioned here when its texts
    /// changed.
    pub fn build_bundle(
        &self,
        app: &Model,
        user: &User,
    ) -> Result<Option<DeploymentBundle>, DeployError> {
        let app_id = app.id_or_derived()?;
        let definition = AppDefinition::from_json(&editor_json(&self.store, app)?)?;
        if definition.is_empty() {
            return Ok(None);
        }

        let mut bundle = DeploymentBundle::new(app.name.clone(), app.key.clone());
        let mut forms: BTreeMap<String, Model> = BTreeMap::new();
        let mut decision_tables: BTreeMap<String, Model> = BTreeMap::new();

        for model_def in &definition.models {
            debug!(app = %app.key, model_id = %model_def.id, "contains process");
            let process = self
                .store
                .get_model(&model_def.id)
                .map_err(|e| DeployError::missing(e, &app_id))?;
            let process_id = process.id_or_derived()?;

            for child in self
                .store
                .get_referenced_models(&process_id)
                .map_err(|e| DeployError::missing(e, &app_id))?
            {
                let child_id = child.id_or_derived()?;
                match child.model_type {
                    ModelType::Form => {
                        forms.insert(child_id, child);
                    }
                    ModelType::DecisionTable => {
                        decision_tables.insert(child_id, child);
                    }
                    _ => {}
                }
            }

            let xml = self.process_xml(&process, &process_id, &forms, &decision_tables)?;
            bundle.add(format!("{}.bpmn", process.key.replace(' ', "")), xml)?;
        }

        for (form_id, form) in &forms {
            debug!(form_id = %form_id, "references form");
            let json = serde_json::to_vec(&editor_json(&self.store, form)?)
                .map_err(|e| ModelError::serde(form_id, e))?;
            bundle.add(format!("form-{}.form", form.key), json)?;
        }
        for (table_id, table) in &decision_tables {
            debug!(decision_table_id = %table_id, "references decision table");
            let xml = dmn::to_dmn_xml(table).map_err(|e| DeployError::Conversion {
                model_id: table_id.clone(),
                message: e.to_string(),
            })?;
            bundle.add(format!("dmn-{}.dmn", table.key), xml)?;
        }

        let texts = gather_texts(&self.store, app, user)?;
        let translations = match &texts {
            Some(model) => editor_json(&self.store, model)?,
            None => serde_json::Value::Null,
        };
        let json = serde_json::to_vec(&translations)
            .map_err(|e| ModelError::serde("translations", e))?;
        bundle.add("translations.json", json)?;

        Ok(Some(bundle))
    }

    /// Deploy one app. `None` when the app has no models.
    pub fn deploy(&self, app: &Model, user: &User) -> Result<Option<Deployment>, DeployError> {
        info!(app = %app.key, "deploying");
        let Some(bundle) = self.build_bundle(app, user)? else {
            debug!(app = %app.key, "app has no models, nothing deployed");
            return Ok(None);
        };
        let deployment = self.service.deploy(bundle)?;
        info!(app = %app.key, deployment_id = %deployment.id, "deployed");
        Ok(Some(deployment))
    }

    /// Deploy every app of the store. Failures are logged and skipped.
    pub fn deploy_all(&self, user: &User) -> Result<Vec<Deployment>, DeployError> {
        let mut deployments = Vec::new();
        for app in self.store.get_models_by_type(ModelType::App, None)? {
            match self.deploy(&app, user) {
                Ok(Some(deployment)) => deployments.push(deployment),
                Ok(None) => {}
                Err(e) => warn!(app = %app.key, error = %e, "deployment failed"),
            }
        }
        Ok(deployments)
    }

    /// Collect the texts of `app` into its translation model.
    pub fn gather_texts(&self, app: &Model, user: &User) -> Result<Option<Model>, DeployError> {
        gather_texts(&self.store, app, user)
    }

    fn process_xml(
        &self,
        process: &Model,
        process_id: &str,
        forms: &BTreeMap<String, Model>,
        decision_tables: &BTreeMap<String, Model>,
    ) -> Result<Vec<u8>, DeployError> {
        let json = editor_json(&self.store, process)?;
        let refs = ReferenceKeys::from_models(forms.values(), decision_tables.values());
        let mut model = bpmn::convert_to_bpmn(&json, &refs).map_err(|e| DeployError::Conversion {
            model_id: process_id.to_string(),
            message: e.to_string(),
        })?;

        for process in &mut model.processes {
            let initiator = match process.none_start_event_mut() {
                Some(start) => {
                    if start.initiator.as_deref().map_or(true, str::is_empty) {
                        start.initiator = Some(DEFAULT_INITIATOR.to_string());
                    }
                    start.initiator.clone()
                }
                None => None,
            };
            if let Some(initiator) = initiator {
                let assignee = format!("${{{}}}", initiator);
                for_each_user_task(&mut process.nodes, &mut |task| {
                    if task.assignee.as_deref() == Some(INITIATOR_PLACEHOLDER) {
                        task.assignee = Some(assignee.clone());
                    }
                });
            }
        }

        Ok(self.store.get_bpmn_xml(&mut model)?)
    }
}
