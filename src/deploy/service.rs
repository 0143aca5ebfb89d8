//! Deployment targets.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::{DeployError, Deployment, DeploymentBundle, DeploymentService};
use crate::error::ModelError;

/// Keeps deployed bundles in memory.
#[derive(Clone, Default)]
pub struct InMemoryDeploymentService {
    deployments: Arc<RwLock<Vec<(Deployment, DeploymentBundle)>>>,
}

impl InMemoryDeploymentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deployments(&self) -> Result<Vec<Deployment>, DeployError> {
        let deployments = self
            .deployments
            .read()
            .map_err(|_| ModelError::LockPoisoned("read"))?;
        Ok(deployments.iter().map(|(d, _)| d.clone()).collect())
    }

    /// The bundle of the newest deployment of `app_key`.
    pub fn latest_bundle(&self, app_key: &str) -> Result<Option<DeploymentBundle>, DeployError> {
        let deployments = self
            .deployments
            .read()
            .map_err(|_| ModelError::LockPoisoned("read"))?;
        Ok(deployments
            .iter()
            .rev()
            .find(|(d, _)| d.key == app_key)
            .map(|(_, b)| b.clone()))
    }
}

impl DeploymentService for InMemoryDeploymentService {
    fn deploy(&self, bundle: DeploymentBundle) -> Result<Deployment, DeployError> {
        let deployment = Deployment::of(Uuid::new_v4().to_string(), &bundle);
        let mut deployments = self
            .deployments
            .write()
            .map_err(|_| ModelError::LockPoisoned("write"))?;
        deployments.push((deployment.clone(), bundle));
        Ok(deployment)
    }

    fn delete_app_definition(&self, app_key: &str) -> Result<(), DeployError> {
        let mut deployments = self
            .deployments
            .write()
            .map_err(|_| ModelError::LockPoisoned("write"))?;
        let before = deployments.len();
        deployments.retain(|(d, _)| d.key != app_key);
        debug!(app = app_key, removed = before - deployments.len(), "deleted deployments");
        Ok(())
    }
}

/// Writes each deployment as a business archive `<dir>/<app key>.bar`.
/// Redeploying an app replaces its archive.
#[derive(Debug, Clone)]
pub struct ArchiveDeploymentService {
    dir: PathBuf,
}

impl ArchiveDeploymentService {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn archive_path(&self, app_key: &str) -> PathBuf {
        self.dir.join(format!("{}.bar", app_key))
    }

    /// Write the archive next to `path` and move it into place once it is
    /// complete. On failure the previous archive is left untouched.
    fn write_archive(&self, path: &Path, bundle: &DeploymentBundle) -> Result<(), DeployError> {
        let sink = |e: zip::result::ZipError| DeployError::Sink(format!("{}: {}", path.display(), e));

        let mut temp =
            NamedTempFile::new_in(&self.dir).map_err(|e| ModelError::io(self.dir.display(), e))?;
        let mut archive = ZipWriter::new(temp.as_file_mut());
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for resource in &bundle.resources {
            archive.start_file(resource.name.as_str(), options).map_err(sink)?;
            archive
                .write_all(&resource.bytes)
                .map_err(|e| ModelError::io(path.display(), e))?;
        }
        archive.finish().map_err(sink)?;

        temp.persist(path)
            .map_err(|e| ModelError::io(path.display(), e.error))?;
        Ok(())
    }
}

impl DeploymentService for ArchiveDeploymentService {
    fn deploy(&self, bundle: DeploymentBundle) -> Result<Deployment, DeployError> {
        fs::create_dir_all(&self.dir).map_err(|e| ModelError::io(self.dir.display(), e))?;
        let path = self.archive_path(&bundle.key);
        self.write_archive(&path, &bundle)?;
        info!(app = %bundle.key, archive = %path.display(), "wrote business archive");
        Ok(Deployment::of(Uuid::new_v4().to_string(), &bundle))
    }

    fn delete_app_definition(&self, app_key: &str) -> Result<(), DeployError> {
        let path = self.archive_path(app_key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ModelError::io(path.display(), e).into()),
        }
    }
}
