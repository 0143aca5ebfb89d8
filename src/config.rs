//! Store configuration.
//!
//! ```toml
//! date_format = "%Y-%m-%dT%H:%M:%S%.3f%z"
//!
//! [svn]
//! root = "/srv/models"
//! timeout_ms = 30000
//! username = "modeler"
//!
//! [class_path]
//! roots = ["/opt/app/lib/models.jar"]
//! base_path = "models"
//! ```
//!
//! [`StoreConfig::build_store`] assembles a [`MultiModelStore`] whose
//! default backend is the first writable store configured (svn, then plain
//! file system) followed by the read-only class path store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::deploy::DeploymentService;
use crate::error::ModelError;
use crate::model::{DateFormat, ModelStore, User};
use crate::store::{ClassPathModelStore, FileSystemModelStore, MultiModelStore};
use crate::svn::{CommandRunner, ProcessSvnExecutor, SvnModelStore};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Pattern of dates in model files (chrono `strftime` syntax).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_system: Option<FileSystemConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub svn: Option<SvnConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_path: Option<ClassPathConfig>,
}

/// Plain model directory without version control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSystemConfig {
    pub root: PathBuf,
}

/// Model directory inside an svn working copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SvnConfig {
    pub root: PathBuf,

    /// The svn client (default: `svn` on the `PATH`)
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Kill svn commands running longer than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Credentials used when a call has no user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn default_executable() -> PathBuf {
    PathBuf::from("svn")
}

/// Read-only models shipped in directories or archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassPathConfig {
    pub roots: Vec<PathBuf>,

    /// Directory of the models inside each root (default: `models`)
    #[serde(default = "default_base_path")]
    pub base_path: String,
}

fn default_base_path() -> String {
    "models".to_string()
}

impl SvnConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            executable: default_executable(),
            timeout_ms: None,
            username: None,
            password: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_credentials(mut self, user: &User) -> Self {
        self.username = Some(user.id.clone());
        self.password = user.password.clone();
        self
    }

    /// The configured default credentials.
    pub fn credentials(&self) -> Option<User> {
        let mut user = User::new(self.username.clone()?);
        user.password = self.password.clone();
        Some(user)
    }

    /// The svn client described by this section.
    pub fn executor(&self) -> ProcessSvnExecutor {
        let mut runner = CommandRunner::new();
        if let Some(ms) = self.timeout_ms {
            runner = runner.with_timeout(Duration::from_millis(ms));
        }
        let executor = ProcessSvnExecutor::new(&self.executable).with_runner(runner);
        match self.credentials() {
            Some(user) => executor.with_credentials(user),
            None => executor,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date_format(mut self, pattern: impl Into<String>) -> Self {
        self.date_format = Some(pattern.into());
        self
    }

    pub fn with_file_system(mut self, root: impl Into<PathBuf>) -> Self {
        self.file_system = Some(FileSystemConfig { root: root.into() });
        self
    }

    pub fn with_svn(mut self, svn: SvnConfig) -> Self {
        self.svn = Some(svn);
        self
    }

    pub fn with_class_path(mut self, roots: Vec<PathBuf>, base_path: impl Into<String>) -> Self {
        self.class_path = Some(ClassPathConfig {
            roots,
            base_path: base_path.into(),
        });
        self
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::io(path.display(), e))?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(toml: &str) -> Result<Self, ModelError> {
        let config: Self = toml::from_str(toml).map_err(|e| ModelError::Config(e.to_string()))?;
        config.dates()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ModelError> {
        toml::to_string(self).map_err(|e| ModelError::Config(e.to_string()))
    }

    /// The configured date format, or the default one.
    pub fn dates(&self) -> Result<DateFormat, ModelError> {
        match &self.date_format {
            Some(pattern) => DateFormat::new(pattern.as_str()),
            None => Ok(DateFormat::default()),
        }
    }

    /// The configured backends in routing order.
    pub fn build_backends(
        &self,
        deployments: Option<Arc<dyn DeploymentService>>,
    ) -> Result<Vec<Arc<dyn ModelStore>>, ModelError> {
        let dates = self.dates()?;
        let files = |root: &Path| {
            let store = FileSystemModelStore::new(root).with_date_format(dates.clone());
            match &deployments {
                Some(service) => store.with_deployment_service(service.clone()),
                None => store,
            }
        };

        let mut backends: Vec<Arc<dyn ModelStore>> = Vec::new();
        if let Some(svn) = &self.svn {
            debug!(root = %svn.root.display(), "svn model store");
            backends.push(Arc::new(SvnModelStore::new(files(&svn.root), svn.executor())));
        }
        if let Some(fs) = &self.file_system {
            debug!(root = %fs.root.display(), "file system model store");
            backends.push(Arc::new(files(&fs.root)));
        }
        if let Some(cp) = &self.class_path {
            debug!(roots = cp.roots.len(), base_path = %cp.base_path, "class path model store");
            backends.push(Arc::new(
                ClassPathModelStore::new(cp.roots.clone(), cp.base_path.clone())
                    .with_date_format(dates.clone()),
            ));
        }
        Ok(backends)
    }

    /// A multiplexing store over every configured backend.
    pub fn build_store(&self) -> Result<MultiModelStore, ModelError> {
        self.build_store_with(None)
    }

    /// Like [`build_store`](Self::build_store), undeploying deleted apps
    /// through `deployments`.
    pub fn build_store_with(
        &self,
        deployments: Option<Arc<dyn DeploymentService>>,
    ) -> Result<MultiModelStore, ModelError> {
        let backends = self.build_backends(deployments)?;
        if backends.is_empty() {
            return Err(ModelError::NoBackend);
        }
        Ok(MultiModelStore::new(backends))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sections_with_defaults() {
        let config = StoreConfig::from_toml_str(
            r#"
[svn]
root = "/srv/models"
timeout_ms = 500
username = "modeler"

[class_path]
roots = ["/opt/models.jar"]
"#,
        )
        .unwrap();

        let svn = config.svn.as_ref().unwrap();
        assert_eq!(svn.executable, PathBuf::from("svn"));
        assert_eq!(svn.credentials(), Some(User::new("modeler")));
        assert_eq!(svn.executor().runner().timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.class_path.as_ref().unwrap().base_path, "models");
        assert!(config.file_system.is_none());
        assert_eq!(config.dates().unwrap(), DateFormat::default());
    }

    #[test]
    fn builder_round_trips_through_toml() {
        let config = StoreConfig::new()
            .with_date_format("%Y-%m-%d %H:%M:%S%z")
            .with_file_system("/tmp/models")
            .with_svn(SvnConfig::new("/srv/models").with_timeout(Duration::from_secs(2)))
            .with_class_path(vec![PathBuf::from("/opt/models")], "bundled");

        let text = config.to_toml_string().unwrap();
        assert_eq!(StoreConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn backend_order_is_svn_file_system_class_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::new()
            .with_class_path(vec![dir.path().to_path_buf()], "models")
            .with_file_system(dir.path().join("fs"))
            .with_svn(SvnConfig::new(dir.path().join("wc")));

        let names: Vec<_> = config.build_backends(None).unwrap().iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["svn", "file system", "class path"]);
    }

    #[test]
    fn malformed_date_format_is_a_config_error() {
        assert!(matches!(
            StoreConfig::from_toml_str("date_format = \"%Q\"\n[file_system]\nroot = \"/tmp/models\""),
            Err(ModelError::Config(_))
        ));

        let config = StoreConfig::new()
            .with_date_format("%Y-%")
            .with_file_system("/tmp/models");
        assert!(matches!(config.build_store(), Err(ModelError::Config(_))));
    }

    #[test]
    fn empty_config_has_no_backend() {
        assert_eq!(StoreConfig::new().build_store().err(), Some(ModelError::NoBackend));
        assert!(matches!(
            StoreConfig::from_toml_str("[svn]\nroot = 3"),
            Err(ModelError::Config(_))
        ));
    }
}
