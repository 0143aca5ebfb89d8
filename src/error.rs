use thiserror::Error;

/// Error type shared by every model store.
///
/// Callers generally only distinguish `NotFound` and `ReadOnly` from the
/// rest; everything else is an internal failure (see [`ModelError::is_internal`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// No model (or model file) exists for the id.
    #[error("model not found: {id}")]
    NotFound { id: String },

    /// A write was attempted on a read-only store.
    #[error("{store} is a read only model store")]
    ReadOnly { store: &'static str },

    /// The id does not follow the `{type-key}` / `{type-key-revision}` grammar.
    #[error("invalid model id: {0}")]
    InvalidId(String),

    /// The key cannot be encoded into a model id.
    #[error("invalid model key: {0}")]
    InvalidKey(String),

    /// File system failure.
    #[error("model i/o error: {0}")]
    Io(String),

    /// JSON serialization/deserialization failure.
    #[error("model serialization error: {0}")]
    Serde(String),

    /// Malformed XML from (or for) an external tool.
    #[error("model xml error: {0}")]
    Xml(String),

    /// External command exited unsuccessfully.
    #[error("external command `{command}` failed with exit code {code:?}: {stderr}")]
    Command {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// External command was cancelled or timed out.
    #[error("external command `{command}` cancelled: {reason}")]
    Cancelled { command: String, reason: String },

    /// A multiplexing store was built without any backend.
    #[error("no model store backend configured")]
    NoBackend,

    /// A store configuration could not be read or is incomplete.
    #[error("invalid store configuration: {0}")]
    Config(String),

    /// The runtime refused to undeploy an app.
    #[error("deployment runtime error: {0}")]
    Deployment(String),

    #[error("model store lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

impl ModelError {
    pub fn not_found(id: impl Into<String>) -> Self {
        ModelError::NotFound { id: id.into() }
    }

    pub fn io(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        ModelError::Io(format!("{}: {}", context, err))
    }

    pub fn serde(context: impl std::fmt::Display, err: serde_json::Error) -> Self {
        ModelError::Serde(format!("{}: {}", context, err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelError::NotFound { .. })
    }

    /// Everything that maps to a generic server-side failure.
    pub fn is_internal(&self) -> bool {
        !matches!(
            self,
            ModelError::NotFound { .. } | ModelError::ReadOnly { .. }
        )
    }
}
