use thiserror::Error;

/// Main error type for update operations
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("tree is dirty: {0}")]
    DirtyTree(String),

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("tool failure: {0}")]
    ToolFailure(String),

    #[error("publish failure: {0}")]
    PublishFailure(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl UpdateError {
    /// Get the error code for JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            UpdateError::DirtyTree(_) => "dirty_tree",
            UpdateError::RefNotFound(_) => "ref_not_found",
            UpdateError::InvalidSignature => "invalid_signature",
            UpdateError::RegistryUnavailable(_) => "registry_unavailable",
            UpdateError::ToolFailure(_) => "tool_failure",
            UpdateError::PublishFailure(_) => "publish_failure",
            UpdateError::ConfigInvalid(_) => "config_invalid",
            UpdateError::Cancelled => "cancelled",
            UpdateError::Io(_) => "io_error",
            UpdateError::Json(_) => "internal_error",
            UpdateError::Internal(_) => "internal_error",
        }
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            UpdateError::ConfigInvalid(_) => 2,
            UpdateError::DirtyTree(_) => 3,
            UpdateError::RefNotFound(_) => 3,
            UpdateError::InvalidSignature => 4,
            UpdateError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Whether the error should abort a whole pass rather than a single update
    pub fn is_fatal_to_pass(&self) -> bool {
        matches!(
            self,
            UpdateError::DirtyTree(_) | UpdateError::Cancelled | UpdateError::ConfigInvalid(_)
        )
    }
}

impl From<serde_yaml::Error> for UpdateError {
    fn from(value: serde_yaml::Error) -> Self {
        UpdateError::ConfigInvalid(value.to_string())
    }
}

impl From<toml::de::Error> for UpdateError {
    fn from(value: toml::de::Error) -> Self {
        UpdateError::ConfigInvalid(value.to_string())
    }
}
