use libupdate_core::UpdateError;
use thiserror::Error;

/// Errors that can occur during Git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a git working tree: {0}")]
    NotARepo(String),

    #[error("tree is dirty: {}", .0.join(", "))]
    DirtyTree(Vec<String>),

    #[error("ref not found: {0}")]
    RefNotFound(String),

    #[error("commit failed: {0}")]
    Commit(String),
}

impl From<GitError> for UpdateError {
    fn from(value: GitError) -> Self {
        match value {
            GitError::DirtyTree(files) => UpdateError::DirtyTree(files.join(", ")),
            GitError::RefNotFound(name) => UpdateError::RefNotFound(name),
            GitError::Git(e) if e.code() == git2::ErrorCode::NotFound => {
                UpdateError::RefNotFound(e.message().to_string())
            }
            GitError::Commit(msg) => UpdateError::PublishFailure(msg),
            GitError::Io(e) => UpdateError::Io(e),
            other => UpdateError::Internal(other.to_string()),
        }
    }
}
