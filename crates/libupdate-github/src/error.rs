use libupdate_core::UpdateError;
use thiserror::Error;

/// Errors returned by the GitHub REST client
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("HTTP error: {message}")]
    Transport { message: String },

    #[error("GitHub API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("decoding response: {0}")]
    Decode(String),

    #[error("invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl GitHubError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GitHubError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// The API refused to open a second pull request for the same head
    pub fn is_already_exists(&self) -> bool {
        matches!(self, GitHubError::Api { message, .. } if message.contains("pull request already exists"))
    }

    /// Convert for a read against a release registry
    pub fn into_registry_error(self) -> UpdateError {
        match self {
            GitHubError::Cancelled => UpdateError::Cancelled,
            other => UpdateError::RegistryUnavailable(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for GitHubError {
    fn from(value: reqwest::Error) -> Self {
        match value.status() {
            Some(status) => GitHubError::Api {
                status: status.as_u16(),
                message: value.to_string(),
            },
            None => GitHubError::Transport {
                message: value.to_string(),
            },
        }
    }
}

impl From<UpdateError> for GitHubError {
    fn from(value: UpdateError) -> Self {
        match value {
            UpdateError::Cancelled => GitHubError::Cancelled,
            other => GitHubError::Transport {
                message: other.to_string(),
            },
        }
    }
}

impl From<GitHubError> for UpdateError {
    fn from(value: GitHubError) -> Self {
        match value {
            GitHubError::Cancelled => UpdateError::Cancelled,
            GitHubError::InvalidInput { field, reason } => {
                UpdateError::ConfigInvalid(format!("{}: {}", field, reason))
            }
            other => UpdateError::PublishFailure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists() {
        let err = GitHubError::Api {
            status: 422,
            message: r#"{"message":"Validation Failed","errors":[{"message":"A pull request already exists for o:b."}]}"#.into(),
        };
        assert!(err.is_already_exists());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_conversions() {
        let err = GitHubError::Api {
            status: 502,
            message: "bad gateway".into(),
        };
        assert!(matches!(
            err.into_registry_error(),
            UpdateError::RegistryUnavailable(_)
        ));
        assert!(matches!(
            UpdateError::from(GitHubError::Cancelled),
            UpdateError::Cancelled
        ));
        assert!(matches!(
            UpdateError::from(GitHubError::Transport { message: "x".into() }),
            UpdateError::PublishFailure(_)
        ));
    }
}
