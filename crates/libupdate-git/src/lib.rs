//! Git working tree repository for action-update
//!
//! `LocalRepo` implements the `Repo` contract over a checked-out working
//! tree: it refuses dirty trees, creates topic branches from local or
//! remote base branches, commits with a fixed identity and force-pushes.

mod error;
mod local;

pub use error::GitError;
pub use local::{commit_message, GitIdentity, LocalRepo, REMOTE_NAME};
