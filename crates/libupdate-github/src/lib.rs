//! GitHub integration for action-update
//!
//! A blocking REST client, the webhook payloads the action is triggered
//! with, pull request content, and `HostedRepo`, which opens a pull request
//! for every update branch pushed by the wrapped repository.

pub mod client;
pub mod content;
mod error;
pub mod events;
pub mod hosted;
pub mod notify;
pub mod types;

pub use client::{GitHubApi, GitHubClient, DEFAULT_API_URL};
pub use content::{PullRequestContent, PullRequestText};
pub use error::GitHubError;
pub use hosted::HostedRepo;
pub use notify::{notify_release, send_feedback, ReleaseNotice};
