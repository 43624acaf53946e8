//! Webhook payloads delivered through `GITHUB_EVENT_PATH`

use std::path::Path;

use libupdate_core::{ReviewRequestEvent, UpdateError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{PullRequest, Release, Repository};

/// Repository dispatch action that requests a single update
pub const UPDATE_DEPENDENCY: &str = "update-dependency";

/// Read and decode an event payload file
pub fn read_event<T: DeserializeOwned>(path: &Path) -> Result<T, UpdateError> {
    let raw = std::fs::read(path)?;
    Ok(serde_json::from_slice(&raw)?)
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: PullRequest,
    #[serde(default)]
    pub repository: Repository,
}

impl PullRequestEvent {
    pub fn review_request(&self) -> ReviewRequestEvent {
        ReviewRequestEvent {
            action: self.action.clone(),
            body: self.pull_request.body.clone().unwrap_or_default(),
            base: self.pull_request.base.ref_name.clone(),
            head: self.pull_request.head.ref_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseEvent {
    pub action: String,
    pub release: Release,
    pub repository: Repository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryDispatchEvent {
    pub action: String,
    #[serde(default)]
    pub client_payload: serde_json::Value,
    pub repository: Repository,
}

impl RepositoryDispatchEvent {
    pub fn update_payload(&self) -> Result<UpdateDependencyPayload, UpdateError> {
        Ok(serde_json::from_value(self.client_payload.clone())?)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Comment {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub comment: Comment,
}

/// Where to report the outcome of a dispatched update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub issue: u64,
}

impl Feedback {
    pub fn is_requested(&self) -> bool {
        self.issue != 0
    }
}

/// Client payload of an `update-dependency` dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDependencyPayload {
    #[serde(default)]
    pub updater: String,
    pub path: String,
    pub next: String,
    #[serde(default)]
    pub feedback: Feedback,
}
