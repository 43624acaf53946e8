//! REST API resources

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub owner: User,
    #[serde(default)]
    pub default_branch: String,
}

/// Branch reference on either side of a pull request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    #[serde(rename = "ref")]
    pub ref_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    pub base: PullRequestRef,
    pub head: PullRequestRef,
}

impl PullRequest {
    pub fn is_open(&self) -> bool {
        self.state == "open"
    }

    pub fn is_merged(&self) -> bool {
        self.state == "closed" && self.merged_at.is_some()
    }

    /// When the proposal last changed state: merge time, else creation time
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.merged_at.or(self.created_at)
    }
}

/// Filter for listing pull requests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestQuery {
    /// `open`, `closed` or `all`; the API defaults to `open`
    pub state: Option<String>,
    pub base: Option<String>,
    /// `owner:branch`
    pub head: Option<String>,
}

impl PullRequestQuery {
    pub fn all_for_base(base: impl Into<String>) -> Self {
        Self {
            state: Some("all".to_string()),
            base: Some(base.into()),
            head: None,
        }
    }

    pub fn for_head(owner: &str, branch: &str) -> Self {
        Self {
            state: None,
            base: None,
            head: Some(format!("{}:{}", owner, branch)),
        }
    }

    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(state) = &self.state {
            params.push(("state", state.clone()));
        }
        if let Some(base) = &self.base {
            params.push(("base", base.clone()));
        }
        if let Some(head) = &self.head {
            params.push(("head", head.clone()));
        }
        params
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub base: String,
    pub head: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchRequest {
    pub event_type: String,
    pub client_payload: serde_json::Value,
}

/// Subset of a repository contents response
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Content {
    #[serde(default)]
    pub html_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_request_states() {
        let json = r#"{
            "number": 7,
            "state": "closed",
            "body": "hello",
            "html_url": "https://github.com/o/r/pull/7",
            "created_at": "2024-01-01T00:00:00Z",
            "merged_at": "2024-01-03T00:00:00Z",
            "base": {"ref": "main"},
            "head": {"ref": "action-update-go/main/p/v1.0.1"}
        }"#;
        let pr: PullRequest = serde_json::from_str(json).unwrap();
        assert!(pr.is_merged());
        assert!(!pr.is_open());
        assert_eq!(pr.base.ref_name, "main");
        assert_eq!(
            pr.last_update().unwrap().to_rfc3339(),
            "2024-01-03T00:00:00+00:00"
        );
    }

    #[test]
    fn test_closed_unmerged() {
        let json = r#"{"number":1,"state":"closed","merged_at":null,"created_at":"2024-01-01T00:00:00Z","base":{"ref":"main"},"head":{"ref":"x"}}"#;
        let pr: PullRequest = serde_json::from_str(json).unwrap();
        assert!(!pr.is_merged());
        assert_eq!(pr.last_update(), pr.created_at);
    }

    #[test]
    fn test_query_params() {
        let q = PullRequestQuery::all_for_base("main");
        assert_eq!(
            q.params(),
            vec![("state", "all".to_string()), ("base", "main".to_string())]
        );
        let q = PullRequestQuery::for_head("octo", "topic");
        assert_eq!(q.params(), vec![("head", "octo:topic".to_string())]);
    }
}
