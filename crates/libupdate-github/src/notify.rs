//! Cross-repository notifications: release fan-out and dispatch feedback

use std::fmt::Write;

use libupdate_core::config::split_repository;
use libupdate_core::Context;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::GitHubApi;
use crate::error::GitHubError;
use crate::events::{Feedback, ReleaseEvent, UpdateDependencyPayload, UPDATE_DEPENDENCY};
use crate::types::{DispatchRequest, NewIssue, PullRequestQuery, Repository};

/// Outcome of handling a release event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReleaseNotice {
    Ignored { action: String },
    NoRepositories,
    Notified {
        issue: u64,
        dispatched: Vec<String>,
        failed: Vec<String>,
    },
}

pub fn feedback_issue_title(tag: &str) -> String {
    format!("Release feedback: {}", tag)
}

pub fn feedback_issue_body(repos: &[String]) -> String {
    let mut body = String::from("Expecting feedback:\n\n");
    for repo in repos {
        let _ = writeln!(body, "- [ ] {}", repo);
    }
    body
}

/// Dispatch payload announcing `event`'s release, reporting back to `issue`
pub fn release_payload(event: &ReleaseEvent, issue: u64) -> UpdateDependencyPayload {
    UpdateDependencyPayload {
        updater: String::new(),
        path: format!("github.com/{}", event.repository.full_name),
        next: event.release.tag_name.clone(),
        feedback: Feedback {
            owner: event.repository.owner.login.clone(),
            name: event.repository.name.clone(),
            issue,
        },
    }
}

/// Open a feedback issue for a published release and ask every repository
/// in `repos` to update to it. Dispatch failures are logged and collected.
pub fn notify_release(
    ctx: &Context,
    api: &dyn GitHubApi,
    event: &ReleaseEvent,
    repos: &[String],
) -> Result<ReleaseNotice, GitHubError> {
    if event.action != "released" {
        info!(action = %event.action, "ignoring release event");
        return Ok(ReleaseNotice::Ignored {
            action: event.action.clone(),
        });
    }
    info!(repos = repos.len(), "notifying repositories of release");
    if repos.is_empty() {
        return Ok(ReleaseNotice::NoRepositories);
    }

    let issue = api.create_issue(
        ctx,
        &event.repository.owner.login,
        &event.repository.name,
        &NewIssue {
            title: feedback_issue_title(&event.release.tag_name),
            body: feedback_issue_body(repos),
        },
    )?;
    debug!(issue_number = issue.number, "created feedback issue");

    let request = DispatchRequest {
        event_type: UPDATE_DEPENDENCY.to_string(),
        client_payload: serde_json::to_value(release_payload(event, issue.number))
            .map_err(|e| GitHubError::Decode(e.to_string()))?,
    };

    let mut dispatched = Vec::new();
    let mut failed = Vec::new();
    for repo in repos {
        let Some((owner, name)) = split_repository(repo) else {
            warn!(repo = %repo, "invalid repository, expected owner/name");
            failed.push(repo.clone());
            continue;
        };
        debug!(owner = %owner, name = %name, "dispatching release to repository");
        match api.dispatch(ctx, owner, name, &request) {
            Ok(()) => dispatched.push(repo.clone()),
            Err(GitHubError::Cancelled) => return Err(GitHubError::Cancelled),
            Err(e) => {
                warn!(repo = %repo, error = %e, "error dispatching update");
                failed.push(repo.clone());
            }
        }
    }

    Ok(ReleaseNotice::Notified {
        issue: issue.number,
        dispatched,
        failed,
    })
}

/// Comment on the feedback issue with the pull request created for
/// `branch`, or a status line when none is found. Errors are logged only.
pub fn send_feedback(
    ctx: &Context,
    api: &dyn GitHubApi,
    repository: &Repository,
    feedback: &Feedback,
    branch: &str,
    success: bool,
) {
    info!(issue = feedback.issue, "sending feedback to provided issue");
    let pulls = api
        .list_pulls(
            ctx,
            &repository.owner.login,
            &repository.name,
            &PullRequestQuery::for_head(&repository.owner.login, branch),
        )
        .unwrap_or_else(|e| {
            warn!(error = %e, "error looking for pull request");
            Vec::new()
        });

    let body = match pulls.first() {
        Some(pr) => pr.html_url.clone(),
        None => format!("{} - {} - {}", repository.full_name, branch, success),
    };

    if let Err(e) = api.create_comment(ctx, &feedback.owner, &feedback.name, feedback.issue, &body) {
        warn!(error = %e, "error reporting feedback");
    }
}
