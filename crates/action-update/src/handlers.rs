//! Workflow event handlers
//!
//! Maps the runner's event name to an engine entry point. Payloads are read
//! from the file named by `GITHUB_EVENT_PATH`.

use std::path::Path;
use std::time::Duration;

use libupdate_core::{reconcile, Context, PassReport, Reconciled, Update, UpdateError, UpdateGroup};
use libupdate_github::events::{
    read_event, IssueCommentEvent, PullRequestEvent, ReleaseEvent, RepositoryDispatchEvent,
    UPDATE_DEPENDENCY,
};
use libupdate_github::{notify_release, send_feedback, ReleaseNotice};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::UpdateContext;

/// Budget for reporting a dispatched update back to its feedback issue
const FEEDBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// What handling an event did
#[derive(Debug, Serialize)]
#[serde(tag = "handled", rename_all = "snake_case")]
pub enum Handled {
    Comment { body: String },
    PullRequest { result: Reconciled },
    Pass { report: PassReport },
    Dispatch { branch: String },
    Skipped { reason: String },
    Release { notice: ReleaseNotice },
    Unknown { event: String },
}

fn event_path(path: Option<&Path>) -> Result<&Path, UpdateError> {
    path.ok_or_else(|| UpdateError::ConfigInvalid("GITHUB_EVENT_PATH is not set".to_string()))
}

pub fn handle(ctx: &Context, app: &UpdateContext) -> Result<Handled, UpdateError> {
    let name = app.config.event_name.as_str();
    let path = app.config.event_path.as_deref();
    debug!(event = %name, "handling event");

    match name {
        "issue_comment" => {
            let event: IssueCommentEvent = read_event(event_path(path)?)?;
            info!(action = %event.action, body = %event.comment.body, "issue comment");
            Ok(Handled::Comment {
                body: event.comment.body,
            })
        }
        "pull_request" => {
            let event: PullRequestEvent = read_event(event_path(path)?)?;
            let mut engine = app.repo_updater()?;
            let result = reconcile(ctx, &mut engine, &app.config.signing_key(), &event.review_request())?;
            Ok(Handled::PullRequest { result })
        }
        "schedule" | "workflow_dispatch" => Ok(Handled::Pass {
            report: app.update_all(ctx, &[])?,
        }),
        "repository_dispatch" => {
            let event: RepositoryDispatchEvent = read_event(event_path(path)?)?;
            if event.action == UPDATE_DEPENDENCY {
                update_dependency(ctx, app, &event)
            } else {
                Ok(Handled::Pass {
                    report: app.update_all(ctx, &[])?,
                })
            }
        }
        "release" => {
            let event: ReleaseEvent = read_event(event_path(path)?)?;
            let api = app.github_api()?;
            let notice = notify_release(ctx, api.as_ref(), &event, &app.config.dispatch_on_release)?;
            Ok(Handled::Release { notice })
        }
        other => {
            warn!(event = %other, "unhandled event");
            Ok(Handled::Unknown {
                event: other.to_string(),
            })
        }
    }
}

/// Propose the single update named by a dispatch payload against the
/// repository's default branch
fn update_dependency(
    ctx: &Context,
    app: &UpdateContext,
    event: &RepositoryDispatchEvent,
) -> Result<Handled, UpdateError> {
    let payload = event.update_payload()?;
    if !payload.updater.is_empty() && payload.updater != app.kind.as_str() {
        info!(updater = %payload.updater, "skipping event for other updaters");
        return Ok(Handled::Skipped {
            reason: format!("payload is for updater {}", payload.updater),
        });
    }

    let mut engine = app.repo_updater()?;
    let base = if event.repository.default_branch.is_empty() {
        engine.repo().branch().to_string()
    } else {
        event.repository.default_branch.clone()
    };

    engine.repo_mut().set_branch(&base)?;
    let previous = match engine.updater().dependencies(ctx) {
        Ok(deps) => deps
            .into_iter()
            .find(|d| d.path == payload.path)
            .map(|d| d.version)
            .unwrap_or_default(),
        Err(UpdateError::Cancelled) => return Err(UpdateError::Cancelled),
        Err(e) => {
            warn!(error = %e, "reading current dependencies");
            String::new()
        }
    };

    let update = Update::new(payload.path.as_str(), previous, payload.next.as_str());
    let branch = engine.branch_namer().format(&base, &update);
    debug!(
        path = %update.path,
        version = %update.next,
        branch = %branch,
        feedback_owner = %payload.feedback.owner,
        feedback_name = %payload.feedback.name,
        feedback_issue = payload.feedback.issue,
        "applying update from repository"
    );

    let result = engine.update(ctx, &base, &branch, &UpdateGroup::singleton(update));

    if payload.feedback.is_requested() {
        let feedback_ctx = Context::detached_with_timeout(FEEDBACK_TIMEOUT);
        match app.github_api() {
            Ok(api) => send_feedback(
                &feedback_ctx,
                api.as_ref(),
                &event.repository,
                &payload.feedback,
                &branch,
                result.is_ok(),
            ),
            Err(e) => warn!(error = %e, "error reporting feedback"),
        }
    }

    result?;
    Ok(Handled::Dispatch { branch })
}
