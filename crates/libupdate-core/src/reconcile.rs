//! Reopen reconciliation
//!
//! When a proposal is reopened its topic branch is recreated from the
//! signed manifest in the request body.

use serde::Serialize;
use tracing::{info, warn};

use crate::context::Context;
use crate::engine::RepoUpdater;
use crate::error::UpdateError;
use crate::signed::{self, SigningKey};

/// Review-request actions that never trigger work
pub const IGNORED_ACTIONS: &[&str] = &[
    "assigned",
    "unassigned",
    "review_requested",
    "review_request_removed",
    "labeled",
    "unlabeled",
    "opened",
    "edited",
    "closed",
    "ready_for_review",
    "locked",
    "unlocked",
];

/// The parts of a review-request event the reconciler reads
#[derive(Debug, Clone, Default)]
pub struct ReviewRequestEvent {
    pub action: String,
    pub body: String,
    pub base: String,
    pub head: String,
}

/// What the reconciler did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reconciled {
    /// The action does not trigger work
    Ignored { action: String },
    /// Reopened, but the body carries no manifest
    NoManifest,
    /// The topic branch was recreated
    Recreated { branch: String, updates: usize },
}

/// Handle a review-request event against `engine`
pub fn reconcile(
    ctx: &Context,
    engine: &mut RepoUpdater,
    key: &SigningKey,
    event: &ReviewRequestEvent,
) -> Result<Reconciled, UpdateError> {
    match event.action.as_str() {
        "reopened" => reopened(ctx, engine, key, event),
        action if IGNORED_ACTIONS.contains(&action) => Ok(Reconciled::Ignored {
            action: action.to_string(),
        }),
        action => {
            warn!(action = %action, "unexpected pull request action");
            Ok(Reconciled::Ignored {
                action: action.to_string(),
            })
        }
    }
}

fn reopened(
    ctx: &Context,
    engine: &mut RepoUpdater,
    key: &SigningKey,
    event: &ReviewRequestEvent,
) -> Result<Reconciled, UpdateError> {
    let Some(group) = signed::extract_verified(key, &event.body)? else {
        info!(head = %event.head, "reopened pull request has no update manifest");
        return Ok(Reconciled::NoManifest);
    };

    info!(
        base = %event.base,
        head = %event.head,
        updates = group.updates.len(),
        "recreating update branch"
    );
    engine.repo_mut().fetch(ctx, &event.base)?;
    engine.update(ctx, &event.base, &event.head, &group)?;
    Ok(Reconciled::Recreated {
        branch: event.head.clone(),
        updates: group.updates.len(),
    })
}
