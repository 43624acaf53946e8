//! Update engine
//!
//! Walks base branches, checks every dependency for a newer version and
//! proposes each available update (or group of updates) on its own topic
//! branch. Failures for one group or dependency are logged and the pass
//! moves on; failing to switch to a base branch or to load its existing
//! proposals aborts that branch.

use chrono::Utc;
use glob::Pattern;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::branch::{BranchNamer, DefaultBranchNamer};
use crate::context::Context;
use crate::error::UpdateError;
use crate::exec;
use crate::group::{Group, Groups};
use crate::repo::Repo;
use crate::types::{Dependency, Update, UpdateGroup};
use crate::updater::Updater;

/// Outcome of one `update_all` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Dependencies inspected across all base branches
    pub dependencies: usize,
    /// Topic branches pushed, in order
    pub pushed: Vec<String>,
    /// Groups skipped because of their cooldown
    pub cooled_down: Vec<String>,
    /// Groups or dependencies whose update failed
    pub failed: Vec<String>,
}

/// Proposes updates for one working tree
pub struct RepoUpdater {
    repo: Box<dyn Repo>,
    updater: Box<dyn Updater>,
    groups: Groups,
    namer: Box<dyn BranchNamer>,
    ignore: Vec<Pattern>,
}

impl RepoUpdater {
    pub fn new(repo: Box<dyn Repo>, updater: Box<dyn Updater>) -> Self {
        Self {
            repo,
            updater,
            groups: Groups::default(),
            namer: Box::new(DefaultBranchNamer),
            ignore: Vec::new(),
        }
    }

    pub fn with_groups(mut self, groups: Groups) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_branch_namer(mut self, namer: Box<dyn BranchNamer>) -> Self {
        self.namer = namer;
        self
    }

    /// Dependencies whose path matches any pattern are never checked
    pub fn with_ignore(mut self, ignore: Vec<Pattern>) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn repo(&self) -> &dyn Repo {
        self.repo.as_ref()
    }

    pub fn repo_mut(&mut self) -> &mut dyn Repo {
        self.repo.as_mut()
    }

    pub fn updater(&self) -> &dyn Updater {
        self.updater.as_ref()
    }

    pub fn branch_namer(&self) -> &dyn BranchNamer {
        self.namer.as_ref()
    }

    /// Create `branch_name` from `base_branch`, apply every update of `group` and push.
    pub fn update(
        &mut self,
        ctx: &Context,
        base_branch: &str,
        branch_name: &str,
        group: &UpdateGroup,
    ) -> Result<(), UpdateError> {
        self.repo.new_branch(base_branch, branch_name)?;
        for update in &group.updates {
            ctx.check()?;
            self.updater.apply_update(ctx, update)?;
        }
        self.repo.push(ctx, group)
    }

    /// Run a pass over each base branch in order.
    ///
    /// The initially checked out branch is restored afterwards when possible.
    pub fn update_all(
        &mut self,
        ctx: &Context,
        branches: &[String],
    ) -> Result<PassReport, UpdateError> {
        let initial = self.repo.branch().to_string();
        let mut report = PassReport::default();

        let mut result = Ok(());
        for branch in branches {
            if let Err(e) = self.update_branch(ctx, branch, &mut report) {
                error!(branch = %branch, error = %e, "update pass aborted");
                result = Err(e);
                break;
            }
        }

        if !initial.is_empty() && self.repo.branch() != initial {
            if let Err(e) = self.repo.set_branch(&initial) {
                warn!(branch = %initial, error = %e, "failed to restore initial branch");
            }
        }

        result.map(|_| report)
    }

    fn update_branch(
        &mut self,
        ctx: &Context,
        branch: &str,
        report: &mut PassReport,
    ) -> Result<(), UpdateError> {
        ctx.check()?;
        self.repo.set_branch(branch)?;

        let deps = self.updater.dependencies(ctx)?;
        let existing = self.repo.existing_updates(ctx, branch)?;
        debug!(branch = %branch, existing = existing.iter().count(), "loaded existing updates");

        let deps: Vec<Dependency> = deps
            .into_iter()
            .filter(|d| {
                let ignored = self.ignore.iter().any(|p| p.matches(&d.path));
                if ignored {
                    debug!(path = %d.path, "ignoring dependency");
                }
                !ignored
            })
            .collect();
        report.dependencies += deps.len();

        let partition = self.groups.partition(&deps);
        info!(
            branch = %branch,
            deps = deps.len(),
            groups = partition.grouped.len(),
            ungrouped = partition.ungrouped.len(),
            "parsed dependencies, checking for updates"
        );

        let mut updates = 0usize;
        for (group_name, members) in &partition.grouped {
            let Some(group) = self.groups.by_name(group_name).cloned() else {
                continue;
            };
            if let Some((cooldown, age)) = group.cooldown_remaining(&existing, Utc::now()) {
                info!(
                    group = %group_name,
                    cooldown = ?cooldown,
                    age = ?age,
                    "skipping group in cooldown"
                );
                report.cooled_down.push(group_name.clone());
                continue;
            }

            debug!(group = %group_name, deps = members.len(), "checking update group");
            match self.grouped_update(ctx, branch, &group, members) {
                Ok(Some((name, count))) => {
                    updates += count;
                    report.pushed.push(name);
                }
                Ok(None) => {}
                Err(e) => {
                    if matches!(e, UpdateError::Cancelled) {
                        return Err(e);
                    }
                    error!(group = %group_name, error = %e, "error processing update group");
                    report.failed.push(group_name.clone());
                }
            }
        }

        for dep in &partition.ungrouped {
            match self.single_update(ctx, branch, dep) {
                Ok(Some(name)) => {
                    updates += 1;
                    report.pushed.push(name);
                }
                Ok(None) => {}
                Err(e) => {
                    if matches!(e, UpdateError::Cancelled) {
                        return Err(e);
                    }
                    error!(path = %dep.path, error = %e, "error processing update");
                    report.failed.push(dep.path.clone());
                }
            }
        }

        info!(branch = %branch, deps = deps.len(), updates, "checked for updates");
        Ok(())
    }

    fn check_for_update(
        &self,
        ctx: &Context,
        dep: &Dependency,
        group: Option<&Group>,
    ) -> Option<Update> {
        let in_range = |v: &str| group.map(|g| g.in_range(v)).unwrap_or(true);
        let filter: Option<&dyn Fn(&str) -> bool> = if group.is_some() {
            Some(&in_range)
        } else {
            None
        };
        match self.updater.check(ctx, dep, filter) {
            Ok(update) => update,
            Err(e) => {
                warn!(path = %dep.path, error = %e, "error checking for updates");
                None
            }
        }
    }

    fn single_update(
        &mut self,
        ctx: &Context,
        base_branch: &str,
        dep: &Dependency,
    ) -> Result<Option<String>, UpdateError> {
        ctx.check()?;
        let Some(update) = self.check_for_update(ctx, dep, None) else {
            return Ok(None);
        };

        info!(
            path = %update.path,
            previous = %update.previous,
            next = %update.next,
            "attempting update"
        );
        let branch = self.namer.format(base_branch, &update);
        self.repo.new_branch(base_branch, &branch)?;
        self.updater.apply_update(ctx, &update)?;
        self.repo.push(ctx, &UpdateGroup::singleton(update.clone()))?;
        info!(path = %update.path, next = %update.next, branch = %branch, "update complete");
        Ok(Some(branch))
    }

    fn grouped_update(
        &mut self,
        ctx: &Context,
        base_branch: &str,
        group: &Group,
        deps: &[Dependency],
    ) -> Result<Option<(String, usize)>, UpdateError> {
        let mut updates = Vec::new();
        for dep in deps {
            ctx.check()?;
            if let Some(update) = self.check_for_update(ctx, dep, Some(group)) {
                debug!(path = %dep.path, next = %update.next, "update available");
                updates.push(update);
            }
        }
        if updates.is_empty() {
            return Ok(None);
        }

        let branch = self.namer.format_batch(base_branch, &group.name);
        self.repo.new_branch(base_branch, &branch)?;
        exec::run_script(ctx, self.repo.root(), "pre", &group.pre_script)?;
        for update in &updates {
            self.updater.apply_update(ctx, update)?;
        }
        exec::run_script(ctx, self.repo.root(), "post", &group.post_script)?;

        let group_updates = UpdateGroup::new(group.name.clone(), updates);
        let count = group_updates.updates.len();
        self.repo.push(ctx, &group_updates)?;
        info!(group = %group.name, updates = count, branch = %branch, "group update complete");
        Ok(Some((branch, count)))
    }
}
