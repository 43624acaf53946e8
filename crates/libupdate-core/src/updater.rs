//! Ecosystem updater contract
//!
//! An updater is bound to a working-tree root. It reads dependencies from
//! the ecosystem's manifests, asks the upstream registry for newer
//! versions and rewrites the tree for one update at a time.

use crate::context::Context;
use crate::error::UpdateError;
use crate::types::{Dependency, Update};

/// Predicate over candidate versions; `None` accepts everything
pub type VersionFilter<'a> = Option<&'a dyn Fn(&str) -> bool>;

pub trait Updater {
    /// Registered name, e.g. `gomod`
    fn name(&self) -> &'static str;

    /// Dependencies found under the root, deduplicated and sorted by path
    fn dependencies(&self, ctx: &Context) -> Result<Vec<Dependency>, UpdateError>;

    /// Highest acceptable version strictly greater than `dep.version`, if any
    fn check(
        &self,
        ctx: &Context,
        dep: &Dependency,
        filter: VersionFilter<'_>,
    ) -> Result<Option<Update>, UpdateError>;

    /// Rewrite the working tree so `update` is its only semantic change
    fn apply_update(&self, ctx: &Context, update: &Update) -> Result<(), UpdateError>;
}

impl<U: Updater + ?Sized> Updater for Box<U> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn dependencies(&self, ctx: &Context) -> Result<Vec<Dependency>, UpdateError> {
        (**self).dependencies(ctx)
    }

    fn check(
        &self,
        ctx: &Context,
        dep: &Dependency,
        filter: VersionFilter<'_>,
    ) -> Result<Option<Update>, UpdateError> {
        (**self).check(ctx, dep, filter)
    }

    fn apply_update(&self, ctx: &Context, update: &Update) -> Result<(), UpdateError> {
        (**self).apply_update(ctx, update)
    }
}

/// Deduplicate by `(path, version)` and sort by path
pub fn normalize_dependencies(mut deps: Vec<Dependency>) -> Vec<Dependency> {
    deps.sort_by(|a, b| {
        a.path
            .cmp(&b.path)
            .then_with(|| a.version.cmp(&b.version))
            .then_with(|| a.indirect.cmp(&b.indirect))
    });
    deps.dedup_by(|b, a| a.path == b.path && a.version == b.version);
    deps
}
