use std::path::Path;

use crate::context::Context;
use crate::error::UpdateError;
use crate::types::{ExistingUpdates, UpdateGroup};

/// A working tree the engine can branch, commit and publish from
pub trait Repo {
    /// Root of the working tree
    fn root(&self) -> &Path;

    /// Currently checked out branch
    fn branch(&self) -> &str;

    /// Check out an existing branch, local first then from the default remote
    fn set_branch(&mut self, branch: &str) -> Result<(), UpdateError>;

    /// Create `branch` at the tip of `base` and check it out
    fn new_branch(&mut self, base: &str, branch: &str) -> Result<(), UpdateError>;

    /// Commit the working tree changes for `group` and publish them.
    ///
    /// The working tree stays on the pushed branch.
    fn push(&mut self, ctx: &Context, group: &UpdateGroup) -> Result<(), UpdateError>;

    /// Update a local branch from the default remote
    fn fetch(&mut self, ctx: &Context, branch: &str) -> Result<(), UpdateError>;

    /// Proposals previously made against `base_branch`
    fn existing_updates(
        &self,
        ctx: &Context,
        base_branch: &str,
    ) -> Result<ExistingUpdates, UpdateError>;
}

impl<R: Repo + ?Sized> Repo for Box<R> {
    fn root(&self) -> &Path {
        (**self).root()
    }

    fn branch(&self) -> &str {
        (**self).branch()
    }

    fn set_branch(&mut self, branch: &str) -> Result<(), UpdateError> {
        (**self).set_branch(branch)
    }

    fn new_branch(&mut self, base: &str, branch: &str) -> Result<(), UpdateError> {
        (**self).new_branch(base, branch)
    }

    fn push(&mut self, ctx: &Context, group: &UpdateGroup) -> Result<(), UpdateError> {
        (**self).push(ctx, group)
    }

    fn fetch(&mut self, ctx: &Context, branch: &str) -> Result<(), UpdateError> {
        (**self).fetch(ctx, branch)
    }

    fn existing_updates(
        &self,
        ctx: &Context,
        base_branch: &str,
    ) -> Result<ExistingUpdates, UpdateError> {
        (**self).existing_updates(ctx, base_branch)
    }
}
