//! Repository decorator that opens pull requests
//!
//! `HostedRepo` delegates working-tree operations to the wrapped repository
//! and adds the GitHub side: a pull request after every push, and the
//! verified manifests of earlier pull requests as existing updates.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use libupdate_core::branch::base_branch;
use libupdate_core::config::split_repository;
use libupdate_core::signed::extract_verified;
use libupdate_core::{
    Context, ExistingUpdate, ExistingUpdates, Repo, SigningKey, UpdateError, UpdateGroup,
};
use tracing::{debug, info};

use crate::client::GitHubApi;
use crate::content::PullRequestContent;
use crate::types::{NewPullRequest, PullRequestQuery};

pub struct HostedRepo<R> {
    local: R,
    api: Arc<dyn GitHubApi>,
    content: PullRequestContent,
    key: SigningKey,
    owner: String,
    name: String,
    no_push: bool,
    /// Base of each branch created through `new_branch`
    bases: HashMap<String, String>,
}

impl<R: Repo> HostedRepo<R> {
    /// Wrap `local` for the `owner/name` repository
    pub fn new(
        local: R,
        api: Arc<dyn GitHubApi>,
        key: SigningKey,
        repository: &str,
    ) -> Result<Self, UpdateError> {
        let (owner, name) = split_repository(repository).ok_or_else(|| {
            UpdateError::ConfigInvalid(format!("repository must be owner/name: {:?}", repository))
        })?;
        Ok(Self {
            content: PullRequestContent::new(Arc::clone(&api), key.clone()),
            local,
            api,
            key,
            owner: owner.to_string(),
            name: name.to_string(),
            no_push: false,
            bases: HashMap::new(),
        })
    }

    /// Skip pull request creation
    pub fn with_no_push(mut self, no_push: bool) -> Self {
        self.no_push = no_push;
        self
    }

    pub fn local(&self) -> &R {
        &self.local
    }

    fn create_pull_request(&self, ctx: &Context, group: &UpdateGroup) -> Result<(), UpdateError> {
        let head = self.local.branch().to_string();
        let base = match self.bases.get(&head) {
            Some(base) => base.clone(),
            None => base_branch(&head)
                .ok_or_else(|| {
                    UpdateError::PublishFailure(format!("no base branch in branch name {:?}", head))
                })?
                .to_string(),
        };
        let text = self.content.generate(ctx, group)?;
        let request = NewPullRequest {
            title: text.title,
            body: text.body,
            base,
            head,
        };

        match self.api.create_pull(ctx, &self.owner, &self.name, &request) {
            Ok(pr) => {
                info!(pr_id = pr.number, url = %pr.html_url, head = %request.head, "created pull request");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                info!(head = %request.head, "pull request already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<R: Repo> Repo for HostedRepo<R> {
    fn root(&self) -> &Path {
        self.local.root()
    }

    fn branch(&self) -> &str {
        self.local.branch()
    }

    fn set_branch(&mut self, branch: &str) -> Result<(), UpdateError> {
        self.local.set_branch(branch)
    }

    fn new_branch(&mut self, base: &str, branch: &str) -> Result<(), UpdateError> {
        self.local.new_branch(base, branch)?;
        self.bases.insert(branch.to_string(), base.to_string());
        Ok(())
    }

    fn push(&mut self, ctx: &Context, group: &UpdateGroup) -> Result<(), UpdateError> {
        self.local.push(ctx, group)?;
        if self.no_push {
            return Ok(());
        }
        self.create_pull_request(ctx, group)
    }

    fn fetch(&mut self, ctx: &Context, branch: &str) -> Result<(), UpdateError> {
        self.local.fetch(ctx, branch)
    }

    fn existing_updates(
        &self,
        ctx: &Context,
        base_branch: &str,
    ) -> Result<ExistingUpdates, UpdateError> {
        let pulls = self
            .api
            .list_pulls(
                ctx,
                &self.owner,
                &self.name,
                &PullRequestQuery::all_for_base(base_branch),
            )
            .map_err(|e| e.into_registry_error())?;

        let mut existing = Vec::new();
        for pr in pulls {
            let body = pr.body.as_deref().unwrap_or_default();
            let group = match extract_verified(&self.key, body) {
                Ok(Some(group)) => group,
                Ok(None) => continue,
                Err(e) => {
                    debug!(number = pr.number, error = %e, "ignoring pull request manifest");
                    continue;
                }
            };
            let Some(last_update) = pr.last_update() else {
                continue;
            };
            existing.push(ExistingUpdate {
                base_branch: base_branch.to_string(),
                last_update,
                group,
                open: pr.is_open(),
                merged: pr.is_merged(),
            });
        }
        debug!(base = %base_branch, count = existing.len(), "loaded existing updates");
        Ok(ExistingUpdates::new(existing))
    }
}
