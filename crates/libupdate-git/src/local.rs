//! Git working tree repository
//!
//! Branches, checkouts and commits go through libgit2. Pushing and
//! fetching shell out to the `git` CLI so the credential helpers and
//! `http.<url>.extraheader` settings of the CI checkout apply.

use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{ErrorCode, Oid, Repository, Signature, StatusOptions};
use libupdate_core::exec::Cmd;
use libupdate_core::{Context, ExistingUpdates, Repo, UpdateError, UpdateGroup};
use tracing::{debug, info, warn};

use crate::GitError;

/// Name of the default remote
pub const REMOTE_NAME: &str = "origin";

/// Author and committer of update commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for GitIdentity {
    fn default() -> Self {
        Self {
            name: "actions-update-go".to_string(),
            email: "noreply@github.com".to_string(),
        }
    }
}

/// Commit message for an update group: `path@next` for a single update,
/// otherwise a header followed by one `path@next` line per update.
pub fn commit_message(group: &UpdateGroup) -> String {
    if let [update] = group.updates.as_slice() {
        return format!("{}@{}", update.path, update.next);
    }
    let mut message = String::from("dependency updates\n\n");
    for update in &group.updates {
        message.push_str(&format!("{}@{}\n", update.path, update.next));
    }
    message
}

/// A `Repo` over a single git working tree
pub struct LocalRepo {
    repo: Repository,
    root: PathBuf,
    branch: String,
    author: GitIdentity,
    remotes: bool,
    no_push: bool,
}

impl LocalRepo {
    /// Open the working tree at `root`. Fails if the tree has changes.
    pub fn open(root: &Path) -> Result<Self, GitError> {
        let repo = Repository::open(root)?;
        let root = repo
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| GitError::NotARepo(root.display().to_string()))?;

        let dirty = changed_files(&repo)?;
        if !dirty.is_empty() {
            for file in &dirty {
                warn!(file = %file, "unexpected file in tree");
            }
            return Err(GitError::DirtyTree(dirty));
        }

        let remotes = !repo.remotes()?.is_empty();
        let branch = match repo.head() {
            Ok(head) if head.is_branch() => head.shorthand().unwrap_or_default().to_string(),
            _ => String::new(),
        };

        Ok(Self {
            repo,
            root,
            branch,
            author: GitIdentity::default(),
            remotes,
            no_push: false,
        })
    }

    /// Show commits on stdout instead of pushing them
    pub fn with_no_push(mut self, no_push: bool) -> Self {
        self.no_push = no_push;
        self
    }

    pub fn with_author(mut self, author: GitIdentity) -> Self {
        self.author = author;
        self
    }

    pub fn no_push(&self) -> bool {
        self.no_push
    }

    /// Underlying libgit2 repository
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Resolve a branch locally, then on the default remote. A remote-only
    /// branch is stored locally so later lookups see the same commit.
    fn resolve_branch(&self, branch: &str) -> Result<(String, Oid), GitError> {
        let local = format!("refs/heads/{}", branch);
        match self.repo.find_reference(&local) {
            Ok(reference) => {
                let oid = reference.peel_to_commit()?.id();
                return Ok((local, oid));
            }
            Err(e) if e.code() == ErrorCode::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        debug!(branch = %branch, "not found locally, checking remote");
        let remote = format!("refs/remotes/{}/{}", REMOTE_NAME, branch);
        let oid = match self.repo.find_reference(&remote) {
            Ok(reference) => reference.peel_to_commit()?.id(),
            Err(e) if e.code() == ErrorCode::NotFound => {
                return Err(GitError::RefNotFound(branch.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        self.repo
            .reference(&local, oid, true, "action-update: track remote branch")?;
        Ok((local, oid))
    }

    fn checkout(&mut self, refname: &str, oid: Oid) -> Result<(), GitError> {
        let object = self.repo.find_object(oid, None)?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force().remove_untracked(true);
        self.repo.checkout_tree(&object, Some(&mut checkout))?;
        self.repo.set_head(refname)?;
        self.branch = refname
            .strip_prefix("refs/heads/")
            .unwrap_or(refname)
            .to_string();
        Ok(())
    }

    fn stage_all(&self) -> Result<usize, GitError> {
        let mut opts = status_options();
        let statuses = self.repo.statuses(Some(&mut opts))?;
        let mut index = self.repo.index()?;
        let mut staged = 0;
        for entry in statuses.iter() {
            let Some(path) = entry.path() else {
                continue;
            };
            let status = entry.status();
            if status.is_wt_deleted() {
                index.remove_path(Path::new(path))?;
            } else if status.is_wt_new() || status.is_wt_modified() || status.is_wt_typechange() || status.is_wt_renamed() {
                index.add_path(Path::new(path))?;
            }
            staged += 1;
        }
        index.write()?;
        debug!(files = staged, "added files to index");
        Ok(staged)
    }

    fn commit(&self, message: &str) -> Result<Oid, GitError> {
        self.stage_all()?;
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let parent = self
            .repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| GitError::Commit(format!("resolving HEAD: {}", e)))?;
        let signature = Signature::now(&self.author.name, &self.author.email)?;
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])
            .map_err(|e| GitError::Commit(e.to_string()))?;
        info!(commit = %oid, branch = %self.branch, "committed update");
        Ok(oid)
    }

    fn show_head(&self, ctx: &Context) -> Result<(), UpdateError> {
        println!();
        Cmd::new("git")
            .args(["show", "--color=always", "HEAD"])
            .env("GIT_PAGER", "cat")
            .run_inherit(ctx, &self.root)
            .map_err(|e| UpdateError::PublishFailure(format!("diffing for push: {}", e)))?;
        println!();
        Ok(())
    }

    fn push_remote(&self, ctx: &Context) -> Result<(), UpdateError> {
        if !self.remotes {
            debug!("no remotes configured, not pushing");
            return Ok(());
        }
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", self.branch);
        Cmd::new("git")
            .args(["push", "-f", REMOTE_NAME, refspec.as_str()])
            .run(ctx, &self.root)
            .map_err(|e| match e {
                UpdateError::Cancelled => e,
                other => UpdateError::PublishFailure(format!("pushing: {}", other)),
            })?;
        debug!(branch = %self.branch, "pushed to remote");
        Ok(())
    }
}

fn status_options() -> StatusOptions {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false);
    opts
}

fn changed_files(repo: &Repository) -> Result<Vec<String>, GitError> {
    let mut opts = status_options();
    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses
        .iter()
        .filter_map(|e| e.path().map(str::to_string))
        .collect())
}

impl Repo for LocalRepo {
    fn root(&self) -> &Path {
        &self.root
    }

    fn branch(&self) -> &str {
        &self.branch
    }

    fn set_branch(&mut self, branch: &str) -> Result<(), UpdateError> {
        debug!(branch = %branch, "switching branch");
        let (refname, oid) = self.resolve_branch(branch)?;
        self.checkout(&refname, oid)?;
        Ok(())
    }

    fn new_branch(&mut self, base: &str, branch: &str) -> Result<(), UpdateError> {
        debug!(base = %base, branch = %branch, "creating branch");
        let (base_ref, oid) = self.resolve_branch(base)?;

        let refname = format!("refs/heads/{}", branch);
        self.repo
            .reference(&refname, oid, true, "action-update: create update branch")
            .map_err(GitError::from)?;
        let mut config = self.repo.config().map_err(GitError::from)?;
        config
            .set_str(&format!("branch.{}.remote", branch), REMOTE_NAME)
            .map_err(GitError::from)?;
        config
            .set_str(&format!("branch.{}.merge", branch), &refname)
            .map_err(GitError::from)?;
        debug!(base_ref = %base_ref, branch = %branch, "branch created");

        self.checkout(&refname, oid)?;
        Ok(())
    }

    fn push(&mut self, ctx: &Context, group: &UpdateGroup) -> Result<(), UpdateError> {
        ctx.check()?;
        self.commit(&commit_message(group))?;
        if self.no_push {
            return self.show_head(ctx);
        }
        self.push_remote(ctx)
    }

    fn fetch(&mut self, ctx: &Context, branch: &str) -> Result<(), UpdateError> {
        let refspec = format!("+refs/heads/{0}:refs/heads/{0}", branch);
        Cmd::new("git")
            .args(["fetch", "--update-head-ok", REMOTE_NAME, refspec.as_str()])
            .run(ctx, &self.root)?;

        // Reopen to drop libgit2's cached view of refs and objects
        self.repo = Repository::open(&self.root).map_err(GitError::from)?;
        Ok(())
    }

    fn existing_updates(
        &self,
        _ctx: &Context,
        _base_branch: &str,
    ) -> Result<ExistingUpdates, UpdateError> {
        Ok(ExistingUpdates::default())
    }
}
