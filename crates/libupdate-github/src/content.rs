//! Pull request title and body for an update group

use std::fmt::Write;
use std::sync::Arc;

use libupdate_core::signed::sign_block;
use libupdate_core::{Context, SigningKey, Update, UpdateError, UpdateGroup};
use tracing::warn;

use crate::client::GitHubApi;
use crate::error::GitHubError;

const GITHUB_PREFIX: &str = "github.com/";

/// Rendered pull request text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestText {
    pub title: String,
    pub body: String,
}

/// Generates pull request content, with changelog links for GitHub-hosted
/// dependencies and the signed manifest at the end of the body.
pub struct PullRequestContent {
    api: Arc<dyn GitHubApi>,
    key: SigningKey,
}

impl PullRequestContent {
    pub fn new(api: Arc<dyn GitHubApi>, key: SigningKey) -> Self {
        Self { api, key }
    }

    pub fn generate(&self, ctx: &Context, group: &UpdateGroup) -> Result<PullRequestText, UpdateError> {
        match group.updates.as_slice() {
            [update] => Ok(PullRequestText {
                title: format!(
                    "Update {} from {} to {}",
                    update.path, update.previous, update.next
                ),
                body: self.body_single(ctx, group, update)?,
            }),
            _ => Ok(PullRequestText {
                title: "Dependency Updates".to_string(),
                body: self.body_multi(ctx, group)?,
            }),
        }
    }

    fn body_single(&self, ctx: &Context, group: &UpdateGroup, update: &Update) -> Result<String, UpdateError> {
        let mut body = format!("Here is {} {}, I hope it works.\n", update.path, update.next);
        body.push_str(&self.changelog(ctx, update)?);
        body.push_str(&sign_block(&self.key, group)?);
        Ok(body)
    }

    fn body_multi(&self, ctx: &Context, group: &UpdateGroup) -> Result<String, UpdateError> {
        let mut body = String::from("Here are some updates, I hope they work.\n\n");
        for update in &group.updates {
            let _ = writeln!(body, "#### {}@{}", update.path, update.next);
            let changelog = self.changelog(ctx, update)?;
            if !changelog.is_empty() {
                body.push_str(&changelog);
                body.push('\n');
            }
        }
        body.push_str(&sign_block(&self.key, group)?);
        Ok(body)
    }

    /// Changelog link section, empty when the dependency is not on GitHub or has no changelog
    fn changelog(&self, ctx: &Context, update: &Update) -> Result<String, UpdateError> {
        let Some((owner, repo)) = github_repository(&update.path) else {
            return Ok(String::new());
        };
        match self.api.changelog_url(ctx, owner, repo, &update.next) {
            Ok(Some(url)) => Ok(format!("\n[changelog]({})\n", url)),
            Ok(None) => Ok(String::new()),
            Err(GitHubError::Cancelled) => Err(UpdateError::Cancelled),
            Err(e) => {
                warn!(path = %update.path, error = %e, "error fetching changelog");
                Ok(String::new())
            }
        }
    }
}

/// Owner and name of a `github.com/owner/name[/...]` module path
pub fn github_repository(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix(GITHUB_PREFIX)?;
    let mut parts = rest.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let repo = parts.next().filter(|s| !s.is_empty())?;
    Some((owner, repo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_repository() {
        assert_eq!(
            github_repository("github.com/foo/bar/v2"),
            Some(("foo", "bar"))
        );
        assert_eq!(github_repository("github.com/foo"), None);
        assert_eq!(github_repository("golang.org/x/text"), None);
    }
}
