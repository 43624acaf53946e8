//! Where release metadata and assets come from

use libupdate_core::{Context, UpdateError};
use libupdate_github::types::Release;
use libupdate_github::GitHubClient;

pub trait ReleaseSource: Send + Sync {
    /// Releases of `owner/repo`, newest first
    fn releases(&self, ctx: &Context, owner: &str, repo: &str) -> Result<Vec<Release>, UpdateError>;

    /// Release for a tag; `None` when the tag has no release
    fn release_by_tag(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<Option<Release>, UpdateError>;

    fn download(&self, ctx: &Context, url: &str) -> Result<Vec<u8>, UpdateError>;
}

impl ReleaseSource for GitHubClient {
    fn releases(&self, ctx: &Context, owner: &str, repo: &str) -> Result<Vec<Release>, UpdateError> {
        self.list_releases(ctx, owner, repo)
            .map_err(|e| e.into_registry_error())
    }

    fn release_by_tag(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<Option<Release>, UpdateError> {
        GitHubClient::release_by_tag(self, ctx, owner, repo, tag).map_err(|e| e.into_registry_error())
    }

    fn download(&self, ctx: &Context, url: &str) -> Result<Vec<u8>, UpdateError> {
        GitHubClient::download(self, ctx, url).map_err(|e| e.into_registry_error())
    }
}
