//! Blocking GitHub REST client
//!
//! Every call checks the context first and bounds the request timeout by
//! the context deadline. Non-2xx responses become `GitHubError::Api` with
//! the response body as the message.

use std::time::Duration;

use libupdate_core::Context;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::GitHubError;
use crate::types::{
    Content, DispatchRequest, Issue, NewIssue, NewPullRequest, PullRequest, PullRequestQuery,
    Release,
};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT: &str = "action-update";
const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 10;

/// The GitHub calls the update workflow depends on
pub trait GitHubApi {
    fn list_pulls(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        query: &PullRequestQuery,
    ) -> Result<Vec<PullRequest>, GitHubError>;

    fn create_pull(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        pull: &NewPullRequest,
    ) -> Result<PullRequest, GitHubError>;

    /// Web URL of `CHANGELOG.md` at `git_ref`, if the repository has one
    fn changelog_url(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<Option<String>, GitHubError>;

    fn create_issue(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        issue: &NewIssue,
    ) -> Result<Issue, GitHubError>;

    fn create_comment(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        issue: u64,
        body: &str,
    ) -> Result<(), GitHubError>;

    fn dispatch(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        request: &DispatchRequest,
    ) -> Result<(), GitHubError>;
}

/// Token-authenticated REST client
pub struct GitHubClient {
    http: Client,
    api_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, GitHubError> {
        let api_url = api_url.into();
        if api_url.trim().is_empty() {
            return Err(GitHubError::InvalidInput {
                field: "api_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, ctx: &Context, method: Method, url: &str) -> Result<RequestBuilder, GitHubError> {
        ctx.check()?;
        let mut builder = self
            .http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", "2022-11-28");
        if !self.token.is_empty() {
            builder = builder.bearer_auth(&self.token);
        }
        if let Some(remaining) = ctx.remaining() {
            builder = builder.timeout(remaining);
        }
        Ok(builder)
    }

    fn api(&self, ctx: &Context, method: Method, path: &str) -> Result<RequestBuilder, GitHubError> {
        let url = format!("{}{}", self.api_url, path);
        self.request(ctx, method, &url)
    }

    fn send(builder: RequestBuilder) -> Result<Response, GitHubError> {
        let response = builder.send()?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "unable to read response body".to_string());
            return Err(GitHubError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    fn json<T: DeserializeOwned>(response: Response) -> Result<T, GitHubError> {
        response
            .json()
            .map_err(|e| GitHubError::Decode(e.to_string()))
    }

    fn get_pages<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, GitHubError> {
        let mut items = Vec::new();
        for page in 1..=MAX_PAGES {
            let builder = self
                .api(ctx, Method::GET, path)?
                .query(params)
                .query(&[("per_page", PER_PAGE), ("page", page)]);
            let batch: Vec<T> = Self::json(Self::send(builder)?)?;
            let last = batch.len() < PER_PAGE;
            items.extend(batch);
            if last {
                break;
            }
        }
        debug!(path = %path, count = items.len(), "listed resources");
        Ok(items)
    }

    pub fn list_releases(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
    ) -> Result<Vec<Release>, GitHubError> {
        self.get_pages(ctx, &format!("/repos/{}/{}/releases", owner, repo), &[])
    }

    /// Release for a tag; `None` when the tag has no release
    pub fn release_by_tag(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<Option<Release>, GitHubError> {
        let path = format!("/repos/{}/{}/releases/tags/{}", owner, repo, tag);
        match Self::send(self.api(ctx, Method::GET, &path)?) {
            Ok(response) => Self::json(response).map(Some),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Download a release asset
    pub fn download(&self, ctx: &Context, url: &str) -> Result<Vec<u8>, GitHubError> {
        debug!(url = %url, "downloading asset");
        let response = Self::send(self.request(ctx, Method::GET, url)?)?;
        Ok(response.bytes()?.to_vec())
    }
}

impl GitHubApi for GitHubClient {
    fn list_pulls(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        query: &PullRequestQuery,
    ) -> Result<Vec<PullRequest>, GitHubError> {
        self.get_pages(ctx, &format!("/repos/{}/{}/pulls", owner, repo), &query.params())
    }

    fn create_pull(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        pull: &NewPullRequest,
    ) -> Result<PullRequest, GitHubError> {
        let path = format!("/repos/{}/{}/pulls", owner, repo);
        let builder = self.api(ctx, Method::POST, &path)?.json(pull);
        Self::json(Self::send(builder)?)
    }

    fn changelog_url(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        git_ref: &str,
    ) -> Result<Option<String>, GitHubError> {
        let path = format!("/repos/{}/{}/contents/CHANGELOG.md", owner, repo);
        let builder = self.api(ctx, Method::GET, &path)?.query(&[("ref", git_ref)]);
        match Self::send(builder) {
            Ok(response) => Ok(Self::json::<Content>(response)?.html_url),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_issue(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        issue: &NewIssue,
    ) -> Result<Issue, GitHubError> {
        let path = format!("/repos/{}/{}/issues", owner, repo);
        let builder = self.api(ctx, Method::POST, &path)?.json(issue);
        Self::json(Self::send(builder)?)
    }

    fn create_comment(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        issue: u64,
        body: &str,
    ) -> Result<(), GitHubError> {
        let path = format!("/repos/{}/{}/issues/{}/comments", owner, repo, issue);
        let builder = self
            .api(ctx, Method::POST, &path)?
            .json(&serde_json::json!({ "body": body }));
        Self::send(builder)?;
        Ok(())
    }

    fn dispatch(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        request: &DispatchRequest,
    ) -> Result<(), GitHubError> {
        let path = format!("/repos/{}/{}/dispatches", owner, repo);
        let builder = self.api(ctx, Method::POST, &path)?.json(request);
        Self::send(builder)?;
        Ok(())
    }
}
