use std::path::PathBuf;
use std::sync::Arc;

use libupdate_core::{
    ActionConfig, ConfigFile, Context, PassReport, Repo, RepoUpdater, UpdateError, Updater,
};
use libupdate_dockerurl::DockerUrlUpdater;
use libupdate_git::LocalRepo;
use libupdate_github::{GitHubApi, GitHubClient, HostedRepo};
use libupdate_gomod::GoModUpdater;
use tracing::{debug, info};

use crate::cli::{Cli, UpdaterKind};

/// Resolved configuration for one invocation
pub struct UpdateContext {
    pub config: ActionConfig,
    pub root: PathBuf,
    pub kind: UpdaterKind,
}

impl UpdateContext {
    /// Environment first, then the `--config` file, then command line flags
    pub fn resolve(cli: &Cli) -> Result<Self, UpdateError> {
        let mut config = ActionConfig::from_env()?;
        if let Some(path) = &cli.config {
            config.apply_file(ConfigFile::load(path)?)?;
        }
        if let Some(level) = &cli.log_level {
            config.log_level = level.clone();
        }
        Ok(Self {
            config,
            root: cli.root.clone(),
            kind: cli.updater,
        })
    }

    /// Whether pull requests can be managed on the hosting service
    pub fn is_hosted(&self) -> bool {
        !self.config.token.is_empty() && !self.config.repository.is_empty()
    }

    pub fn github_client(&self) -> Result<GitHubClient, UpdateError> {
        GitHubClient::new(self.config.api_url.as_str(), self.config.token.as_str())
            .map_err(UpdateError::from)
    }

    pub fn github_api(&self) -> Result<Arc<dyn GitHubApi>, UpdateError> {
        Ok(Arc::new(self.github_client()?))
    }

    /// The selected ecosystem's updater rooted at `--root`
    pub fn updater(&self) -> Result<Box<dyn Updater>, UpdateError> {
        let updater: Box<dyn Updater> = match self.kind {
            UpdaterKind::Gomod => Box::new(
                GoModUpdater::new(&self.root)
                    .with_tidy(self.config.tidy)
                    .with_major_versions(self.config.major_versions)
                    .with_prereleases(self.config.prereleases),
            ),
            UpdaterKind::Dockerurl => Box::new(
                DockerUrlUpdater::new(&self.root, Box::new(self.github_client()?))
                    .with_prereleases(self.config.prereleases),
            ),
        };
        Ok(updater)
    }

    fn repo(&self) -> Result<Box<dyn Repo>, UpdateError> {
        let local = LocalRepo::open(&self.root)?.with_no_push(self.config.no_push);
        if !self.is_hosted() {
            debug!("no token or repository, using local repository only");
            return Ok(Box::new(local));
        }
        let hosted = HostedRepo::new(
            local,
            self.github_api()?,
            self.config.signing_key(),
            &self.config.repository,
        )?
        .with_no_push(self.config.no_push);
        Ok(Box::new(hosted))
    }

    /// Engine over the working tree with the configured groups and ignore list
    pub fn repo_updater(&self) -> Result<RepoUpdater, UpdateError> {
        Ok(RepoUpdater::new(self.repo()?, self.updater()?)
            .with_groups(self.config.groups.clone())
            .with_ignore(self.config.ignore.clone()))
    }

    /// Run a pass over `branches`, falling back to the configured branches
    /// and then to the checked out branch
    pub fn update_all(&self, ctx: &Context, branches: &[String]) -> Result<PassReport, UpdateError> {
        let mut engine = self.repo_updater()?;
        let branches = if !branches.is_empty() {
            branches.to_vec()
        } else if !self.config.branches.is_empty() {
            self.config.branches.clone()
        } else {
            let current = engine.repo().branch().to_string();
            if current.is_empty() {
                return Err(UpdateError::ConfigInvalid(
                    "no branches configured and HEAD is not a branch".to_string(),
                ));
            }
            vec![current]
        };

        info!(branches = ?branches, updater = self.kind.as_str(), "starting update pass");
        engine.update_all(ctx, &branches)
    }
}
