use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "action-update",
    about = "Propose dependency updates as signed pull requests",
    version
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress human-readable output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// TOML file overriding the INPUT_* environment
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Working tree to update
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Ecosystem to update
    #[arg(long, global = true, value_enum, default_value_t = UpdaterKind::Gomod, env = "ACTION_UPDATE_UPDATER")]
    pub updater: UpdaterKind,

    /// Log filter (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum UpdaterKind {
    /// Go modules
    Gomod,
    /// GitHub release downloads in Dockerfiles
    Dockerurl,
}

impl UpdaterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdaterKind::Gomod => "gomod",
            UpdaterKind::Dockerurl => "dockerurl",
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Handle the workflow event named by GITHUB_EVENT_NAME
    Run,

    /// Propose updates against base branches
    UpdateAll {
        /// Base branch (repeatable; defaults to the configured branches, then the current one)
        #[arg(long)]
        branch: Vec<String>,
    },

    /// List dependencies found in the working tree
    Dependencies,
}
