//! The `go` command

use std::path::Path;

use libupdate_core::exec::{Cmd, Output};
use libupdate_core::{Context, UpdateError};
use serde::Deserialize;

/// Runs `go` subcommands in a module directory
pub trait GoTool: Send + Sync {
    fn run(&self, ctx: &Context, dir: &Path, args: &[&str]) -> Result<Output, UpdateError>;
}

/// The `go` binary on `PATH`
#[derive(Debug, Clone, Copy, Default)]
pub struct GoToolchain;

impl GoTool for GoToolchain {
    fn run(&self, ctx: &Context, dir: &Path, args: &[&str]) -> Result<Output, UpdateError> {
        Cmd::new("go").args(args.iter().copied()).run(ctx, dir)
    }
}

/// Output of `go list -m -versions -json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleVersions {
    pub path: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub versions: Vec<String>,
}

impl ModuleVersions {
    /// Every version the query reported, including the selected one
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.versions
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.version.as_str()).filter(|v| !v.is_empty()))
    }
}
