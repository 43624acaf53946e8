//! Go modules updater for action-update
//!
//! Reads and edits `go.mod` files, queries versions through `go list` and
//! rewrites imports when a dependency moves to a new major module path.

pub mod modfile;
pub mod source;
pub mod tool;
mod updater;

pub use modfile::{ModFile, ModFileError, Replace, Require};
pub use tool::{GoTool, GoToolchain, ModuleVersions};
pub use updater::{extract_dependencies, GoModUpdater, GO_MOD, VENDOR_MODULES};
