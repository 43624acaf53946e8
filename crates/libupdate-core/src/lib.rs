//! Core library for action-update
//!
//! Holds the update model, the version comparator, signed proposal
//! manifests, the grouping and branch naming policies, the `Repo` and
//! `Updater` contracts and the engine driving them.

pub mod branch;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod exec;
pub mod group;
pub mod reconcile;
pub mod repo;
pub mod signed;
pub mod types;
pub mod updater;
pub mod version;

pub use branch::{BranchNamer, DefaultBranchNamer};
pub use config::{ActionConfig, ConfigFile};
pub use context::Context;
pub use engine::{PassReport, RepoUpdater};
pub use error::UpdateError;
pub use group::{Group, Groups, Partition};
pub use reconcile::{reconcile, Reconciled, ReviewRequestEvent};
pub use repo::Repo;
pub use signed::{SignedUpdateGroup, SigningKey};
pub use types::{Dependency, ExistingUpdate, ExistingUpdates, Update, UpdateGroup};
pub use updater::{Updater, VersionFilter};
pub use version::PrereleasePolicy;
