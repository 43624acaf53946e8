//! Updates GitHub release downloads pinned in Dockerfiles and Containerfiles

pub mod containerfile;
pub mod release;
pub mod updater;

pub use containerfile::{find_containerfiles, is_containerfile, Instruction, Interpolation};
pub use release::ReleaseSource;
pub use updater::{env_prefix, extract_dependencies, parse_release_path, release_path, DockerUrlUpdater};
