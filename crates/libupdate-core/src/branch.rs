use crate::types::Update;

/// Prefix of every topic branch created by the engine
pub const BRANCH_PREFIX: &str = "action-update-go";

/// Names topic branches for proposed updates
pub trait BranchNamer: Send + Sync {
    /// Branch name for a single update
    fn format(&self, base_branch: &str, update: &Update) -> String;
    /// Branch name for a group of updates
    fn format_batch(&self, base_branch: &str, group_name: &str) -> String;
}

/// `action-update-go/<base>/<path>/<next>` and `action-update-go/<base>/<group>`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBranchNamer;

impl BranchNamer for DefaultBranchNamer {
    fn format(&self, base_branch: &str, update: &Update) -> String {
        join(&[BRANCH_PREFIX, base_branch, &sanitize(&update.path), &update.next])
    }

    fn format_batch(&self, base_branch: &str, group_name: &str) -> String {
        join(&[BRANCH_PREFIX, base_branch, group_name])
    }
}

fn sanitize(path: &str) -> String {
    path.replace("https://", "")
        .replace("http://", "")
        .replace(['#', '{', '}'], "")
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|p| p.split('/'))
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Base branch encoded in a topic branch name: its second `/` segment.
///
/// A base containing `/` cannot be recovered from the name; only its first
/// segment is returned. Callers that created the branch should keep the base
/// they passed instead.
pub fn base_branch(topic_branch: &str) -> Option<&str> {
    topic_branch.split('/').nth(1).filter(|s| !s.is_empty())
}
