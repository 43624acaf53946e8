use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dependency read from an ecosystem manifest
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub path: String,
    /// Empty when the dependency is unversioned
    pub version: String,
    #[serde(default)]
    pub indirect: bool,
}

impl Dependency {
    pub fn new(path: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            version: version.into(),
            indirect: false,
        }
    }

    pub fn indirect(mut self, indirect: bool) -> Self {
        self.indirect = indirect;
        self
    }
}

/// A proposed move of one dependency from `previous` to `next`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Update {
    pub path: String,
    pub previous: String,
    pub next: String,
}

impl Update {
    pub fn new(
        path: impl Into<String>,
        previous: impl Into<String>,
        next: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            previous: previous.into(),
            next: next.into(),
        }
    }
}

/// Updates proposed and reviewed together.
///
/// An empty `name` marks a singleton (ungrouped) update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub updates: Vec<Update>,
}

impl UpdateGroup {
    /// Build a group, keeping the first update seen for each path
    pub fn new(name: impl Into<String>, updates: Vec<Update>) -> Self {
        let mut unique: Vec<Update> = Vec::with_capacity(updates.len());
        for update in updates {
            if !unique.iter().any(|u| u.path == update.path) {
                unique.push(update);
            }
        }
        Self {
            name: name.into(),
            updates: unique,
        }
    }

    pub fn singleton(update: Update) -> Self {
        Self {
            name: String::new(),
            updates: vec![update],
        }
    }

    pub fn is_singleton(&self) -> bool {
        self.name.is_empty() && self.updates.len() == 1
    }

    /// Copy with updates sorted by path
    pub fn sorted(&self) -> Self {
        let mut updates = self.updates.clone();
        updates.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            name: self.name.clone(),
            updates,
        }
    }
}

/// A previously proposed update group as recorded by the hosting service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingUpdate {
    pub base_branch: String,
    pub last_update: DateTime<Utc>,
    pub group: UpdateGroup,
    pub open: bool,
    pub merged: bool,
}

/// All existing updates for one base branch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingUpdates(pub Vec<ExistingUpdate>);

impl ExistingUpdates {
    pub fn new(updates: Vec<ExistingUpdate>) -> Self {
        Self(updates)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExistingUpdate> {
        self.0.iter()
    }

    /// Most recent open or merged proposal for a named group
    pub fn latest_group_update(&self, group: &str) -> Option<DateTime<Utc>> {
        self.0
            .iter()
            .filter(|u| u.group.name == group && (u.open || u.merged))
            .map(|u| u.last_update)
            .max()
    }
}
