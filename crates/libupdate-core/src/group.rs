//! Grouping policy
//!
//! Rules are matched in order against dependency paths; the first match
//! wins. A rule also carries the version range its members may move within
//! and how often the group may be proposed.

use std::collections::HashSet;
use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::UpdateError;
use crate::types::{Dependency, ExistingUpdates};
use crate::version;

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);
const ONE_WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const ONE_MONTH: Duration = Duration::from_secs(730 * 60 * 60 + 30 * 60);
const ONE_YEAR: Duration = Duration::from_secs(8766 * 60 * 60);

/// How often a group may be proposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Frequency {
    #[default]
    Always,
    Daily,
    Weekly,
}

impl Frequency {
    /// Parse from string; empty means no limit
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" => Some(Frequency::Always),
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Always => "",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Frequency::Always => Duration::ZERO,
            Frequency::Daily => ONE_DAY,
            Frequency::Weekly => ONE_WEEK,
        }
    }
}

/// A single grouping rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    /// Path prefix, or a regular expression enclosed in `/`
    pub pattern: String,
    /// Comma separated `<`, `<=`, `>`, `>=` guards
    #[serde(default)]
    pub range: String,
    #[serde(default)]
    pub frequency: String,
    /// ISO-8601 style duration such as `P1W` or `3D`
    #[serde(default)]
    pub cooldown: String,
    #[serde(default, rename = "pre-script")]
    pub pre_script: String,
    #[serde(default, rename = "post-script")]
    pub post_script: String,

    #[serde(skip)]
    compiled: Option<Regex>,
}

fn duration_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^P?(?:(?:(?P<year>\d+)Y)?(?:(?P<month>\d+)M)?(?:(?P<day>\d+)D)?|(?P<week>\d+)W)$").ok()
    })
    .as_ref()
}

/// Parse an ISO-8601 style duration (`P1Y2M3D`, `P2W`, `5D`). Empty is zero.
pub fn parse_cooldown(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Some(Duration::ZERO);
    }
    let caps = duration_re()?.captures(s)?;
    let mut total = Duration::ZERO;
    for (name, unit) in [
        ("year", ONE_YEAR),
        ("month", ONE_MONTH),
        ("week", ONE_WEEK),
        ("day", ONE_DAY),
    ] {
        if let Some(m) = caps.name(name) {
            let n: u32 = m.as_str().parse().ok()?;
            total = total.checked_add(unit.checked_mul(n)?)?;
        }
    }
    Some(total)
}

impl Group {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = range.into();
        self
    }

    pub fn with_frequency(mut self, frequency: impl Into<String>) -> Self {
        self.frequency = frequency.into();
        self
    }

    pub fn with_cooldown(mut self, cooldown: impl Into<String>) -> Self {
        self.cooldown = cooldown.into();
        self
    }

    /// Check the rule and compile its pattern
    pub fn validate(&mut self) -> Result<(), UpdateError> {
        if self.name.is_empty() {
            return Err(UpdateError::ConfigInvalid("groups must specify name".into()));
        }
        if self.pattern.is_empty() {
            return Err(UpdateError::ConfigInvalid(format!(
                "group {:?} must specify pattern",
                self.name
            )));
        }
        if Frequency::parse(&self.frequency).is_none() {
            return Err(UpdateError::ConfigInvalid(format!(
                "group {:?}: invalid frequency {:?}, expected daily or weekly",
                self.name, self.frequency
            )));
        }
        if parse_cooldown(&self.cooldown).is_none() {
            return Err(UpdateError::ConfigInvalid(format!(
                "group {:?}: invalid cooldown, expected ISO8601 duration: {:?}",
                self.name, self.cooldown
            )));
        }

        let source = if self.pattern.len() > 1 && self.pattern.starts_with('/') && self.pattern.ends_with('/') {
            self.pattern[1..self.pattern.len() - 1].to_string()
        } else {
            format!("^{}", regex::escape(&self.pattern))
        };
        let re = Regex::new(&source).map_err(|e| {
            UpdateError::ConfigInvalid(format!("group {:?}: compiling pattern: {}", self.name, e))
        })?;
        self.compiled = Some(re);
        Ok(())
    }

    /// Whether this rule claims `path`. Unvalidated rules match nothing.
    pub fn matches(&self, path: &str) -> bool {
        self.compiled.as_ref().map(|re| re.is_match(path)).unwrap_or(false)
    }

    /// Whether version `v` satisfies every guard of the range
    pub fn in_range(&self, v: &str) -> bool {
        self.range.split(',').map(str::trim).all(|guard| {
            use std::cmp::Ordering::*;
            if let Some(bound) = guard.strip_prefix("<=") {
                version::compare(&version::normalize(bound), v) != Less
            } else if let Some(bound) = guard.strip_prefix(">=") {
                version::compare(&version::normalize(bound), v) != Greater
            } else if let Some(bound) = guard.strip_prefix('<') {
                version::compare(&version::normalize(bound), v) == Greater
            } else if let Some(bound) = guard.strip_prefix('>') {
                version::compare(&version::normalize(bound), v) == Less
            } else {
                true
            }
        })
    }

    /// Minimum time between proposals: the longer of frequency and cooldown
    pub fn cooldown_duration(&self) -> Duration {
        let frequency = Frequency::parse(&self.frequency)
            .map(|f| f.duration())
            .unwrap_or_default();
        let cooldown = parse_cooldown(&self.cooldown).unwrap_or_default();
        frequency.max(cooldown)
    }

    /// If the group was proposed too recently, return `(cooldown, age)`
    pub fn cooldown_remaining(
        &self,
        existing: &ExistingUpdates,
        now: DateTime<Utc>,
    ) -> Option<(Duration, Duration)> {
        let cooldown = self.cooldown_duration();
        if cooldown.is_zero() {
            return None;
        }
        let last = existing.latest_group_update(&self.name)?;
        let age = now.signed_duration_since(last).to_std().unwrap_or(Duration::ZERO);
        (age < cooldown).then_some((cooldown, age))
    }
}

/// Dependencies split by rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Groups with at least one member, in rule order
    pub grouped: Vec<(String, Vec<Dependency>)>,
    pub ungrouped: Vec<Dependency>,
}

/// Ordered rule list with unique names
#[derive(Debug, Clone, Default)]
pub struct Groups(Vec<Group>);

impl Groups {
    /// Validate and compile rules
    pub fn new(mut groups: Vec<Group>) -> Result<Self, UpdateError> {
        let mut names = HashSet::new();
        for group in groups.iter_mut() {
            group.validate()?;
            if !names.insert(group.name.clone()) {
                return Err(UpdateError::ConfigInvalid(format!(
                    "duplicate group name: {:?}",
                    group.name
                )));
            }
        }
        Ok(Self(groups))
    }

    /// Parse rules from a YAML list
    pub fn parse(s: &str) -> Result<Self, UpdateError> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let groups: Vec<Group> = serde_yaml::from_str(s)?;
        Self::new(groups)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.0.iter()
    }

    pub fn by_name(&self, name: &str) -> Option<&Group> {
        self.0.iter().find(|g| g.name == name)
    }

    /// First rule matching `path`
    pub fn match_group(&self, path: &str) -> Option<&Group> {
        self.0.iter().find(|g| g.matches(path))
    }

    /// Split dependencies by first matching rule, keeping input order within each part
    pub fn partition(&self, deps: &[Dependency]) -> Partition {
        let mut grouped: Vec<(String, Vec<Dependency>)> =
            self.0.iter().map(|g| (g.name.clone(), Vec::new())).collect();
        let mut ungrouped = Vec::new();
        for dep in deps {
            match self.0.iter().position(|g| g.matches(&dep.path)) {
                Some(i) => grouped[i].1.push(dep.clone()),
                None => ungrouped.push(dep.clone()),
            }
        }
        grouped.retain(|(_, members)| !members.is_empty());
        Partition { grouped, ungrouped }
    }
}
