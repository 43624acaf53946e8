//! Go-style version ordering
//!
//! Versions carry a leading `v` and may abbreviate the minor and patch
//! components (`v1`, `v1.2`). The rest is semver 2.0 and is handled by the
//! `semver` crate. Invalid strings sort below every valid version and compare
//! equal to each other.

use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Parse a `v`-prefixed version, expanding `v1` and `v1.2` to full triples.
///
/// Short forms may not carry a pre-release or build suffix.
pub fn parse(v: &str) -> Option<semver::Version> {
    let naked = v.strip_prefix('v')?;
    let core_len = naked.find(['-', '+']).unwrap_or(naked.len());
    let full = match naked[..core_len].matches('.').count() {
        0 if core_len == naked.len() => format!("{}.0.0", naked),
        1 if core_len == naked.len() => format!("{}.0", naked),
        2 => naked.to_string(),
        _ => return None,
    };
    semver::Version::parse(&full).ok()
}

/// Whether `v` is a valid version string
pub fn is_valid(v: &str) -> bool {
    parse(v).is_some()
}

/// Compare two version strings, ignoring build metadata.
///
/// An invalid version is less than every valid one; two invalid versions are equal.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp_precedence(&b),
    }
}

/// Major version prefix, e.g. `v2` for `v2.3.4`, or empty if invalid
pub fn major(v: &str) -> String {
    parse(v)
        .map(|p| format!("v{}", p.major))
        .unwrap_or_default()
}

/// Whether `v` is a valid pre-release version
pub fn is_prerelease(v: &str) -> bool {
    parse(v).map(|p| !p.pre.is_empty()).unwrap_or(false)
}

/// Prepend `v` to a bare version
pub fn normalize(v: &str) -> String {
    let v = v.trim();
    if v.starts_with('v') {
        v.to_string()
    } else {
        format!("v{}", v)
    }
}

fn pseudo_version_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^v[0-9]+\.(0\.0-|\d+\.\d+-([^+]*\.)?0\.)\d{14}-[A-Za-z0-9]+(\+[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?$",
        )
        .ok()
    })
    .as_ref()
}

/// Whether `v` is a pseudo-version (a commit pinned as `vX.Y.Z-<timestamp>-<hash>`)
pub fn is_pseudo_version(v: &str) -> bool {
    v.matches('-').count() >= 2
        && is_valid(v)
        && pseudo_version_re().map(|re| re.is_match(v)).unwrap_or(false)
}

/// Eligibility of pre-release candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrereleasePolicy {
    /// Pre-releases are eligible only when the current version is a pre-release
    #[default]
    Auto,
    /// Pre-releases are never eligible
    Never,
    /// Pre-releases are always eligible
    Always,
}

impl PrereleasePolicy {
    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Some(PrereleasePolicy::Auto),
            "never" => Some(PrereleasePolicy::Never),
            "always" => Some(PrereleasePolicy::Always),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            PrereleasePolicy::Auto => "auto",
            PrereleasePolicy::Never => "never",
            PrereleasePolicy::Always => "always",
        }
    }

    /// Whether `candidate` may replace `current` under this policy
    pub fn allows(&self, current: &str, candidate: &str) -> bool {
        if !is_prerelease(candidate) {
            return true;
        }
        match self {
            PrereleasePolicy::Auto => is_prerelease(current),
            PrereleasePolicy::Never => false,
            PrereleasePolicy::Always => true,
        }
    }
}

/// Pick the highest candidate strictly greater than `current`.
///
/// Pseudo-versions are never selected. `filter`, when given, must accept the candidate.
pub fn highest_upgrade<'a, I>(
    current: &str,
    candidates: I,
    policy: PrereleasePolicy,
    filter: Option<&dyn Fn(&str) -> bool>,
) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter(|c| is_valid(c) && !is_pseudo_version(c))
        .filter(|c| current.is_empty() || compare(current, c) == Ordering::Less)
        .filter(|c| policy.allows(current, c))
        .filter(|c| filter.map(|f| f(c)).unwrap_or(true))
        .max_by(|a, b| compare(a, b))
        .map(str::to_string)
}
