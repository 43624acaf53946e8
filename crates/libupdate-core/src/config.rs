use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::Deserialize;

use crate::error::UpdateError;
use crate::group::{Group, Groups};
use crate::signed::SigningKey;
use crate::version::PrereleasePolicy;

const DEFAULT_API_URL: &str = "https://api.github.com";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Resolved configuration for one invocation
#[derive(Debug, Clone)]
pub struct ActionConfig {
    /// Hosting-service credential
    pub token: String,
    /// Secret the HMAC key is derived from
    pub signing_key: String,
    pub groups: Groups,
    /// Base branches to update; empty means the current branch
    pub branches: Vec<String>,
    /// Show commits instead of pushing them and publish nothing
    pub no_push: bool,
    /// Glob patterns of dependency paths never checked
    pub ignore: Vec<Pattern>,
    /// `owner/name` repositories notified on release
    pub dispatch_on_release: Vec<String>,
    pub log_level: String,
    pub prereleases: PrereleasePolicy,
    pub tidy: bool,
    pub major_versions: bool,

    /// `owner/name` of the repository being updated
    pub repository: String,
    pub event_name: String,
    pub event_path: Option<PathBuf>,
    pub api_url: String,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            signing_key: String::new(),
            groups: Groups::default(),
            branches: Vec::new(),
            no_push: false,
            ignore: Vec::new(),
            dispatch_on_release: Vec::new(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            prereleases: PrereleasePolicy::Auto,
            tidy: true,
            major_versions: true,
            repository: String::new(),
            event_name: String::new(),
            event_path: None,
            api_url: DEFAULT_API_URL.to_string(),
        }
    }
}

/// Optional TOML overrides, keyed like the action inputs
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ConfigFile {
    pub token: Option<String>,
    pub signing_key: Option<String>,
    pub groups: Option<Vec<Group>>,
    pub branches: Option<Vec<String>>,
    pub no_push: Option<bool>,
    pub ignore: Option<Vec<String>>,
    pub dispatch_on_release: Option<Vec<String>>,
    pub log_level: Option<String>,
    pub prereleases: Option<String>,
    pub tidy: Option<bool>,
    pub major_versions: Option<bool>,
    pub repository: Option<String>,
    pub api_url: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, UpdateError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            UpdateError::ConfigInvalid(format!("reading {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&content)?)
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, UpdateError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(UpdateError::ConfigInvalid(format!(
            "{}: expected a boolean, got {:?}",
            name, other
        ))),
    }
}

fn lines(value: &str) -> Vec<String> {
    value
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn compile_ignore<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Pattern>, UpdateError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p.as_ref()).map_err(|e| {
                UpdateError::ConfigInvalid(format!("ignore pattern {:?}: {}", p.as_ref(), e))
            })
        })
        .collect()
}

fn parse_prereleases(value: &str) -> Result<PrereleasePolicy, UpdateError> {
    PrereleasePolicy::parse(value).ok_or_else(|| {
        UpdateError::ConfigInvalid(format!(
            "prereleases: expected auto, never or always, got {:?}",
            value
        ))
    })
}

impl ActionConfig {
    /// Build from a variable lookup, typically the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, UpdateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("INPUT_TOKEN") {
            config.token = v;
        }
        if let Some(v) = get("INPUT_SIGNING_KEY") {
            config.signing_key = v;
        }
        if let Some(v) = get("INPUT_GROUPS") {
            config.groups = Groups::parse(&v)?;
        }
        if let Some(v) = get("INPUT_BRANCHES") {
            config.branches = lines(&v);
        }
        if let Some(v) = get("INPUT_NO_PUSH") {
            config.no_push = parse_bool("no-push", &v)?;
        }
        if let Some(v) = get("INPUT_IGNORE") {
            let patterns: Vec<&str> = v.split_whitespace().collect();
            config.ignore = compile_ignore(&patterns)?;
        }
        if let Some(v) = get("INPUT_DISPATCH_ON_RELEASE") {
            config.dispatch_on_release = lines(&v);
        }
        if let Some(v) = get("INPUT_LOG_LEVEL") {
            config.log_level = v.trim().to_string();
        }
        if let Some(v) = get("INPUT_PRERELEASES") {
            config.prereleases = parse_prereleases(&v)?;
        }
        if let Some(v) = get("INPUT_TIDY") {
            config.tidy = parse_bool("tidy", &v)?;
        }
        if let Some(v) = get("INPUT_MAJOR_VERSIONS") {
            config.major_versions = parse_bool("major-versions", &v)?;
        }

        if let Some(v) = get("GITHUB_REPOSITORY") {
            config.repository = v;
        }
        if let Some(v) = get("GITHUB_EVENT_NAME") {
            config.event_name = v;
        }
        if let Some(v) = get("GITHUB_EVENT_PATH") {
            config.event_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("GITHUB_API_URL") {
            config.api_url = v.trim_end_matches('/').to_string();
        }

        Ok(config)
    }

    /// Build from the process environment
    pub fn from_env() -> Result<Self, UpdateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Override values with those set in a config file
    pub fn apply_file(&mut self, file: ConfigFile) -> Result<(), UpdateError> {
        if let Some(v) = file.token {
            self.token = v;
        }
        if let Some(v) = file.signing_key {
            self.signing_key = v;
        }
        if let Some(v) = file.groups {
            self.groups = Groups::new(v)?;
        }
        if let Some(v) = file.branches {
            self.branches = v;
        }
        if let Some(v) = file.no_push {
            self.no_push = v;
        }
        if let Some(v) = file.ignore {
            self.ignore = compile_ignore(&v)?;
        }
        if let Some(v) = file.dispatch_on_release {
            self.dispatch_on_release = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        if let Some(v) = file.prereleases {
            self.prereleases = parse_prereleases(&v)?;
        }
        if let Some(v) = file.tidy {
            self.tidy = v;
        }
        if let Some(v) = file.major_versions {
            self.major_versions = v;
        }
        if let Some(v) = file.repository {
            self.repository = v;
        }
        if let Some(v) = file.api_url {
            self.api_url = v.trim_end_matches('/').to_string();
        }
        Ok(())
    }

    /// HMAC key for signed manifests
    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_input(&self.signing_key)
    }

    /// Whether a dependency path is excluded by `ignore`
    pub fn ignored(&self, path: &str) -> bool {
        self.ignore.iter().any(|p| p.matches(path))
    }

    /// `(owner, name)` of the repository being updated
    pub fn repository_parts(&self) -> Option<(&str, &str)> {
        split_repository(&self.repository)
    }
}

/// Split `owner/name`
pub fn split_repository(full_name: &str) -> Option<(&str, &str)> {
    let (owner, name) = full_name.split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((owner, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ActionConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.tidy);
        assert!(config.major_versions);
        assert!(!config.no_push);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.prereleases, PrereleasePolicy::Auto);
        assert_eq!(config.api_url, "https://api.github.com");
        assert!(config.branches.is_empty());
        assert!(config.groups.is_empty());
    }

    #[test]
    fn test_from_lookup() {
        let config = ActionConfig::from_lookup(lookup(&[
            ("INPUT_BRANCHES", "main\n\n  release-1.x \n"),
            ("INPUT_NO_PUSH", "YES"),
            ("INPUT_IGNORE", "github.com/internal/*  golang.org/x/**"),
            ("INPUT_DISPATCH_ON_RELEASE", "acme/one\nacme/two"),
            ("INPUT_GROUPS", "- name: aws\n  pattern: github.com/aws\n"),
            ("INPUT_PRERELEASES", "never"),
            ("INPUT_TIDY", "0"),
            ("GITHUB_REPOSITORY", "acme/widgets"),
            ("GITHUB_API_URL", "https://ghe.example/api/v3/"),
        ]))
        .unwrap();
        assert_eq!(config.branches, vec!["main", "release-1.x"]);
        assert!(config.no_push);
        assert!(config.ignored("github.com/internal/secret"));
        assert!(config.ignored("golang.org/x/net"));
        assert!(!config.ignored("github.com/public/thing"));
        assert_eq!(config.dispatch_on_release, vec!["acme/one", "acme/two"]);
        assert!(config.groups.by_name("aws").is_some());
        assert_eq!(config.prereleases, PrereleasePolicy::Never);
        assert!(!config.tidy);
        assert_eq!(config.repository_parts(), Some(("acme", "widgets")));
        assert_eq!(config.api_url, "https://ghe.example/api/v3");
    }

    #[test]
    fn test_invalid_bool() {
        let err = ActionConfig::from_lookup(lookup(&[("INPUT_NO_PUSH", "maybe")])).unwrap_err();
        assert!(matches!(err, UpdateError::ConfigInvalid(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_invalid_groups() {
        let err = ActionConfig::from_lookup(lookup(&[(
            "INPUT_GROUPS",
            "- name: a\n  pattern: x\n- name: a\n  pattern: y\n",
        )]))
        .unwrap_err();
        assert!(matches!(err, UpdateError::ConfigInvalid(_)));
    }

    #[test]
    fn test_signing_key_is_digest_of_input() {
        let a = ActionConfig::from_lookup(lookup(&[("INPUT_SIGNING_KEY", "k")])).unwrap();
        let b = ActionConfig::from_lookup(lookup(&[("INPUT_SIGNING_KEY", "k")])).unwrap();
        let group = crate::types::UpdateGroup::default();
        let sa = crate::signed::sign(&a.signing_key(), &group).unwrap();
        let sb = crate::signed::sign(&b.signing_key(), &group).unwrap();
        assert_eq!(sa.signature, sb.signature);
    }

    #[test]
    fn test_file_overrides_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("action-update.toml");
        std::fs::write(
            &path,
            r#"
no-push = true
branches = ["develop"]
ignore = ["example.com/**"]
prereleases = "always"

[[groups]]
name = "foo"
pattern = "github.com/foo"
range = "<2.0"
frequency = "weekly"
"#,
        )
        .unwrap();

        let mut config = ActionConfig::from_lookup(lookup(&[("INPUT_BRANCHES", "main")])).unwrap();
        config.apply_file(ConfigFile::load(&path).unwrap()).unwrap();
        assert!(config.no_push);
        assert_eq!(config.branches, vec!["develop"]);
        assert!(config.ignored("example.com/a/b"));
        assert_eq!(config.prereleases, PrereleasePolicy::Always);
        assert_eq!(config.groups.by_name("foo").unwrap().range, "<2.0");
    }

    #[test]
    fn test_file_unknown_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "colour = \"blue\"\n").unwrap();
        assert!(matches!(ConfigFile::load(&path), Err(UpdateError::ConfigInvalid(_))));
    }

    #[test]
    fn test_split_repository() {
        assert_eq!(split_repository("a/b"), Some(("a", "b")));
        assert_eq!(split_repository("a"), None);
        assert_eq!(split_repository("a/b/c"), None);
    }
}
