//! Updater for GitHub release downloads in container build files
//!
//! A dependency is a `https://github.com/<owner>/<repo>/releases/download/<tag>/`
//! URL found in an interpolated `RUN` instruction. Updates rewrite the
//! `<REPO>_VERSION` style build arguments and refresh checksums pinned
//! next to them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use libupdate_core::updater::normalize_dependencies;
use libupdate_core::version::{self, PrereleasePolicy};
use libupdate_core::{Context, Dependency, Update, UpdateError, Updater, VersionFilter};
use regex::Regex;
use sha2::{Digest, Sha256, Sha512};
use tracing::{debug, info, warn};

use crate::containerfile::{find_containerfiles, parse, Interpolation};
use crate::release::ReleaseSource;

/// Checksum files larger than this are not inspected
const MAX_CHECKSUM_FILE: u64 = 1024;

const VERSION_SUFFIXES: [&str; 2] = ["_VERSION", "_RELEASE"];
const HASH_SUFFIXES: [&str; 4] = ["_SHASUM", "_SHA256SUM", "_SHA512SUM", "_CHECKSUM"];

fn release_url_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"https://github\.com/([^/\s]+)/([^/\s]+)/releases/download/([^/\s]+)/").ok()
    })
    .as_ref()
}

/// Dependency path of a repository's releases
pub fn release_path(owner: &str, repo: &str) -> String {
    format!("github.com/{}/{}/releases", owner, repo)
}

/// Owner and repository of a dependency path built by `release_path`
pub fn parse_release_path(path: &str) -> Option<(&str, &str)> {
    let mut parts = path.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("github.com"), Some(owner), Some(repo), Some("releases"), None)
            if !owner.is_empty() && !repo.is_empty() =>
        {
            Some((owner, repo))
        }
        _ => None,
    }
}

/// Build argument prefix for a repository: `docker-credential.helper` becomes
/// `DOCKER_CREDENTIAL_HELPER`
pub fn env_prefix(repo: &str) -> String {
    repo.chars()
        .map(|c| match c {
            '-' | '.' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Release downloads referenced from the `RUN` instructions of one file
pub fn extract_dependencies(text: &str) -> Vec<Dependency> {
    let Some(re) = release_url_re() else {
        return Vec::new();
    };
    let instructions = parse(text);
    let vars = Interpolation::new(&instructions);

    let mut deps = Vec::new();
    for inst in instructions.iter().filter(|i| i.keyword == "RUN") {
        let line = vars.interpolate(&inst.args);
        for caps in re.captures_iter(&line) {
            deps.push(Dependency::new(release_path(&caps[1], &caps[2]), &caps[3]));
        }
    }
    deps
}

/// Release tag with the leading `v` dropped, for build args pinned without it
fn bare(tag: &str) -> &str {
    tag.strip_prefix('v').unwrap_or(tag)
}

/// Swap the version in an asset URL or file name, with or without its `v`
fn rewrite_url(url: &str, previous: &str, next: &str) -> String {
    url.replace(bare(previous), bare(next))
}

/// Hash for `file_name` in a `sha256sum` style listing, falling back to the
/// first token of the first line
fn checksum_for(listing: &str, file_name: Option<&str>) -> Option<String> {
    let mut first = None;
    for line in listing.lines() {
        let mut fields = line.split_whitespace();
        let Some(hash) = fields.next() else {
            continue;
        };
        let name = fields.next().map(|n| n.trim_start_matches('*'));
        if file_name.is_some() && name == file_name {
            return Some(hash.to_lowercase());
        }
        first.get_or_insert_with(|| hash.to_lowercase());
    }
    first
}

fn digest_like(old_hash: &str, body: &[u8]) -> Option<String> {
    match old_hash.len() {
        64 => Some(hex::encode(Sha256::digest(body))),
        128 => Some(hex::encode(Sha512::digest(body))),
        _ => None,
    }
}

pub struct DockerUrlUpdater {
    root: PathBuf,
    prereleases: PrereleasePolicy,
    source: Box<dyn ReleaseSource>,
}

impl DockerUrlUpdater {
    pub fn new(root: impl Into<PathBuf>, source: Box<dyn ReleaseSource>) -> Self {
        Self {
            root: root.into(),
            prereleases: PrereleasePolicy::default(),
            source,
        }
    }

    pub fn with_prereleases(mut self, policy: PrereleasePolicy) -> Self {
        self.prereleases = policy;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn split_path(path: &str) -> Result<(&str, &str), UpdateError> {
        parse_release_path(path)
            .ok_or_else(|| UpdateError::Internal(format!("unexpected release path: {}", path)))
    }

    /// Whether releases GitHub flags as pre-releases are eligible
    fn flagged_prereleases(&self, current: &str) -> bool {
        match self.prereleases {
            PrereleasePolicy::Always => true,
            PrereleasePolicy::Never => false,
            PrereleasePolicy::Auto => version::is_prerelease(current),
        }
    }

    /// New value for a pinned hash of one of the previous release's assets
    fn updated_hash(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        update: &Update,
        old_hash: &str,
    ) -> Result<Option<String>, UpdateError> {
        let old_hash = old_hash.to_lowercase();
        let Some(release) = self
            .source
            .release_by_tag(ctx, owner, repo, &update.previous)?
        else {
            debug!(tag = %update.previous, "previous release not found");
            return Ok(None);
        };

        for asset in release.assets.iter().filter(|a| a.size <= MAX_CHECKSUM_FILE) {
            let listing = self.source.download(ctx, &asset.browser_download_url)?;
            let listing = String::from_utf8_lossy(&listing);
            let Some(line) = listing
                .lines()
                .find(|l| l.to_lowercase().contains(&old_hash))
            else {
                continue;
            };
            let file_name = line
                .split_whitespace()
                .nth(1)
                .map(|n| rewrite_url(n.trim_start_matches('*'), &update.previous, &update.next));

            debug!(asset = %asset.name, "found checksum file");
            let url = rewrite_url(&asset.browser_download_url, &update.previous, &update.next);
            let next_listing = self.source.download(ctx, &url)?;
            return Ok(checksum_for(
                &String::from_utf8_lossy(&next_listing),
                file_name.as_deref(),
            ));
        }

        if digest_like(&old_hash, b"").is_none() {
            return Ok(None);
        }
        for asset in &release.assets {
            let body = self.source.download(ctx, &asset.browser_download_url)?;
            if digest_like(&old_hash, &body).as_deref() != Some(old_hash.as_str()) {
                continue;
            }
            debug!(asset = %asset.name, "found hashed asset");
            let url = rewrite_url(&asset.browser_download_url, &update.previous, &update.next);
            let next_body = self.source.download(ctx, &url)?;
            return Ok(digest_like(&old_hash, &next_body));
        }
        Ok(None)
    }

    /// `(from, to)` text replacements for one file
    fn replacements(
        &self,
        ctx: &Context,
        owner: &str,
        repo: &str,
        update: &Update,
        vars: &Interpolation,
        hashes: &mut HashMap<String, Option<String>>,
    ) -> Result<Vec<(String, String)>, UpdateError> {
        let prefix = env_prefix(repo);
        let mut out = Vec::new();

        for suffix in VERSION_SUFFIXES {
            let key = format!("{}{}", prefix, suffix);
            match vars.get(&key) {
                Some(v) if v == update.previous => {
                    out.push((format!("{}={}", key, update.previous), format!("{}={}", key, update.next)));
                }
                Some(v) if v == bare(&update.previous) => {
                    out.push((
                        format!("{}={}", key, bare(&update.previous)),
                        format!("{}={}", key, bare(&update.next)),
                    ));
                }
                _ => {}
            }
        }

        for suffix in HASH_SUFFIXES {
            let key = format!("{}{}", prefix, suffix);
            let Some(old) = vars.get(&key) else {
                continue;
            };
            if !hashes.contains_key(old) {
                let new = match self.updated_hash(ctx, owner, repo, update, old) {
                    Ok(new) => new,
                    Err(UpdateError::Cancelled) => return Err(UpdateError::Cancelled),
                    Err(e) => {
                        warn!(key = %key, error = %e, "refreshing checksum");
                        None
                    }
                };
                hashes.insert(old.to_string(), new);
            }
            match hashes.get(old).cloned().flatten() {
                Some(new) => out.push((format!("{}={}", key, old), format!("{}={}", key, new))),
                None => warn!(key = %key, "no checksum found for new release"),
            }
        }

        let url = format!("https://github.com/{}/{}/releases/download/", owner, repo);
        out.push((
            format!("{}{}/", url, update.previous),
            format!("{}{}/", url, update.next),
        ));
        Ok(out)
    }
}

impl Updater for DockerUrlUpdater {
    fn name(&self) -> &'static str {
        "dockerurl"
    }

    fn dependencies(&self, ctx: &Context) -> Result<Vec<Dependency>, UpdateError> {
        let mut deps = Vec::new();
        for path in find_containerfiles(&self.root)? {
            ctx.check()?;
            let text = fs::read_to_string(&path)?;
            let found = extract_dependencies(&text);
            debug!(file = %path.display(), count = found.len(), "parsed container file");
            deps.extend(found);
        }
        Ok(normalize_dependencies(deps))
    }

    fn check(
        &self,
        ctx: &Context,
        dep: &Dependency,
        filter: VersionFilter<'_>,
    ) -> Result<Option<Update>, UpdateError> {
        let (owner, repo) = Self::split_path(&dep.path)?;
        let current = version::normalize(&dep.version);

        debug!(path = %dep.path, "querying releases");
        let releases = self.source.releases(ctx, owner, repo)?;
        let flagged_ok = self.flagged_prereleases(&current);

        // Normalized version to the tag as published
        let mut tags: HashMap<String, String> = HashMap::new();
        for release in releases {
            if release.draft || (release.prerelease && !flagged_ok) {
                continue;
            }
            let normalized = version::normalize(&release.tag_name);
            if !version::is_valid(&normalized) {
                continue;
            }
            tags.entry(normalized).or_insert(release.tag_name);
        }

        let best = version::highest_upgrade(
            &current,
            tags.keys().map(String::as_str),
            self.prereleases,
            filter,
        );
        match best.and_then(|v| tags.get(&v)) {
            Some(tag) => {
                info!(path = %dep.path, previous = %dep.version, next = %tag, "update available");
                Ok(Some(Update::new(dep.path.as_str(), dep.version.as_str(), tag.as_str())))
            }
            None => {
                debug!(path = %dep.path, current_version = %dep.version, "no update available");
                Ok(None)
            }
        }
    }

    fn apply_update(&self, ctx: &Context, update: &Update) -> Result<(), UpdateError> {
        let (owner, repo) = Self::split_path(&update.path)?;
        let mut hashes = HashMap::new();
        let mut touched = 0;

        for path in find_containerfiles(&self.root)? {
            ctx.check()?;
            let text = fs::read_to_string(&path)?;
            let vars = Interpolation::new(&parse(&text));
            let mut updated = text.clone();
            for (from, to) in self.replacements(ctx, owner, repo, update, &vars, &mut hashes)? {
                updated = updated.replace(&from, &to);
            }
            if updated != text {
                fs::write(&path, updated)?;
                info!(file = %path.display(), path = %update.path, next = %update.next, "updated container file");
                touched += 1;
            }
        }

        if touched == 0 {
            return Err(UpdateError::ToolFailure(format!(
                "could not update {} to {}: no pinned version found",
                update.path, update.next
            )));
        }
        Ok(())
    }
}
