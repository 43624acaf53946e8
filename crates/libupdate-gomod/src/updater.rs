//! Go modules updater
//!
//! Dependencies come from every `go.mod` under the root. Version queries
//! and `go.sum` maintenance shell out to the Go toolchain so the user's
//! module proxy and credentials apply. Every `go` invocation holds the
//! updater's lock: the working tree is shared.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use libupdate_core::updater::normalize_dependencies;
use libupdate_core::version::{self, PrereleasePolicy};
use libupdate_core::{Context, Dependency, Update, UpdateError, Updater, VersionFilter};
use tracing::{debug, info, warn};

use crate::modfile::ModFile;
use crate::source::{is_major_update, next_major_path, target_path, ImportRewriter};
use crate::tool::{GoTool, GoToolchain, ModuleVersions};

pub const GO_MOD: &str = "go.mod";
pub const VENDOR_MODULES: &str = "vendor/modules.txt";

const DUMMY_GO_MOD: &str = "module dummy\n";
const FAKE_MAIN: &str = "package main\n\nfunc main() {}\n";

/// Removes a scratch file when dropped
struct ScratchFile(PathBuf);

impl ScratchFile {
    /// Write `contents` to `path` unless something is already there
    fn create(path: PathBuf, contents: &str) -> Result<Option<Self>, UpdateError> {
        if path.exists() {
            return Ok(None);
        }
        fs::write(&path, contents)?;
        Ok(Some(Self(path)))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.0) {
            warn!(path = %self.0.display(), error = %e, "cleaning up temp go file");
        }
    }
}

/// How an update was written into one `go.mod`
#[derive(Debug, Clone, PartialEq, Eq)]
enum Patched {
    /// A requirement now points at `path@version`
    Require { path: String },
    /// A replacement target was bumped
    Replace,
}

pub struct GoModUpdater {
    root: PathBuf,
    tidy: bool,
    major_versions: bool,
    prereleases: PrereleasePolicy,
    go: Box<dyn GoTool>,
    lock: Mutex<()>,
}

impl GoModUpdater {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tidy: true,
            major_versions: true,
            prereleases: PrereleasePolicy::default(),
            go: Box::new(GoToolchain),
            lock: Mutex::new(()),
        }
    }

    /// Run `go mod tidy` after each update
    pub fn with_tidy(mut self, tidy: bool) -> Self {
        self.tidy = tidy;
        self
    }

    /// Consider upgrades to the next major module path
    pub fn with_major_versions(mut self, major_versions: bool) -> Self {
        self.major_versions = major_versions;
        self
    }

    pub fn with_prereleases(mut self, policy: PrereleasePolicy) -> Self {
        self.prereleases = policy;
        self
    }

    pub fn with_tool(mut self, go: Box<dyn GoTool>) -> Self {
        self.go = go;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every `go.mod` under the root, outside vendor and hidden directories
    pub fn go_mod_files(&self) -> Result<Vec<PathBuf>, UpdateError> {
        let root = self
            .root
            .to_str()
            .ok_or_else(|| UpdateError::Internal(format!("non UTF-8 root: {}", self.root.display())))?;
        let pattern = format!("{}/**/{}", glob::Pattern::escape(root), GO_MOD);
        let entries = glob::glob(&pattern).map_err(|e| UpdateError::Internal(e.to_string()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| UpdateError::Io(e.into()))?;
            let rel = path.strip_prefix(&self.root).unwrap_or(&path);
            let skipped = rel.components().any(|c| {
                let name = c.as_os_str().to_string_lossy();
                name == "vendor" || (name.starts_with('.') && name != ".")
            });
            if !skipped {
                files.push(path);
            }
        }
        files.sort();
        debug!(gomods = files.len(), "discovered go.mod files");
        Ok(files)
    }

    fn read_mod(path: &Path) -> Result<ModFile, UpdateError> {
        let text = fs::read_to_string(path)?;
        Ok(ModFile::parse(&text)?)
    }

    /// `go list` the versions of a module
    fn query(&self, ctx: &Context, path: &str) -> Result<ModuleVersions, UpdateError> {
        let _guard = self.lock();
        let _dummy = ScratchFile::create(self.root.join(GO_MOD), DUMMY_GO_MOD)?;

        let output = self
            .go
            .run(ctx, &self.root, &["list", "-m", "-mod=mod", "-versions", "-json", path])?;
        let versions: ModuleVersions = serde_json::from_str(&output.stdout)?;
        if versions.version.is_empty() && versions.versions.is_empty() {
            return Err(UpdateError::RegistryUnavailable(format!(
                "invalid version response for {}",
                path
            )));
        }
        Ok(versions)
    }

    fn best(&self, current: &str, versions: &ModuleVersions, filter: VersionFilter<'_>) -> Option<String> {
        version::highest_upgrade(current, versions.candidates(), self.prereleases, filter)
    }

    fn check_major(
        &self,
        ctx: &Context,
        dep: &Dependency,
        filter: VersionFilter<'_>,
    ) -> Result<Option<Update>, UpdateError> {
        let Some(next_path) = next_major_path(&dep.path) else {
            return Ok(None);
        };
        debug!(path = %dep.path, next_path = %next_path, "querying latest major version");

        let versions = match self.query(ctx, &next_path) {
            Ok(versions) => versions,
            // The next major version most likely does not exist
            Err(UpdateError::ToolFailure(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some(next) = self.best(&dep.version, &versions, filter) else {
            return Ok(None);
        };
        info!(path = %dep.path, previous = %dep.version, next = %next, "major upgrade available");
        Ok(Some(Update::new(dep.path.as_str(), dep.version.as_str(), next)))
    }

    fn patch(file: &mut ModFile, update: &Update) -> Result<Option<Patched>, UpdateError> {
        let target = target_path(update);
        let applied = file
            .requires()
            .iter()
            .any(|r| r.path == target && r.version == update.next);
        if applied {
            return Ok(Some(Patched::Require { path: target }));
        }
        if target != update.path {
            if file.rename_require(&update.path, &target, &update.next)? {
                return Ok(Some(Patched::Require { path: target }));
            }
            return Ok(None);
        }
        if file.set_require(&update.path, &update.next)? {
            return Ok(Some(Patched::Require { path: target }));
        }
        if file.set_replace_version(&update.path, &update.next)? {
            return Ok(Some(Patched::Replace));
        }
        Ok(None)
    }

    fn rewrite_sources(&self, update: &Update) -> Result<(), UpdateError> {
        let target = target_path(update);
        let rewriter = ImportRewriter::new(&update.path, &target)
            .map_err(|e| UpdateError::Internal(e.to_string()))?;
        let root = self
            .root
            .to_str()
            .ok_or_else(|| UpdateError::Internal(format!("non UTF-8 root: {}", self.root.display())))?;
        let pattern = format!("{}/**/*.go", glob::Pattern::escape(root));
        for entry in glob::glob(&pattern).map_err(|e| UpdateError::Internal(e.to_string()))? {
            let path = entry.map_err(|e| UpdateError::Io(e.into()))?;
            let rel = path.strip_prefix(&self.root).unwrap_or(&path);
            if rel.components().any(|c| c.as_os_str() == "vendor") {
                continue;
            }
            let source = fs::read_to_string(&path)?;
            if let Some(rewritten) = rewriter.rewrite(&source) {
                debug!(file_path = %path.display(), "updating go file");
                fs::write(&path, rewritten)?;
            }
        }
        Ok(())
    }

    /// Refresh `go.sum`, tidy and re-vendor one module after its `go.mod` changed
    fn refresh_module(
        &self,
        ctx: &Context,
        dir: &Path,
        patched: &Patched,
        update: &Update,
    ) -> Result<(), UpdateError> {
        let _main = if has_go_files(dir)? {
            None
        } else {
            ScratchFile::create(dir.join("main.go"), FAKE_MAIN)?
        };

        match patched {
            Patched::Require { path } => {
                let module = format!("{}@{}", path, update.next);
                self.go.run(ctx, dir, &["get", module.as_str()])?;
            }
            Patched::Replace => {
                self.go.run(ctx, dir, &["mod", "download"])?;
            }
        }
        if self.tidy {
            self.go.run(ctx, dir, &["mod", "tidy"])?;
        }
        if dir.join(VENDOR_MODULES).exists() {
            self.go.run(ctx, dir, &["mod", "vendor"])?;
        }
        Ok(())
    }
}

fn has_go_files(dir: &Path) -> Result<bool, UpdateError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "go").unwrap_or(false) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Requirements of a parsed `go.mod`, with replaced modules reported by
/// their replacement
pub fn extract_dependencies(file: &ModFile) -> Vec<Dependency> {
    let replaces = file.replaces();
    file.requires()
        .into_iter()
        .map(|req| match replaces.iter().find(|r| r.old_path == req.path) {
            Some(rep) => Dependency::new(
                rep.new_path.as_str(),
                rep.new_version.clone().unwrap_or_default(),
            )
            .indirect(req.indirect),
            None => Dependency::new(req.path, req.version).indirect(req.indirect),
        })
        .collect()
}

impl Updater for GoModUpdater {
    fn name(&self) -> &'static str {
        "gomod"
    }

    fn dependencies(&self, ctx: &Context) -> Result<Vec<Dependency>, UpdateError> {
        ctx.check()?;
        let mut deps = Vec::new();
        for path in self.go_mod_files()? {
            let file = Self::read_mod(&path)?;
            // Modules without versions are local path replacements
            deps.extend(
                extract_dependencies(&file)
                    .into_iter()
                    .filter(|d| !d.version.is_empty()),
            );
        }
        Ok(normalize_dependencies(deps))
    }

    fn check(
        &self,
        ctx: &Context,
        dep: &Dependency,
        filter: VersionFilter<'_>,
    ) -> Result<Option<Update>, UpdateError> {
        if version::is_pseudo_version(&dep.version) {
            debug!(path = %dep.path, version = %dep.version, "skipping pseudoversion module");
            return Ok(None);
        }

        if self.major_versions {
            if let Some(update) = self.check_major(ctx, dep, filter)? {
                return Ok(Some(update));
            }
        }

        debug!(path = %dep.path, "querying latest version");
        let versions = match self.query(ctx, &dep.path) {
            Ok(versions) => versions,
            Err(UpdateError::ToolFailure(msg)) => return Err(UpdateError::RegistryUnavailable(msg)),
            Err(e) => return Err(e),
        };
        match self.best(&dep.version, &versions, filter) {
            Some(next) => {
                info!(path = %dep.path, previous = %dep.version, next = %next, "update available");
                Ok(Some(Update::new(dep.path.as_str(), dep.version.as_str(), next)))
            }
            None => {
                debug!(path = %dep.path, current_version = %dep.version, "no update available");
                Ok(None)
            }
        }
    }

    fn apply_update(&self, ctx: &Context, update: &Update) -> Result<(), UpdateError> {
        let _guard = self.lock();
        let mut touched = Vec::new();
        for path in self.go_mod_files()? {
            let mut file = Self::read_mod(&path)?;
            let Some(patched) = Self::patch(&mut file, update)? else {
                continue;
            };
            let updated = file.to_string();
            debug!(file = %path.display(), "-- go.mod --\n{}\n-- /go.mod --", updated);
            fs::write(&path, updated)?;
            touched.push((path, patched));
        }
        if touched.is_empty() {
            return Err(UpdateError::ToolFailure(format!("could not update {:?}", update.path)));
        }

        if is_major_update(update) {
            self.rewrite_sources(update)?;
        }

        for (path, patched) in &touched {
            let dir = path.parent().unwrap_or(self.root.as_path());
            self.refresh_module(ctx, dir, patched, update)?;
        }
        info!(path = %update.path, next = %update.next, modules = touched.len(), "applied update");
        Ok(())
    }
}
