//! Module paths with major version suffixes, and import rewriting

use std::sync::OnceLock;

use libupdate_core::version;
use libupdate_core::Update;
use regex::Regex;

fn path_major_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([./])v(\d+)$").ok()).as_ref()
}

/// Path of the next major version: `foo/v2` → `foo/v3`, `gopkg.in/yaml.v2` → `gopkg.in/yaml.v3`
pub fn next_major_path(path: &str) -> Option<String> {
    let caps = path_major_re()?.captures(path)?;
    let current: u64 = caps.get(2)?.as_str().parse().ok()?;
    let prefix = &path[..caps.get(0)?.start()];
    Some(format!("{}{}v{}", prefix, caps.get(1)?.as_str(), current + 1))
}

/// Replace the major suffix of `path` with `major` (e.g. `v3`)
pub fn with_major(path: &str, major: &str) -> Option<String> {
    let caps = path_major_re()?.captures(path)?;
    let prefix = &path[..caps.get(0)?.start()];
    Some(format!("{}{}{}", prefix, caps.get(1)?.as_str(), major))
}

/// An update that moves a suffixed module path to another major version
pub fn is_major_update(update: &Update) -> bool {
    version::major(&update.previous) != version::major(&update.next)
        && path_major_re().map(|re| re.is_match(&update.path)).unwrap_or(false)
}

/// Module path an update installs: the new major path for major updates
pub fn target_path(update: &Update) -> String {
    if is_major_update(update) {
        if let Some(path) = with_major(&update.path, &version::major(&update.next)) {
            return path;
        }
    }
    update.path.clone()
}

/// Rewrites import references from one module path to another
pub struct ImportRewriter {
    pattern: Regex,
    replacement: String,
}

impl ImportRewriter {
    pub fn new(from: &str, to: &str) -> Result<Self, regex::Error> {
        // Match the module itself or one of its packages, never a longer path
        let pattern = Regex::new(&format!(r#"{}(["/])"#, regex::escape(from)))?;
        Ok(Self {
            pattern,
            replacement: format!("{}${{1}}", to),
        })
    }

    /// Rewrite the import section of a Go source file. `None` when nothing changed.
    pub fn rewrite(&self, source: &str) -> Option<String> {
        let mut changed = false;
        let mut importing = false;
        let mut out = String::with_capacity(source.len());

        for line in source.split_inclusive('\n') {
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed == "import (" {
                importing = true;
            } else if trimmed == ")" && importing {
                importing = false;
            }

            if importing || trimmed.starts_with("import") {
                let replaced = self.pattern.replace_all(line, self.replacement.as_str());
                changed |= replaced != line;
                out.push_str(&replaced);
            } else {
                out.push_str(line);
            }
        }

        changed.then_some(out)
    }
}
