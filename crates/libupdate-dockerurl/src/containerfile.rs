//! Just enough Dockerfile parsing to read `ARG`, `ENV` and `RUN`

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use libupdate_core::UpdateError;

const MAX_INTERPOLATION_PASSES: usize = 16;

/// One instruction with continuation lines joined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Upper-cased keyword, e.g. `RUN`
    pub keyword: String,
    pub args: String,
}

/// Whether a file name denotes a container build file
pub fn is_containerfile(name: &str) -> bool {
    name.starts_with("Dockerfile") || name.starts_with("Containerfile")
}

/// Container build files under `root`, sorted, skipping hidden directories
pub fn find_containerfiles(root: &Path) -> Result<Vec<PathBuf>, UpdateError> {
    let base = root
        .to_str()
        .ok_or_else(|| UpdateError::Internal(format!("non UTF-8 root: {}", root.display())))?;
    let pattern = format!("{}/**/*", glob::Pattern::escape(base));
    let mut files = Vec::new();
    for entry in glob::glob(&pattern).map_err(|e| UpdateError::Internal(e.to_string()))? {
        let path = entry.map_err(|e| UpdateError::Io(e.into()))?;
        let rel = path.strip_prefix(root).unwrap_or(&path);
        let hidden = rel
            .components()
            .any(|c| c.as_os_str().to_string_lossy().starts_with('.'));
        let matches = path
            .file_name()
            .map(|n| is_containerfile(&n.to_string_lossy()))
            .unwrap_or(false);
        if matches && !hidden && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn parse(text: &str) -> Vec<Instruction> {
    let mut instructions = Vec::new();
    let mut pending = String::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if pending.is_empty() && (trimmed.is_empty() || trimmed.starts_with('#')) {
            continue;
        }
        if !pending.is_empty() && trimmed.starts_with('#') {
            continue;
        }
        match trimmed.strip_suffix('\\') {
            Some(head) => {
                pending.push_str(head.trim_end());
                pending.push(' ');
            }
            None => {
                pending.push_str(trimmed);
                push_instruction(&mut instructions, &pending);
                pending.clear();
            }
        }
    }
    if !pending.trim().is_empty() {
        push_instruction(&mut instructions, &pending);
    }
    instructions
}

fn push_instruction(out: &mut Vec<Instruction>, line: &str) {
    let line = line.trim();
    let (keyword, args) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    out.push(Instruction {
        keyword: keyword.to_uppercase(),
        args: args.trim().to_string(),
    });
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    for q in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(q).and_then(|s| s.strip_suffix(q)) {
            return inner;
        }
    }
    s
}

/// Best-effort `ARG`/`ENV` substitution. Later declarations win.
#[derive(Debug, Clone, Default)]
pub struct Interpolation {
    vars: HashMap<String, String>,
    keys_by_len: Vec<String>,
}

impl Interpolation {
    pub fn new(instructions: &[Instruction]) -> Self {
        let mut vars = HashMap::new();
        for inst in instructions {
            match inst.keyword.as_str() {
                "ARG" => {
                    if let Some((k, v)) = inst.args.split_once('=') {
                        vars.insert(k.trim().to_string(), unquote(v).to_string());
                    }
                }
                "ENV" => {
                    let first = inst.args.split_whitespace().next().unwrap_or_default();
                    if first.contains('=') {
                        for pair in inst.args.split_whitespace() {
                            if let Some((k, v)) = pair.split_once('=') {
                                vars.insert(k.to_string(), unquote(v).to_string());
                            }
                        }
                    } else if let Some((k, v)) = inst.args.split_once(char::is_whitespace) {
                        vars.insert(k.to_string(), unquote(v).to_string());
                    }
                }
                _ => {}
            }
        }

        let mut keys_by_len: Vec<String> = vars.keys().cloned().collect();
        keys_by_len.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self { vars, keys_by_len }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Substitute `${X}` and `$X`, longest names first, until nothing changes
    pub fn interpolate(&self, s: &str) -> String {
        let mut current = s.to_string();
        for _ in 0..MAX_INTERPOLATION_PASSES {
            let mut next = current.clone();
            for key in &self.keys_by_len {
                let value = &self.vars[key];
                next = next.replace(&format!("${{{}}}", key), value);
                next = next.replace(&format!("${}", key), value);
            }
            if next == current {
                break;
            }
            current = next;
        }
        current
    }
}
