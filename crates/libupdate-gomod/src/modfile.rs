//! Line-preserving `go.mod` reader and editor
//!
//! Only `module`, `require` and `replace` directives are interpreted.
//! Edits rewrite the affected line in place, so formatting, comments and
//! unrelated directives survive untouched.

use libupdate_core::UpdateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModFileError {
    #[error("go.mod:{line}: {message}")]
    Syntax { line: usize, message: String },
}

impl From<ModFileError> for UpdateError {
    fn from(value: ModFileError) -> Self {
        UpdateError::ToolFailure(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Require {
    pub path: String,
    pub version: String,
    pub indirect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replace {
    pub old_path: String,
    pub old_version: Option<String>,
    pub new_path: String,
    pub new_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    None,
    Require,
    Replace,
    Other,
}

/// Where a directive lives in the file
#[derive(Debug, Clone)]
struct Located<T> {
    line: usize,
    /// `require x v` rather than an entry inside `require ( ... )`
    single: bool,
    comment: Option<String>,
    entry: T,
}

#[derive(Debug, Default)]
struct Parsed {
    module: Option<String>,
    requires: Vec<Located<Require>>,
    replaces: Vec<Located<Replace>>,
}

#[derive(Debug, Clone)]
pub struct ModFile {
    lines: Vec<String>,
}

impl ModFile {
    pub fn parse(text: &str) -> Result<Self, ModFileError> {
        let file = Self {
            lines: text.split('\n').map(str::to_string).collect(),
        };
        file.parsed()?;
        Ok(file)
    }

    /// Declared module path
    pub fn module(&self) -> Option<String> {
        self.parsed().ok().and_then(|p| p.module)
    }

    pub fn requires(&self) -> Vec<Require> {
        self.parsed()
            .map(|p| p.requires.into_iter().map(|r| r.entry).collect())
            .unwrap_or_default()
    }

    pub fn replaces(&self) -> Vec<Replace> {
        self.parsed()
            .map(|p| p.replaces.into_iter().map(|r| r.entry).collect())
            .unwrap_or_default()
    }

    /// Set the version of an existing requirement. Returns false if `path` is not required.
    pub fn set_require(&mut self, path: &str, version: &str) -> Result<bool, ModFileError> {
        self.rename_require(path, path, version)
    }

    /// Replace the requirement on `old_path` with `new_path` at `version`,
    /// keeping its position and `// indirect` marker.
    pub fn rename_require(
        &mut self,
        old_path: &str,
        new_path: &str,
        version: &str,
    ) -> Result<bool, ModFileError> {
        let parsed = self.parsed()?;
        let Some(req) = parsed.requires.iter().find(|r| r.entry.path == old_path) else {
            return Ok(false);
        };
        let body = format!("{} {}", quote(new_path), version);
        let line = self.render(req.line, req.single.then_some("require"), &body, req.comment.as_deref());
        self.lines[req.line] = line;
        Ok(true)
    }

    /// Set the version a replacement points at. Returns false if no versioned
    /// replacement targets `new_path`.
    pub fn set_replace_version(&mut self, new_path: &str, version: &str) -> Result<bool, ModFileError> {
        let parsed = self.parsed()?;
        let Some(rep) = parsed
            .replaces
            .iter()
            .find(|r| r.entry.new_path == new_path && r.entry.new_version.is_some())
        else {
            return Ok(false);
        };
        let old = match &rep.entry.old_version {
            Some(v) => format!("{} {}", quote(&rep.entry.old_path), v),
            None => quote(&rep.entry.old_path),
        };
        let body = format!("{} => {} {}", old, quote(new_path), version);
        let line = self.render(rep.line, rep.single.then_some("replace"), &body, rep.comment.as_deref());
        self.lines[rep.line] = line;
        Ok(true)
    }

    fn render(&self, line: usize, verb: Option<&str>, body: &str, comment: Option<&str>) -> String {
        let current = &self.lines[line];
        let indent: String = current.chars().take_while(|c| c.is_whitespace()).collect();
        let mut out = indent;
        if let Some(verb) = verb {
            out.push_str(verb);
            out.push(' ');
        }
        out.push_str(body);
        if let Some(comment) = comment {
            out.push_str(" // ");
            out.push_str(comment);
        }
        out
    }

    fn parsed(&self) -> Result<Parsed, ModFileError> {
        let mut parsed = Parsed::default();
        let mut block = Block::None;

        for (idx, raw) in self.lines.iter().enumerate() {
            let (content, comment) = split_comment(raw);
            let content = content.trim();
            if content.is_empty() {
                continue;
            }
            let syntax = |message: &str| ModFileError::Syntax {
                line: idx + 1,
                message: message.to_string(),
            };

            if block != Block::None {
                if content == ")" {
                    block = Block::None;
                    continue;
                }
                match block {
                    Block::Require => parsed.requires.push(Located {
                        line: idx,
                        single: false,
                        comment: comment.clone(),
                        entry: parse_require(content, comment.as_deref()).ok_or_else(|| syntax("malformed require"))?,
                    }),
                    Block::Replace => parsed.replaces.push(Located {
                        line: idx,
                        single: false,
                        comment: comment.clone(),
                        entry: parse_replace(content).ok_or_else(|| syntax("malformed replace"))?,
                    }),
                    _ => {}
                }
                continue;
            }

            let (verb, rest) = content.split_once(char::is_whitespace).unwrap_or((content, ""));
            let rest = rest.trim();
            let opens = rest == "(";
            match verb {
                "module" => parsed.module = Some(unquote(rest).to_string()),
                "require" if opens => block = Block::Require,
                "replace" if opens => block = Block::Replace,
                "require" => parsed.requires.push(Located {
                    line: idx,
                    single: true,
                    comment: comment.clone(),
                    entry: parse_require(rest, comment.as_deref()).ok_or_else(|| syntax("malformed require"))?,
                }),
                "replace" => parsed.replaces.push(Located {
                    line: idx,
                    single: true,
                    comment: comment.clone(),
                    entry: parse_replace(rest).ok_or_else(|| syntax("malformed replace"))?,
                }),
                _ if opens => block = Block::Other,
                _ => {}
            }
        }

        if block != Block::None {
            return Err(ModFileError::Syntax {
                line: self.lines.len(),
                message: "unterminated block".to_string(),
            });
        }
        Ok(parsed)
    }
}

impl std::fmt::Display for ModFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

fn split_comment(line: &str) -> (&str, Option<String>) {
    match line.find("//") {
        Some(i) => (&line[..i], Some(line[i + 2..].trim().to_string())),
        None => (line, None),
    }
}

fn unquote(s: &str) -> &str {
    s.trim_matches('"')
}

fn quote(path: &str) -> String {
    if path.contains(char::is_whitespace) {
        format!("\"{}\"", path)
    } else {
        path.to_string()
    }
}

fn is_indirect(comment: Option<&str>) -> bool {
    comment
        .map(|c| c == "indirect" || c.starts_with("indirect;"))
        .unwrap_or(false)
}

fn parse_require(s: &str, comment: Option<&str>) -> Option<Require> {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    match tokens.as_slice() {
        [path, version] => Some(Require {
            path: unquote(path).to_string(),
            version: unquote(version).to_string(),
            indirect: is_indirect(comment),
        }),
        _ => None,
    }
}

fn parse_replace(s: &str) -> Option<Replace> {
    let (old, new) = s.split_once("=>")?;
    let old: Vec<&str> = old.split_whitespace().collect();
    let new: Vec<&str> = new.split_whitespace().collect();
    let (old_path, old_version) = match old.as_slice() {
        [p] => (unquote(p).to_string(), None),
        [p, v] => (unquote(p).to_string(), Some(unquote(v).to_string())),
        _ => return None,
    };
    let (new_path, new_version) = match new.as_slice() {
        [p] => (unquote(p).to_string(), None),
        [p, v] => (unquote(p).to_string(), Some(unquote(v).to_string())),
        _ => return None,
    };
    Some(Replace {
        old_path,
        old_version,
        new_path,
        new_version,
    })
}
