//! Glob ignore rules compiled to anchored regular expressions.
//!
//! Supported syntax: `*` (within one path segment), `**` (across segments),
//! `?`, `[abc]` / `[!abc]` classes, `{a,b}` alternatives and `\` escapes.

use regex::Regex;

use crate::core::error::{StarterError, StarterResult};

#[derive(Debug, Clone)]
struct GlobMatcher {
    glob: String,
    regex: Regex,
}

/// Ordered list of compiled glob matchers.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    matchers: Vec<GlobMatcher>,
}

impl PathFilter {
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> StarterResult<Self> {
        let mut matchers = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let glob = pattern.as_ref().trim();
            if glob.is_empty() {
                continue;
            }
            let regex = Regex::new(&glob_to_regex(glob)).map_err(|source| {
                StarterError::InvalidPattern {
                    pattern: glob.to_string(),
                    source,
                }
            })?;
            matchers.push(GlobMatcher {
                glob: glob.to_string(),
                regex,
            });
        }
        Ok(Self { matchers })
    }

    /// File-name matchers for the rules scoped to `dir` (e.g. `mods`).
    ///
    /// `mods/*-client.jar` becomes a matcher for `*-client.jar` applied to
    /// bare file names.
    pub fn for_file_names_in<S: AsRef<str>>(patterns: &[S], dir: &str) -> StarterResult<Self> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let scoped = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| p.starts_with(&prefix))
            .filter_map(|p| p.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>();
        Self::compile(&scoped)
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matching_glob(path).is_some()
    }

    /// The first glob matching `path`, if any.
    pub fn matching_glob(&self, path: &str) -> Option<&str> {
        let normalized = path.replace('\\', "/");
        let normalized = normalized.trim_end_matches('/');
        self.matchers
            .iter()
            .find(|m| m.regex.is_match(normalized))
            .map(|m| m.glob.as_str())
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');

    let chars: Vec<char> = glob.chars().collect();
    let mut i = 0;
    let mut in_group = false;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    out.push_str(".*");
                    i += 1;
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '\\' => {
                if let Some(next) = chars.get(i + 1) {
                    out.push_str(&regex::escape(&next.to_string()));
                    i += 1;
                }
            }
            '[' => {
                let Some(close) = chars[i + 1..].iter().position(|&ch| ch == ']') else {
                    out.push_str(r"\[");
                    i += 1;
                    continue;
                };
                let body: String = chars[i + 1..i + 1 + close].iter().collect();
                out.push('[');
                if let Some(negated) = body.strip_prefix('!') {
                    out.push('^');
                    out.push_str(&escape_class(negated));
                } else {
                    out.push_str(&escape_class(&body));
                }
                out.push(']');
                i += close + 1;
            }
            '{' if !in_group => {
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
        i += 1;
    }

    if in_group {
        out.push(')');
    }
    out.push('$');
    out
}

fn escape_class(body: &str) -> String {
    body.chars()
        .map(|c| match c {
            '\\' | '[' | ']' | '^' | '&' | '~' => format!("\\{}", c),
            other => other.to_string(),
        })
        .collect()
}
