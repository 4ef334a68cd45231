//! Path exclusion rules for source archives.
//!
//! A pattern excludes a relative path (always `/`-separated) when any of the
//! following holds, checked in order:
//!
//! 1. The pattern ends in `/` and the path is that directory or lies beneath it.
//! 2. The path equals the pattern verbatim.
//! 3. The pattern, as a glob, matches any single segment of the path. The last
//!    segment is the basename, so `*.log` excludes `a.log` and `dir/sub/a.log`.
//!
//! A bare name such as `Tests` therefore excludes `Tests/...` and
//! `src/Tests/...` but not `Sources/Tests.swift`.
//!
//! A malformed glob never matches; it is not an error.

use glob::{MatchOptions, Pattern};

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Returns true if `path` matches any of `patterns`.
///
/// Pure and total. Prefer [`ExcludeSet`] when checking many paths against
/// the same list; both give identical answers.
pub fn should_exclude(path: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| Rule::compile(p).matches(path))
}

/// A pre-compiled exclusion list.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    rules: Vec<Rule>,
}

impl ExcludeSet {
    /// Compile a pattern list. Order is kept; the first matching rule wins.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        Self {
            rules: patterns.iter().map(|p| Rule::compile(p.as_ref())).collect(),
        }
    }

    /// Returns true if `path` (relative, `/`-separated) is excluded.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.rules.iter().any(|r| r.matches(path))
    }

    /// The pattern that excludes `path`, if any.
    pub fn matching_pattern(&self, path: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|r| r.matches(path))
            .map(|r| r.raw.as_str())
    }

    /// Number of patterns in the set.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no patterns were given.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Rule {
    raw: String,
    dir: Option<String>,
    glob: Option<Pattern>,
}

impl Rule {
    fn compile(raw: &str) -> Self {
        let dir = raw.strip_suffix('/').map(str::to_string);
        // Directory patterns only ever match by prefix.
        let glob = if dir.is_some() {
            None
        } else {
            Pattern::new(raw).ok()
        };
        Self {
            raw: raw.to_string(),
            dir,
            glob,
        }
    }

    fn matches(&self, path: &str) -> bool {
        if let Some(dir) = &self.dir {
            if path == dir
                || path
                    .strip_prefix(dir.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
            {
                return true;
            }
        }

        if path == self.raw {
            return true;
        }

        match &self.glob {
            Some(glob) => path
                .split('/')
                .any(|segment| glob.matches_with(segment, GLOB_OPTIONS)),
            None => false,
        }
    }
}
