//! Glob-based exclusion of root-relative paths.
//!
//! Patterns use shell-style glob syntax. As with classic `fnmatch`, `*`
//! also matches across `/`, so `*.log` excludes log files at any depth.
//! Supported syntax:
//! - `*`, `?` and character classes like `[abc]`
//! - Recursive matching with `**`
//! - Alternation like `*.{png,jpg}`
//!
//! A path is also excluded when one of its ancestor directories, written
//! with a trailing `/`, matches a pattern. That is what lets
//! `node_modules/**` prune the whole subtree.

use crate::IndexerError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{info, warn};

/// An immutable, ordered set of exclusion patterns.
#[derive(Debug, Clone)]
pub struct ExclusionMatcher {
    patterns: Vec<String>,
    set: GlobSet,
}

impl Default for ExclusionMatcher {
    fn default() -> Self {
        Self::empty()
    }
}

impl ExclusionMatcher {
    /// A matcher that excludes nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    /// Compile a matcher from patterns.
    ///
    /// A pattern that does not compile is logged and dropped; the remaining
    /// patterns still apply.
    ///
    /// # Errors
    /// Returns error if the compiled set cannot be built.
    pub fn new<I, S>(patterns: I) -> Result<Self, IndexerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();

        for pattern in patterns {
            let pattern: String = pattern.into();
            match Glob::new(&pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    kept.push(pattern);
                }
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "invalid_exclude_pattern");
                }
            }
        }

        let set = builder.build().map_err(|e| IndexerError::InvalidPattern {
            pattern: kept.join(", "),
            reason: e.to_string(),
        })?;

        Ok(Self {
            patterns: kept,
            set,
        })
    }

    /// Parse pattern-file content: one glob per line, blank lines and
    /// `#` comments ignored.
    pub fn parse(content: &str) -> Result<Self, IndexerError> {
        Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    /// Load patterns from a file. A missing file yields an empty matcher.
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, IndexerError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "excludes_file_not_found");
                return Ok(Self::empty());
            }
            Err(source) => {
                return Err(IndexerError::ExcludesFile {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let matcher = Self::parse(&content)?;
        info!(count = matcher.len(), "loaded_excludes");
        Ok(matcher)
    }

    /// Check whether a root-relative path must be skipped.
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        if self.set.is_empty() {
            return false;
        }
        if self.set.is_match(relative_path) {
            return true;
        }

        // Ancestor prefixes, each ending at a separator.
        relative_path
            .match_indices('/')
            .any(|(i, _)| self.set.is_match(&relative_path[..=i]))
    }

    /// Number of active patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// The active patterns, in file order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
