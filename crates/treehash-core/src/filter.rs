//! Base-name exclusion filter.

use globset::{Glob, GlobMatcher};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TreeHashError;

/// Pattern syntax for the exclusion filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterSyntax {
    /// Unanchored regular expression (`^skip$` anchors explicitly).
    #[default]
    Regex,
    /// Shell glob matched against the whole base name.
    Glob,
}

/// Decides whether a directory entry is excluded from processing.
///
/// Compiled once and shared read-only by every walker. Only the entry's
/// base name is tested, never the full path. A directory that matches is
/// pruned together with its whole subtree.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    matcher: Matcher,
}

#[derive(Debug, Clone, Default)]
enum Matcher {
    #[default]
    Disabled,
    Regex(Regex),
    Glob(GlobMatcher),
}

impl NameFilter {
    /// A filter that excludes nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Compile a pattern, reporting syntax errors.
    ///
    /// An absent or empty pattern yields a disabled filter.
    pub fn try_compile(pattern: Option<&str>, syntax: FilterSyntax) -> Result<Self, TreeHashError> {
        let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
            return Ok(Self::disabled());
        };

        let matcher = match syntax {
            FilterSyntax::Regex => Regex::new(pattern)
                .map(Matcher::Regex)
                .map_err(|e| TreeHashError::invalid_filter(pattern, e))?,
            FilterSyntax::Glob => Glob::new(pattern)
                .map(|g| Matcher::Glob(g.compile_matcher()))
                .map_err(|e| TreeHashError::invalid_filter(pattern, e))?,
        };

        Ok(Self { matcher })
    }

    /// Compile a pattern; a pattern that fails to compile excludes nothing.
    pub fn compile(pattern: Option<&str>, syntax: FilterSyntax) -> Self {
        Self::try_compile(pattern, syntax).unwrap_or_default()
    }

    /// Check whether an entry with this base name is excluded.
    pub fn matches(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::Disabled => false,
            Matcher::Regex(re) => re.is_match(name),
            Matcher::Glob(glob) => glob.is_match(name),
        }
    }

    /// Whether this filter can exclude anything at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self.matcher, Matcher::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_is_noop() {
        let filter = NameFilter::compile(Some(""), FilterSyntax::Regex);
        assert!(!filter.is_enabled());
        assert!(!filter.matches("anything"));

        let filter = NameFilter::compile(None, FilterSyntax::Glob);
        assert!(!filter.matches("anything"));
    }

    #[test]
    fn test_invalid_regex_is_noop() {
        assert!(NameFilter::try_compile(Some("(unclosed"), FilterSyntax::Regex).is_err());

        let filter = NameFilter::compile(Some("(unclosed"), FilterSyntax::Regex);
        assert!(!filter.is_enabled());
        assert!(!filter.matches("(unclosed"));
    }

    #[test]
    fn test_regex_is_unanchored() {
        let filter = NameFilter::compile(Some("tmp"), FilterSyntax::Regex);
        assert!(filter.matches("tmp"));
        assert!(filter.matches("my_tmp_dir"));
        assert!(!filter.matches("src"));
    }

    #[test]
    fn test_anchored_regex() {
        let filter = NameFilter::compile(Some("^skip$"), FilterSyntax::Regex);
        assert!(filter.matches("skip"));
        assert!(!filter.matches("skipped"));
        assert!(!filter.matches("a.txt"));
    }

    #[test]
    fn test_glob_matches_whole_name() {
        let filter = NameFilter::compile(Some("*.log"), FilterSyntax::Glob);
        assert!(filter.matches("build.log"));
        assert!(!filter.matches("build.log.gz"));
        assert!(!filter.matches("notes.txt"));
    }
}
