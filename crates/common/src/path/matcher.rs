//! # Path predicates
//!
//! API keys may carry `include` and `exclude` glob lists. They are compiled
//! once, when the credential is built, into a [`PathPredicate`]:
//!
//! ```text
//! allowed(path) = (includes empty OR any include matches)
//!             AND (excludes empty OR no exclude matches)
//! ```
//!
//! Paths are relative, forward-slash delimited and carry no leading slash.
//! Matching is case-sensitive; `*` stays within one segment and `**` spans
//! any number of segments.

use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};

/// Compiles glob patterns into matchers.
pub struct PathMatcher;

impl PathMatcher {
    /// Compile each pattern, dropping (and logging) the ones that fail to parse.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Vec<GlobMatcher> {
        patterns
            .iter()
            .filter_map(|pattern| {
                let pattern = pattern.as_ref();
                match GlobBuilder::new(pattern).literal_separator(true).build() {
                    Ok(glob) => Some(glob.compile_matcher()),
                    Err(e) => {
                        tracing::warn!(pattern, error = %e, "ignoring invalid path glob");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Compiled allow/deny rule over registry paths.
#[derive(Clone, Default)]
pub struct PathPredicate {
    rules: Option<Arc<Rules>>,
}

struct Rules {
    includes: Vec<GlobMatcher>,
    excludes: Vec<GlobMatcher>,
}

impl PathPredicate {
    /// The constant-true predicate.
    pub fn allow_all() -> Self {
        Self { rules: None }
    }

    /// Build a predicate from include and exclude patterns.
    pub fn build<S: AsRef<str>>(includes: &[S], excludes: &[S]) -> Self {
        let includes = PathMatcher::compile(includes);
        let excludes = PathMatcher::compile(excludes);

        if includes.is_empty() && excludes.is_empty() {
            return Self::allow_all();
        }

        Self {
            rules: Some(Arc::new(Rules { includes, excludes })),
        }
    }

    pub fn is_allow_all(&self) -> bool {
        self.rules.is_none()
    }

    /// Whether `path` is allowed.
    pub fn matches(&self, path: &str) -> bool {
        let Some(rules) = &self.rules else {
            return true;
        };

        let included =
            rules.includes.is_empty() || rules.includes.iter().any(|m| m.is_match(path));
        let excluded = rules.excludes.iter().any(|m| m.is_match(path));

        included && !excluded
    }

    /// Whether a synthesized directory (`a/b/`) is visible.
    ///
    /// Directories are visible when either spelling matches, so both
    /// `a/b/**` and `a/b` rules expose the folder itself.
    pub fn matches_dir(&self, dir: &str) -> bool {
        self.matches(dir) || self.matches(dir.trim_end_matches('/'))
    }
}

impl std::fmt::Debug for PathPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.rules {
            None => write!(f, "PathPredicate(allow all)"),
            Some(rules) => write!(
                f,
                "PathPredicate(includes: {:?}, excludes: {:?})",
                rules.includes.iter().map(|m| m.glob().glob()).collect::<Vec<_>>(),
                rules.excludes.iter().map(|m| m.glob().glob()).collect::<Vec<_>>()
            ),
        }
    }
}
