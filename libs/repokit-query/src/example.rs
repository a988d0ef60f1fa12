//! Probe-based queries.
//!
//! An [`Example`] is a set of `(path, value)` pairs taken from a partially
//! filled record. Every present, non-ignored pair becomes an equality
//! predicate; the predicates are ANDed. Paths may address one related
//! entity, e.g. `team.name`.

use std::collections::BTreeSet;

use crate::ast::{CompareOperator, Expr, Value};

/// Controls which probe values take part in matching.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExampleMatcher {
    ignored: BTreeSet<String>,
    include_nulls: bool,
}

impl ExampleMatcher {
    /// Match on every non-null probe value.
    #[must_use]
    pub fn matching() -> Self {
        Self::default()
    }

    /// Skip the given paths even when the probe carries a value for them.
    #[must_use]
    pub fn with_ignore_paths<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.ignored
            .extend(paths.into_iter().map(|p| p.into().to_ascii_lowercase()));
        self
    }

    /// Turn null probe values into `is null` predicates instead of skipping them.
    #[must_use]
    pub fn with_include_nulls(mut self) -> Self {
        self.include_nulls = true;
        self
    }

    #[must_use]
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignored.contains(&path.to_ascii_lowercase())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Example {
    probe: Vec<(String, Value)>,
    matcher: ExampleMatcher,
}

impl Example {
    pub fn of<I, K>(probe: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            probe: probe.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            matcher: ExampleMatcher::matching(),
        }
    }

    #[must_use]
    pub fn with_matcher(mut self, matcher: ExampleMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    #[must_use]
    pub fn matcher(&self) -> &ExampleMatcher {
        &self.matcher
    }

    /// The conjunction of equality predicates, or `None` to match everything.
    #[must_use]
    pub fn to_expr(&self) -> Option<Expr> {
        let predicates = self
            .probe
            .iter()
            .filter(|(path, _)| !self.matcher.is_ignored(path))
            .filter(|(_, value)| self.matcher.include_nulls || !matches!(value, Value::Null))
            .map(|(path, value)| Expr::compare(path.as_str(), CompareOperator::Eq, value.clone()));
        Expr::all(predicates)
    }
}
