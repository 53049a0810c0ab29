//! Test selection
//!
//! A filter is a comma-separated list of exact test ids and glob patterns.
//! Tests it does not select are never scheduled and get no outcome.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt;

use crate::models::TestUnit;

/// Which discovered tests a run executes
#[derive(Clone, Debug, Default)]
pub enum TestFilter {
    #[default]
    All,
    Matching {
        ids: BTreeSet<String>,
        patterns: Vec<glob::Pattern>,
    },
}

impl TestFilter {
    /// Parse `"a::one, a::*"`; an empty expression selects everything
    pub fn parse(expression: &str) -> Result<Self> {
        let mut ids = BTreeSet::new();
        let mut patterns = Vec::new();

        for entry in expression.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            if entry.contains(['*', '?', '[']) {
                let pattern = glob::Pattern::new(entry)
                    .with_context(|| format!("Invalid test filter pattern '{entry}'"))?;
                patterns.push(pattern);
            } else {
                ids.insert(entry.to_string());
            }
        }

        if ids.is_empty() && patterns.is_empty() {
            Ok(TestFilter::All)
        } else {
            Ok(TestFilter::Matching { ids, patterns })
        }
    }

    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TestFilter::Matching {
            ids: ids.into_iter().map(Into::into).collect(),
            patterns: Vec::new(),
        }
    }

    pub fn matches_id(&self, id: &str) -> bool {
        match self {
            TestFilter::All => true,
            TestFilter::Matching { ids, patterns } => {
                ids.contains(id) || patterns.iter().any(|p| p.matches(id))
            }
        }
    }

    pub fn matches(&self, test: &TestUnit) -> bool {
        self.matches_id(test.id())
    }
}

impl fmt::Display for TestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestFilter::All => write!(f, "*"),
            TestFilter::Matching { ids, patterns } => {
                let entries: Vec<&str> = ids
                    .iter()
                    .map(String::as_str)
                    .chain(patterns.iter().map(glob::Pattern::as_str))
                    .collect();
                write!(f, "{}", entries.join(","))
            }
        }
    }
}
