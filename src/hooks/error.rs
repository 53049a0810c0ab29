//! Hook failure taxonomy
//!
//! Every failure carries the [`HookKind`] it happened in, so callers can tell
//! a broken class setup from a broken session teardown without looking at
//! hook names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::cancel::Interruption;

/// Lifetime boundary a hook attaches to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookScope {
    Test,
    Class,
    Assembly,
    Session,
    Discovery,
}

impl HookScope {
    pub fn name(&self) -> &'static str {
        match self {
            HookScope::Test => "Test",
            HookScope::Class => "Class",
            HookScope::Assembly => "Assembly",
            HookScope::Session => "TestSession",
            HookScope::Discovery => "TestDiscovery",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookPhase {
    Before,
    After,
}

/// One of the ten scope+phase combinations
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HookKind {
    pub phase: HookPhase,
    pub scope: HookScope,
}

impl HookKind {
    pub const BEFORE_TEST: HookKind = HookKind::new(HookPhase::Before, HookScope::Test);
    pub const AFTER_TEST: HookKind = HookKind::new(HookPhase::After, HookScope::Test);
    pub const BEFORE_CLASS: HookKind = HookKind::new(HookPhase::Before, HookScope::Class);
    pub const AFTER_CLASS: HookKind = HookKind::new(HookPhase::After, HookScope::Class);
    pub const BEFORE_ASSEMBLY: HookKind = HookKind::new(HookPhase::Before, HookScope::Assembly);
    pub const AFTER_ASSEMBLY: HookKind = HookKind::new(HookPhase::After, HookScope::Assembly);
    pub const BEFORE_SESSION: HookKind = HookKind::new(HookPhase::Before, HookScope::Session);
    pub const AFTER_SESSION: HookKind = HookKind::new(HookPhase::After, HookScope::Session);
    pub const BEFORE_DISCOVERY: HookKind = HookKind::new(HookPhase::Before, HookScope::Discovery);
    pub const AFTER_DISCOVERY: HookKind = HookKind::new(HookPhase::After, HookScope::Discovery);

    pub const fn new(phase: HookPhase, scope: HookScope) -> Self {
        Self { phase, scope }
    }

    pub fn is_before(&self) -> bool {
        self.phase == HookPhase::Before
    }

    pub fn phase_label(&self) -> &'static str {
        match self.phase {
            HookPhase::Before => "Before",
            HookPhase::After => "After",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.phase_label(), self.scope.name())
    }
}

/// A hook failure, or the aggregate of every after-hook failure in a scope
#[derive(Error, Debug, Clone)]
pub enum HookError {
    #[error("Error executing {kind} hook '{name}': {cause:#}")]
    Failed {
        kind: HookKind,
        name: String,
        cause: Arc<anyhow::Error>,
    },

    #[error("{kind} hook '{name}' {reason}")]
    Interrupted {
        kind: HookKind,
        name: String,
        reason: Interruption,
    },

    #[error("{} {} hook(s) failed: {}", .failures.len(), .kind, join_failures(.failures))]
    Aggregate {
        kind: HookKind,
        failures: Vec<HookError>,
    },
}

fn join_failures(failures: &[HookError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl HookError {
    pub fn failed(kind: HookKind, name: impl Into<String>, cause: anyhow::Error) -> Self {
        HookError::Failed {
            kind,
            name: name.into(),
            cause: Arc::new(cause),
        }
    }

    /// `Ok` when nothing failed, otherwise one error listing every failure
    pub fn aggregate(kind: HookKind, failures: Vec<HookError>) -> Result<(), HookError> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(HookError::Aggregate { kind, failures })
        }
    }

    pub fn kind(&self) -> HookKind {
        match self {
            HookError::Failed { kind, .. }
            | HookError::Interrupted { kind, .. }
            | HookError::Aggregate { kind, .. } => *kind,
        }
    }

    /// Name of the failing hook; `None` for aggregates
    pub fn hook_name(&self) -> Option<&str> {
        match self {
            HookError::Failed { name, .. } | HookError::Interrupted { name, .. } => Some(name),
            HookError::Aggregate { .. } => None,
        }
    }

    /// Individual failures, flattening aggregates
    pub fn failures(&self) -> Vec<&HookError> {
        match self {
            HookError::Aggregate { failures, .. } => {
                failures.iter().flat_map(HookError::failures).collect()
            }
            other => vec![other],
        }
    }
}
