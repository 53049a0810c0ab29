//! Discovered test units
//!
//! A [`TestUnit`] is immutable after discovery apart from its lifecycle
//! state, which only ever moves forward: pending, running, then terminal.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::context::TestContext;
use super::test_result::TestStatus;

/// Body of a test: receives its context and a cancellation token to observe
pub type TestBody = Arc<
    dyn Fn(Arc<TestContext>, CancellationToken) -> BoxFuture<'static, anyhow::Result<()>>
        + Send
        + Sync,
>;

const DEFAULT_ASSEMBLY: &str = "default";

/// Ordered set of mutual-exclusion keys
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintKeySet(BTreeSet<String>);

impl ConstraintKeySet {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// True when the two sets share at least one key
    pub fn overlaps(&self, other: &ConstraintKeySet) -> bool {
        !self.0.is_disjoint(&other.0)
    }
}

impl<S: Into<String>> FromIterator<S> for ConstraintKeySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl fmt::Display for ConstraintKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}")?;
        }
        write!(f, "}}")
    }
}

/// How a test may overlap with others
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConcurrencyMode {
    /// Free to run alongside anything except global exclusives
    #[default]
    Parallel,
    /// Must not overlap with any other test
    NotInParallel,
    /// Must not overlap with tests holding any of these keys
    Keyed(ConstraintKeySet),
}

impl ConcurrencyMode {
    /// `NotInParallel` with keys; an empty key list means globally exclusive
    pub fn not_in_parallel<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys = ConstraintKeySet::new(keys);
        if keys.is_empty() {
            ConcurrencyMode::NotInParallel
        } else {
            ConcurrencyMode::Keyed(keys)
        }
    }

    pub fn keys(&self) -> Option<&ConstraintKeySet> {
        match self {
            ConcurrencyMode::Keyed(keys) => Some(keys),
            _ => None,
        }
    }
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyMode::Parallel => write!(f, "parallel"),
            ConcurrencyMode::NotInParallel => write!(f, "not-in-parallel"),
            ConcurrencyMode::Keyed(keys) => write!(f, "not-in-parallel {keys}"),
        }
    }
}

/// Lifecycle state of a test unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestState {
    Pending,
    Running,
    Finished(TestStatus),
}

/// Serializable description of a discovered test, used for listings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestInfo {
    pub id: String,
    pub display_name: String,
    pub class_scope: String,
    pub assembly_scope: String,
    pub order: i32,
    pub mode: String,
}

/// A single discovered test
pub struct TestUnit {
    id: String,
    display_name: String,
    order: i32,
    mode: ConcurrencyMode,
    class_scope: String,
    assembly_scope: String,
    timeout: Option<Duration>,
    body: TestBody,
    state: Mutex<TestState>,
}

impl TestUnit {
    /// Create a test; the class scope defaults to the id up to its last `::`
    pub fn new<F, Fut>(id: impl Into<String>, body: F) -> Self
    where
        F: Fn(Arc<TestContext>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let id = id.into();
        let class_scope = id
            .rsplit_once("::")
            .map(|(class, _)| class.to_string())
            .unwrap_or_else(|| id.clone());

        Self {
            display_name: id.clone(),
            id,
            order: 0,
            mode: ConcurrencyMode::Parallel,
            class_scope,
            assembly_scope: DEFAULT_ASSEMBLY.to_string(),
            timeout: None,
            body: Arc::new(move |context, token| body(context, token).boxed()),
            state: Mutex::new(TestState::Pending),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn in_class(mut self, class: impl Into<String>) -> Self {
        self.class_scope = class.into();
        self
    }

    pub fn in_assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly_scope = assembly.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn mode(&self) -> &ConcurrencyMode {
        &self.mode
    }

    pub fn class_scope(&self) -> &str {
        &self.class_scope
    }

    pub fn assembly_scope(&self) -> &str {
        &self.assembly_scope
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn state(&self) -> TestState {
        *self.state.lock()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state(), TestState::Finished(_))
    }

    pub fn info(&self) -> TestInfo {
        TestInfo {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            class_scope: self.class_scope.clone(),
            assembly_scope: self.assembly_scope.clone(),
            order: self.order,
            mode: self.mode.to_string(),
        }
    }

    /// Move from pending to running. Returns false if the test was already
    /// scheduled, which keeps every unit to a single execution.
    pub(crate) fn try_start(&self) -> bool {
        let mut state = self.state.lock();
        if *state == TestState::Pending {
            *state = TestState::Running;
            true
        } else {
            false
        }
    }

    /// Record the terminal status. Returns false if one was already recorded.
    pub(crate) fn finish(&self, status: TestStatus) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, TestState::Finished(_)) {
            return false;
        }
        *state = TestState::Finished(status);
        true
    }

    pub(crate) fn run_body(
        &self,
        context: Arc<TestContext>,
        token: CancellationToken,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        (self.body)(context, token)
    }
}

impl fmt::Debug for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestUnit")
            .field("id", &self.id)
            .field("order", &self.order)
            .field("mode", &self.mode)
            .field("class_scope", &self.class_scope)
            .field("assembly_scope", &self.assembly_scope)
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Display for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.display_name, self.mode)
    }
}
