//! Result sinks
//!
//! The engine publishes every terminal outcome to a [`ResultSink`]; the
//! collecting sink keeps them in memory and builds the run summary.

use parking_lot::Mutex;
use std::time::Duration;
use tracing::{debug, info};

use crate::cancel::Interruption;
use crate::hooks::{HookError, HookInfo};
use crate::models::{HookExecution, RunSummary, TestInfo, TestResult, TestStatus};

/// Receiver of run events
pub trait ResultSink: Send + Sync {
    /// A test reached its terminal state
    fn report(&self, result: TestResult);

    /// A test was discovered (discover-only requests)
    fn report_discovered(&self, _test: &TestInfo) {}

    /// A class or assembly hook was found ahead of execution
    fn report_hook_discovered(&self, _hook: &HookInfo) {}

    /// A scope-level hook chain failed outside any single test
    fn report_hook_failure(&self, _failure: &str) {}

    /// A class or assembly hook finished running for `scope_id`
    fn report_hook_outcome(
        &self,
        _hook: &HookInfo,
        _scope_id: &str,
        _outcome: Result<(), &HookError>,
        _duration: Duration,
    ) {
    }
}

/// Build the record kept for one hook run
pub fn hook_execution(
    hook: &HookInfo,
    scope_id: &str,
    outcome: Result<(), &HookError>,
    duration: Duration,
) -> HookExecution {
    let (status, message) = match outcome {
        Ok(()) => (TestStatus::Passed, None),
        Err(e) => {
            let cancelled = matches!(
                e,
                HookError::Interrupted {
                    reason: Interruption::Cancelled,
                    ..
                }
            );
            let status = if cancelled {
                TestStatus::Cancelled
            } else {
                TestStatus::Failed
            };
            (status, Some(e.to_string()))
        }
    };
    HookExecution {
        name: hook.name.clone(),
        kind: hook.kind.to_string(),
        scope_id: scope_id.to_string(),
        status,
        duration_ms: duration.as_millis() as u64,
        message,
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    results: Mutex<Vec<TestResult>>,
    discovered: Mutex<Vec<TestInfo>>,
    hooks: Mutex<Vec<HookInfo>>,
    hook_failures: Mutex<Vec<String>>,
    hook_executions: Mutex<Vec<HookExecution>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<TestResult> {
        self.results.lock().clone()
    }

    pub fn discovered(&self) -> Vec<TestInfo> {
        self.discovered.lock().clone()
    }

    pub fn discovered_hooks(&self) -> Vec<HookInfo> {
        self.hooks.lock().clone()
    }

    pub fn hook_failures(&self) -> Vec<String> {
        self.hook_failures.lock().clone()
    }

    pub fn hook_executions(&self) -> Vec<HookExecution> {
        self.hook_executions.lock().clone()
    }

    /// Number of outcomes reported for `test_id`
    pub fn outcomes_for(&self, test_id: &str) -> usize {
        self.results
            .lock()
            .iter()
            .filter(|r| r.test_id == test_id)
            .count()
    }

    pub fn summary(&self, total_duration_ms: u64) -> RunSummary {
        RunSummary::new(self.results(), self.hook_failures(), total_duration_ms)
            .with_hook_executions(self.hook_executions())
    }
}

impl ResultSink for CollectingSink {
    fn report(&self, result: TestResult) {
        debug!("  {}", result);
        self.results.lock().push(result);
    }

    fn report_discovered(&self, test: &TestInfo) {
        self.discovered.lock().push(test.clone());
    }

    fn report_hook_discovered(&self, hook: &HookInfo) {
        self.hooks.lock().push(hook.clone());
    }

    fn report_hook_failure(&self, failure: &str) {
        info!("Hook failure: {}", failure);
        self.hook_failures.lock().push(failure.to_string());
    }

    fn report_hook_outcome(
        &self,
        hook: &HookInfo,
        scope_id: &str,
        outcome: Result<(), &HookError>,
        duration: Duration,
    ) {
        let execution = hook_execution(hook, scope_id, outcome, duration);
        debug!("  {}", execution);
        self.hook_executions.lock().push(execution);
    }
}
