//! Single test execution
//!
//! Drives one test through its lifecycle: scope before hooks, before-test
//! hooks, the body under its timeout, after-test hooks, outcome reporting and
//! scope teardown when it was the last test of its class or assembly.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::scope::ScopeTracker;
use crate::cancel::{run_with_timeout, Interruption};
use crate::hooks::{HookError, HookOrchestrator};
use crate::models::{TestContext, TestResult, TestStatus, TestUnit};
use crate::results::ResultSink;
use crate::utils::{catch_panic, Timer};

enum Outcome {
    Passed,
    Failed(String),
    Cancelled(String),
}

impl From<HookError> for Outcome {
    fn from(e: HookError) -> Self {
        match e {
            HookError::Interrupted {
                reason: Interruption::Cancelled,
                ..
            } => Outcome::Cancelled(e.to_string()),
            other => Outcome::Failed(other.to_string()),
        }
    }
}

/// Runs individual tests with their hooks
pub struct SingleTestExecutor {
    hooks: Arc<HookOrchestrator>,
    default_timeout: Option<Duration>,
    fail_fast: bool,
}

impl SingleTestExecutor {
    pub fn new(hooks: Arc<HookOrchestrator>) -> Self {
        Self {
            hooks,
            default_timeout: None,
            fail_fast: false,
        }
    }

    /// Timeout for tests that do not declare their own
    pub fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn hooks(&self) -> &Arc<HookOrchestrator> {
        &self.hooks
    }

    /// Run `test` and report its outcome. Returns `None` if the test had
    /// already been scheduled.
    pub async fn execute(
        &self,
        test: &Arc<TestUnit>,
        scopes: &ScopeTracker,
        sink: &dyn ResultSink,
    ) -> Option<TestStatus> {
        if !test.try_start() {
            warn!("Test {} was scheduled twice; ignoring", test.id());
            return None;
        }

        if self.hooks.cancellation().is_cancelled() {
            let result = TestResult::cancelled(test.id(), "run cancelled before the test started")
                .with_display_name(test.display_name());
            return Some(self.conclude(test, result, scopes, sink).await);
        }

        debug!("Running {}", test);
        let timer = Timer::start(test.id());
        let context = Arc::new(TestContext::from(&**test));
        let mut after_failures = Vec::new();

        let outcome = match self.enter_scopes(test, scopes).await {
            Err(e) => Outcome::from(e),
            Ok(()) => {
                let outcome = match self.hooks.run_before_test(&context).await {
                    Err(e) => Outcome::from(e),
                    Ok(()) => self.run_body(test, &context).await,
                };
                // Runs even when a before-test hook failed.
                self.hooks.run_after_test(&context, &mut after_failures).await;
                outcome
            }
        };

        let duration_ms = timer.stop().as_millis() as u64;
        let result = match outcome {
            Outcome::Passed => TestResult::pass(test.id(), duration_ms),
            Outcome::Failed(message) => TestResult::fail(test.id(), duration_ms, message),
            Outcome::Cancelled(reason) => TestResult {
                duration_ms,
                ..TestResult::cancelled(test.id(), reason)
            },
        }
        .with_display_name(test.display_name())
        .with_hook_failures(after_failures.iter().map(HookError::to_string).collect());

        Some(self.conclude(test, result, scopes, sink).await)
    }

    /// Report `test` as failed without running it
    pub async fn fail_unrun(
        &self,
        test: &Arc<TestUnit>,
        message: &str,
        scopes: &ScopeTracker,
        sink: &dyn ResultSink,
    ) -> TestStatus {
        test.try_start();
        let result = TestResult::fail(test.id(), 0, message).with_display_name(test.display_name());
        self.conclude(test, result, scopes, sink).await
    }

    /// Report `test` as cancelled without running it
    pub async fn cancel_unrun(
        &self,
        test: &Arc<TestUnit>,
        reason: &str,
        scopes: &ScopeTracker,
        sink: &dyn ResultSink,
    ) -> TestStatus {
        test.try_start();
        let result =
            TestResult::cancelled(test.id(), reason).with_display_name(test.display_name());
        self.conclude(test, result, scopes, sink).await
    }

    async fn enter_scopes(&self, test: &TestUnit, scopes: &ScopeTracker) -> Result<(), HookError> {
        if let Some(assembly) = scopes.assembly_context(test.assembly_scope()) {
            self.hooks.run_before_assembly(&assembly).await?;
        }
        if let Some(class) = scopes.class_context(test.class_scope()) {
            self.hooks.run_before_class(&class).await?;
        }
        Ok(())
    }

    async fn run_body(&self, test: &TestUnit, context: &Arc<TestContext>) -> Outcome {
        let timeout = test.timeout().or(self.default_timeout);
        let cancellation = self.hooks.cancellation().token();

        let outcome = run_with_timeout(cancellation, timeout, |token| {
            catch_panic(test.run_body(context.clone(), token))
        })
        .await;

        match outcome {
            Ok(Ok(())) => Outcome::Passed,
            Ok(Err(e)) => Outcome::Failed(format!("{e:#}")),
            Err(Interruption::TimedOut(limit)) => {
                Outcome::Failed(format!("Test timed out after {}ms", limit.as_millis()))
            }
            Err(Interruption::Cancelled) => {
                Outcome::Cancelled("run cancelled while the test was running".to_string())
            }
        }
    }

    /// Record the terminal state, report it, and tear down finished scopes
    async fn conclude(
        &self,
        test: &Arc<TestUnit>,
        result: TestResult,
        scopes: &ScopeTracker,
        sink: &dyn ResultSink,
    ) -> TestStatus {
        let status = result.status;
        if !test.finish(status) {
            warn!("Test {} already has an outcome; dropping {}", test.id(), status);
            return status;
        }

        if status == TestStatus::Failed {
            error!(
                "Test {} failed: {}",
                test.id(),
                result.message.as_deref().unwrap_or("unknown error")
            );
            if self.fail_fast && !self.hooks.cancellation().is_cancelled() {
                warn!("Fail-fast: cancelling remaining tests after {}", test.id());
                self.hooks.cancellation().cancel();
            }
        }
        sink.report(result);

        let completed = scopes.complete(test);
        if let Some(class) = completed.class {
            if let Err(e) = self.hooks.run_after_class(&class).await {
                error!("{}", e);
                sink.report_hook_failure(&e.to_string());
            }
        }
        if let Some(assembly) = completed.assembly {
            if let Err(e) = self.hooks.run_after_assembly(&assembly).await {
                error!("{}", e);
                sink.report_hook_failure(&e.to_string());
            }
        }

        status
    }
}
