//! Test result models
//!
//! Terminal outcomes reported for each test, and the run summary built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of a test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Cancelled,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Passed => "✓",
            TestStatus::Failed => "✗",
            TestStatus::Cancelled => "○",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestStatus::Passed)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "PASS"),
            TestStatus::Failed => write!(f, "FAIL"),
            TestStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Result of a single test execution
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    pub test_id: String,
    pub display_name: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    pub message: Option<String>,
    /// After-hook failures reported alongside the test's own outcome
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hook_failures: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

impl TestResult {
    fn new(test_id: impl Into<String>, status: TestStatus, duration_ms: u64) -> Self {
        let test_id = test_id.into();
        Self {
            display_name: test_id.clone(),
            test_id,
            status,
            duration_ms,
            message: None,
            hook_failures: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn pass(test_id: impl Into<String>, duration_ms: u64) -> Self {
        Self::new(test_id, TestStatus::Passed, duration_ms)
    }

    pub fn fail(test_id: impl Into<String>, duration_ms: u64, message: impl Into<String>) -> Self {
        Self::new(test_id, TestStatus::Failed, duration_ms).with_message(message)
    }

    pub fn cancelled(test_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(test_id, TestStatus::Cancelled, 0).with_message(reason)
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hook_failures(mut self, failures: Vec<String>) -> Self {
        self.hook_failures = failures;
        self
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.display_name,
            self.duration_ms
        )?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        for failure in &self.hook_failures {
            write!(f, " (hook: {failure})")?;
        }
        Ok(())
    }
}

/// A test that could not be constructed during discovery
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailedInitialization {
    pub test_id: String,
    pub display_name: String,
    pub error: String,
}

impl FailedInitialization {
    pub fn new(test_id: impl Into<String>, error: impl Into<String>) -> Self {
        let test_id = test_id.into();
        Self {
            display_name: test_id.clone(),
            test_id,
            error: error.into(),
        }
    }
}

/// Outcome of one class or assembly hook run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HookExecution {
    pub name: String,
    /// Phase and scope, e.g. `Before(Class)`
    pub kind: String,
    /// The class or assembly the hook ran for
    pub scope_id: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl fmt::Display for HookExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} [{}] [{}ms]",
            self.status.symbol(),
            self.kind,
            self.name,
            self.scope_id,
            self.duration_ms
        )?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Summary of a whole run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total_duration_ms: u64,
    pub results: Vec<TestResult>,
    /// Scope-level hook failures not attributable to a single test
    #[serde(default)]
    pub hook_failures: Vec<String>,
    /// Every class and assembly hook that ran, in completion order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hook_executions: Vec<HookExecution>,
}

impl RunSummary {
    pub fn new(mut results: Vec<TestResult>, hook_failures: Vec<String>, total_duration_ms: u64) -> Self {
        results.sort_by(|a, b| a.test_id.cmp(&b.test_id));

        let count = |status: TestStatus| results.iter().filter(|r| r.status == status).count();
        let passed = count(TestStatus::Passed);
        let failed = count(TestStatus::Failed);
        let cancelled = count(TestStatus::Cancelled);

        Self {
            total: results.len(),
            passed,
            failed,
            cancelled,
            total_duration_ms,
            results,
            hook_failures,
            hook_executions: Vec::new(),
        }
    }

    pub fn with_hook_executions(mut self, executions: Vec<HookExecution>) -> Self {
        self.hook_executions = executions;
        self
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    /// True when every test passed and no scope hook failed
    pub fn is_all_passed(&self) -> bool {
        self.passed == self.total && self.hook_failures.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test Run")?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        for failure in &self.hook_failures {
            writeln!(f, "  ! {failure}")?;
        }
        if !self.hook_executions.is_empty() {
            writeln!(f, "Hooks")?;
            for execution in &self.hook_executions {
                writeln!(f, "  {execution}")?;
            }
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Cancelled: {}",
            self.total, self.passed, self.failed, self.cancelled
        )?;
        writeln!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate(),
            self.total_duration_ms
        )
    }
}
