//! Run lifecycle
//!
//! Drives one request end to end: discovery hooks around discovery, then for
//! run requests the session hooks around the scheduler. Every event is
//! forwarded to the caller's sink and the run summary is built on the way.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::EngineConfig;
use crate::executor::{ExecuteRequestContext, SingleTestExecutor, TestFilter, TestsExecutor};
use crate::hooks::{HookError, HookInfo, HookOrchestrator};
use crate::models::{
    DiscoveryContext, FailedInitialization, RunSummary, SessionContext, TestInfo, TestResult,
    TestUnit,
};
use crate::results::{CollectingSink, ResultSink};
use crate::utils::Stopwatch;

/// What a request asks the engine to do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Enumerate tests without running them
    Discover,
    Run,
}

/// A single discover or run request
#[derive(Clone, Debug)]
pub struct ExecuteRequest {
    pub kind: RequestKind,
    pub filter: TestFilter,
}

impl ExecuteRequest {
    pub fn discover() -> Self {
        Self {
            kind: RequestKind::Discover,
            filter: TestFilter::All,
        }
    }

    pub fn run(filter: TestFilter) -> Self {
        Self {
            kind: RequestKind::Run,
            filter,
        }
    }
}

/// Tests produced by a discovery pass
#[derive(Default)]
pub struct DiscoveryResult {
    pub tests: Vec<Arc<TestUnit>>,
    pub failed_to_initialize: Vec<FailedInitialization>,
}

/// Source of test units
pub trait TestDiscoverer: Send + Sync {
    fn discover(&self, context: &DiscoveryContext) -> Result<DiscoveryResult>;
}

/// Forwards every event to the caller's sink while collecting the summary
struct SummarySink {
    inner: Arc<dyn ResultSink>,
    collected: CollectingSink,
}

impl ResultSink for SummarySink {
    fn report(&self, result: TestResult) {
        self.collected.report(result.clone());
        self.inner.report(result);
    }

    fn report_discovered(&self, test: &TestInfo) {
        self.collected.report_discovered(test);
        self.inner.report_discovered(test);
    }

    fn report_hook_discovered(&self, hook: &HookInfo) {
        self.inner.report_hook_discovered(hook);
    }

    fn report_hook_failure(&self, failure: &str) {
        self.collected.report_hook_failure(failure);
        self.inner.report_hook_failure(failure);
    }

    fn report_hook_outcome(
        &self,
        hook: &HookInfo,
        scope_id: &str,
        outcome: Result<(), &HookError>,
        duration: Duration,
    ) {
        self.collected.report_hook_outcome(hook, scope_id, outcome, duration);
        self.inner.report_hook_outcome(hook, scope_id, outcome, duration);
    }
}

/// Engine facade tying hooks, discovery and the scheduler together
pub struct TestFramework {
    hooks: Arc<HookOrchestrator>,
    config: EngineConfig,
}

impl TestFramework {
    pub fn new(hooks: HookOrchestrator, config: EngineConfig) -> Self {
        Self {
            hooks: Arc::new(hooks),
            config,
        }
    }

    pub fn hooks(&self) -> &Arc<HookOrchestrator> {
        &self.hooks
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute `request` against the tests `discoverer` produces.
    ///
    /// Fails only when the discovery phase fails; test and session hook
    /// failures are reported through `sink` and the returned summary.
    pub async fn execute_request(
        &self,
        request: &ExecuteRequest,
        discoverer: &dyn TestDiscoverer,
        sink: Arc<dyn ResultSink>,
    ) -> Result<RunSummary> {
        let mut stopwatch = Stopwatch::new();
        let sink = Arc::new(SummarySink {
            inner: sink,
            collected: CollectingSink::new(),
        });

        let discovery = self.discover(discoverer).await?;
        stopwatch.lap("discovery");

        match request.kind {
            RequestKind::Discover => {
                for test in &discovery.tests {
                    sink.report_discovered(&test.info());
                }
                for failed in &discovery.failed_to_initialize {
                    sink.report_discovered(&failed_info(failed));
                }
                info!(
                    "Discovered {} tests ({} failed to initialize)",
                    discovery.tests.len(),
                    discovery.failed_to_initialize.len()
                );
            }
            RequestKind::Run => {
                self.run(discovery, &request.filter, sink.clone()).await;
                stopwatch.lap("execution");
            }
        }

        info!("Request finished in {}", stopwatch.format());
        Ok(sink
            .collected
            .summary(stopwatch.total().as_millis() as u64))
    }

    async fn discover(&self, discoverer: &dyn TestDiscoverer) -> Result<DiscoveryResult> {
        let context = Arc::new(DiscoveryContext::default());
        self.hooks
            .run_before_discovery(&context)
            .await
            .context("Before test discovery hooks failed")?;

        let discovery = discoverer.discover(&context).context("Test discovery failed")?;

        let context = Arc::new(DiscoveryContext {
            tests: discovery.tests.iter().map(|t| t.id().to_string()).collect(),
        });
        self.hooks
            .run_after_discovery(&context)
            .await
            .context("After test discovery hooks failed")?;

        Ok(discovery)
    }

    async fn run(&self, discovery: DiscoveryResult, filter: &TestFilter, sink: Arc<SummarySink>) {
        for failed in &discovery.failed_to_initialize {
            error!("Test {} failed to initialize: {}", failed.test_id, failed.error);
            sink.report(
                TestResult::fail(&failed.test_id, 0, &failed.error)
                    .with_display_name(&failed.display_name),
            );
        }

        self.hooks.discover_hooks(sink.as_ref());

        let selected: Vec<Arc<TestUnit>> = discovery
            .tests
            .into_iter()
            .filter(|t| filter.matches(t))
            .collect();
        let session = Arc::new(SessionContext {
            session_id: Utc::now().format("%Y%m%dT%H%M%S%3f").to_string(),
            tests: selected.iter().map(|t| t.id().to_string()).collect(),
        });
        info!("Starting session {} with {} tests", session.session_id, selected.len());

        match self.hooks.run_before_session(&session).await {
            Err(e) => {
                let message = e.to_string();
                for test in &selected {
                    sink.report(
                        TestResult::fail(test.id(), 0, &message).with_display_name(test.display_name()),
                    );
                }
            }
            Ok(()) => {
                let runner = SingleTestExecutor::new(self.hooks.clone())
                    .with_default_timeout(self.config.default_test_timeout())
                    .with_fail_fast(self.config.fail_fast);
                let executor = TestsExecutor::new(runner)
                    .with_max_parallel(self.config.max_parallel_tests)
                    .with_lock_settings(self.config.lock_settings());
                let sink: Arc<dyn ResultSink> = sink.clone();
                executor
                    .execute(selected, &TestFilter::All, &ExecuteRequestContext::new(sink))
                    .await;
            }
        }

        if let Err(e) = self.hooks.run_after_session(&session).await {
            warn!("{}", e);
            sink.report_hook_failure(&e.to_string());
        }
    }
}

fn failed_info(failed: &FailedInitialization) -> TestInfo {
    TestInfo {
        id: failed.test_id.clone(),
        display_name: failed.display_name.clone(),
        class_scope: String::new(),
        assembly_scope: String::new(),
        order: 0,
        mode: format!("failed to initialize: {}", failed.error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::EngineCancellation;
    use crate::hooks::HookDescriptor;
    use crate::models::{ClassHookContext, ConcurrencyMode, TestStatus};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct FixedDiscoverer {
        tests: Vec<(String, String)>,
        failing: Vec<String>,
        broken: Vec<FailedInitialization>,
        runs: Arc<AtomicUsize>,
    }

    impl FixedDiscoverer {
        fn new(tests: &[(&str, &str)]) -> Self {
            Self {
                tests: tests
                    .iter()
                    .map(|(id, class)| (id.to_string(), class.to_string()))
                    .collect(),
                failing: Vec::new(),
                broken: Vec::new(),
                runs: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing(mut self, id: &str) -> Self {
            self.failing.push(id.to_string());
            self
        }

        fn broken(mut self, id: &str) -> Self {
            self.broken.push(FailedInitialization::new(id, "constructor threw"));
            self
        }
    }

    impl TestDiscoverer for FixedDiscoverer {
        fn discover(&self, _context: &DiscoveryContext) -> Result<DiscoveryResult> {
            let tests = self
                .tests
                .iter()
                .map(|(id, class)| {
                    let runs = self.runs.clone();
                    let fail = self.failing.contains(id);
                    Arc::new(
                        TestUnit::new(id.clone(), move |_, _| {
                            let runs = runs.clone();
                            async move {
                                runs.fetch_add(1, Ordering::SeqCst);
                                if fail {
                                    Err(anyhow::anyhow!("assertion failed"))
                                } else {
                                    Ok(())
                                }
                            }
                        })
                        .in_class(class.clone())
                        .with_mode(ConcurrencyMode::Parallel),
                    )
                })
                .collect();

            Ok(DiscoveryResult {
                tests,
                failed_to_initialize: self.broken.clone(),
            })
        }
    }

    struct BrokenDiscoverer;

    impl TestDiscoverer for BrokenDiscoverer {
        fn discover(&self, _context: &DiscoveryContext) -> Result<DiscoveryResult> {
            Err(anyhow::anyhow!("suite file missing"))
        }
    }

    fn journal_hook<C: Send + Sync + 'static>(
        journal: &Arc<Mutex<Vec<String>>>,
        name: &str,
    ) -> HookDescriptor<C> {
        let journal = journal.clone();
        let entry = name.to_string();
        HookDescriptor::new(name, move |_: Arc<C>, _: CancellationToken| {
            let journal = journal.clone();
            let entry = entry.clone();
            async move {
                journal.lock().push(entry);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_run_request_reports_every_test() {
        let framework = TestFramework::new(HookOrchestrator::new(), EngineConfig::default());
        let discoverer = FixedDiscoverer::new(&[("A::one", "A"), ("A::two", "A"), ("B::one", "B")])
            .failing("A::two");
        let sink = Arc::new(CollectingSink::new());

        let summary = framework
            .execute_request(&ExecuteRequest::run(TestFilter::All), &discoverer, sink.clone())
            .await
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_all_passed());
        assert_eq!(sink.results().len(), 3);
        assert_eq!(discoverer.runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_class_hook_outcomes_reach_summary_and_caller() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookOrchestrator::new();
        hooks.register_before(journal_hook::<ClassHookContext>(&journal, "seed"));
        hooks.register_before(journal_hook::<SessionContext>(&journal, "boot"));
        hooks.register_after(
            HookDescriptor::<ClassHookContext>::new("drop", |_, _| async {
                Err(anyhow::anyhow!("table locked"))
            })
            .for_scope("B"),
        );
        let framework = TestFramework::new(hooks, EngineConfig::default());
        let discoverer = FixedDiscoverer::new(&[("A::one", "A"), ("A::two", "A"), ("B::one", "B")]);
        let sink = Arc::new(CollectingSink::new());

        let summary = framework
            .execute_request(&ExecuteRequest::run(TestFilter::All), &discoverer, sink.clone())
            .await
            .unwrap();

        let mut seen: Vec<_> = summary
            .hook_executions
            .iter()
            .map(|e| format!("{} {} [{}] {}", e.kind, e.name, e.scope_id, e.status))
            .collect();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                "After(Class) drop [B] FAIL",
                "Before(Class) seed [A] PASS",
                "Before(Class) seed [B] PASS",
            ]
        );
        assert_eq!(sink.hook_executions().len(), 3);
        assert_eq!(summary.passed, 3);
    }

    #[tokio::test]
    async fn test_lifecycle_hook_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookOrchestrator::new();
        hooks
            .register_before(journal_hook::<DiscoveryContext>(&journal, "before-discovery"))
            .register_after(journal_hook::<DiscoveryContext>(&journal, "after-discovery"))
            .register_before(journal_hook::<SessionContext>(&journal, "before-session"))
            .register_after(journal_hook::<SessionContext>(&journal, "after-session"))
            .register_before(journal_hook::<ClassHookContext>(&journal, "before-class"))
            .register_after(journal_hook::<ClassHookContext>(&journal, "after-class"));

        let framework = TestFramework::new(hooks, EngineConfig::default());
        let discoverer = FixedDiscoverer::new(&[("A::one", "A")]);
        framework
            .execute_request(
                &ExecuteRequest::run(TestFilter::All),
                &discoverer,
                Arc::new(CollectingSink::new()),
            )
            .await
            .unwrap();

        assert_eq!(
            *journal.lock(),
            vec![
                "before-discovery",
                "after-discovery",
                "before-session",
                "before-class",
                "after-class",
                "after-session",
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_request_runs_nothing() {
        let framework = TestFramework::new(HookOrchestrator::new(), EngineConfig::default());
        let discoverer = FixedDiscoverer::new(&[("A::one", "A"), ("A::two", "A")]).broken("A::bad");
        let sink = Arc::new(CollectingSink::new());

        let summary = framework
            .execute_request(&ExecuteRequest::discover(), &discoverer, sink.clone())
            .await
            .unwrap();

        assert_eq!(summary.total, 0);
        assert_eq!(discoverer.runs.load(Ordering::SeqCst), 0);
        let ids: Vec<_> = sink.discovered().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["A::one", "A::two", "A::bad"]);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_reported_as_failure() {
        let framework = TestFramework::new(HookOrchestrator::new(), EngineConfig::default());
        let discoverer = FixedDiscoverer::new(&[("A::one", "A")]).broken("A::bad");
        let sink = Arc::new(CollectingSink::new());

        let summary = framework
            .execute_request(&ExecuteRequest::run(TestFilter::All), &discoverer, sink.clone())
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        let bad = summary.results.iter().find(|r| r.test_id == "A::bad").unwrap();
        assert_eq!(bad.status, TestStatus::Failed);
        assert_eq!(bad.message.as_deref(), Some("constructor threw"));
    }

    #[tokio::test]
    async fn test_before_session_failure_fails_every_selected_test() {
        let mut hooks = HookOrchestrator::new();
        hooks.register_before(HookDescriptor::<SessionContext>::new("provision", |_, _| async {
            Err(anyhow::anyhow!("no database"))
        }));
        let framework = TestFramework::new(hooks, EngineConfig::default());
        let discoverer = FixedDiscoverer::new(&[("A::one", "A"), ("B::one", "B")]);

        let summary = framework
            .execute_request(
                &ExecuteRequest::run(TestFilter::All),
                &discoverer,
                Arc::new(CollectingSink::new()),
            )
            .await
            .unwrap();

        assert_eq!(summary.failed, 2);
        assert_eq!(discoverer.runs.load(Ordering::SeqCst), 0);
        for result in &summary.results {
            assert!(result.message.as_deref().unwrap_or_default().contains("provision"));
        }
    }

    #[tokio::test]
    async fn test_after_session_failure_is_a_run_level_failure() {
        let mut hooks = HookOrchestrator::new();
        hooks.register_after(HookDescriptor::<SessionContext>::new("teardown", |_, _| async {
            Err(anyhow::anyhow!("leaked container"))
        }));
        let framework = TestFramework::new(hooks, EngineConfig::default());
        let discoverer = FixedDiscoverer::new(&[("A::one", "A")]);
        let sink = Arc::new(CollectingSink::new());

        let summary = framework
            .execute_request(&ExecuteRequest::run(TestFilter::All), &discoverer, sink.clone())
            .await
            .unwrap();

        assert_eq!(summary.passed, 1);
        assert_eq!(summary.hook_failures.len(), 1);
        assert!(summary.hook_failures[0].contains("teardown"));
        assert!(!summary.is_all_passed());
        assert_eq!(sink.hook_failures(), summary.hook_failures);
    }

    #[tokio::test]
    async fn test_discovery_failures_abort_the_request() {
        let framework = TestFramework::new(HookOrchestrator::new(), EngineConfig::default());
        let err = framework
            .execute_request(
                &ExecuteRequest::run(TestFilter::All),
                &BrokenDiscoverer,
                Arc::new(CollectingSink::new()),
            )
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("suite file missing"));

        let mut hooks = HookOrchestrator::new();
        hooks.register_before(HookDescriptor::<DiscoveryContext>::new("scan", |_, _| async {
            Err(anyhow::anyhow!("scan failed"))
        }));
        let framework = TestFramework::new(hooks, EngineConfig::default());
        let discoverer = FixedDiscoverer::new(&[("A::one", "A")]);
        let result = framework
            .execute_request(
                &ExecuteRequest::run(TestFilter::All),
                &discoverer,
                Arc::new(CollectingSink::new()),
            )
            .await;
        assert!(result.is_err());
        assert_eq!(discoverer.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_filter_limits_selection() {
        let framework = TestFramework::new(HookOrchestrator::new(), EngineConfig::default());
        let discoverer = FixedDiscoverer::new(&[("A::one", "A"), ("A::two", "A"), ("B::one", "B")]);

        let summary = framework
            .execute_request(
                &ExecuteRequest::run(TestFilter::parse("A::*").unwrap()),
                &discoverer,
                Arc::new(CollectingSink::new()),
            )
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert!(summary.results.iter().all(|r| r.test_id.starts_with("A::")));
    }

    #[tokio::test]
    async fn test_host_cancellation_cancels_the_run() {
        let host = CancellationToken::new();
        host.cancel();
        let hooks = HookOrchestrator::new().with_cancellation(EngineCancellation::linked_to(&host));
        let framework = TestFramework::new(hooks, EngineConfig::default());
        let discoverer = FixedDiscoverer::new(&[("A::one", "A"), ("A::two", "A")]);

        let summary = framework
            .execute_request(
                &ExecuteRequest::run(TestFilter::All),
                &discoverer,
                Arc::new(CollectingSink::new()),
            )
            .await
            .unwrap();

        assert_eq!(summary.cancelled, 2);
        assert_eq!(discoverer.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_config_reaches_the_scheduler() {
        let config = EngineConfig {
            default_test_timeout_ms: Some(20),
            ..EngineConfig::default()
        };
        let framework = TestFramework::new(HookOrchestrator::new(), config);

        struct SlowDiscoverer;
        impl TestDiscoverer for SlowDiscoverer {
            fn discover(&self, _context: &DiscoveryContext) -> Result<DiscoveryResult> {
                Ok(DiscoveryResult {
                    tests: vec![Arc::new(TestUnit::new("slow", |_, _| async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        Ok(())
                    }))],
                    failed_to_initialize: Vec::new(),
                })
            }
        }

        let summary = framework
            .execute_request(
                &ExecuteRequest::run(TestFilter::All),
                &SlowDiscoverer,
                Arc::new(CollectingSink::new()),
            )
            .await
            .unwrap();

        assert_eq!(summary.failed, 1);
        assert!(summary.results[0]
            .message
            .as_deref()
            .unwrap_or_default()
            .contains("timed out"));
    }
}
