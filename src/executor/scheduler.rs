//! Test scheduling
//!
//! Runs a selection of tests with as much parallelism as their constraints
//! allow. Free tests and keyed groups run concurrently; each keyed group is
//! sequential and holds its key locks per test; globally exclusive tests run
//! one at a time once everything else has drained. One semaphore bounds all
//! concurrent work.

use futures::future::join_all;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::filter::TestFilter;
use super::grouper::{GroupedTests, KeyedGroup};
use super::locks::{ConstraintLockManager, LockSettings};
use super::runner::SingleTestExecutor;
use super::scope::ScopeTracker;
use crate::models::TestUnit;
use crate::results::ResultSink;
use crate::utils::Timer;

/// Where a scheduling request reports to
#[derive(Clone)]
pub struct ExecuteRequestContext {
    pub sink: Arc<dyn ResultSink>,
}

impl ExecuteRequestContext {
    pub fn new(sink: Arc<dyn ResultSink>) -> Self {
        Self { sink }
    }
}

/// Counters from one `execute` call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub selected: usize,
    pub parallel: usize,
    pub keyed_groups: usize,
    pub not_in_parallel: usize,
}

#[derive(Debug, Default)]
struct InFlightGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct InFlight(Arc<InFlightGauge>);

impl InFlightGauge {
    fn enter(self: &Arc<Self>) -> InFlight {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlight(self.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Keep the first unit for each test id
fn distinct(tests: impl IntoIterator<Item = Arc<TestUnit>>) -> Vec<Arc<TestUnit>> {
    let mut seen = HashSet::new();
    tests
        .into_iter()
        .filter(|test| {
            let first = seen.insert(test.id().to_string());
            if !first {
                warn!("Test {} was submitted more than once; running it once", test.id());
            }
            first
        })
        .collect()
}

/// Scheduler entry point
#[derive(Clone)]
pub struct TestsExecutor {
    runner: Arc<SingleTestExecutor>,
    locks: Arc<ConstraintLockManager>,
    limiter: Option<Arc<Semaphore>>,
    gauge: Arc<InFlightGauge>,
}

impl TestsExecutor {
    /// Unbounded parallelism with default lock polling
    pub fn new(runner: SingleTestExecutor) -> Self {
        Self {
            runner: Arc::new(runner),
            locks: Arc::new(ConstraintLockManager::default()),
            limiter: None,
            gauge: Arc::new(InFlightGauge::default()),
        }
    }

    /// Bound concurrently running tests; `None` leaves them unbounded
    pub fn with_max_parallel(mut self, max_parallel: Option<usize>) -> Self {
        self.limiter = max_parallel.map(|max| Arc::new(Semaphore::new(max.max(1))));
        self
    }

    pub fn with_lock_settings(mut self, settings: LockSettings) -> Self {
        self.locks = Arc::new(ConstraintLockManager::new(settings));
        self
    }

    /// Tests currently between start and report
    pub fn in_flight(&self) -> usize {
        self.gauge.current.load(Ordering::SeqCst)
    }

    /// Highest in-flight count observed
    pub fn peak_in_flight(&self) -> usize {
        self.gauge.peak.load(Ordering::SeqCst)
    }

    /// Run every test `filter` selects; each gets exactly one outcome.
    /// Class and assembly hook outcomes go to the same sink.
    pub async fn execute(
        &self,
        tests: Vec<Arc<TestUnit>>,
        filter: &TestFilter,
        context: &ExecuteRequestContext,
    ) -> ExecutionStats {
        let timer = Timer::start("execute");
        self.runner.hooks().report_to(context.sink.clone());
        let selected = distinct(tests.into_iter().filter(|t| filter.matches(t)));
        let scopes = Arc::new(ScopeTracker::new(&selected));
        let grouped = GroupedTests::organise(selected.iter().cloned());

        let stats = ExecutionStats {
            selected: selected.len(),
            parallel: grouped.parallel.len(),
            keyed_groups: grouped.keyed.len(),
            not_in_parallel: grouped.not_in_parallel.len(),
        };
        info!(
            "Executing {} tests: {} parallel, {} keyed groups, {} not in parallel",
            stats.selected, stats.parallel, stats.keyed_groups, stats.not_in_parallel
        );

        for (i, group) in grouped.keyed.iter().enumerate() {
            for other in grouped.keyed.iter().skip(i + 1) {
                if group.keys.overlaps(&other.keys) {
                    debug!("Keyed groups {} and {} share a lock", group.keys, other.keys);
                }
            }
        }

        let GroupedTests {
            parallel,
            not_in_parallel,
            keyed,
        } = grouped;

        let mut handles = Vec::with_capacity(parallel.len() + keyed.len());
        for test in parallel {
            let this = self.clone();
            let scopes = scopes.clone();
            let sink = context.sink.clone();
            handles.push(tokio::spawn(async move {
                this.run_one(&test, &scopes, sink.as_ref()).await;
            }));
        }
        for group in keyed {
            let this = self.clone();
            let scopes = scopes.clone();
            let sink = context.sink.clone();
            handles.push(tokio::spawn(async move {
                this.run_keyed_group(group, &scopes, sink.as_ref()).await;
            }));
        }

        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!("Test execution task failed: {}", e);
            }
        }

        for test in not_in_parallel {
            self.run_one(&test, &scopes, context.sink.as_ref()).await;
        }

        for test in selected.iter().filter(|t| !t.is_finished()) {
            error!("Test {} finished without an outcome", test.id());
            self.runner
                .fail_unrun(
                    test,
                    "Test was not executed: scheduler fault",
                    &scopes,
                    context.sink.as_ref(),
                )
                .await;
        }

        info!("Executed {} tests in {}ms", stats.selected, timer.elapsed_ms());
        stats
    }

    async fn run_one(&self, test: &Arc<TestUnit>, scopes: &ScopeTracker, sink: &dyn ResultSink) {
        let _permit = match &self.limiter {
            Some(limiter) => limiter.clone().acquire_owned().await.ok(),
            None => None,
        };
        let _in_flight = self.gauge.enter();
        self.runner.execute(test, scopes, sink).await;
    }

    async fn run_keyed_group(&self, group: KeyedGroup, scopes: &ScopeTracker, sink: &dyn ResultSink) {
        debug!("Running keyed group {} ({} tests)", group.keys, group.tests.len());
        let cancellation = self.runner.hooks().cancellation().token().clone();

        for test in &group.tests {
            match self.locks.acquire_all(&group.keys, &cancellation).await {
                Ok(_locks) => self.run_one(test, scopes, sink).await,
                Err(reason) => {
                    let message = format!("Could not acquire locks {}: run {}", group.keys, reason);
                    self.runner.cancel_unrun(test, &message, scopes, sink).await;
                }
            }
        }
    }
}
