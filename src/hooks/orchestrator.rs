//! Hook orchestration
//!
//! Holds the before/after registries for the five hook scopes and runs them
//! around tests. Registration takes `&mut self`, so the registry is frozen
//! once the orchestrator is shared behind an `Arc` for a run.
//!
//! - Before chains stop at the first failure and return it.
//! - After chains run every hook and collect each failure.
//! - Class, assembly, session and discovery before chains are memoized: the
//!   chain runs once per scope instance and every caller sees its outcome.
//! - Each class and assembly hook run is timed and reported to the sink set
//!   with [`HookOrchestrator::report_to`].

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::cell::MemoizedHookCell;
use super::descriptor::{HookDescriptor, HookInfo};
use super::error::{HookError, HookKind, HookPhase, HookScope};
use crate::cancel::{run_with_timeout, EngineCancellation};
use crate::models::{
    AssemblyHookContext, ClassHookContext, DiscoveryContext, SessionContext, TestContext,
};
use crate::results::ResultSink;
use crate::utils::{catch_panic, Timer};

/// Outcome of a memoized hook chain, shared by every waiter
pub type HookOutcome = Result<(), HookError>;

type ScopeCells = RwLock<HashMap<String, Arc<MemoizedHookCell<HookOutcome>>>>;

/// Sink and scope instance that hook outcomes are reported against
#[derive(Clone)]
struct HookReporter {
    sink: Arc<dyn ResultSink>,
    scope_id: String,
}

impl HookReporter {
    fn report(&self, info: &HookInfo, outcome: &HookOutcome, duration: Duration) {
        self.sink
            .report_hook_outcome(info, &self.scope_id, outcome.as_ref().copied(), duration);
    }
}

/// Before and after hooks of one scope, each list sorted by declared order
pub struct ScopeHooks<C> {
    before: Vec<HookDescriptor<C>>,
    after: Vec<HookDescriptor<C>>,
}

impl<C: Send + Sync + 'static> ScopeHooks<C> {
    fn new() -> Self {
        Self {
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    fn insert(list: &mut Vec<HookDescriptor<C>>, hook: HookDescriptor<C>) {
        list.push(hook);
        // Stable: equal orders keep registration order.
        list.sort_by_key(HookDescriptor::order);
    }

    fn selected(list: &[HookDescriptor<C>], scope_id: Option<&str>) -> Vec<HookDescriptor<C>> {
        list.iter()
            .filter(|hook| scope_id.map_or(true, |id| hook.applies_to(id)))
            .cloned()
            .collect()
    }

    fn infos(&self, scope: HookScope) -> Vec<HookInfo> {
        let before = HookKind::new(HookPhase::Before, scope);
        let after = HookKind::new(HookPhase::After, scope);
        self.before
            .iter()
            .map(|hook| hook.info(before))
            .chain(self.after.iter().map(|hook| hook.info(after)))
            .collect()
    }
}

/// A context type that has its own hook registry
pub trait ScopedContext: Send + Sync + Sized + 'static {
    const SCOPE: HookScope;

    fn registry(hooks: &mut HookOrchestrator) -> &mut ScopeHooks<Self>;
}

impl ScopedContext for TestContext {
    const SCOPE: HookScope = HookScope::Test;

    fn registry(hooks: &mut HookOrchestrator) -> &mut ScopeHooks<Self> {
        &mut hooks.test
    }
}

impl ScopedContext for ClassHookContext {
    const SCOPE: HookScope = HookScope::Class;

    fn registry(hooks: &mut HookOrchestrator) -> &mut ScopeHooks<Self> {
        &mut hooks.class
    }
}

impl ScopedContext for AssemblyHookContext {
    const SCOPE: HookScope = HookScope::Assembly;

    fn registry(hooks: &mut HookOrchestrator) -> &mut ScopeHooks<Self> {
        &mut hooks.assembly
    }
}

impl ScopedContext for SessionContext {
    const SCOPE: HookScope = HookScope::Session;

    fn registry(hooks: &mut HookOrchestrator) -> &mut ScopeHooks<Self> {
        &mut hooks.session
    }
}

impl ScopedContext for DiscoveryContext {
    const SCOPE: HookScope = HookScope::Discovery;

    fn registry(hooks: &mut HookOrchestrator) -> &mut ScopeHooks<Self> {
        &mut hooks.discovery
    }
}

/// Registry and runner for every lifecycle hook of a run
pub struct HookOrchestrator {
    test: ScopeHooks<TestContext>,
    class: ScopeHooks<ClassHookContext>,
    assembly: ScopeHooks<AssemblyHookContext>,
    session: ScopeHooks<SessionContext>,
    discovery: ScopeHooks<DiscoveryContext>,
    class_cells: ScopeCells,
    assembly_cells: ScopeCells,
    before_session: MemoizedHookCell<HookOutcome>,
    after_session: MemoizedHookCell<HookOutcome>,
    before_discovery: MemoizedHookCell<HookOutcome>,
    after_discovery: MemoizedHookCell<HookOutcome>,
    cancellation: EngineCancellation,
    reporter: RwLock<Option<Arc<dyn ResultSink>>>,
}

impl HookOrchestrator {
    pub fn new() -> Self {
        Self {
            test: ScopeHooks::new(),
            class: ScopeHooks::new(),
            assembly: ScopeHooks::new(),
            session: ScopeHooks::new(),
            discovery: ScopeHooks::new(),
            class_cells: RwLock::new(HashMap::new()),
            assembly_cells: RwLock::new(HashMap::new()),
            before_session: MemoizedHookCell::new(),
            after_session: MemoizedHookCell::new(),
            before_discovery: MemoizedHookCell::new(),
            after_discovery: MemoizedHookCell::new(),
            cancellation: EngineCancellation::new(),
            reporter: RwLock::new(None),
        }
    }

    /// Use `cancellation` as the run-wide signal before chains observe
    pub fn with_cancellation(mut self, cancellation: EngineCancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn cancellation(&self) -> &EngineCancellation {
        &self.cancellation
    }

    /// Report class and assembly hook outcomes to `sink` from now on
    pub fn report_to(&self, sink: Arc<dyn ResultSink>) {
        *self.reporter.write() = Some(sink);
    }

    fn reporter_for(&self, scope_id: &str) -> Option<HookReporter> {
        self.reporter.read().as_ref().map(|sink| HookReporter {
            sink: sink.clone(),
            scope_id: scope_id.to_string(),
        })
    }

    pub fn register_before<C: ScopedContext>(&mut self, hook: HookDescriptor<C>) -> &mut Self {
        debug!("Registering Before {} hook '{}'", C::SCOPE.name(), hook.name());
        ScopeHooks::insert(&mut C::registry(self).before, hook);
        self
    }

    pub fn register_after<C: ScopedContext>(&mut self, hook: HookDescriptor<C>) -> &mut Self {
        debug!("Registering After {} hook '{}'", C::SCOPE.name(), hook.name());
        ScopeHooks::insert(&mut C::registry(self).after, hook);
        self
    }

    /// Every registered hook, grouped by scope, before hooks first
    pub fn hook_infos(&self) -> Vec<HookInfo> {
        let mut infos = self.discovery.infos(HookScope::Discovery);
        infos.extend(self.session.infos(HookScope::Session));
        infos.extend(self.assembly.infos(HookScope::Assembly));
        infos.extend(self.class.infos(HookScope::Class));
        infos.extend(self.test.infos(HookScope::Test));
        infos
    }

    /// Publish the class and assembly hooks to `sink` ahead of execution
    pub fn discover_hooks(&self, sink: &dyn ResultSink) -> Vec<HookInfo> {
        let mut infos = self.class.infos(HookScope::Class);
        infos.extend(self.assembly.infos(HookScope::Assembly));

        for info in &infos {
            debug!("Discovered hook {}", info);
            sink.report_hook_discovered(info);
        }
        infos
    }

    pub async fn run_before_test(&self, context: &Arc<TestContext>) -> HookOutcome {
        let hooks = ScopeHooks::selected(&self.test.before, Some(&context.class_scope));
        run_before_chain(
            hooks,
            HookKind::BEFORE_TEST,
            context.clone(),
            self.cancellation.token().clone(),
            None,
        )
        .await
    }

    /// Run every after-test hook, appending each failure to `failures`
    pub async fn run_after_test(&self, context: &Arc<TestContext>, failures: &mut Vec<HookError>) {
        let hooks = ScopeHooks::selected(&self.test.after, Some(&context.class_scope));
        run_after_chain(&hooks, HookKind::AFTER_TEST, context, failures, None).await;
    }

    /// Run the class before chain once per class id; later callers share the outcome
    pub async fn run_before_class(&self, context: &Arc<ClassHookContext>) -> HookOutcome {
        let cell = cell_for(&self.class_cells, &context.class_id);
        cell.get_or_run(|| {
            let hooks = ScopeHooks::selected(&self.class.before, Some(&context.class_id));
            run_before_chain(
                hooks,
                HookKind::BEFORE_CLASS,
                context.clone(),
                self.cancellation.token().clone(),
                self.reporter_for(&context.class_id),
            )
        })
        .await
    }

    /// Run the assembly before chain once per assembly id
    pub async fn run_before_assembly(&self, context: &Arc<AssemblyHookContext>) -> HookOutcome {
        let cell = cell_for(&self.assembly_cells, &context.assembly_id);
        cell.get_or_run(|| {
            let hooks = ScopeHooks::selected(&self.assembly.before, Some(&context.assembly_id));
            run_before_chain(
                hooks,
                HookKind::BEFORE_ASSEMBLY,
                context.clone(),
                self.cancellation.token().clone(),
                self.reporter_for(&context.assembly_id),
            )
        })
        .await
    }

    pub fn class_entered(&self, class_id: &str) -> bool {
        entered(&self.class_cells, class_id)
    }

    pub fn assembly_entered(&self, assembly_id: &str) -> bool {
        entered(&self.assembly_cells, assembly_id)
    }

    /// Teardown for a finished class; skipped if its before chain never ran
    pub async fn run_after_class(&self, context: &Arc<ClassHookContext>) -> HookOutcome {
        if !self.class_entered(&context.class_id) {
            return Ok(());
        }
        let hooks = ScopeHooks::selected(&self.class.after, Some(&context.class_id));
        let mut failures = Vec::new();
        let reporter = self.reporter_for(&context.class_id);
        run_after_chain(
            &hooks,
            HookKind::AFTER_CLASS,
            context,
            &mut failures,
            reporter.as_ref(),
        )
        .await;
        HookError::aggregate(HookKind::AFTER_CLASS, failures)
    }

    /// Teardown for a finished assembly; skipped if its before chain never ran
    pub async fn run_after_assembly(&self, context: &Arc<AssemblyHookContext>) -> HookOutcome {
        if !self.assembly_entered(&context.assembly_id) {
            return Ok(());
        }
        let hooks = ScopeHooks::selected(&self.assembly.after, Some(&context.assembly_id));
        let mut failures = Vec::new();
        let reporter = self.reporter_for(&context.assembly_id);
        run_after_chain(
            &hooks,
            HookKind::AFTER_ASSEMBLY,
            context,
            &mut failures,
            reporter.as_ref(),
        )
        .await;
        HookError::aggregate(HookKind::AFTER_ASSEMBLY, failures)
    }

    pub async fn run_before_session(&self, context: &Arc<SessionContext>) -> HookOutcome {
        self.before_session
            .get_or_run(|| {
                run_before_chain(
                    self.session.before.clone(),
                    HookKind::BEFORE_SESSION,
                    context.clone(),
                    self.cancellation.token().clone(),
                    None,
                )
            })
            .await
    }

    pub async fn run_after_session(&self, context: &Arc<SessionContext>) -> HookOutcome {
        self.after_session
            .get_or_run(|| {
                run_after_aggregate(self.session.after.clone(), HookKind::AFTER_SESSION, context.clone())
            })
            .await
    }

    pub async fn run_before_discovery(&self, context: &Arc<DiscoveryContext>) -> HookOutcome {
        self.before_discovery
            .get_or_run(|| {
                run_before_chain(
                    self.discovery.before.clone(),
                    HookKind::BEFORE_DISCOVERY,
                    context.clone(),
                    self.cancellation.token().clone(),
                    None,
                )
            })
            .await
    }

    pub async fn run_after_discovery(&self, context: &Arc<DiscoveryContext>) -> HookOutcome {
        self.after_discovery
            .get_or_run(|| {
                run_after_aggregate(
                    self.discovery.after.clone(),
                    HookKind::AFTER_DISCOVERY,
                    context.clone(),
                )
            })
            .await
    }
}

impl Default for HookOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn cell_for(cells: &ScopeCells, scope_id: &str) -> Arc<MemoizedHookCell<HookOutcome>> {
    if let Some(cell) = cells.read().get(scope_id) {
        return cell.clone();
    }
    cells
        .write()
        .entry(scope_id.to_string())
        .or_insert_with(|| Arc::new(MemoizedHookCell::new()))
        .clone()
}

fn entered(cells: &ScopeCells, scope_id: &str) -> bool {
    cells
        .read()
        .get(scope_id)
        .map_or(false, |cell| cell.is_started())
}

async fn run_hook<C: Send + Sync + 'static>(
    hook: &HookDescriptor<C>,
    kind: HookKind,
    context: Arc<C>,
    cancellation: &CancellationToken,
    reporter: Option<&HookReporter>,
) -> HookOutcome {
    let info = hook.info(kind);
    debug!("Running {}", info);
    let timer = Timer::start(hook.name());

    let outcome = run_with_timeout(cancellation, hook.timeout(), |token| {
        catch_panic(hook.invoke(&info, context, token))
    })
    .await;

    let outcome = match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(cause)) => Err(HookError::failed(kind, hook.name(), cause)),
        Err(reason) => Err(HookError::Interrupted {
            kind,
            name: hook.name().to_string(),
            reason,
        }),
    };
    let duration = timer.stop();
    if let Some(reporter) = reporter {
        reporter.report(&info, &outcome, duration);
    }
    outcome
}

async fn run_before_chain<C: Send + Sync + 'static>(
    hooks: Vec<HookDescriptor<C>>,
    kind: HookKind,
    context: Arc<C>,
    cancellation: CancellationToken,
    reporter: Option<HookReporter>,
) -> HookOutcome {
    for hook in &hooks {
        let outcome =
            run_hook(hook, kind, context.clone(), &cancellation, reporter.as_ref()).await;
        if let Err(e) = outcome {
            error!("{}", e);
            return Err(e);
        }
    }
    Ok(())
}

/// After hooks only honour their own timeout: a detached token keeps
/// run-wide cancellation from interrupting teardown.
async fn run_after_chain<C: Send + Sync + 'static>(
    hooks: &[HookDescriptor<C>],
    kind: HookKind,
    context: &Arc<C>,
    failures: &mut Vec<HookError>,
    reporter: Option<&HookReporter>,
) {
    let detached = CancellationToken::new();
    for hook in hooks {
        if let Err(e) = run_hook(hook, kind, context.clone(), &detached, reporter).await {
            warn!("{}", e);
            failures.push(e);
        }
    }
}

async fn run_after_aggregate<C: Send + Sync + 'static>(
    hooks: Vec<HookDescriptor<C>>,
    kind: HookKind,
    context: Arc<C>,
) -> HookOutcome {
    let mut failures = Vec::new();
    run_after_chain(&hooks, kind, &context, &mut failures, None).await;
    HookError::aggregate(kind, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Interruption;
    use crate::results::CollectingSink;
    use futures::future::join_all;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Journal = Arc<Mutex<Vec<String>>>;

    fn recording<C: Send + Sync + 'static>(journal: &Journal, name: &str) -> HookDescriptor<C> {
        let journal = journal.clone();
        let label = name.to_string();
        HookDescriptor::new(name, move |_, _| {
            let journal = journal.clone();
            let label = label.clone();
            async move {
                journal.lock().push(label);
                Ok(())
            }
        })
    }

    fn failing<C: Send + Sync + 'static>(journal: &Journal, name: &str) -> HookDescriptor<C> {
        let journal = journal.clone();
        let label = name.to_string();
        HookDescriptor::new(name, move |_, _| {
            let journal = journal.clone();
            let label = label.clone();
            async move {
                journal.lock().push(label.clone());
                Err(anyhow::anyhow!("{label} broke"))
            }
        })
    }

    fn test_context(class: &str) -> Arc<TestContext> {
        Arc::new(TestContext {
            test_id: format!("{class}::case"),
            display_name: "case".to_string(),
            class_scope: class.to_string(),
            assembly_scope: "default".to_string(),
            order: 0,
        })
    }

    fn class_context(class: &str) -> Arc<ClassHookContext> {
        Arc::new(ClassHookContext {
            class_id: class.to_string(),
            assembly_id: "default".to_string(),
            tests: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_hooks_run_in_declared_order_ties_by_registration() {
        let journal = Journal::default();
        let mut hooks = HookOrchestrator::new();
        hooks
            .register_before(recording::<TestContext>(&journal, "late").with_order(5))
            .register_before(recording::<TestContext>(&journal, "first-zero"))
            .register_before(recording::<TestContext>(&journal, "early").with_order(-1))
            .register_before(recording::<TestContext>(&journal, "second-zero"));

        hooks.run_before_test(&test_context("Orders")).await.unwrap();

        assert_eq!(
            *journal.lock(),
            vec!["early", "first-zero", "second-zero", "late"]
        );
    }

    #[tokio::test]
    async fn test_before_failure_stops_chain() {
        let journal = Journal::default();
        let mut hooks = HookOrchestrator::new();
        hooks
            .register_before(recording::<TestContext>(&journal, "one"))
            .register_before(failing::<TestContext>(&journal, "two"))
            .register_before(recording::<TestContext>(&journal, "three"));

        let err = hooks.run_before_test(&test_context("Orders")).await.unwrap_err();

        assert_eq!(err.kind(), HookKind::BEFORE_TEST);
        assert_eq!(err.hook_name(), Some("two"));
        assert_eq!(*journal.lock(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_after_chain_runs_all_and_collects_failure() {
        let journal = Journal::default();
        let mut hooks = HookOrchestrator::new();
        hooks
            .register_after(recording::<TestContext>(&journal, "one"))
            .register_after(failing::<TestContext>(&journal, "two"))
            .register_after(recording::<TestContext>(&journal, "three"));

        let mut failures = Vec::new();
        hooks
            .run_after_test(&test_context("Orders"), &mut failures)
            .await;

        assert_eq!(*journal.lock(), vec!["one", "two", "three"]);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].hook_name(), Some("two"));
        assert_eq!(failures[0].kind(), HookKind::AFTER_TEST);
    }

    #[tokio::test]
    async fn test_hook_timeout_is_reported_as_interruption() {
        let mut hooks = HookOrchestrator::new();
        hooks.register_before(
            HookDescriptor::<TestContext>::new("slow", |_, _| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .with_timeout(Duration::from_millis(20)),
        );

        let err = hooks.run_before_test(&test_context("Orders")).await.unwrap_err();
        assert!(matches!(
            err,
            HookError::Interrupted {
                reason: Interruption::TimedOut(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_panicking_hook_is_a_failure() {
        let mut hooks = HookOrchestrator::new();
        hooks.register_before(HookDescriptor::<TestContext>::new("explodes", |_, _| async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        }));

        let err = hooks.run_before_test(&test_context("Orders")).await.unwrap_err();
        assert!(err.to_string().contains("panicked: kaboom"));
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_before_hooks_but_not_after_hooks() {
        let journal = Journal::default();
        let mut hooks = HookOrchestrator::new();
        hooks
            .register_before(recording::<TestContext>(&journal, "setup"))
            .register_after(recording::<TestContext>(&journal, "teardown"));
        hooks.cancellation().cancel();

        let context = test_context("Orders");
        let err = hooks.run_before_test(&context).await.unwrap_err();
        assert!(matches!(
            err,
            HookError::Interrupted {
                reason: Interruption::Cancelled,
                ..
            }
        ));

        let mut failures = Vec::new();
        hooks.run_after_test(&context, &mut failures).await;
        assert!(failures.is_empty());
        assert_eq!(*journal.lock(), vec!["teardown"]);
    }

    #[tokio::test]
    async fn test_scoped_hook_only_runs_for_its_class() {
        let journal = Journal::default();
        let mut hooks = HookOrchestrator::new();
        hooks.register_before(recording::<TestContext>(&journal, "orders-only").for_scope("Orders"));

        hooks.run_before_test(&test_context("Billing")).await.unwrap();
        assert!(journal.lock().is_empty());

        hooks.run_before_test(&test_context("Orders")).await.unwrap();
        assert_eq!(*journal.lock(), vec!["orders-only"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_class_before_runs_once_for_concurrent_tests() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut hooks = HookOrchestrator::new();
        {
            let calls = calls.clone();
            hooks.register_before(HookDescriptor::<ClassHookContext>::new(
                "seed",
                move |_, _| {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(())
                    }
                },
            ));
        }
        let hooks = Arc::new(hooks);
        let context = class_context("Orders");

        let handles = (0..100).map(|_| {
            let hooks = hooks.clone();
            let context = context.clone();
            tokio::spawn(async move { hooks.run_before_class(&context).await })
        });
        let outcomes = join_all(handles).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(outcomes.into_iter().all(|o| o.unwrap().is_ok()));
        assert!(hooks.class_entered("Orders"));
        assert!(!hooks.class_entered("Billing"));
    }

    #[tokio::test]
    async fn test_class_before_failure_is_memoized() {
        let journal = Journal::default();
        let mut hooks = HookOrchestrator::new();
        hooks.register_before(failing::<ClassHookContext>(&journal, "seed"));

        let context = class_context("Orders");
        let first = hooks.run_before_class(&context).await.unwrap_err();
        let second = hooks.run_before_class(&context).await.unwrap_err();

        assert_eq!(first.to_string(), second.to_string());
        assert_eq!(*journal.lock(), vec!["seed"]);
    }

    #[tokio::test]
    async fn test_after_class_skipped_when_never_entered() {
        let journal = Journal::default();
        let mut hooks = HookOrchestrator::new();
        hooks.register_after(recording::<ClassHookContext>(&journal, "cleanup"));

        let context = class_context("Orders");
        hooks.run_after_class(&context).await.unwrap();
        assert!(journal.lock().is_empty());

        hooks.run_before_class(&context).await.unwrap();
        hooks.run_after_class(&context).await.unwrap();
        assert_eq!(*journal.lock(), vec!["cleanup"]);
    }

    #[tokio::test]
    async fn test_after_session_aggregates_failures() {
        let journal = Journal::default();
        let mut hooks = HookOrchestrator::new();
        hooks
            .register_after(failing::<SessionContext>(&journal, "flush"))
            .register_after(recording::<SessionContext>(&journal, "close"))
            .register_after(failing::<SessionContext>(&journal, "upload"));

        let context = Arc::new(SessionContext::default());
        let err = hooks.run_after_session(&context).await.unwrap_err();

        assert_eq!(err.kind(), HookKind::AFTER_SESSION);
        let failures = err.failures();
        let names: Vec<_> = failures.iter().filter_map(|f| f.hook_name()).collect();
        assert_eq!(names, vec!["flush", "upload"]);
        assert_eq!(*journal.lock(), vec!["flush", "close", "upload"]);

        // Once per run.
        let _ = hooks.run_after_session(&context).await;
        assert_eq!(journal.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_discover_hooks_reports_class_and_assembly_hooks() {
        let journal = Journal::default();
        let mut hooks = HookOrchestrator::new();
        hooks
            .register_before(recording::<ClassHookContext>(&journal, "seed"))
            .register_after(recording::<AssemblyHookContext>(&journal, "teardown"))
            .register_before(recording::<TestContext>(&journal, "per-test"));

        let sink = CollectingSink::new();
        let infos = hooks.discover_hooks(&sink);

        let labels: Vec<_> = infos.iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["Before Class: seed", "After Assembly: teardown"]);
        assert_eq!(sink.discovered_hooks().len(), 2);
        assert_eq!(hooks.hook_infos().len(), 3);
        assert!(journal.lock().is_empty());
    }

    #[tokio::test]
    async fn test_class_and_assembly_hook_outcomes_are_reported() {
        let journal = Journal::default();
        let mut hooks = HookOrchestrator::new();
        hooks
            .register_before(recording::<ClassHookContext>(&journal, "seed"))
            .register_after(failing::<ClassHookContext>(&journal, "drop"))
            .register_before(recording::<AssemblyHookContext>(&journal, "boot"))
            .register_before(recording::<TestContext>(&journal, "per-test"))
            .register_before(recording::<SessionContext>(&journal, "session"));
        let sink = Arc::new(CollectingSink::new());
        hooks.report_to(sink.clone());

        let class = class_context("Orders");
        let assembly = Arc::new(AssemblyHookContext {
            assembly_id: "core".to_string(),
            classes: vec!["Orders".to_string()],
            tests: Vec::new(),
        });
        hooks.run_before_assembly(&assembly).await.unwrap();
        hooks.run_before_class(&class).await.unwrap();
        hooks.run_before_test(&test_context("Orders")).await.unwrap();
        hooks.run_before_session(&Arc::new(SessionContext::default())).await.unwrap();
        assert!(hooks.run_after_class(&class).await.is_err());

        let executions = sink.hook_executions();
        let seen: Vec<_> = executions
            .iter()
            .map(|e| format!("{} {} [{}] {}", e.kind, e.name, e.scope_id, e.status))
            .collect();
        assert_eq!(
            seen,
            vec![
                "Before(Assembly) boot [core] PASS",
                "Before(Class) seed [Orders] PASS",
                "After(Class) drop [Orders] FAIL",
            ]
        );
        assert!(executions[2].message.as_deref().unwrap().contains("drop broke"));
        assert_eq!(journal.lock().len(), 5);
    }

    #[tokio::test]
    async fn test_cancelled_class_hook_is_reported_as_cancelled() {
        let journal = Journal::default();
        let mut hooks = HookOrchestrator::new();
        hooks.register_before(recording::<ClassHookContext>(&journal, "seed"));
        let sink = Arc::new(CollectingSink::new());
        hooks.report_to(sink.clone());
        hooks.cancellation().cancel();

        assert!(hooks.run_before_class(&class_context("Orders")).await.is_err());

        let executions = sink.hook_executions();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].status, crate::models::TestStatus::Cancelled);
        assert!(journal.lock().is_empty());
    }

    #[tokio::test]
    async fn test_hooks_run_unreported_without_a_sink() {
        let journal = Journal::default();
        let mut hooks = HookOrchestrator::new();
        hooks.register_before(recording::<ClassHookContext>(&journal, "seed"));
        let sink = Arc::new(CollectingSink::new());

        hooks.run_before_class(&class_context("Orders")).await.unwrap();
        hooks.report_to(sink.clone());
        hooks.run_before_class(&class_context("Billing")).await.unwrap();

        let scopes: Vec<_> = sink.hook_executions().into_iter().map(|e| e.scope_id).collect();
        assert_eq!(scopes, vec!["Billing"]);
        assert_eq!(journal.lock().len(), 2);
    }
}
