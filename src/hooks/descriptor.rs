//! Hook descriptors and executor strategies

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::error::HookKind;

/// Body of a hook: receives the scope context and a cancellation token
pub type HookBody<C> =
    Arc<dyn Fn(Arc<C>, CancellationToken) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Strategy a hook body is run through.
///
/// Executors wrap the body future; they decide where and how it is polled,
/// not whether it counts as a failure.
pub trait HookExecutor: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn execute(
        &self,
        hook: &HookInfo,
        body: BoxFuture<'static, anyhow::Result<()>>,
    ) -> BoxFuture<'static, anyhow::Result<()>>;
}

/// Polls the body on the calling task
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl HookExecutor for InlineExecutor {
    fn name(&self) -> &'static str {
        "inline"
    }

    fn execute(
        &self,
        _hook: &HookInfo,
        body: BoxFuture<'static, anyhow::Result<()>>,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        body
    }
}

/// Runs the body on its own tokio task
#[derive(Debug, Default, Clone, Copy)]
pub struct DedicatedTaskExecutor;

impl HookExecutor for DedicatedTaskExecutor {
    fn name(&self) -> &'static str {
        "dedicated-task"
    }

    fn execute(
        &self,
        hook: &HookInfo,
        body: BoxFuture<'static, anyhow::Result<()>>,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        let name = hook.name.clone();
        let handle = tokio::spawn(body);

        // Aborts the task if the caller stops waiting (timeout, cancellation).
        let guard = AbortOnDrop(handle.abort_handle());

        async move {
            let joined = handle.await;
            drop(guard);
            match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(anyhow::anyhow!("hook task '{name}' panicked")),
                Err(e) => Err(anyhow::anyhow!("hook task '{name}' did not complete: {e}")),
            }
        }
        .boxed()
    }
}

struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Reporting view of a registered hook
#[derive(Clone, Debug, Serialize)]
pub struct HookInfo {
    pub name: String,
    pub kind: HookKind,
    pub order: i32,
    pub timeout_ms: Option<u64>,
    pub scope_id: Option<String>,
    pub executor: &'static str,
}

impl fmt::Display for HookInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.kind.phase_label(), self.kind.scope.name(), self.name)?;
        if let Some(scope) = &self.scope_id {
            write!(f, " [{scope}]")?;
        }
        Ok(())
    }
}

/// A registered hook: name, declared order, optional timeout, executor, body
pub struct HookDescriptor<C> {
    name: String,
    order: i32,
    timeout: Option<Duration>,
    scope_id: Option<String>,
    executor: Arc<dyn HookExecutor>,
    body: HookBody<C>,
}

impl<C: Send + Sync + 'static> HookDescriptor<C> {
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Arc<C>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            order: 0,
            timeout: None,
            scope_id: None,
            executor: Arc::new(InlineExecutor),
            body: Arc::new(move |context, token| body(context, token).boxed()),
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn HookExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Restrict the hook to one scope instance: a class id for test and class
    /// hooks, an assembly id for assembly hooks. Unrestricted hooks apply to
    /// every instance.
    pub fn for_scope(mut self, scope_id: impl Into<String>) -> Self {
        self.scope_id = Some(scope_id.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn applies_to(&self, scope_id: &str) -> bool {
        self.scope_id.as_deref().map_or(true, |id| id == scope_id)
    }

    pub fn info(&self, kind: HookKind) -> HookInfo {
        HookInfo {
            name: self.name.clone(),
            kind,
            order: self.order,
            timeout_ms: self.timeout.map(|t| t.as_millis() as u64),
            scope_id: self.scope_id.clone(),
            executor: self.executor.name(),
        }
    }

    pub(crate) fn invoke(
        &self,
        info: &HookInfo,
        context: Arc<C>,
        token: CancellationToken,
    ) -> BoxFuture<'static, anyhow::Result<()>> {
        self.executor.execute(info, (self.body)(context, token))
    }
}

impl<C> Clone for HookDescriptor<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            order: self.order,
            timeout: self.timeout,
            scope_id: self.scope_id.clone(),
            executor: Arc::clone(&self.executor),
            body: Arc::clone(&self.body),
        }
    }
}

impl<C> fmt::Debug for HookDescriptor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDescriptor")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("timeout", &self.timeout)
            .field("scope_id", &self.scope_id)
            .field("executor", &self.executor.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClassHookContext;

    fn ok_hook(name: &str) -> HookDescriptor<ClassHookContext> {
        HookDescriptor::new(name, |_, _| async { Ok(()) })
    }

    #[test]
    fn test_descriptor_defaults() {
        let hook = ok_hook("seed");
        assert_eq!(hook.name(), "seed");
        assert_eq!(hook.order(), 0);
        assert!(hook.timeout().is_none());
        assert!(hook.applies_to("AnyClass"));
    }

    #[test]
    fn test_scope_restriction() {
        let hook = ok_hook("seed").for_scope("Orders");
        assert!(hook.applies_to("Orders"));
        assert!(!hook.applies_to("Billing"));
    }

    #[test]
    fn test_info_display() {
        let info = ok_hook("seed")
            .with_order(2)
            .with_timeout(Duration::from_secs(1))
            .for_scope("Orders")
            .info(HookKind::BEFORE_CLASS);
        assert_eq!(info.to_string(), "Before Class: seed [Orders]");
        assert_eq!(info.timeout_ms, Some(1000));
        assert_eq!(info.executor, "inline");
    }

    #[tokio::test]
    async fn test_dedicated_executor_runs_body() {
        let hook = ok_hook("spawned").with_executor(Arc::new(DedicatedTaskExecutor));
        let info = hook.info(HookKind::BEFORE_CLASS);
        assert_eq!(info.executor, "dedicated-task");

        let result = hook
            .invoke(&info, Arc::new(ClassHookContext::default()), CancellationToken::new())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_dedicated_executor_reports_panic() {
        let hook: HookDescriptor<ClassHookContext> = HookDescriptor::new("explodes", |_, _| async {
            if true {
                panic!("boom");
            }
            Ok(())
        })
        .with_executor(Arc::new(DedicatedTaskExecutor));
        let info = hook.info(HookKind::AFTER_CLASS);

        let err = hook
            .invoke(&info, Arc::new(ClassHookContext::default()), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "hook task 'explodes' panicked");
    }
}
