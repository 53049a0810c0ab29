//! Suite files
//!
//! A suite file declares simulated tests and hooks in YAML or JSON so the
//! engine can be driven end to end from the command line. Test bodies sleep
//! for their declared duration and then pass, fail or panic as declared.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::file::is_yaml_file;
use crate::framework::{DiscoveryResult, TestDiscoverer};
use crate::hooks::{
    DedicatedTaskExecutor, HookDescriptor, HookOrchestrator, HookPhase, HookScope, ScopedContext,
};
use crate::models::{
    AssemblyHookContext, ClassHookContext, ConcurrencyMode, DiscoveryContext,
    FailedInitialization, SessionContext, TestContext, TestUnit,
};

/// Concurrency mode as written in a suite file
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteMode {
    #[default]
    Parallel,
    NotInParallel,
}

/// Executor a suite hook runs through
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuiteExecutor {
    #[default]
    Inline,
    DedicatedTask,
}

/// Behaviour shared by simulated test and hook bodies
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Behaviour {
    /// How long the body runs
    #[serde(default)]
    pub duration_ms: u64,

    /// Fail with this message after running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<String>,

    /// Panic instead of returning
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub panic: bool,
}

impl Behaviour {
    async fn run(self, token: CancellationToken) -> Result<()> {
        if self.duration_ms > 0 {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(self.duration_ms)) => {}
                _ = token.cancelled() => anyhow::bail!("interrupted"),
            }
        }
        if self.panic {
            panic!("simulated panic");
        }
        match self.fail {
            Some(message) => Err(anyhow::anyhow!(message)),
            None => Ok(()),
        }
    }
}

/// A simulated test
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Class scope; defaults to the id up to its last `::`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly: Option<String>,

    #[serde(default)]
    pub order: i32,

    #[serde(default)]
    pub mode: SuiteMode,

    /// Constraint keys for `not_in_parallel`; none means globally exclusive
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Report the test as failed to initialize instead of running it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_error: Option<String>,

    #[serde(flatten)]
    pub behaviour: Behaviour,
}

impl TestSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            class: None,
            assembly: None,
            order: 0,
            mode: SuiteMode::Parallel,
            keys: Vec::new(),
            timeout_ms: None,
            init_error: None,
            behaviour: Behaviour::default(),
        }
    }

    fn concurrency_mode(&self) -> ConcurrencyMode {
        match self.mode {
            SuiteMode::Parallel => ConcurrencyMode::Parallel,
            SuiteMode::NotInParallel => ConcurrencyMode::not_in_parallel(self.keys.iter().cloned()),
        }
    }

    fn build(&self) -> TestUnit {
        let behaviour = self.behaviour.clone();
        let mut unit = TestUnit::new(self.id.clone(), move |_: Arc<TestContext>, token| {
            behaviour.clone().run(token)
        })
        .with_order(self.order)
        .with_mode(self.concurrency_mode());

        if let Some(name) = &self.display_name {
            unit = unit.with_display_name(name.clone());
        }
        if let Some(class) = &self.class {
            unit = unit.in_class(class.clone());
        }
        if let Some(assembly) = &self.assembly {
            unit = unit.in_assembly(assembly.clone());
        }
        if let Some(ms) = self.timeout_ms {
            unit = unit.with_timeout(Duration::from_millis(ms));
        }
        unit
    }
}

/// A simulated hook
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HookSpec {
    pub name: String,
    pub scope: HookScope,
    pub phase: HookPhase,

    #[serde(default)]
    pub order: i32,

    /// Only run for this class or assembly id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default)]
    pub executor: SuiteExecutor,

    #[serde(flatten)]
    pub behaviour: Behaviour,
}

impl HookSpec {
    fn descriptor<C: Send + Sync + 'static>(&self) -> HookDescriptor<C> {
        let behaviour = self.behaviour.clone();
        let mut hook = HookDescriptor::new(self.name.clone(), move |_: Arc<C>, token| {
            behaviour.clone().run(token)
        })
        .with_order(self.order);

        if let Some(ms) = self.timeout_ms {
            hook = hook.with_timeout(Duration::from_millis(ms));
        }
        if let Some(target) = &self.target {
            hook = hook.for_scope(target.clone());
        }
        if self.executor == SuiteExecutor::DedicatedTask {
            hook = hook.with_executor(Arc::new(DedicatedTaskExecutor));
        }
        hook
    }

    fn register_as<C: ScopedContext>(&self, hooks: &mut HookOrchestrator) {
        let descriptor = self.descriptor::<C>();
        match self.phase {
            HookPhase::Before => hooks.register_before(descriptor),
            HookPhase::After => hooks.register_after(descriptor),
        };
    }
}

/// Suite file structure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuiteFile {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub tests: Vec<TestSpec>,

    #[serde(default)]
    pub hooks: Vec<HookSpec>,
}

fn default_name() -> String {
    "suite".to_string()
}

impl SuiteFile {
    /// Load and validate a suite from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read suite file: {}", path.display()))?;

        let suite: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML suite: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON suite: {}", path.display()))?
        };

        suite.validate()?;
        info!(
            "Loaded suite '{}': {} tests, {} hooks",
            suite.name,
            suite.tests.len(),
            suite.hooks.len()
        );
        Ok(suite)
    }

    /// Save the suite to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize suite")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize suite")?
        };
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write suite file: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for test in &self.tests {
            if test.id.trim().is_empty() {
                anyhow::bail!("Test with empty id in suite '{}'", self.name);
            }
            if !seen.insert(test.id.as_str()) {
                anyhow::bail!("Duplicate test id '{}' in suite '{}'", test.id, self.name);
            }
            if test.mode == SuiteMode::Parallel && !test.keys.is_empty() {
                anyhow::bail!(
                    "Test '{}' declares keys but is not marked not_in_parallel",
                    test.id
                );
            }
            if test.keys.iter().any(|k| k.trim().is_empty()) {
                anyhow::bail!("Test '{}' declares an empty constraint key", test.id);
            }
        }

        for hook in &self.hooks {
            if hook.name.trim().is_empty() {
                anyhow::bail!("Hook with empty name in suite '{}'", self.name);
            }
            if hook.target.is_some()
                && matches!(hook.scope, HookScope::Session | HookScope::Discovery)
            {
                anyhow::bail!(
                    "Hook '{}' targets a scope id, but {} hooks are run-wide",
                    hook.name,
                    hook.scope.name()
                );
            }
        }
        Ok(())
    }

    /// Register every declared hook with `hooks`
    pub fn register_hooks(&self, hooks: &mut HookOrchestrator) {
        for spec in &self.hooks {
            debug!("Registering suite hook '{}'", spec.name);
            match spec.scope {
                HookScope::Test => spec.register_as::<TestContext>(hooks),
                HookScope::Class => spec.register_as::<ClassHookContext>(hooks),
                HookScope::Assembly => spec.register_as::<AssemblyHookContext>(hooks),
                HookScope::Session => spec.register_as::<SessionContext>(hooks),
                HookScope::Discovery => spec.register_as::<DiscoveryContext>(hooks),
            }
        }
    }

    /// Example suite exercising every scheduling class
    pub fn example() -> Self {
        let mut tests: Vec<TestSpec> = (1..=5)
            .map(|i| TestSpec {
                behaviour: Behaviour {
                    duration_ms: 50 * i,
                    ..Default::default()
                },
                ..TestSpec::new(format!("Api::request_{i}"))
            })
            .collect();

        tests.push(TestSpec {
            mode: SuiteMode::NotInParallel,
            behaviour: Behaviour {
                duration_ms: 100,
                ..Default::default()
            },
            ..TestSpec::new("Maintenance::rebuild_indexes")
        });

        for (order, name) in [(1, "migrate"), (2, "query")] {
            tests.push(TestSpec {
                order,
                mode: SuiteMode::NotInParallel,
                keys: vec!["db".to_string()],
                behaviour: Behaviour {
                    duration_ms: 80,
                    ..Default::default()
                },
                ..TestSpec::new(format!("Database::{name}"))
            });
        }

        let hook = |name: &str, scope: HookScope, phase: HookPhase| HookSpec {
            name: name.to_string(),
            scope,
            phase,
            order: 0,
            target: None,
            timeout_ms: Some(5_000),
            executor: SuiteExecutor::Inline,
            behaviour: Behaviour {
                duration_ms: 10,
                ..Default::default()
            },
        };

        Self {
            name: "example".to_string(),
            tests,
            hooks: vec![
                hook("start_services", HookScope::Session, HookPhase::Before),
                hook("stop_services", HookScope::Session, HookPhase::After),
                HookSpec {
                    target: Some("Database".to_string()),
                    ..hook("seed_database", HookScope::Class, HookPhase::Before)
                },
                HookSpec {
                    target: Some("Database".to_string()),
                    executor: SuiteExecutor::DedicatedTask,
                    ..hook("drop_database", HookScope::Class, HookPhase::After)
                },
            ],
        }
    }
}

impl TestDiscoverer for SuiteFile {
    fn discover(&self, _context: &DiscoveryContext) -> Result<DiscoveryResult> {
        let mut result = DiscoveryResult::default();
        for spec in &self.tests {
            match &spec.init_error {
                Some(error) => {
                    let mut failed = FailedInitialization::new(spec.id.clone(), error.clone());
                    if let Some(name) = &spec.display_name {
                        failed.display_name = name.clone();
                    }
                    result.failed_to_initialize.push(failed);
                }
                None => result.tests.push(Arc::new(spec.build())),
            }
        }
        debug!(
            "Discovered {} tests in suite '{}'",
            result.tests.len(),
            self.name
        );
        Ok(result)
    }
}
