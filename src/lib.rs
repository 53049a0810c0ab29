//! testgrid - parallel test execution engine
//!
//! Runs discovered test units with as much parallelism as their constraints
//! allow: free tests run concurrently, tests sharing a constraint key never
//! overlap, and globally exclusive tests run alone once everything else has
//! drained. Lifecycle hooks at five scopes (test, class, assembly, session,
//! discovery) run in declared order, scope-level setup runs exactly once no
//! matter how many tests race for it, and teardown failures are aggregated
//! without masking test outcomes.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use testgrid::config::EngineConfig;
//! use testgrid::executor::TestFilter;
//! use testgrid::framework::{ExecuteRequest, TestFramework};
//! use testgrid::hooks::HookOrchestrator;
//! use testgrid::results::CollectingSink;
//! use testgrid::suite::SuiteFile;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let suite = SuiteFile::load("suite.yaml")?;
//! let mut hooks = HookOrchestrator::new();
//! suite.register_hooks(&mut hooks);
//!
//! let framework = TestFramework::new(hooks, EngineConfig::default());
//! let summary = framework
//!     .execute_request(
//!         &ExecuteRequest::run(TestFilter::All),
//!         &suite,
//!         Arc::new(CollectingSink::new()),
//!     )
//!     .await?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod cli;
pub mod config;
pub mod executor;
pub mod framework;
pub mod hooks;
pub mod models;
pub mod output;
pub mod results;
pub mod suite;
pub mod utils;
