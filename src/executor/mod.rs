//! Test execution engine
//!
//! Partitions tests by concurrency mode, runs them under a shared
//! concurrency limit with keyed mutual exclusion, and drives each test
//! through its lifecycle hooks.

mod filter;
mod grouper;
mod locks;
mod runner;
mod scheduler;
mod scope;

pub use filter::TestFilter;
pub use grouper::{GroupedTests, KeyedGroup};
pub use locks::{ConstraintLockManager, KeyLockGuard, LockSettings};
pub use runner::SingleTestExecutor;
pub use scheduler::{ExecuteRequestContext, ExecutionStats, TestsExecutor};
pub use scope::{CompletedScopes, ScopeTracker};
