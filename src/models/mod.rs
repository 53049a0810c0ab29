//! Data models for the execution engine
//!
//! Test units as they arrive from discovery, the per-scope contexts handed to
//! hooks, and the terminal results reported for every test.

mod context;
mod test_result;
mod test_unit;

pub use context::{
    AssemblyHookContext, ClassHookContext, DiscoveryContext, SessionContext, TestContext,
};
pub use test_result::{FailedInitialization, HookExecution, RunSummary, TestResult, TestStatus};
pub use test_unit::{ConcurrencyMode, ConstraintKeySet, TestBody, TestInfo, TestState, TestUnit};
