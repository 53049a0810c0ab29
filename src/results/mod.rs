//! Result reporting
//!
//! Provides the sink that terminal test outcomes, discovery listings,
//! class and assembly hook outcomes and scope-level hook failures are
//! published to.

mod sink;

pub use sink::{hook_execution, CollectingSink, ResultSink};
