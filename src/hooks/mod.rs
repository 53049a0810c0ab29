//! Lifecycle hooks
//!
//! Descriptors, executor strategies, the single-flight cell used for
//! scope-level before chains, and the orchestrator that runs them.

mod cell;
mod descriptor;
mod error;
mod orchestrator;

pub use cell::MemoizedHookCell;
pub use descriptor::{
    DedicatedTaskExecutor, HookBody, HookDescriptor, HookExecutor, HookInfo, InlineExecutor,
};
pub use error::{HookError, HookKind, HookPhase, HookScope};
pub use orchestrator::{HookOrchestrator, HookOutcome, ScopeHooks, ScopedContext};
