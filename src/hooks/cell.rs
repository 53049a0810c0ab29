//! Single-flight memoization for scope-level hook chains
//!
//! The first caller of [`MemoizedHookCell::get_or_run`] starts the
//! computation; every other caller, concurrent or late, awaits the same
//! shared future and observes the same value. The internal lock is held only
//! around state transitions, never while the computation is awaited.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;

enum CellState<T> {
    Idle,
    Running(Shared<BoxFuture<'static, T>>),
    Done(T),
}

/// Runs its computation at most once and hands the result to every caller
pub struct MemoizedHookCell<T> {
    state: Mutex<CellState<T>>,
}

impl<T> MemoizedHookCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CellState::Idle),
        }
    }

    /// Return the memoized value, running `factory` if nobody has yet.
    ///
    /// `factory` is only called by the caller that moves the cell out of idle.
    /// If that caller is dropped mid-way, the next waiter keeps polling the
    /// shared future, so the computation is never restarted.
    pub async fn get_or_run<F, Fut>(&self, factory: F) -> T
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = T> + Send + 'static,
    {
        let shared = {
            let mut state = self.state.lock();
            match &*state {
                CellState::Done(value) => return value.clone(),
                CellState::Running(shared) => shared.clone(),
                CellState::Idle => {
                    let shared = factory().boxed().shared();
                    *state = CellState::Running(shared.clone());
                    shared
                }
            }
        };

        let value = shared.await;

        let mut state = self.state.lock();
        if let CellState::Running(_) = &*state {
            *state = CellState::Done(value.clone());
        }
        value
    }

    /// True once some caller has started the computation
    pub fn is_started(&self) -> bool {
        !matches!(*self.state.lock(), CellState::Idle)
    }

    /// The completed value, if any
    pub fn peek(&self) -> Option<T> {
        match &*self.state.lock() {
            CellState::Done(value) => Some(value.clone()),
            CellState::Running(shared) => shared.peek().cloned(),
            CellState::Idle => None,
        }
    }
}

impl<T> Default for MemoizedHookCell<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MemoizedHookCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.lock() {
            CellState::Idle => "idle",
            CellState::Running(_) => "running",
            CellState::Done(_) => "done",
        };
        f.debug_struct("MemoizedHookCell").field("state", &state).finish()
    }
}
