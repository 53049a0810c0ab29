//! Run-wide cancellation and timeout composition
//!
//! One [`EngineCancellation`] exists per run. Every hook and test body runs
//! under a child token of it, optionally bounded by a timeout; whichever
//! fires first interrupts the body.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a body did not run to completion
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("was cancelled")]
    Cancelled,
}

/// Process-wide cancellation signal for a single run
#[derive(Clone, Debug, Default)]
pub struct EngineCancellation {
    token: CancellationToken,
}

impl EngineCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a signal that also trips when the host's token is cancelled
    pub fn linked_to(host: &CancellationToken) -> Self {
        Self {
            token: host.child_token(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Run `body` until it completes, `timeout` elapses, or `cancellation` fires.
///
/// The body receives a child token that is cancelled when the timeout wins,
/// so cooperative bodies can unwind; the body future itself is dropped.
pub async fn run_with_timeout<F, Fut, T>(
    cancellation: &CancellationToken,
    timeout: Option<Duration>,
    body: F,
) -> Result<T, Interruption>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = T>,
{
    if cancellation.is_cancelled() {
        return Err(Interruption::Cancelled);
    }

    let token = cancellation.child_token();
    let work = body(token.clone());
    tokio::pin!(work);

    let deadline = async move {
        match timeout {
            Some(limit) => {
                tokio::time::sleep(limit).await;
                limit
            }
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        output = &mut work => Ok(output),
        _ = cancellation.cancelled() => Err(Interruption::Cancelled),
        limit = deadline => {
            token.cancel();
            Err(Interruption::TimedOut(limit))
        }
    }
}
