//! Constraint-key locks
//!
//! One binary lock per constraint key, created on first use. A test holding
//! several keys takes all of them or none: `acquire_all` never waits on a
//! single lock while holding another, so two tests declaring the same keys in
//! any order cannot deadlock. The price is polling: while not every lock is
//! free the manager retries for a short window, then backs off.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::cancel::Interruption;
use crate::models::ConstraintKeySet;

/// Polling cadence for multi-key acquisition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockSettings {
    /// Delay between attempts inside an acquire window
    pub poll_interval: Duration,
    /// How long to keep retrying before backing off
    pub acquire_window: Duration,
    /// Pause after an unsuccessful window
    pub backoff: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            acquire_window: Duration::from_millis(100),
            backoff: Duration::from_millis(500),
        }
    }
}

/// Holds every lock of one key set; dropping it releases them all
#[derive(Debug)]
pub struct KeyLockGuard {
    keys: ConstraintKeySet,
    _permits: Vec<OwnedSemaphorePermit>,
}

impl KeyLockGuard {
    pub fn keys(&self) -> &ConstraintKeySet {
        &self.keys
    }
}

impl Drop for KeyLockGuard {
    fn drop(&mut self) {
        trace!("Released locks {}", self.keys);
    }
}

/// Table of named locks shared by every keyed test of a run
#[derive(Debug, Default)]
pub struct ConstraintLockManager {
    locks: RwLock<HashMap<String, Arc<Semaphore>>>,
    settings: LockSettings,
}

impl ConstraintLockManager {
    pub fn new(settings: LockSettings) -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
            settings,
        }
    }

    pub fn settings(&self) -> LockSettings {
        self.settings
    }

    /// The lock for `key`; concurrent first lookups get the same lock
    pub fn get_or_create(&self, key: &str) -> Arc<Semaphore> {
        if let Some(lock) = self.locks.read().get(key) {
            return lock.clone();
        }
        self.locks
            .write()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    /// Take every lock in `keys`, all or nothing.
    ///
    /// Returns `Interruption::Cancelled` if `cancellation` fires first; no
    /// lock is held in that case.
    pub async fn acquire_all(
        &self,
        keys: &ConstraintKeySet,
        cancellation: &CancellationToken,
    ) -> Result<KeyLockGuard, Interruption> {
        let locks: Vec<Arc<Semaphore>> = keys.iter().map(|key| self.get_or_create(key)).collect();

        loop {
            let window_end = Instant::now() + self.settings.acquire_window;

            loop {
                if cancellation.is_cancelled() {
                    return Err(Interruption::Cancelled);
                }
                if let Some(permits) = try_acquire_every(&locks) {
                    trace!("Acquired locks {}", keys);
                    return Ok(KeyLockGuard {
                        keys: keys.clone(),
                        _permits: permits,
                    });
                }
                if Instant::now() >= window_end {
                    break;
                }
                pause(self.settings.poll_interval, cancellation).await?;
            }

            debug!(
                "Locks {} busy, backing off for {}ms",
                keys,
                self.settings.backoff.as_millis()
            );
            pause(self.settings.backoff, cancellation).await?;
        }
    }
}

fn try_acquire_every(locks: &[Arc<Semaphore>]) -> Option<Vec<OwnedSemaphorePermit>> {
    let mut permits = Vec::with_capacity(locks.len());
    for lock in locks {
        // Permits taken so far are released when `permits` drops.
        permits.push(lock.clone().try_acquire_owned().ok()?);
    }
    Some(permits)
}

async fn pause(delay: Duration, cancellation: &CancellationToken) -> Result<(), Interruption> {
    tokio::select! {
        _ = cancellation.cancelled() => Err(Interruption::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
