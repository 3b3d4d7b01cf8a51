//! Bounded resource simulation.
//!
//! Models a fixed-capacity resource such as a database connection pool.
//! Callers beyond capacity queue for a unit instead of failing fast, which
//! reproduces real pool-exhaustion behavior: requests pile up until their
//! own timeout fires.
//!
//! # Invariants
//! - `in_use` never exceeds `capacity`, enforced by the semaphore
//! - every acquired unit is released exactly once, including when the
//!   holding task is cancelled mid-hold (RAII guard)
//! - a caller whose timeout fires while waiting is removed from the queue
//!   and can never be granted a unit afterward

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Result of one acquire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A unit was acquired, held for the requested duration, and released.
    Held { waited: Duration },
    /// The timeout elapsed before a unit became available.
    TimedOut { waited: Duration },
}

impl AcquireOutcome {
    pub fn is_held(&self) -> bool {
        matches!(self, AcquireOutcome::Held { .. })
    }
}

/// A fixed-capacity pool of opaque resource units.
///
/// Capacity is set at construction and never changes. The pool is cheap to
/// clone-share via `Arc`.
#[derive(Debug)]
pub struct ResourcePool {
    capacity: usize,
    permits: Arc<Semaphore>,
    in_use: Arc<AtomicUsize>,
}

/// Ownership token for one acquired unit. Dropping it releases the unit,
/// on the normal path and on cancellation alike.
struct PoolUnit {
    in_use: Arc<AtomicUsize>,
    _permit: OwnedSemaphorePermit,
}

impl PoolUnit {
    fn new(permit: OwnedSemaphorePermit, in_use: Arc<AtomicUsize>) -> Self {
        in_use.fetch_add(1, Ordering::SeqCst);
        Self {
            in_use,
            _permit: permit,
        }
    }
}

impl Drop for PoolUnit {
    fn drop(&mut self) {
        self.in_use.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ResourcePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            in_use: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Units currently held. Sampled value; only guaranteed not to exceed
    /// `capacity`.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::SeqCst)
    }

    /// Acquire a unit, hold it for `hold`, then release it.
    ///
    /// Waits in FIFO order when the pool is exhausted. If `timeout` elapses
    /// first the caller gets [`AcquireOutcome::TimedOut`] and `in_use` is
    /// never incremented on its behalf; dropping the acquire future removes
    /// it from the wait queue, so there is no late grant.
    pub async fn acquire(&self, hold: Duration, timeout: Duration) -> AcquireOutcome {
        let started = Instant::now();

        match tokio::time::timeout(timeout, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => {
                let waited = started.elapsed();
                let unit = PoolUnit::new(permit, self.in_use.clone());
                tokio::time::sleep(hold).await;
                drop(unit);
                AcquireOutcome::Held { waited }
            }
            // The pool owns the semaphore and never closes it; surface a
            // closed semaphore the same way as exhaustion.
            Ok(Err(_)) | Err(_) => AcquireOutcome::TimedOut {
                waited: started.elapsed(),
            },
        }
    }
}
