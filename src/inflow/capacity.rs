//! Admission control for the job scheduler
//!
//! Producers `allocate` the cost of the work they submit and may block there;
//! workers `free` it once the job ran, whatever its outcome. Follow-up jobs
//! scheduled from inside a running job are `charge`d instead, which never
//! blocks, so a full gate cannot stall the workers that would drain it.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub trait InflowCapacity: Send + Sync + fmt::Debug {
    /// Account for `cost`, blocking while the gate is full
    fn allocate(&self, cost: u64);

    /// Account for `cost` without blocking
    fn charge(&self, cost: u64);

    /// Release cost previously allocated or charged
    fn free(&self, cost: u64);

    /// Cost currently accounted for
    fn outstanding(&self) -> u64;
}

/// Admits everything; only tracks outstanding cost
#[derive(Debug, Default)]
pub struct UnboundedCapacity {
    outstanding: AtomicU64,
}

impl UnboundedCapacity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl InflowCapacity for UnboundedCapacity {
    fn allocate(&self, cost: u64) {
        self.outstanding.fetch_add(cost, Ordering::AcqRel);
    }

    fn charge(&self, cost: u64) {
        self.outstanding.fetch_add(cost, Ordering::AcqRel);
    }

    fn free(&self, cost: u64) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_sub(cost))
            });
    }

    fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }
}

/// Blocks producers while outstanding cost would exceed `ceiling`
///
/// A request larger than the ceiling is admitted once nothing else is
/// outstanding, so oversized batches run alone instead of never running.
pub struct BoundedCapacity {
    ceiling: u64,
    outstanding: Mutex<u64>,
    released: Condvar,
}

impl fmt::Debug for BoundedCapacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCapacity")
            .field("ceiling", &self.ceiling)
            .field("outstanding", &*self.outstanding.lock())
            .finish()
    }
}

impl BoundedCapacity {
    #[must_use]
    pub fn new(ceiling: u64) -> Self {
        Self {
            ceiling: ceiling.max(1),
            outstanding: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    #[must_use]
    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    #[inline]
    fn admits(&self, outstanding: u64, cost: u64) -> bool {
        outstanding == 0 || outstanding.saturating_add(cost) <= self.ceiling
    }

    /// Non-blocking variant of `allocate`; true if admitted
    pub fn try_allocate(&self, cost: u64) -> bool {
        let mut outstanding = self.outstanding.lock();
        if self.admits(*outstanding, cost) {
            *outstanding += cost;
            true
        } else {
            false
        }
    }

    /// `allocate` with a deadline; true if admitted
    pub fn allocate_timeout(&self, cost: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut outstanding = self.outstanding.lock();
        while !self.admits(*outstanding, cost) {
            if self.released.wait_until(&mut outstanding, deadline).timed_out()
                && !self.admits(*outstanding, cost)
            {
                return false;
            }
        }
        *outstanding += cost;
        true
    }
}

impl InflowCapacity for BoundedCapacity {
    fn allocate(&self, cost: u64) {
        let mut outstanding = self.outstanding.lock();
        if !self.admits(*outstanding, cost) {
            tracing::debug!(
                cost,
                outstanding = *outstanding,
                ceiling = self.ceiling,
                "Inflow capacity exhausted, waiting"
            );
        }
        while !self.admits(*outstanding, cost) {
            self.released.wait(&mut outstanding);
        }
        *outstanding += cost;
    }

    fn charge(&self, cost: u64) {
        *self.outstanding.lock() += cost;
    }

    fn free(&self, cost: u64) {
        let mut outstanding = self.outstanding.lock();
        debug_assert!(*outstanding >= cost, "freed more inflow cost than allocated");
        *outstanding = outstanding.saturating_sub(cost);
        self.released.notify_all();
    }

    fn outstanding(&self) -> u64 {
        *self.outstanding.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn unbounded_tracks_without_blocking() {
        let capacity = UnboundedCapacity::new();
        capacity.allocate(u64::MAX / 2);
        capacity.charge(10);
        capacity.free(10);
        capacity.free(u64::MAX / 2);
        assert_eq!(capacity.outstanding(), 0);
    }

    #[test]
    fn bounded_blocks_until_freed() {
        let capacity = Arc::new(BoundedCapacity::new(10));
        capacity.allocate(8);
        assert!(!capacity.try_allocate(5));

        let producer = {
            let capacity = Arc::clone(&capacity);
            std::thread::spawn(move || capacity.allocate(5))
        };
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(capacity.outstanding(), 8);

        capacity.free(8);
        producer.join().expect("producer");
        assert_eq!(capacity.outstanding(), 5);
    }

    #[test]
    fn oversized_request_runs_alone() {
        let capacity = BoundedCapacity::new(4);
        assert!(capacity.try_allocate(100));
        assert!(!capacity.allocate_timeout(1, Duration::from_millis(10)));
        capacity.free(100);
        assert!(capacity.allocate_timeout(1, Duration::from_millis(10)));
    }

    #[test]
    fn charge_ignores_the_ceiling() {
        let capacity = BoundedCapacity::new(2);
        capacity.allocate(2);
        capacity.charge(5);
        assert_eq!(capacity.outstanding(), 7);
        capacity.free(7);
        assert_eq!(capacity.outstanding(), 0);
    }
}
