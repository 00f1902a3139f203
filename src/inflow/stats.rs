//! Lock-free statistics tracking for the inflow pipeline

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Lock-free inflow statistics
#[derive(Debug)]
pub struct InflowStats {
    pub batches_submitted: AtomicUsize,
    pub documents_submitted: AtomicUsize,
    pub documents_converted: AtomicUsize,
    pub documents_failed: AtomicUsize,
    pub entries_written: AtomicUsize,
    pub deletes_written: AtomicUsize,
    pub write_errors: AtomicUsize,
    pub jobs_completed: AtomicUsize,
    pub jobs_failed: AtomicUsize,
    pub jobs_panicked: AtomicUsize,
    started: Instant,
}

impl InflowStats {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            batches_submitted: AtomicUsize::new(0),
            documents_submitted: AtomicUsize::new(0),
            documents_converted: AtomicUsize::new(0),
            documents_failed: AtomicUsize::new(0),
            entries_written: AtomicUsize::new(0),
            deletes_written: AtomicUsize::new(0),
            write_errors: AtomicUsize::new(0),
            jobs_completed: AtomicUsize::new(0),
            jobs_failed: AtomicUsize::new(0),
            jobs_panicked: AtomicUsize::new(0),
            started: Instant::now(),
        }
    }

    #[inline]
    pub(crate) fn add(counter: &AtomicUsize, amount: usize) {
        counter.fetch_add(amount, Ordering::Relaxed);
    }

    /// Get snapshot of current statistics
    #[must_use]
    pub fn snapshot(&self) -> InflowStatsSnapshot {
        InflowStatsSnapshot {
            batches_submitted: self.batches_submitted.load(Ordering::Relaxed),
            documents_submitted: self.documents_submitted.load(Ordering::Relaxed),
            documents_converted: self.documents_converted.load(Ordering::Relaxed),
            documents_failed: self.documents_failed.load(Ordering::Relaxed),
            entries_written: self.entries_written.load(Ordering::Relaxed),
            deletes_written: self.deletes_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_panicked: self.jobs_panicked.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

impl Default for InflowStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable snapshot of inflow statistics
#[derive(Debug, Clone, Serialize)]
pub struct InflowStatsSnapshot {
    pub batches_submitted: usize,
    pub documents_submitted: usize,
    pub documents_converted: usize,
    pub documents_failed: usize,
    pub entries_written: usize,
    pub deletes_written: usize,
    pub write_errors: usize,
    pub jobs_completed: usize,
    pub jobs_failed: usize,
    pub jobs_panicked: usize,
    pub elapsed: Duration,
}

impl InflowStatsSnapshot {
    /// Converted documents per second since the pipeline started
    #[must_use]
    pub fn documents_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.documents_converted as f64 / secs
        } else {
            0.0
        }
    }
}
