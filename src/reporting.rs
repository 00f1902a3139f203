//! Error side channel for fire-and-forget ingestion
//!
//! Submissions succeed as soon as their slot is reserved, so per-document
//! failures, failed jobs and writer errors surface here instead.
//!
//! Uses lock-free data structures so reporting never contends with the
//! conversion threads:
//! - `SegQueue` for error storage (lock-free concurrent push)
//! - `DashMap` for per-category counts
//! - `AtomicUsize` for overflow tracking

use crossbeam_queue::SegQueue;
use dashmap::DashMap;
use imstr::ImString;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::IndexError;

/// Default bound on retained error records
pub const DEFAULT_MAX_ERRORS: usize = 1000;

/// Hook invoked synchronously for every reported error
pub type ErrorHook = Arc<dyn Fn(&str, &IndexError) + Send + Sync>;

/// A retained error record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// What failed: a document position, identity or job name
    pub source: ImString,
    pub category: &'static str,
    pub message: ImString,
}

/// Collects errors reported by materializers, jobs and writers
pub struct ErrorCollector {
    errors: SegQueue<ErrorRecord>,
    max_errors: usize,
    total: AtomicUsize,
    overflow_count: AtomicUsize,
    error_counts: DashMap<&'static str, AtomicUsize>,
    hook: Option<ErrorHook>,
}

impl std::fmt::Debug for ErrorCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorCollector")
            .field("total", &self.total.load(Ordering::Relaxed))
            .field("retained", &self.errors.len())
            .field("max_errors", &self.max_errors)
            .finish()
    }
}

impl Default for ErrorCollector {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ERRORS)
    }
}

impl ErrorCollector {
    #[inline]
    #[must_use]
    pub fn new(max_errors: usize) -> Self {
        Self {
            errors: SegQueue::new(),
            max_errors,
            total: AtomicUsize::new(0),
            overflow_count: AtomicUsize::new(0),
            error_counts: DashMap::new(),
            hook: None,
        }
    }

    /// Attach a hook called for every report, in addition to retention
    #[must_use]
    pub fn with_hook(mut self, hook: ErrorHook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn report(&self, source: impl Into<ImString>, error: &IndexError) {
        let source = source.into();
        let category = error.category();

        if error.is_per_item() {
            tracing::warn!(source = %source, category, error = %error, "Document skipped");
        } else {
            tracing::error!(source = %source, category, error = %error, "Inflow error");
        }

        if let Some(hook) = &self.hook {
            hook(source.as_str(), error);
        }

        self.total.fetch_add(1, Ordering::Relaxed);
        self.error_counts
            .entry(category)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);

        if self.errors.len() >= self.max_errors {
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.errors.push(ErrorRecord {
                source,
                category,
                message: ImString::from(error.to_string()),
            });
        }
    }

    /// Total number of errors ever reported
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of errors reported for one category
    #[must_use]
    pub fn count(&self, category: &str) -> usize {
        self.error_counts
            .get(category)
            .map_or(0, |count| count.load(Ordering::Relaxed))
    }

    /// Errors that were not retained because the bound was reached
    #[must_use]
    pub fn overflow(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }

    /// Per-category totals, sorted by category
    #[must_use]
    pub fn counts(&self) -> Vec<(&'static str, usize)> {
        let mut counts: Vec<_> = self
            .error_counts
            .iter()
            .map(|entry| (*entry.key(), entry.value().load(Ordering::Relaxed)))
            .collect();
        counts.sort_unstable();
        counts
    }

    /// Copy of the retained records
    ///
    /// Atomic per record, not per snapshot: errors reported while the
    /// snapshot is taken may or may not be included.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ErrorRecord> {
        let mut records = Vec::with_capacity(self.errors.len());
        while let Some(record) = self.errors.pop() {
            records.push(record);
        }
        for record in &records {
            self.errors.push(record.clone());
        }
        records
    }
}
