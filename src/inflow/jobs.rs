//! Convert and write jobs
//!
//! A submitted batch becomes a [`ConvertJob`] that materializes its documents
//! and hands the entries to a [`WriteJob`], which marks the batch's slot ready
//! and drains the inflow queue.

use serde_json::Value;
use std::sync::Arc;

use super::queue::InflowQueue;
use super::scheduler::{Job, JobContext, Priority};
use super::slot::ReservedSlot;
use super::stats::InflowStats;
use crate::document::{DocumentEntry, DocumentMaterializer};
use crate::errors::IndexResult;

/// A slot owed a `ready` call
///
/// Dropping it unfulfilled, because a job panicked or was discarded, readies
/// the slot with no entries so later slots are not stuck behind it.
pub(crate) struct PendingSlot {
    slot: Option<ReservedSlot<DocumentEntry>>,
    queue: Arc<InflowQueue<DocumentEntry>>,
}

impl PendingSlot {
    pub(crate) fn new(
        slot: ReservedSlot<DocumentEntry>,
        queue: Arc<InflowQueue<DocumentEntry>>,
    ) -> Self {
        Self {
            slot: Some(slot),
            queue,
        }
    }

    fn fulfil(&mut self, entries: Vec<DocumentEntry>) -> usize {
        match self.slot.take() {
            Some(slot) => {
                slot.ready(entries);
                self.queue.drain()
            }
            None => 0,
        }
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        if let Some(slot) = &self.slot {
            tracing::warn!(
                sequence = slot.sequence(),
                "Releasing slot without entries"
            );
            self.fulfil(Vec::new());
        }
    }
}

/// Materializes one submitted batch
pub struct ConvertJob {
    documents: Vec<Value>,
    slot: PendingSlot,
    materializer: Arc<DocumentMaterializer>,
    stats: Arc<InflowStats>,
}

impl ConvertJob {
    pub(crate) fn new(
        documents: Vec<Value>,
        slot: PendingSlot,
        materializer: Arc<DocumentMaterializer>,
        stats: Arc<InflowStats>,
    ) -> Self {
        Self {
            documents,
            slot,
            materializer,
            stats,
        }
    }

    /// Admission cost of a batch: its size, at least 1
    #[must_use]
    pub fn cost_of(batch_len: usize) -> u64 {
        (batch_len as u64).max(1)
    }
}

impl Job for ConvertJob {
    fn name(&self) -> &'static str {
        "convert"
    }

    fn cost(&self) -> u64 {
        Self::cost_of(self.documents.len())
    }

    fn execute(self: Box<Self>, ctx: &JobContext<'_>) -> IndexResult<()> {
        let ConvertJob {
            documents,
            slot,
            materializer,
            stats,
        } = *self;

        let submitted = documents.len();
        let entries = materializer.create_batch(documents).collect_all();
        let converted = entries.len();

        InflowStats::add(&stats.documents_converted, converted);
        InflowStats::add(&stats.documents_failed, submitted - converted);
        tracing::debug!(
            worker = ctx.worker(),
            submitted,
            converted,
            "Batch converted"
        );

        ctx.schedule(Box::new(WriteJob { slot, entries }), Priority::Highest)
    }
}

/// Hands converted entries to their slot and drains the queue
pub struct WriteJob {
    slot: PendingSlot,
    entries: Vec<DocumentEntry>,
}

impl Job for WriteJob {
    fn name(&self) -> &'static str {
        "write"
    }

    fn execute(self: Box<Self>, ctx: &JobContext<'_>) -> IndexResult<()> {
        let WriteJob { mut slot, entries } = *self;
        let completed = slot.fulfil(entries);
        tracing::trace!(worker = ctx.worker(), completed, "Slot ready");
        Ok(())
    }
}
