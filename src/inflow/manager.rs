//! The inflow pipeline, assembled
//!
//! `InflowManager` owns the queue, scheduler and worker pool for one index.
//! Submissions return as soon as their slot is reserved; conversion happens
//! on the pool and writes reach the index writer in submission order.

use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::capacity::{BoundedCapacity, InflowCapacity, UnboundedCapacity};
use super::jobs::{ConvertJob, PendingSlot};
use super::pool::WorkerPool;
use super::queue::InflowQueue;
use super::scheduler::Scheduler;
use super::slot::ReservedSlot;
use super::stats::InflowStats;
use crate::config::IndexConfig;
use crate::document::{DocumentEntry, DocumentMaterializer, IdentityTerm};
use crate::errors::{IndexError, IndexResult};
use crate::index::IndexWriter;
use crate::reporting::{ErrorCollector, ErrorHook};
use crate::schema::SchemaTracker;

pub struct InflowManager {
    config: IndexConfig,
    writer: Arc<dyn IndexWriter>,
    materializer: Arc<DocumentMaterializer>,
    errors: Arc<ErrorCollector>,
    stats: Arc<InflowStats>,
    queue: Arc<InflowQueue<DocumentEntry>>,
    scheduler: Arc<Scheduler>,
    pool: WorkerPool,
    stopped: AtomicBool,
}

impl std::fmt::Debug for InflowManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InflowManager")
            .field("queue", &self.queue)
            .field("pool", &self.pool)
            .field("stopped", &self.stopped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl InflowManager {
    /// Build the pipeline for `config` and start its workers
    pub fn start(config: IndexConfig, writer: Arc<dyn IndexWriter>) -> IndexResult<Self> {
        let errors = ErrorCollector::new(config.max_errors());
        Self::start_with_errors(config, writer, errors)
    }

    /// Like [`start`](Self::start), calling `hook` for every reported error
    pub fn start_with_hook(
        config: IndexConfig,
        writer: Arc<dyn IndexWriter>,
        hook: ErrorHook,
    ) -> IndexResult<Self> {
        let errors = ErrorCollector::new(config.max_errors()).with_hook(hook);
        Self::start_with_errors(config, writer, errors)
    }

    fn start_with_errors(
        config: IndexConfig,
        writer: Arc<dyn IndexWriter>,
        errors: ErrorCollector,
    ) -> IndexResult<Self> {
        config.validate()?;

        let errors = Arc::new(errors);
        let stats = Arc::new(InflowStats::new());
        let schema = Arc::new(SchemaTracker::new());
        let materializer = Arc::new(DocumentMaterializer::new(
            Arc::new(config.field_resolver()),
            config.strategy_registry(),
            config.classify_options(),
            schema,
            Arc::clone(&errors),
        ));

        let capacity: Arc<dyn InflowCapacity> = match config.max_inflight_cost() {
            Some(ceiling) => Arc::new(BoundedCapacity::new(ceiling)),
            None => Arc::new(UnboundedCapacity::new()),
        };
        let scheduler = Arc::new(Scheduler::new(capacity));
        let pool = WorkerPool::start(
            config.worker_count(),
            Arc::clone(&scheduler),
            Arc::clone(&errors),
            Arc::clone(&stats),
        )?;

        tracing::info!(
            workers = pool.size(),
            max_inflight_cost = ?config.max_inflight_cost(),
            convert_priority = %config.convert_priority(),
            "Inflow pipeline started"
        );

        Ok(Self {
            config,
            writer,
            materializer,
            errors,
            stats,
            queue: Arc::new(InflowQueue::new()),
            scheduler,
            pool,
            stopped: AtomicBool::new(false),
        })
    }

    /// Submit a batch whose entries are upserted into the index writer
    ///
    /// Returns once the batch has its place in commit order; conversion and
    /// writing happen in the background. Per-document failures are reported
    /// to [`errors`](Self::errors), never returned here. Blocks only when a
    /// bounded capacity gate is full.
    pub fn submit(&self, documents: Vec<Value>) -> IndexResult<ReservedSlot<DocumentEntry>> {
        let writer = Arc::clone(&self.writer);
        let errors = Arc::clone(&self.errors);
        let stats = Arc::clone(&self.stats);

        self.submit_with(documents, move |entries| {
            for entry in &entries {
                match writer.upsert(entry) {
                    Ok(()) => InflowStats::add(&stats.entries_written, 1),
                    Err(e) => {
                        InflowStats::add(&stats.write_errors, 1);
                        errors.report(
                            entry.identity().to_string(),
                            &IndexError::WriterFailed {
                                identity: entry.identity().to_string(),
                                message: e.to_string(),
                            },
                        );
                    }
                }
            }
        })
    }

    /// Submit a batch with a custom write action
    ///
    /// The action runs on the draining thread, after every earlier slot's
    /// action, and should hand off anything slow.
    pub fn submit_with(
        &self,
        documents: Vec<Value>,
        write_action: impl FnOnce(Vec<DocumentEntry>) + Send + 'static,
    ) -> IndexResult<ReservedSlot<DocumentEntry>> {
        self.ensure_running()?;

        let batch_len = documents.len();
        let cost = ConvertJob::cost_of(batch_len);
        self.scheduler.capacity().allocate(cost);

        let slot = self.queue.reserve(write_action);
        InflowStats::add(&self.stats.batches_submitted, 1);
        InflowStats::add(&self.stats.documents_submitted, batch_len);

        let job = ConvertJob::new(
            documents,
            PendingSlot::new(slot.clone(), Arc::clone(&self.queue)),
            Arc::clone(&self.materializer),
            Arc::clone(&self.stats),
        );
        self.scheduler
            .enqueue_admitted(Box::new(job), cost, self.config.convert_priority())?;

        tracing::debug!(sequence = slot.sequence(), documents = batch_len, "Batch submitted");
        Ok(slot)
    }

    /// Delete documents, ordered with respect to earlier and later submissions
    pub fn delete(&self, identities: Vec<IdentityTerm>) -> IndexResult<ReservedSlot<DocumentEntry>> {
        self.ensure_running()?;

        let writer = Arc::clone(&self.writer);
        let errors = Arc::clone(&self.errors);
        let stats = Arc::clone(&self.stats);
        let count = identities.len();

        let slot = self.queue.reserve(move |_entries| {
            for identity in &identities {
                match writer.delete(identity) {
                    Ok(()) => InflowStats::add(&stats.deletes_written, 1),
                    Err(e) => {
                        InflowStats::add(&stats.write_errors, 1);
                        errors.report(
                            identity.to_string(),
                            &IndexError::WriterFailed {
                                identity: identity.to_string(),
                                message: e.to_string(),
                            },
                        );
                    }
                }
            }
        });
        slot.ready(Vec::new());
        self.queue.drain();

        tracing::debug!(sequence = slot.sequence(), identities = count, "Delete submitted");
        Ok(slot)
    }

    /// Wait until every reserved slot completed, then commit
    pub fn flush(&self) -> IndexResult<()> {
        self.queue.wait_idle();
        self.writer.commit()
    }

    /// Finish outstanding work, stop the workers and commit
    ///
    /// Later submissions fail with `IndexError::ShuttingDown`.
    pub fn shutdown(&self) -> IndexResult<()> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.queue.wait_idle();
        self.pool.shutdown();
        self.writer.commit()?;

        let stats = self.stats.snapshot();
        tracing::info!(
            batches = stats.batches_submitted,
            converted = stats.documents_converted,
            failed = stats.documents_failed,
            written = stats.entries_written,
            errors = self.errors.len(),
            "Inflow pipeline stopped"
        );
        Ok(())
    }

    fn ensure_running(&self) -> IndexResult<()> {
        if self.stopped.load(Ordering::Acquire) {
            Err(IndexError::ShuttingDown)
        } else {
            Ok(())
        }
    }

    #[must_use]
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    #[must_use]
    pub fn writer(&self) -> &Arc<dyn IndexWriter> {
        &self.writer
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaTracker> {
        self.materializer.schema()
    }

    #[must_use]
    pub fn materializer(&self) -> &Arc<DocumentMaterializer> {
        &self.materializer
    }

    #[must_use]
    pub fn errors(&self) -> &Arc<ErrorCollector> {
        &self.errors
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<InflowStats> {
        &self.stats
    }

    #[must_use]
    pub fn queue(&self) -> &Arc<InflowQueue<DocumentEntry>> {
        &self.queue
    }

    #[must_use]
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }
}
