//! Fixed-size worker pool over the scheduler's priority queue

use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::capacity::InflowCapacity;
use super::scheduler::{JobContext, Scheduler};
use super::stats::InflowStats;
use crate::errors::{IndexError, IndexResult, panic_message};
use crate::reporting::ErrorCollector;

/// Frees a job's admitted cost however the job ends
struct CostRelease<'a> {
    capacity: &'a dyn InflowCapacity,
    cost: u64,
}

impl Drop for CostRelease<'_> {
    fn drop(&mut self) {
        self.capacity.free(self.cost);
    }
}

pub struct WorkerPool {
    scheduler: Arc<Scheduler>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("running", &self.handles.lock().len())
            .finish()
    }
}

impl WorkerPool {
    /// Spawn `size` workers named `inflow-worker-N`
    pub fn start(
        size: usize,
        scheduler: Arc<Scheduler>,
        errors: Arc<ErrorCollector>,
        stats: Arc<InflowStats>,
    ) -> IndexResult<Self> {
        let size = size.max(1);
        let mut handles = Vec::with_capacity(size);

        for worker in 0..size {
            let worker_scheduler = Arc::clone(&scheduler);
            let errors = Arc::clone(&errors);
            let stats = Arc::clone(&stats);
            let spawned = std::thread::Builder::new()
                .name(format!("inflow-worker-{worker}"))
                .spawn(move || run_worker(worker, &worker_scheduler, &errors, &stats));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    scheduler.close();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(IndexError::Io(e));
                }
            }
        }

        tracing::info!(workers = size, "Worker pool started");
        Ok(Self {
            scheduler,
            handles: Mutex::new(handles),
            size,
        })
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Close the queue and join every worker once queued jobs ran
    pub fn shutdown(&self) {
        self.scheduler.close();
        let handles = std::mem::take(&mut *self.handles.lock());
        if handles.is_empty() {
            return;
        }

        let current = std::thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("Inflow worker exited abnormally");
            }
        }
        tracing::info!(workers = self.size, "Worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(worker: usize, scheduler: &Scheduler, errors: &ErrorCollector, stats: &InflowStats) {
    tracing::debug!(worker, "Inflow worker started");

    while let Some(scheduled) = scheduler.queue().dequeue() {
        let _release = CostRelease {
            capacity: scheduler.capacity().as_ref(),
            cost: scheduled.cost(),
        };
        let name = scheduled.name();
        let priority = scheduled.priority();
        let job = scheduled.into_job();
        let ctx = JobContext::new(scheduler, worker);

        match catch_unwind(AssertUnwindSafe(|| job.execute(&ctx))) {
            Ok(Ok(())) => {
                InflowStats::add(&stats.jobs_completed, 1);
                tracing::trace!(worker, job = name, %priority, "Job finished");
            }
            Ok(Err(e)) => {
                InflowStats::add(&stats.jobs_failed, 1);
                errors.report(
                    name,
                    &IndexError::JobFailed {
                        job: name,
                        message: e.to_string(),
                    },
                );
            }
            Err(panic) => {
                InflowStats::add(&stats.jobs_panicked, 1);
                errors.report(
                    name,
                    &IndexError::JobPanicked {
                        job: name,
                        message: panic_message(panic.as_ref()),
                    },
                );
            }
        }
    }

    tracing::debug!(worker, "Inflow worker stopped");
}
