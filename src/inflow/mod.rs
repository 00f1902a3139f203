//! Inflow pipeline: ordered, concurrent ingestion of JSON batches
//!
//! Batches convert concurrently on a worker pool but reach the index writer
//! in submission order.
//!
//! # Architecture
//!
//! - `slot` - reserved slots and their `Pending -> Ready -> Completed` lifecycle
//! - `queue` - the single FIFO that completes slots in reservation order
//! - `capacity` - admission control in front of the scheduler
//! - `scheduler` - five-lane priority job queue and job contract
//! - `pool` - worker threads executing scheduled jobs
//! - `jobs` - convert and write jobs
//! - `stats` - lock-free counters
//! - `manager` - `InflowManager`, which wires everything together
//!
//! # Example
//!
//! ```ignore
//! use jsonindex::{IndexConfig, InflowManager, TantivyIndex};
//!
//! let config = IndexConfig::builder().build()?;
//! let index = Arc::new(TantivyIndex::open(&config)?);
//! let inflow = InflowManager::start(config, index.clone())?;
//!
//! let slot = inflow.submit(documents)?;
//! slot.wait();
//! inflow.flush()?;
//! ```

mod capacity;
mod jobs;
mod manager;
mod pool;
mod queue;
mod scheduler;
mod slot;
mod stats;

// Re-export public API
pub use capacity::{BoundedCapacity, InflowCapacity, UnboundedCapacity};
pub use jobs::{ConvertJob, WriteJob};
pub use manager::InflowManager;
pub use pool::WorkerPool;
pub use queue::InflowQueue;
pub use scheduler::{Job, JobContext, Priority, PriorityJobQueue, ScheduledJob, Scheduler};
pub use slot::{CompletionCallback, ReservedSlot, SlotState, WriteAction};
pub use stats::{InflowStats, InflowStatsSnapshot};
