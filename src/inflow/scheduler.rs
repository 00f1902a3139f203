//! Five-lane priority job queue and the scheduler in front of it
//!
//! Lanes are strictly ordered: a job is only dequeued when every higher lane
//! is empty. Within a lane jobs run in enqueue order.

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use super::capacity::InflowCapacity;
use crate::errors::{IndexError, IndexResult};

/// Job priority, highest first
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Highest,
    High,
    #[default]
    Medium,
    Low,
    Lowest,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Highest,
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::Lowest,
    ];

    #[inline]
    #[must_use]
    pub const fn lane(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Highest => "highest",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Lowest => "lowest",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work executed by the worker pool
pub trait Job: Send {
    fn name(&self) -> &'static str;

    /// Admission cost; read once when the job is scheduled
    fn cost(&self) -> u64 {
        1
    }

    fn execute(self: Box<Self>, ctx: &JobContext<'_>) -> IndexResult<()>;
}

/// A job with the cost and priority it was admitted with
pub struct ScheduledJob {
    job: Box<dyn Job>,
    cost: u64,
    priority: Priority,
}

impl fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("name", &self.job.name())
            .field("cost", &self.cost)
            .field("priority", &self.priority)
            .finish()
    }
}

impl ScheduledJob {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.job.name()
    }

    #[must_use]
    pub fn cost(&self) -> u64 {
        self.cost
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub fn into_job(self) -> Box<dyn Job> {
        self.job
    }
}

struct Lanes {
    lanes: [VecDeque<ScheduledJob>; 5],
    closed: bool,
}

impl Lanes {
    fn len(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }

    fn pop(&mut self) -> Option<ScheduledJob> {
        self.lanes.iter_mut().find_map(VecDeque::pop_front)
    }
}

/// Blocking priority queue shared by the worker threads
pub struct PriorityJobQueue {
    state: Mutex<Lanes>,
    available: Condvar,
}

impl fmt::Debug for PriorityJobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PriorityJobQueue")
            .field("queued", &state.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl Default for PriorityJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityJobQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(Lanes {
                lanes: Default::default(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Queue a job; fails once the queue is closed
    pub fn enqueue(&self, job: Box<dyn Job>, priority: Priority) -> IndexResult<()> {
        let cost = job.cost();
        self.push(job, cost, priority, false)
    }

    fn push(
        &self,
        job: Box<dyn Job>,
        cost: u64,
        priority: Priority,
        allow_closed: bool,
    ) -> IndexResult<()> {
        let mut state = self.state.lock();
        if state.closed && !allow_closed {
            return Err(IndexError::ShuttingDown);
        }
        state.lanes[priority.lane()].push_back(ScheduledJob {
            job,
            cost,
            priority,
        });
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Block until a job is available
    ///
    /// Returns `None` only once the queue is closed and every lane is empty.
    pub fn dequeue(&self) -> Option<ScheduledJob> {
        let mut state = self.state.lock();
        loop {
            if let Some(job) = state.pop() {
                return Some(job);
            }
            if state.closed {
                return None;
            }
            self.available.wait(&mut state);
        }
    }

    pub fn try_dequeue(&self) -> Option<ScheduledJob> {
        self.state.lock().pop()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn lane_len(&self, priority: Priority) -> usize {
        self.state.lock().lanes[priority.lane()].len()
    }

    /// Reject new jobs and release idle consumers once the lanes run dry
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Admits jobs through the capacity gate into the priority queue
#[derive(Debug)]
pub struct Scheduler {
    queue: PriorityJobQueue,
    capacity: Arc<dyn InflowCapacity>,
}

impl Scheduler {
    #[must_use]
    pub fn new(capacity: Arc<dyn InflowCapacity>) -> Self {
        Self {
            queue: PriorityJobQueue::new(),
            capacity,
        }
    }

    /// Allocate the job's cost, possibly blocking, then queue it
    pub fn enqueue(&self, job: Box<dyn Job>, priority: Priority) -> IndexResult<()> {
        let cost = job.cost();
        self.capacity.allocate(cost);
        self.enqueue_admitted(job, cost, priority)
    }

    /// Queue a job whose cost the caller already allocated
    ///
    /// The cost is freed again if the queue rejects the job.
    pub(crate) fn enqueue_admitted(
        &self,
        job: Box<dyn Job>,
        cost: u64,
        priority: Priority,
    ) -> IndexResult<()> {
        self.queue.push(job, cost, priority, false).inspect_err(|_| {
            self.capacity.free(cost);
        })
    }

    /// Queue follow-up work from inside a running job
    ///
    /// Accepted even after `close` so that admitted work can finish.
    fn enqueue_follow_up(&self, job: Box<dyn Job>, priority: Priority) -> IndexResult<()> {
        let cost = job.cost();
        self.capacity.charge(cost);
        self.queue.push(job, cost, priority, true)
    }

    #[must_use]
    pub fn queue(&self) -> &PriorityJobQueue {
        &self.queue
    }

    #[must_use]
    pub fn capacity(&self) -> &Arc<dyn InflowCapacity> {
        &self.capacity
    }

    pub fn close(&self) {
        self.queue.close();
    }
}

/// What a running job can see of the pool it runs on
pub struct JobContext<'a> {
    scheduler: &'a Scheduler,
    worker: usize,
}

impl<'a> JobContext<'a> {
    #[must_use]
    pub fn new(scheduler: &'a Scheduler, worker: usize) -> Self {
        Self { scheduler, worker }
    }

    /// Index of the worker thread running the job
    #[must_use]
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Schedule follow-up work; never blocks on the capacity gate
    pub fn schedule(&self, job: Box<dyn Job>, priority: Priority) -> IndexResult<()> {
        self.scheduler.enqueue_follow_up(job, priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflow::capacity::{BoundedCapacity, UnboundedCapacity};

    struct Named(&'static str);

    impl Job for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn execute(self: Box<Self>, _ctx: &JobContext<'_>) -> IndexResult<()> {
            Ok(())
        }
    }

    fn drain_names(queue: &PriorityJobQueue) -> Vec<&'static str> {
        std::iter::from_fn(|| queue.try_dequeue().map(|job| job.name())).collect()
    }

    #[test]
    fn higher_lanes_first_fifo_within_lane() {
        let queue = PriorityJobQueue::new();
        for (name, priority) in [
            ("low-1", Priority::Lowest),
            ("mid-1", Priority::Medium),
            ("top-1", Priority::Highest),
            ("mid-2", Priority::Medium),
            ("low-2", Priority::Lowest),
            ("top-2", Priority::Highest),
        ] {
            queue.enqueue(Box::new(Named(name)), priority).expect("open");
        }
        assert_eq!(queue.lane_len(Priority::Medium), 2);
        assert_eq!(
            drain_names(&queue),
            vec!["top-1", "top-2", "mid-1", "mid-2", "low-1", "low-2"]
        );
    }

    #[test]
    fn closed_queue_rejects_and_releases_consumers() {
        let queue = Arc::new(PriorityJobQueue::new());
        queue.enqueue(Box::new(Named("last")), Priority::Low).expect("open");

        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(job) = queue.dequeue() {
                    seen.push(job.name());
                }
                seen
            })
        };
        queue.close();

        assert_eq!(consumer.join().expect("consumer"), vec!["last"]);
        assert!(matches!(
            queue.enqueue(Box::new(Named("late")), Priority::High),
            Err(IndexError::ShuttingDown)
        ));
    }

    #[test]
    fn scheduler_allocates_and_refunds_rejected_jobs() {
        let scheduler = Scheduler::new(Arc::new(BoundedCapacity::new(10)));
        scheduler.enqueue(Box::new(Named("a")), Priority::Medium).expect("open");
        assert_eq!(scheduler.capacity().outstanding(), 1);

        scheduler.close();
        assert!(scheduler.enqueue(Box::new(Named("b")), Priority::Medium).is_err());
        assert_eq!(scheduler.capacity().outstanding(), 1);
    }

    #[test]
    fn follow_ups_are_charged_and_accepted_after_close() {
        let scheduler = Scheduler::new(Arc::new(UnboundedCapacity::new()));
        scheduler.close();

        let ctx = JobContext::new(&scheduler, 0);
        ctx.schedule(Box::new(Named("follow-up")), Priority::Highest)
            .expect("follow-ups bypass close");
        assert_eq!(scheduler.capacity().outstanding(), 1);
        assert_eq!(scheduler.queue().dequeue().map(|job| job.name()), Some("follow-up"));
        assert!(scheduler.queue().dequeue().is_none());
    }
}
