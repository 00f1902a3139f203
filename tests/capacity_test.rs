//! Every admitted cost is released exactly once, however the job ends

use jsonindex::{
    BoundedCapacity, ErrorCollector, IndexError, IndexResult, InflowCapacity, InflowStats, Job,
    JobContext, Priority, Scheduler, WorkerPool,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

mod common;

use common::LedgerCapacity;

#[derive(Clone, Copy)]
enum Ending {
    Succeed,
    Fail,
    Panic,
    /// Schedule a follow-up, then panic
    SpawnThenPanic,
}

struct Probe {
    ending: Ending,
    cost: u64,
}

impl Job for Probe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn cost(&self) -> u64 {
        self.cost
    }

    fn execute(self: Box<Self>, ctx: &JobContext<'_>) -> IndexResult<()> {
        match self.ending {
            Ending::Succeed => Ok(()),
            Ending::Fail => Err(IndexError::Other("probe declined".to_string())),
            Ending::Panic => panic!("probe panicked"),
            Ending::SpawnThenPanic => {
                let child = Probe {
                    ending: Ending::Succeed,
                    cost: 2,
                };
                ctx.schedule(Box::new(child), Priority::Highest)?;
                panic!("probe panicked after scheduling")
            }
        }
    }
}

#[test]
fn allocations_and_frees_balance_across_outcomes() {
    common::init_tracing();

    let capacity = Arc::new(LedgerCapacity::default());
    let scheduler = Arc::new(Scheduler::new(capacity.clone()));
    let errors = Arc::new(ErrorCollector::default());
    let stats = Arc::new(InflowStats::new());

    let endings = [
        Ending::Succeed,
        Ending::Fail,
        Ending::Panic,
        Ending::SpawnThenPanic,
    ];
    let mut submitted = 0u64;
    for i in 0..40u64 {
        let ending = endings[(i % 4) as usize];
        scheduler
            .enqueue(Box::new(Probe { ending, cost: i + 1 }), Priority::Medium)
            .expect("open scheduler");
        submitted += 1;
    }

    let pool = WorkerPool::start(4, Arc::clone(&scheduler), errors.clone(), stats.clone())
        .expect("pool starts");
    pool.shutdown();

    let allocate_calls = capacity.allocate_calls.load(Ordering::SeqCst);
    let free_calls = capacity.free_calls.load(Ordering::SeqCst);
    let allocated = capacity.allocated.load(Ordering::SeqCst);
    let charged = capacity.charged.load(Ordering::SeqCst);
    let freed = capacity.freed.load(Ordering::SeqCst);

    assert_eq!(allocate_calls, submitted);
    // Ten follow-ups were charged, each freed when it ran.
    assert_eq!(charged, 20);
    assert_eq!(free_calls, submitted + 10);
    assert_eq!(allocated + charged, freed);
    assert_eq!(capacity.outstanding(), 0);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.jobs_completed, 20);
    assert_eq!(snapshot.jobs_failed, 10);
    assert_eq!(snapshot.jobs_panicked, 20);
    assert_eq!(errors.count("job_panicked"), 20);
}

#[test]
fn bounded_gate_blocks_until_released() {
    let gate = Arc::new(BoundedCapacity::new(10));
    gate.allocate(8);
    assert!(!gate.try_allocate(5));
    assert!(!gate.allocate_timeout(5, Duration::from_millis(20)));

    let waiter = {
        let gate = Arc::clone(&gate);
        std::thread::spawn(move || {
            gate.allocate(5);
            gate.outstanding()
        })
    };
    std::thread::sleep(Duration::from_millis(20));
    gate.free(8);

    assert_eq!(waiter.join().expect("waiter"), 5);
    gate.free(5);
    assert_eq!(gate.outstanding(), 0);
}

#[test]
fn oversized_cost_is_admitted_on_an_idle_gate() {
    let gate = BoundedCapacity::new(4);
    assert!(gate.try_allocate(100));
    assert!(!gate.try_allocate(1));
    gate.free(100);
    assert!(gate.try_allocate(1));
}
