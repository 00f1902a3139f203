//! Single global FIFO of reserved slots
//!
//! Conversion finishes out of order; the queue makes writes happen in
//! reservation order. `drain` completes ready slots from the head and stops
//! at the first slot that is still pending.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::slot::ReservedSlot;

struct QueueState<T> {
    slots: VecDeque<ReservedSlot<T>>,
    /// Reserved and not yet completed, including slots popped for completion
    outstanding: usize,
}

pub struct InflowQueue<T> {
    state: Mutex<QueueState<T>>,
    idle: Condvar,
    draining: AtomicBool,
    next_sequence: AtomicU64,
}

impl<T> fmt::Debug for InflowQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InflowQueue")
            .field("queued", &state.slots.len())
            .field("outstanding", &state.outstanding)
            .field("draining", &self.draining.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T: Send + 'static> Default for InflowQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears the drain flag on every exit path
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<T: Send + 'static> InflowQueue<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                slots: VecDeque::new(),
                outstanding: 0,
            }),
            idle: Condvar::new(),
            draining: AtomicBool::new(false),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Reserve the next position in commit order; never blocks on conversion
    pub fn reserve(&self, write_action: impl FnOnce(Vec<T>) + Send + 'static) -> ReservedSlot<T> {
        let mut state = self.state.lock();
        // Assigned under the lock so sequence order matches queue order.
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let slot = ReservedSlot::new(sequence, write_action);
        state.slots.push_back(slot.clone());
        state.outstanding += 1;
        slot
    }

    /// Complete every ready slot at the head, in order
    ///
    /// Returns the number of slots this call completed. A call made while
    /// another thread is draining returns 0 immediately; the running drain
    /// picks up the new readiness before it gives up the flag.
    pub fn drain(&self) -> usize {
        let mut completed = 0;
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                return completed;
            }

            {
                let _guard = DrainGuard(&self.draining);
                loop {
                    let ready = self.pop_ready();
                    if ready.is_empty() {
                        break;
                    }
                    for slot in ready {
                        slot.complete();
                        completed += 1;
                        self.finish_one();
                    }
                }
            }

            // A slot that became ready after our last look but before the flag
            // was cleared would otherwise wait for the next trigger.
            if !self.head_ready() {
                if completed > 0 {
                    tracing::trace!(completed, "Inflow queue drained");
                }
                return completed;
            }
        }
    }

    fn pop_ready(&self) -> Vec<ReservedSlot<T>> {
        let mut state = self.state.lock();
        let mut ready = Vec::new();
        while state.slots.front().is_some_and(ReservedSlot::is_ready) {
            if let Some(slot) = state.slots.pop_front() {
                ready.push(slot);
            }
        }
        ready
    }

    fn head_ready(&self) -> bool {
        self.state
            .lock()
            .slots
            .front()
            .is_some_and(ReservedSlot::is_ready)
    }

    fn finish_one(&self) {
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        if state.outstanding == 0 {
            self.idle.notify_all();
        }
    }

    /// Slots reserved and not yet completed
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().outstanding
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until every reserved slot has completed
    pub fn wait_idle(&self) {
        let mut state = self.state.lock();
        while state.outstanding > 0 {
            self.idle.wait(&mut state);
        }
    }

    /// Like [`wait_idle`](Self::wait_idle) with a deadline; true if idle
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.outstanding > 0 {
            if self.idle.wait_until(&mut state, deadline).timed_out() {
                return state.outstanding == 0;
            }
        }
        true
    }
}
