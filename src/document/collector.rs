//! Unordered blocking collector
//!
//! Producers register units of work, push results as they finish, and seal the
//! collector once no more units will start. Consumers block on a condition
//! variable until an item arrives or the collector is done.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

struct State<T> {
    items: VecDeque<T>,
    outstanding: usize,
    sealed: bool,
    completed: bool,
}

impl<T> State<T> {
    /// No item can arrive for a blocking consumer anymore
    #[inline]
    fn finished(&self) -> bool {
        self.completed || (self.sealed && self.outstanding == 0)
    }
}

/// Collects results in completion order, not submission order
pub struct BlockingCollector<T> {
    state: Mutex<State<T>>,
    changed: Condvar,
}

impl<T> Default for BlockingCollector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for BlockingCollector<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BlockingCollector")
            .field("buffered", &state.items.len())
            .field("outstanding", &state.outstanding)
            .field("sealed", &state.sealed)
            .field("completed", &state.completed)
            .finish()
    }
}

impl<T> BlockingCollector<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                outstanding: 0,
                sealed: false,
                completed: false,
            }),
            changed: Condvar::new(),
        }
    }

    /// Register a unit of work that will eventually call [`finish_unit`](Self::finish_unit)
    pub fn begin_unit(&self) {
        self.state.lock().outstanding += 1;
    }

    /// Mark one registered unit as finished, whether or not it pushed a result
    pub fn finish_unit(&self) {
        let mut state = self.state.lock();
        state.outstanding = state.outstanding.saturating_sub(1);
        if state.finished() {
            self.changed.notify_all();
        }
    }

    pub fn push(&self, item: T) {
        self.state.lock().items.push_back(item);
        self.changed.notify_one();
    }

    /// No further units will be registered
    pub fn seal(&self) {
        let mut state = self.state.lock();
        state.sealed = true;
        if state.finished() {
            self.changed.notify_all();
        }
    }

    /// Stop waiting for outstanding units; buffered items are still delivered
    pub fn complete(&self) {
        let mut state = self.state.lock();
        state.completed = true;
        self.changed.notify_all();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished()
    }

    /// Finished and fully consumed
    #[must_use]
    pub fn is_drained(&self) -> bool {
        let state = self.state.lock();
        state.finished() && state.items.is_empty()
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn try_next(&self) -> Option<T> {
        self.state.lock().items.pop_front()
    }

    /// Block until an item is available or nothing more can arrive
    pub fn next_blocking(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.finished() {
                return None;
            }
            self.changed.wait(&mut state);
        }
    }

    /// Like [`next_blocking`](Self::next_blocking) but gives up after `timeout`
    pub fn next_timeout(&self, timeout: Duration) -> Option<T> {
        let mut state = self.state.lock();
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.finished() || self.changed.wait_until(&mut state, deadline).timed_out() {
                return state.items.pop_front();
            }
        }
    }

    /// Blocking iterator over results in completion order
    pub fn iter(&self) -> BlockingIter<'_, T> {
        BlockingIter { collector: self }
    }

    /// Block until finished and return everything collected
    pub fn collect_all(&self) -> Vec<T> {
        self.iter().collect()
    }
}

/// Iterator returned by [`BlockingCollector::iter`]
pub struct BlockingIter<'a, T> {
    collector: &'a BlockingCollector<T>,
}

impl<T> Iterator for BlockingIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.collector.next_blocking()
    }
}
