//! Reserved slots: commit-order reservations for batches still converting
//!
//! A slot moves `Pending -> Ready -> Completed`. Only the queue completes a
//! slot, and only once it is the head of the queue and ready. Breaking the
//! state machine is a programming error and panics.

use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::errors::panic_message;

/// Invoked with the slot's entries when it completes
pub type WriteAction<T> = Box<dyn FnOnce(Vec<T>) + Send + 'static>;

/// Invoked after the write action of a completed slot
pub type CompletionCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Reserved, entries not computed yet
    Pending,
    /// Entries computed, waiting for every earlier slot
    Ready,
    /// Written; terminal
    Completed,
}

struct SlotData<T> {
    state: SlotState,
    /// Set once `complete` started, so a second call is caught
    completing: bool,
    entries: Option<Vec<T>>,
    entry_count: usize,
    write_action: Option<WriteAction<T>>,
    callbacks: Vec<CompletionCallback>,
    notifiers: Vec<oneshot::Sender<()>>,
}

struct SlotInner<T> {
    sequence: u64,
    data: Mutex<SlotData<T>>,
    completed: Condvar,
}

/// Handle to a reserved slot; clones share the same slot
pub struct ReservedSlot<T> {
    inner: Arc<SlotInner<T>>,
}

impl<T> Clone for ReservedSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for ReservedSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReservedSlot")
            .field("sequence", &self.inner.sequence)
            .field("state", &self.inner.data.lock().state)
            .finish()
    }
}

impl<T: Send + 'static> ReservedSlot<T> {
    pub(crate) fn new(sequence: u64, write_action: impl FnOnce(Vec<T>) + Send + 'static) -> Self {
        let write_action: WriteAction<T> = Box::new(write_action);
        Self {
            inner: Arc::new(SlotInner {
                sequence,
                data: Mutex::new(SlotData {
                    state: SlotState::Pending,
                    completing: false,
                    entries: None,
                    entry_count: 0,
                    write_action: Some(write_action),
                    callbacks: Vec::new(),
                    notifiers: Vec::new(),
                }),
                completed: Condvar::new(),
            }),
        }
    }

    /// Position in submission order
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.inner.sequence
    }

    #[must_use]
    pub fn state(&self) -> SlotState {
        self.inner.data.lock().state
    }

    /// Ready and not yet handed to the write action
    #[must_use]
    pub fn is_ready(&self) -> bool {
        let data = self.inner.data.lock();
        data.state == SlotState::Ready && !data.completing
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state() == SlotState::Completed
    }

    /// Number of entries handed to `ready`
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.inner.data.lock().entry_count
    }

    /// Hand over the converted entries
    ///
    /// # Panics
    ///
    /// If the slot already left `Pending`.
    pub fn ready(&self, entries: Vec<T>) {
        let mut data = self.inner.data.lock();
        assert!(
            data.state == SlotState::Pending,
            "slot {} marked ready while {:?}",
            self.inner.sequence,
            data.state
        );
        data.entry_count = entries.len();
        data.entries = Some(entries);
        data.state = SlotState::Ready;
    }

    /// Run `callback` after this slot's write action
    ///
    /// # Panics
    ///
    /// If the slot already completed.
    pub fn on_complete(&self, callback: impl FnOnce() + Send + 'static) {
        let mut data = self.inner.data.lock();
        assert!(
            data.state != SlotState::Completed,
            "completion callback added to completed slot {}",
            self.inner.sequence
        );
        data.callbacks.push(Box::new(callback));
    }

    /// Receiver resolved once the slot completes
    pub fn completion(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let mut data = self.inner.data.lock();
        if data.state == SlotState::Completed {
            let _ = tx.send(());
        } else {
            data.notifiers.push(tx);
        }
        rx
    }

    /// Block until the slot completes
    pub fn wait(&self) {
        let mut data = self.inner.data.lock();
        while data.state != SlotState::Completed {
            self.inner.completed.wait(&mut data);
        }
    }

    /// Block until the slot completes or `timeout` elapses; true if completed
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut data = self.inner.data.lock();
        while data.state != SlotState::Completed {
            if self.inner.completed.wait_until(&mut data, deadline).timed_out() {
                return data.state == SlotState::Completed;
            }
        }
        true
    }

    /// Write the entries, run callbacks, then release waiters
    ///
    /// Called by the draining thread once this slot reached the queue head.
    ///
    /// # Panics
    ///
    /// If the slot is not ready or completion already started.
    pub(crate) fn complete(&self) {
        let (action, entries) = {
            let mut data = self.inner.data.lock();
            assert!(
                data.state == SlotState::Ready && !data.completing,
                "slot {} completed while {:?} (completing: {})",
                self.inner.sequence,
                data.state,
                data.completing
            );
            data.completing = true;
            (data.write_action.take(), data.entries.take().unwrap_or_default())
        };

        if let Some(action) = action
            && let Err(panic) = catch_unwind(AssertUnwindSafe(|| action(entries)))
        {
            tracing::error!(
                sequence = self.inner.sequence,
                panic = %panic_message(panic.as_ref()),
                "Write action panicked"
            );
        }

        // Callbacks registered while earlier ones run still get called.
        loop {
            let callbacks = {
                let mut data = self.inner.data.lock();
                if data.callbacks.is_empty() {
                    data.state = SlotState::Completed;
                    break;
                }
                std::mem::take(&mut data.callbacks)
            };
            for callback in callbacks {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(callback)) {
                    tracing::error!(
                        sequence = self.inner.sequence,
                        panic = %panic_message(panic.as_ref()),
                        "Completion callback panicked"
                    );
                }
            }
        }

        let notifiers = std::mem::take(&mut self.inner.data.lock().notifiers);
        for notifier in notifiers {
            let _ = notifier.send(());
        }
        self.inner.completed.notify_all();
    }
}

/// Best-effort text of a panic payload
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recording_slot(log: &Arc<Mutex<Vec<String>>>) -> ReservedSlot<u32> {
        let log = Arc::clone(log);
        ReservedSlot::new(0, move |entries: Vec<u32>| {
            log.lock().push(format!("write {entries:?}"));
        })
    }

    #[test]
    fn write_action_runs_before_callbacks_and_waiters() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let slot = recording_slot(&log);
        let callback_log = Arc::clone(&log);
        slot.on_complete(move || callback_log.lock().push("callback".to_string()));

        assert_eq!(slot.state(), SlotState::Pending);
        slot.ready(vec![1, 2]);
        assert!(slot.is_ready());
        assert_eq!(slot.entry_count(), 2);

        let waiter = {
            let slot = slot.clone();
            std::thread::spawn(move || slot.wait())
        };
        slot.complete();
        waiter.join().expect("waiter");

        assert!(slot.is_completed());
        assert!(!slot.is_ready());
        assert_eq!(*log.lock(), vec!["write [1, 2]".to_string(), "callback".to_string()]);
    }

    #[test]
    #[should_panic(expected = "marked ready")]
    fn double_ready_panics() {
        let slot = ReservedSlot::<u32>::new(1, |_| {});
        slot.ready(Vec::new());
        slot.ready(Vec::new());
    }

    #[test]
    #[should_panic(expected = "completed while")]
    fn completing_a_pending_slot_panics() {
        let slot = ReservedSlot::<u32>::new(2, |_| {});
        slot.complete();
    }

    #[test]
    #[should_panic(expected = "completed while")]
    fn double_complete_panics() {
        let slot = ReservedSlot::<u32>::new(3, |_| {});
        slot.ready(Vec::new());
        slot.complete();
        slot.complete();
    }

    #[test]
    #[should_panic(expected = "completed slot")]
    fn callback_on_completed_slot_panics() {
        let slot = ReservedSlot::<u32>::new(4, |_| {});
        slot.ready(Vec::new());
        slot.complete();
        slot.on_complete(|| {});
    }

    #[test]
    fn panicking_write_action_still_completes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let slot = ReservedSlot::<u32>::new(5, |_| panic!("writer exploded"));
        let counter = Arc::clone(&calls);
        slot.on_complete(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        slot.ready(Vec::new());
        slot.complete();

        assert!(slot.is_completed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn wait_timeout_reports_pending() {
        let slot = ReservedSlot::<u32>::new(6, |_| {});
        assert!(!slot.wait_timeout(Duration::from_millis(10)));
        slot.ready(Vec::new());
        slot.complete();
        assert!(slot.wait_timeout(Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn completion_receiver_resolves() {
        let slot = ReservedSlot::<u32>::new(7, |_| {});
        let before = slot.completion();
        slot.ready(vec![1]);
        slot.complete();
        let after = slot.completion();

        assert!(before.await.is_ok());
        assert!(after.await.is_ok());
    }
}
