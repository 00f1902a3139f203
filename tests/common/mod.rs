//! Test utilities shared by the jsonindex integration tests

use jsonindex::{DocumentEntry, IdentityTerm, IndexResult, IndexWriter, InflowCapacity};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};

/// Route `tracing` output through the test harness; safe to call repeatedly
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A call observed by [`RecordingWriter`]
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterCall {
    Upsert(String),
    Delete(String),
    Commit,
}

/// Index writer that records every call in order
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct RecordingWriter {
    calls: Mutex<Vec<WriterCall>>,
}

#[allow(dead_code)]
impl RecordingWriter {
    pub fn calls(&self) -> Vec<WriterCall> {
        self.calls.lock().clone()
    }

    pub fn upserted(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                WriterCall::Upsert(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }
}

impl IndexWriter for RecordingWriter {
    fn upsert(&self, entry: &DocumentEntry) -> IndexResult<()> {
        self.calls
            .lock()
            .push(WriterCall::Upsert(entry.identity().value.clone()));
        Ok(())
    }

    fn delete(&self, identity: &IdentityTerm) -> IndexResult<()> {
        self.calls.lock().push(WriterCall::Delete(identity.value.clone()));
        Ok(())
    }

    fn commit(&self) -> IndexResult<()> {
        self.calls.lock().push(WriterCall::Commit);
        Ok(())
    }
}

/// Capacity gate that counts every allocation and release
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct LedgerCapacity {
    pub allocated: AtomicU64,
    pub charged: AtomicU64,
    pub freed: AtomicU64,
    pub allocate_calls: AtomicU64,
    pub free_calls: AtomicU64,
}

impl InflowCapacity for LedgerCapacity {
    fn allocate(&self, cost: u64) {
        self.allocate_calls.fetch_add(1, Ordering::SeqCst);
        self.allocated.fetch_add(cost, Ordering::SeqCst);
    }

    fn charge(&self, cost: u64) {
        self.charged.fetch_add(cost, Ordering::SeqCst);
    }

    fn free(&self, cost: u64) {
        self.free_calls.fetch_add(1, Ordering::SeqCst);
        self.freed.fetch_add(cost, Ordering::SeqCst);
    }

    fn outstanding(&self) -> u64 {
        self.allocated.load(Ordering::SeqCst) + self.charged.load(Ordering::SeqCst)
            - self.freed.load(Ordering::SeqCst)
    }
}

/// An order document with a numeric total
#[allow(dead_code)]
pub fn order(id: &str, total: i64) -> Value {
    json!({
        "id": id,
        "contentType": "order",
        "total": total,
        "customer": { "name": format!("Customer {id}") },
    })
}
