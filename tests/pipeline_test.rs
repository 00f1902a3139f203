//! End-to-end ingestion into a tantivy index on disk

use anyhow::Result;
use futures::future::join_all;
use jsonindex::{
    FieldQuery, IdentityTerm, IndexConfig, IndexWriter, InflowManager, Priority, TantivyIndex,
};
use serde_json::json;
use std::sync::Arc;

mod common;

use common::order;

fn start(dir: &std::path::Path) -> Result<(InflowManager, Arc<TantivyIndex>)> {
    let config = IndexConfig::builder()
        .index_dir(Some(dir))
        .worker_threads(Some(4))
        .max_inflight_cost(Some(64))
        .convert_priority(Priority::High)
        .build()?;
    let index = Arc::new(TantivyIndex::open(&config)?);
    let writer: Arc<dyn IndexWriter> = index.clone();
    let manager = InflowManager::start(config, writer)?;
    Ok((manager, index))
}

#[tokio::test]
async fn submitted_batches_become_searchable() -> Result<()> {
    common::init_tracing();
    let dir = tempfile::tempdir()?;
    let (manager, index) = start(dir.path())?;

    let mut completions = Vec::new();
    for batch in 0..10i64 {
        let documents = (0..20)
            .map(|i| order(&format!("{batch}-{i}"), batch * 100 + i))
            .collect();
        completions.push(manager.submit(documents)?.completion());
    }
    for completed in join_all(completions).await {
        completed?;
    }
    manager.flush()?;

    assert_eq!(index.num_docs(), 200);

    let hits = index.search(&FieldQuery::int64_eq("total", 305), 10)?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].identity, "3-5");
    assert_eq!(hits[0].content_type, "order");
    assert_eq!(hits[0].source["customer"]["name"], "Customer 3-5");

    let range = FieldQuery::Int64Range {
        field: "total".to_string(),
        min: Some(900),
        max: None,
    };
    assert_eq!(index.search(&range, 100)?.len(), 20);

    let named = index.search(&FieldQuery::term("customer.name", "Customer 7-1"), 10)?;
    assert_eq!(named.len(), 1);

    manager.shutdown()?;
    Ok(())
}

#[tokio::test]
async fn later_upserts_and_deletes_win() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (manager, index) = start(dir.path())?;

    manager.submit(vec![order("a", 1), order("b", 2)])?;
    manager.delete(vec![IdentityTerm::new("id", "a")])?;
    let last = manager.submit(vec![order("b", 20)])?;
    last.completion().await?;
    manager.flush()?;

    assert_eq!(index.num_docs(), 1);
    let hits = index.all(10)?;
    assert_eq!(hits[0].identity, "b");
    assert_eq!(hits[0].source["total"], 20);
    assert!(index.search(&FieldQuery::int64_eq("total", 2), 10)?.is_empty());

    manager.shutdown()?;
    Ok(())
}

#[test]
fn failed_documents_do_not_block_the_batch() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let (manager, index) = start(dir.path())?;

    let slot = manager.submit(vec![
        order("ok-1", 10),
        json!({ "contentType": "order", "total": 11 }),
        json!({ "id": "ok-2", "contentType": "order", "": "bad key" }),
        order("ok-3", 12),
    ])?;
    slot.wait();
    manager.shutdown()?;

    assert_eq!(slot.entry_count(), 2);
    assert_eq!(index.num_docs(), 2);
    assert_eq!(manager.errors().count("identity_missing"), 1);
    assert_eq!(manager.errors().len(), 2);

    let stats = manager.stats().snapshot();
    assert_eq!(stats.documents_submitted, 4);
    assert_eq!(stats.documents_converted, 2);
    assert_eq!(stats.documents_failed, 2);
    Ok(())
}

#[test]
fn index_survives_a_restart() -> Result<()> {
    let dir = tempfile::tempdir()?;
    {
        let (manager, _index) = start(dir.path())?;
        manager.submit(vec![order("kept", 42)])?;
        manager.shutdown()?;
    }

    let (manager, index) = start(dir.path())?;
    assert_eq!(index.num_docs(), 1);
    assert_eq!(index.search_str("terms.id:kept", 10)?.len(), 1);
    assert_eq!(index.search_str("text.customer.name:customer", 10)?.len(), 1);
    manager.shutdown()?;
    Ok(())
}
