//! Concurrent per-content-type field tracking
//!
//! Materializer threads merge shapes into per-content-type collections held in a
//! `DashMap` (short shard locks). Query construction reads an immutable
//! [`SchemaView`] snapshot which is swapped in whole after each merge that
//! actually adds something, so readers never observe a half-applied merge.

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::types::{FieldInfo, FieldInfoCollection, FieldInfoEntry, ShapeChange};

/// Immutable snapshot of everything the tracker has observed
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaView {
    generation: u64,
    all_fields: BTreeMap<String, FieldInfo>,
    content_types: BTreeMap<String, BTreeMap<String, FieldInfo>>,
}

impl SchemaView {
    fn apply(&mut self, content_type: &str, added: &[FieldInfoEntry]) {
        let per_type = self
            .content_types
            .entry(content_type.to_string())
            .or_default();
        for entry in added {
            per_type
                .entry(entry.name.clone())
                .or_insert_with(|| FieldInfo::new(&entry.name))
                .absorb(entry);
            self.all_fields
                .entry(entry.name.clone())
                .or_insert_with(|| FieldInfo::new(&entry.name))
                .absorb(entry);
        }
        self.generation += 1;
    }

    /// Number of merges that changed the schema
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Field info aggregated across every content type
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        self.all_fields.get(name)
    }

    #[must_use]
    pub fn field_in(&self, content_type: &str, name: &str) -> Option<&FieldInfo> {
        self.content_types.get(content_type)?.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldInfo> {
        self.all_fields.values()
    }

    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.content_types.keys().map(String::as_str)
    }

    #[must_use]
    pub fn has_content_type(&self, content_type: &str) -> bool {
        self.content_types.contains_key(content_type)
    }
}

/// Tracks field shapes per content type
#[derive(Debug, Default)]
pub struct SchemaTracker {
    collections: DashMap<String, FieldInfoCollection>,
    view: RwLock<Arc<SchemaView>>,
    publish: Mutex<()>,
}

impl SchemaTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge observed shapes for a content type, returning how many were new
    ///
    /// Known shapes only contribute metadata keys they did not have yet.
    /// Re-merging known shapes with known metadata is a no-op and does not
    /// publish a new snapshot.
    pub fn merge(&self, content_type: &str, collection: &FieldInfoCollection) -> usize {
        if collection.is_empty() {
            return 0;
        }

        let mut added = 0;
        let changed: Vec<FieldInfoEntry> = {
            let mut known = self
                .collections
                .entry(content_type.to_string())
                .or_default();
            collection
                .iter()
                .filter_map(|entry| {
                    let change = known.observe(entry.clone());
                    if change == ShapeChange::Added {
                        added += 1;
                    }
                    change
                        .is_change()
                        .then(|| known.get(&entry.key()).cloned())
                        .flatten()
                })
                .collect()
        };

        if changed.is_empty() {
            return 0;
        }

        // Publications are serialized so no merge can overwrite another's snapshot.
        let _publish = self.publish.lock();
        let mut next = SchemaView::clone(&self.view.read());
        next.apply(content_type, &changed);
        *self.view.write() = Arc::new(next);

        tracing::debug!(
            content_type = %content_type,
            new_shapes = added,
            changed_shapes = changed.len(),
            "Schema extended"
        );

        added
    }

    /// Look up a field path across all content types
    #[must_use]
    pub fn lookup(&self, field: &str) -> Option<FieldInfo> {
        self.view().field(field).cloned()
    }

    /// Look up a field path within one content type
    #[must_use]
    pub fn lookup_in(&self, content_type: &str, field: &str) -> Option<FieldInfo> {
        self.view().field_in(content_type, field).cloned()
    }

    /// Current snapshot; cheap to clone and safe to hold across merges
    #[must_use]
    pub fn view(&self) -> Arc<SchemaView> {
        Arc::clone(&self.view.read())
    }

    #[must_use]
    pub fn content_types(&self) -> Vec<String> {
        self.view().content_types().map(str::to_string).collect()
    }

    /// Copy of the raw shape collection for a content type
    #[must_use]
    pub fn collection(&self, content_type: &str) -> Option<FieldInfoCollection> {
        self.collections
            .get(content_type)
            .map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{FieldEncoding, ValueKind};

    fn entry(name: &str, kind: ValueKind, encoding: FieldEncoding) -> FieldInfoEntry {
        FieldInfoEntry::new(name, kind, encoding, "default")
    }

    #[test]
    fn merge_is_idempotent() {
        let tracker = SchemaTracker::new();
        let collection: FieldInfoCollection = [
            entry("title", ValueKind::String, FieldEncoding::Exact),
            entry("title", ValueKind::String, FieldEncoding::Analyzed),
            entry("count", ValueKind::Integer, FieldEncoding::Int64),
        ]
        .into_iter()
        .collect();

        assert_eq!(tracker.merge("article", &collection), 3);
        let first = tracker.view();
        assert_eq!(tracker.merge("article", &collection), 0);
        let second = tracker.view();

        assert_eq!(first.generation(), second.generation());
        assert_eq!(tracker.collection("article"), Some(collection));
    }

    #[test]
    fn snapshot_is_stable_across_merges() {
        let tracker = SchemaTracker::new();
        let before = tracker.view();
        let collection: FieldInfoCollection =
            std::iter::once(entry("a", ValueKind::Bool, FieldEncoding::Exact)).collect();
        tracker.merge("t", &collection);

        assert!(before.field("a").is_none());
        assert!(tracker.view().field("a").is_some());
    }

    #[test]
    fn remerge_keeps_first_metadata_and_adds_new_keys() {
        let tracker = SchemaTracker::new();
        let first: FieldInfoCollection = std::iter::once(
            entry("title", ValueKind::String, FieldEncoding::Exact).with_metadata("first_seen", "doc-1"),
        )
        .collect();
        let second: FieldInfoCollection = std::iter::once(
            entry("title", ValueKind::String, FieldEncoding::Exact)
                .with_metadata("first_seen", "doc-2")
                .with_metadata("tokenizer", "raw"),
        )
        .collect();

        assert_eq!(tracker.merge("article", &first), 1);
        let before = tracker.view();
        assert_eq!(tracker.merge("article", &second), 0);
        let after = tracker.view();

        assert!(after.generation() > before.generation());
        let metadata = |view: &SchemaView| {
            view.field_in("article", "title")
                .map(|info| info.entries[0].metadata.clone())
                .unwrap_or_default()
        };
        assert_eq!(metadata(&before).len(), 1);
        let merged = metadata(&after);
        assert_eq!(merged.get("first_seen").map(String::as_str), Some("doc-1"));
        assert_eq!(merged.get("tokenizer").map(String::as_str), Some("raw"));
        assert_eq!(
            after.field("title").map(|info| info.entries[0].metadata.clone()),
            Some(merged)
        );

        let third = tracker.view();
        assert_eq!(tracker.merge("article", &second), 0);
        assert_eq!(tracker.view().generation(), third.generation());
    }

    #[test]
    fn concurrent_merges_converge() {
        let tracker = SchemaTracker::new();
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let tracker = &tracker;
                scope.spawn(move || {
                    for i in 0..50 {
                        let collection: FieldInfoCollection = [
                            entry(&format!("f{}", i % 10), ValueKind::Integer, FieldEncoding::Int64),
                            entry(&format!("w{worker}"), ValueKind::String, FieldEncoding::Exact),
                        ]
                        .into_iter()
                        .collect();
                        tracker.merge("shared", &collection);
                    }
                });
            }
        });

        let view = tracker.view();
        assert_eq!(view.fields().count(), 18);
        assert_eq!(tracker.collection("shared").map(|c| c.len()), Some(18));
    }
}
