//! Field shape types tracked per content type

use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kind of a JSON value as observed during materialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Integer,
    Float,
    String,
    Bool,
    Date,
    TimeSpan,
    Null,
    Array,
    Object,
    Guid,
    Uri,
    Bytes,
}

impl ValueKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::Bool => "bool",
            ValueKind::Date => "date",
            ValueKind::TimeSpan => "timespan",
            ValueKind::Null => "null",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
            ValueKind::Guid => "guid",
            ValueKind::Uri => "uri",
            ValueKind::Bytes => "bytes",
        }
    }

    /// Numeric kinds support range decomposition at query time
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Integer | ValueKind::Float)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index-native representation chosen for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldEncoding {
    /// Untokenized term, exact match only
    Exact,
    /// Tokenized full-text
    Analyzed,
    /// 64-bit signed integer
    Int64,
    /// 64-bit float
    Float64,
}

impl FieldEncoding {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FieldEncoding::Exact => "exact",
            FieldEncoding::Analyzed => "analyzed",
            FieldEncoding::Int64 => "int64",
            FieldEncoding::Float64 => "float64",
        }
    }
}

impl fmt::Display for FieldEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite identity of a field shape within one content type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldKey {
    pub name: String,
    pub encoding: FieldEncoding,
    pub kind: ValueKind,
    pub strategy: &'static str,
}

/// One observed (field path, encoding, value kind, strategy) combination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfoEntry {
    pub name: String,
    pub kind: ValueKind,
    pub encoding: FieldEncoding,
    pub strategy: &'static str,
    pub metadata: BTreeMap<String, String>,
}

impl FieldInfoEntry {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: ValueKind,
        encoding: FieldEncoding,
        strategy: &'static str,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            encoding,
            strategy,
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Add metadata keys not yet present, returning true when any was added
    pub fn extend_metadata(&mut self, metadata: &BTreeMap<String, String>) -> bool {
        let before = self.metadata.len();
        for (key, value) in metadata {
            self.metadata.entry(key.clone()).or_insert_with(|| value.clone());
        }
        self.metadata.len() != before
    }

    #[must_use]
    pub fn key(&self) -> FieldKey {
        FieldKey {
            name: self.name.clone(),
            encoding: self.encoding,
            kind: self.kind,
            strategy: self.strategy,
        }
    }
}

/// Effect of adding one shape to a [`FieldInfoCollection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeChange {
    /// Shape and metadata were already known
    Unchanged,
    /// A shape not seen before
    Added,
    /// Known shape that gained metadata keys
    Extended,
}

impl ShapeChange {
    #[must_use]
    pub fn is_change(self) -> bool {
        self != ShapeChange::Unchanged
    }
}

/// Set of field shapes observed for a single content type
///
/// Keyed by [`FieldKey`]. Adding a known shape keeps the metadata of its first
/// observation and only picks up metadata keys it did not have, so merging is
/// idempotent and order independent for the shapes themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldInfoCollection {
    entries: BTreeMap<FieldKey, FieldInfoEntry>,
}

impl FieldInfoCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shape, returning true when it was not present before
    pub fn add(&mut self, entry: FieldInfoEntry) -> bool {
        self.observe(entry) == ShapeChange::Added
    }

    /// Add a shape or extend the metadata of the known one
    pub fn observe(&mut self, entry: FieldInfoEntry) -> ShapeChange {
        match self.entries.entry(entry.key()) {
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
                ShapeChange::Added
            }
            Entry::Occupied(mut occupied) => {
                if occupied.get_mut().extend_metadata(&entry.metadata) {
                    ShapeChange::Extended
                } else {
                    ShapeChange::Unchanged
                }
            }
        }
    }

    /// Merge every shape of `other`, returning the number of new shapes
    pub fn merge(&mut self, other: &FieldInfoCollection) -> usize {
        other
            .entries
            .values()
            .filter(|entry| self.add((*entry).clone()))
            .count()
    }

    #[must_use]
    pub fn get(&self, key: &FieldKey) -> Option<&FieldInfoEntry> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &FieldKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldInfoEntry> {
        self.entries.values()
    }

    /// Distinct field paths in this collection
    #[must_use]
    pub fn field_names(&self) -> BTreeSet<&str> {
        self.entries.keys().map(|key| key.name.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<FieldInfoEntry> for FieldInfoCollection {
    fn from_iter<I: IntoIterator<Item = FieldInfoEntry>>(iter: I) -> Self {
        let mut collection = FieldInfoCollection::new();
        for entry in iter {
            collection.add(entry);
        }
        collection
    }
}

impl Extend<FieldInfoEntry> for FieldInfoCollection {
    fn extend<I: IntoIterator<Item = FieldInfoEntry>>(&mut self, iter: I) {
        for entry in iter {
            self.add(entry);
        }
    }
}

/// Query-time view of a single field path
///
/// Conflicting value kinds are kept side by side as alternates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub kinds: BTreeSet<ValueKind>,
    pub encodings: BTreeSet<FieldEncoding>,
    pub entries: Vec<FieldInfoEntry>,
}

impl FieldInfo {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kinds: BTreeSet::new(),
            encodings: BTreeSet::new(),
            entries: Vec::new(),
        }
    }

    pub(crate) fn absorb(&mut self, entry: &FieldInfoEntry) {
        let key = entry.key();
        if let Some(existing) = self.entries.iter_mut().find(|existing| existing.key() == key) {
            existing.extend_metadata(&entry.metadata);
            return;
        }
        self.kinds.insert(entry.kind);
        self.encodings.insert(entry.encoding);
        self.entries.push(entry.clone());
    }

    #[must_use]
    pub fn has_kind(&self, kind: ValueKind) -> bool {
        self.kinds.contains(&kind)
    }

    #[must_use]
    pub fn has_encoding(&self, encoding: FieldEncoding) -> bool {
        self.encodings.contains(&encoding)
    }

    /// True when more than one value kind has been observed
    #[must_use]
    pub fn is_polymorphic(&self) -> bool {
        self.kinds.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_reports_what_changed() {
        let mut collection = FieldInfoCollection::new();
        let shape = || FieldInfoEntry::new("price", ValueKind::Float, FieldEncoding::Float64, "numeric");

        assert_eq!(collection.observe(shape().with_metadata("unit", "eur")), ShapeChange::Added);
        assert_eq!(collection.observe(shape().with_metadata("unit", "usd")), ShapeChange::Unchanged);
        assert_eq!(collection.observe(shape().with_metadata("scale", "2")), ShapeChange::Extended);
        assert!(!collection.add(shape()));

        let stored = collection.get(&shape().key()).expect("tracked");
        assert_eq!(stored.metadata.get("unit").map(String::as_str), Some("eur"));
        assert_eq!(stored.metadata.get("scale").map(String::as_str), Some("2"));
        assert_eq!(collection.len(), 1);
    }
}
