//! Field and schema information observed across ingested documents
//!
//! Every materialized field reports its shape (path, value kind, encoding and
//! the strategy that produced it). Shapes only ever accumulate; conflicting
//! kinds for the same path are kept as alternates for query planning.

pub mod tracker;
pub mod types;

pub use tracker::{SchemaTracker, SchemaView};
pub use types::{
    FieldEncoding, FieldInfo, FieldInfoCollection, FieldInfoEntry, FieldKey, ShapeChange, ValueKind,
};
