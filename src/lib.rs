//! Search layer over a full-text index for schemaless JSON documents
//!
//! Documents are materialized into index-native fields, their shapes are
//! tracked per content type, and the inflow pipeline converts batches
//! concurrently while writing them in submission order.

pub mod config;
pub mod document;
pub mod errors;
pub mod index;
pub mod inflow;
pub mod reporting;
pub mod schema;

pub use config::{IndexConfig, IndexConfigBuilder};
pub use document::{
    BlockingCollector, DocumentEntry, DocumentMaterializer, FieldResolver, FieldStrategy,
    IdentityTerm, IndexField, JsonValue, PathFieldResolver, ResolutionMode, StrategyKind,
    StrategyRegistry, StrategyRule,
};
pub use errors::{IndexError, IndexResult};
pub use index::{FieldQuery, IndexWriter, SearchHit, TantivyIndex};
pub use inflow::{
    BoundedCapacity, InflowCapacity, InflowManager, InflowQueue, InflowStats,
    InflowStatsSnapshot, Job, JobContext, Priority, PriorityJobQueue, ReservedSlot, Scheduler,
    SlotState, UnboundedCapacity, WorkerPool,
};
pub use reporting::{ErrorCollector, ErrorHook, ErrorRecord};
pub use schema::{FieldEncoding, FieldInfo, FieldInfoCollection, FieldInfoEntry, SchemaTracker, ValueKind};
