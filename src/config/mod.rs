//! Configuration for the index and its inflow pipeline
//!
//! This module provides the `IndexConfig` struct and its builder, which
//! validates settings once at construction.

// Sub-modules
pub mod builder;
pub mod getters;
pub mod methods;
pub mod types;

// Re-exports for public API
pub use builder::IndexConfigBuilder;
pub use types::{
    DEFAULT_CONTENT_TYPE_FIELD, DEFAULT_IDENTITY_FIELD, DEFAULT_WORKER_MULTIPLIER,
    DEFAULT_WRITER_MEMORY_LIMIT, IndexConfig, MIN_WRITER_MEMORY_LIMIT,
};
