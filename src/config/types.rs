//! Core configuration types
//!
//! `IndexConfig` is deserializable so deployments can keep it in a JSON file;
//! missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::document::{ResolutionMode, StrategyRule};
use crate::errors::{IndexError, IndexResult};
use crate::inflow::Priority;
use crate::reporting::DEFAULT_MAX_ERRORS;

/// Writer heap shared by indexing threads
pub const DEFAULT_WRITER_MEMORY_LIMIT: usize = 50_000_000;

/// Smallest heap tantivy accepts for a writer
pub const MIN_WRITER_MEMORY_LIMIT: usize = 15_000_000;

/// Worker threads per available CPU
pub const DEFAULT_WORKER_MULTIPLIER: usize = 2;

pub const DEFAULT_IDENTITY_FIELD: &str = "id";
pub const DEFAULT_CONTENT_TYPE_FIELD: &str = "contentType";

/// Main configuration struct for an index and its ingestion pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Index directory; `None` keeps the index in memory
    pub(crate) index_dir: Option<PathBuf>,
    pub(crate) writer_memory_limit: usize,

    /// Explicit pool size, overriding `worker_multiplier`
    pub(crate) worker_threads: Option<usize>,
    pub(crate) worker_multiplier: usize,

    /// Ceiling on outstanding job cost; `None` admits everything
    ///
    /// A convert job costs its batch size and a write job costs 1, so this
    /// roughly bounds the number of documents held in memory.
    pub(crate) max_inflight_cost: Option<u64>,
    pub(crate) convert_priority: Priority,

    pub(crate) identity_field: String,
    pub(crate) content_type_field: String,
    pub(crate) default_content_type: Option<String>,
    pub(crate) resolution_mode: ResolutionMode,

    pub(crate) detect_dates: bool,
    pub(crate) detect_guids: bool,
    pub(crate) detect_uris: bool,
    pub(crate) detect_timespans: bool,

    /// Error records retained by the error collector
    pub(crate) max_errors: usize,
    pub(crate) strategies: Vec<StrategyRule>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_dir: None,
            writer_memory_limit: DEFAULT_WRITER_MEMORY_LIMIT,
            worker_threads: None,
            worker_multiplier: DEFAULT_WORKER_MULTIPLIER,
            max_inflight_cost: None,
            convert_priority: Priority::Medium,
            identity_field: DEFAULT_IDENTITY_FIELD.to_string(),
            content_type_field: DEFAULT_CONTENT_TYPE_FIELD.to_string(),
            default_content_type: None,
            resolution_mode: ResolutionMode::Dotted,
            detect_dates: true,
            detect_guids: true,
            detect_uris: true,
            detect_timespans: true,
            max_errors: DEFAULT_MAX_ERRORS,
            strategies: Vec::new(),
        }
    }
}

impl IndexConfig {
    /// Load a configuration from a JSON file and validate it
    pub fn from_json_file(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: IndexConfig = serde_json::from_str(&text).map_err(|e| {
            IndexError::Config(format!("invalid config file {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> IndexResult<()> {
        if self.identity_field.trim().is_empty() {
            return Err(IndexError::Config("identity_field must not be empty".to_string()));
        }
        if self.content_type_field.trim().is_empty() && self.default_content_type.is_none() {
            return Err(IndexError::Config(
                "content_type_field must not be empty without a default_content_type".to_string(),
            ));
        }
        if self.worker_multiplier == 0 {
            return Err(IndexError::Config("worker_multiplier must be at least 1".to_string()));
        }
        if self.worker_threads == Some(0) {
            return Err(IndexError::Config("worker_threads must be at least 1".to_string()));
        }
        if self.writer_memory_limit < MIN_WRITER_MEMORY_LIMIT {
            return Err(IndexError::Config(format!(
                "writer_memory_limit must be at least {MIN_WRITER_MEMORY_LIMIT} bytes, got {}",
                self.writer_memory_limit
            )));
        }
        if self.max_inflight_cost == Some(0) {
            return Err(IndexError::Config("max_inflight_cost must be at least 1".to_string()));
        }
        Ok(())
    }
}
