//! Builder setter methods for `IndexConfigBuilder`

use std::path::PathBuf;

use super::builder::IndexConfigBuilder;
use crate::document::{ResolutionMode, StrategyRule};
use crate::inflow::Priority;

impl IndexConfigBuilder {
    /// Store the index on disk instead of in memory
    #[must_use]
    pub fn index_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
        self.config.index_dir = dir.map(Into::into);
        self
    }

    #[must_use]
    pub fn writer_memory_limit(mut self, bytes: usize) -> Self {
        self.config.writer_memory_limit = bytes;
        self
    }

    #[must_use]
    pub fn worker_threads(mut self, threads: Option<usize>) -> Self {
        self.config.worker_threads = threads;
        self
    }

    #[must_use]
    pub fn worker_multiplier(mut self, multiplier: usize) -> Self {
        self.config.worker_multiplier = multiplier;
        self
    }

    /// Bound outstanding job cost, blocking submitters above the ceiling
    #[must_use]
    pub fn max_inflight_cost(mut self, ceiling: Option<u64>) -> Self {
        self.config.max_inflight_cost = ceiling;
        self
    }

    #[must_use]
    pub fn convert_priority(mut self, priority: Priority) -> Self {
        self.config.convert_priority = priority;
        self
    }

    #[must_use]
    pub fn identity_field(mut self, field: impl Into<String>) -> Self {
        self.config.identity_field = field.into();
        self
    }

    #[must_use]
    pub fn content_type_field(mut self, field: impl Into<String>) -> Self {
        self.config.content_type_field = field.into();
        self
    }

    #[must_use]
    pub fn default_content_type(mut self, content_type: Option<impl Into<String>>) -> Self {
        self.config.default_content_type = content_type.map(Into::into);
        self
    }

    #[must_use]
    pub fn resolution_mode(mut self, mode: ResolutionMode) -> Self {
        self.config.resolution_mode = mode;
        self
    }

    #[must_use]
    pub fn detect_dates(mut self, detect: bool) -> Self {
        self.config.detect_dates = detect;
        self
    }

    #[must_use]
    pub fn detect_guids(mut self, detect: bool) -> Self {
        self.config.detect_guids = detect;
        self
    }

    #[must_use]
    pub fn detect_uris(mut self, detect: bool) -> Self {
        self.config.detect_uris = detect;
        self
    }

    #[must_use]
    pub fn detect_timespans(mut self, detect: bool) -> Self {
        self.config.detect_timespans = detect;
        self
    }

    #[must_use]
    pub fn max_errors(mut self, max: usize) -> Self {
        self.config.max_errors = max;
        self
    }

    /// Add one strategy rule
    #[must_use]
    pub fn strategy(mut self, rule: StrategyRule) -> Self {
        self.config.strategies.push(rule);
        self
    }

    /// Replace all strategy rules
    #[must_use]
    pub fn strategies(mut self, rules: Vec<StrategyRule>) -> Self {
        self.config.strategies = rules;
        self
    }
}
