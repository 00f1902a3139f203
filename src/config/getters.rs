//! Getter methods for `IndexConfig`
//!
//! Besides plain accessors this assembles the runtime pieces the
//! configuration describes: classification options, the strategy registry
//! and the field resolver.

use std::path::Path;

use super::types::IndexConfig;
use crate::document::{
    ClassifyOptions, PathFieldResolver, ResolutionMode, StrategyRegistry, StrategyRule,
};
use crate::inflow::Priority;

impl IndexConfig {
    #[must_use]
    pub fn index_dir(&self) -> Option<&Path> {
        self.index_dir.as_deref()
    }

    #[must_use]
    pub fn writer_memory_limit(&self) -> usize {
        self.writer_memory_limit
    }

    #[must_use]
    pub fn worker_threads(&self) -> Option<usize> {
        self.worker_threads
    }

    #[must_use]
    pub fn worker_multiplier(&self) -> usize {
        self.worker_multiplier
    }

    /// Effective worker pool size
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| num_cpus::get() * self.worker_multiplier)
            .max(1)
    }

    #[must_use]
    pub fn max_inflight_cost(&self) -> Option<u64> {
        self.max_inflight_cost
    }

    #[must_use]
    pub fn convert_priority(&self) -> Priority {
        self.convert_priority
    }

    #[must_use]
    pub fn identity_field(&self) -> &str {
        &self.identity_field
    }

    #[must_use]
    pub fn content_type_field(&self) -> &str {
        &self.content_type_field
    }

    #[must_use]
    pub fn default_content_type(&self) -> Option<&str> {
        self.default_content_type.as_deref()
    }

    #[must_use]
    pub fn resolution_mode(&self) -> ResolutionMode {
        self.resolution_mode
    }

    #[must_use]
    pub fn max_errors(&self) -> usize {
        self.max_errors
    }

    #[must_use]
    pub fn strategies(&self) -> &[StrategyRule] {
        &self.strategies
    }

    #[must_use]
    pub fn classify_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            detect_dates: self.detect_dates,
            detect_guids: self.detect_guids,
            detect_uris: self.detect_uris,
            detect_timespans: self.detect_timespans,
        }
    }

    #[must_use]
    pub fn strategy_registry(&self) -> StrategyRegistry {
        StrategyRegistry::from_rules(&self.strategies)
    }

    #[must_use]
    pub fn field_resolver(&self) -> PathFieldResolver {
        let resolver = PathFieldResolver::new(
            self.identity_field.as_str(),
            self.content_type_field.as_str(),
            self.resolution_mode,
        );
        match &self.default_content_type {
            Some(content_type) => resolver.with_default_content_type(content_type.as_str()),
            None => resolver,
        }
    }
}
