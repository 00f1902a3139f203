//! Fluent builder for `IndexConfig`
//!
//! Every setting has a default, so the builder starts from
//! `IndexConfig::default()` and only validates on `build()`.

use super::types::IndexConfig;
use crate::errors::IndexResult;

#[derive(Debug, Clone, Default)]
pub struct IndexConfigBuilder {
    pub(crate) config: IndexConfig,
}

impl IndexConfig {
    /// Create a builder for configuring an `IndexConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }
}

impl From<IndexConfig> for IndexConfigBuilder {
    fn from(config: IndexConfig) -> Self {
        Self { config }
    }
}

impl IndexConfigBuilder {
    /// Validate and produce the configuration
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Config` when the identity field is blank, the
    /// worker multiplier or thread count is zero, the writer memory limit is
    /// below `MIN_WRITER_MEMORY_LIMIT`, or the inflight ceiling is zero.
    pub fn build(self) -> IndexResult<IndexConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
