//! Document materialization: JSON in, index-native fields out
//!
//! - `value` - closed value model with string classification
//! - `strategy` - field strategies and their registry
//! - `resolver` - identity and content-type resolution
//! - `collector` - unordered blocking collector for batch results
//! - `materializer` - the walk that ties them together

pub mod collector;
pub mod materializer;
pub mod resolver;
pub mod strategy;
pub mod value;

pub use collector::{BlockingCollector, BlockingIter};
pub use materializer::{DocumentEntry, DocumentMaterializer};
pub use resolver::{FieldResolver, IdentityTerm, PathFieldResolver, ResolutionMode};
pub use strategy::{
    DefaultStrategy, FieldStrategy, FieldValue, IndexField, NULL_SENTINEL, NullStrategy,
    NumericStrategy, StrategyKind, StrategyRegistry, StrategyRule, TermStrategy,
};
pub use value::{ClassifyOptions, JsonValue};
