//! Index collaborators
//!
//! - `query` - structured queries emitted by field strategies
//! - `writer` - the write contract the inflow pipeline drives
//! - `tantivy_index` - tantivy-backed implementation of both

pub mod query;
pub mod tantivy_index;
pub mod writer;

pub use query::FieldQuery;
pub use tantivy_index::{SearchHit, TantivyIndex};
pub use writer::IndexWriter;
