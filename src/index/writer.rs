//! Write contract between the inflow pipeline and an index

use crate::document::{DocumentEntry, IdentityTerm};
use crate::errors::IndexResult;

/// Accepts identity-keyed documents for upsert and deletion
///
/// Calls arrive from whichever thread drains the inflow queue, one slot at a
/// time and in submission order. Commits are caller driven.
pub trait IndexWriter: Send + Sync {
    /// Insert the entry, replacing any document with the same identity
    fn upsert(&self, entry: &DocumentEntry) -> IndexResult<()>;

    fn delete(&self, identity: &IdentityTerm) -> IndexResult<()>;

    /// Make every preceding upsert and delete visible to readers
    fn commit(&self) -> IndexResult<()>;
}
