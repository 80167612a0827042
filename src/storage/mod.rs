//! Storage module for persisting harvested entries
//!
//! Every entry commits in its own transaction together with all of its
//! child rows (versions, issues, contributors, dependents), so a crash
//! loses at most the in-flight entry and a reader never observes a
//! partially enriched one. Re-discovery of an already-stored pair is an
//! expected steady state, not a fault: duplicate entries are skipped and
//! duplicate child rows silently absorbed.

mod schema;
mod sqlite;

pub use schema::initialize_schema;
pub use sqlite::SqliteCatalog;

use crate::enrich::{EnrichedEntry, IssueTally, VersionRecord};
use thiserror::Error;

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Persistence operations needed by the harvest
pub trait CatalogStore {
    /// Category currently stored for a pair, if the pair exists
    fn lookup_category(&self, owner: &str, repository: &str) -> StorageResult<Option<String>>;

    /// Rewrites the category of an existing pair
    fn promote_category(
        &mut self,
        owner: &str,
        repository: &str,
        category: &str,
    ) -> StorageResult<()>;

    /// Inserts an entry and all of its child rows in one transaction,
    /// committed immediately
    ///
    /// Returns `false` when the pair already exists; nothing is written in
    /// that case.
    fn insert_entry(&mut self, entry: &EnrichedEntry) -> StorageResult<bool>;

    /// (owner, repository) pairs stored under a category
    fn pairs_in_category(&self, category: &str) -> StorageResult<Vec<(String, String)>>;

    /// Total number of stored entries
    fn count_entries(&self) -> StorageResult<u64>;

    /// Entry counts per category
    fn category_counts(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Stored release history for a pair
    fn versions_for(&self, owner: &str, repository: &str) -> StorageResult<Vec<VersionRecord>>;

    /// Stored contributor logins for a pair
    fn contributors_for(&self, owner: &str, repository: &str) -> StorageResult<Vec<String>>;

    /// Stored issue tally for a pair
    fn issues_for(&self, owner: &str, repository: &str) -> StorageResult<Option<IssueTally>>;
}
