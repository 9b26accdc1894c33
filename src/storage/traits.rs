//! Storage traits and error types
//!
//! `ResultStore` is the write side the iteration controller drives;
//! `HarvestArchive` is the read side used for statistics and exports.

use crate::harvest::ProductRecord;
use crate::storage::ExecutionRecord;
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Accumulates the deduplicated products of one execution
///
/// The store owns the set of titles already accepted. `append` is the only
/// way that set grows, and its return value is the authoritative count of
/// records accepted.
pub trait ResultStore: Send {
    /// Titles already accepted (including prior executions, if configured)
    fn seen_titles(&self) -> &HashSet<String>;

    /// Stores every record whose title is not yet seen
    ///
    /// # Returns
    ///
    /// The number of records actually stored
    fn append(&mut self, records: Vec<ProductRecord>) -> StorageResult<usize>;

    /// Makes everything appended so far durable
    ///
    /// Calling `save` again without an intervening `append` does nothing.
    fn save(&mut self) -> StorageResult<()>;

    /// Number of this execution among all executions for the root site
    fn execution_number(&self) -> u32;

    /// Records held for this execution
    fn total_products(&self) -> usize;
}

/// Read access to past executions and their products
pub trait HarvestArchive {
    /// Lists every execution for `root_url`, oldest first
    fn list_executions(&self, root_url: &str) -> StorageResult<Vec<ExecutionRecord>>;

    /// Gets the most recent execution for `root_url`
    fn latest_execution(&self, root_url: &str) -> StorageResult<Option<ExecutionRecord>>;

    /// Gets one execution by its per-site number
    fn find_execution(
        &self,
        root_url: &str,
        execution_number: u32,
    ) -> StorageResult<Option<ExecutionRecord>>;

    /// Loads the products accepted by an execution, in acceptance order
    fn products_for_execution(&self, execution_id: i64) -> StorageResult<Vec<ProductRecord>>;

    /// Counts the products accepted by an execution
    fn count_products(&self, execution_id: i64) -> StorageResult<u64>;
}
