//! In-process result store

use crate::harvest::ProductRecord;
use crate::storage::traits::{ResultStore, StorageError, StorageResult};
use std::collections::HashSet;

/// Result store that keeps everything in memory
///
/// Behaves like the SQLite store (title dedup, idempotent save) and records
/// how many times `save` was called, which makes it the store of choice for
/// exercising the iteration controller.
#[derive(Debug, Default)]
pub struct MemoryResultStore {
    execution_number: u32,
    seen: HashSet<String>,
    records: Vec<ProductRecord>,
    dirty: bool,
    save_calls: usize,
    effective_saves: usize,
    failing_saves: bool,
}

impl MemoryResultStore {
    pub fn new(execution_number: u32) -> Self {
        Self {
            execution_number,
            ..Default::default()
        }
    }

    /// Creates a store that already considers `titles` seen
    pub fn with_seen_titles<I, S>(execution_number: u32, titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            execution_number,
            seen: titles.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Makes every later `save` fail, as a full disk would
    pub fn with_failing_saves(mut self) -> Self {
        self.failing_saves = true;
        self
    }

    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    /// Number of times `save` was called
    pub fn save_count(&self) -> usize {
        self.save_calls
    }

    /// Number of `save` calls that had unsaved records to write
    pub fn effective_save_count(&self) -> usize {
        self.effective_saves
    }
}

impl ResultStore for MemoryResultStore {
    fn seen_titles(&self) -> &HashSet<String> {
        &self.seen
    }

    fn append(&mut self, records: Vec<ProductRecord>) -> StorageResult<usize> {
        let mut stored = 0;
        for record in records {
            if self.seen.insert(record.title.clone()) {
                self.records.push(record);
                stored += 1;
            }
        }
        if stored > 0 {
            self.dirty = true;
        }
        Ok(stored)
    }

    fn save(&mut self) -> StorageResult<()> {
        self.save_calls += 1;
        if self.failing_saves {
            return Err(StorageError::Database("disk full".to_string()));
        }
        if self.dirty {
            self.effective_saves += 1;
            self.dirty = false;
        }
        Ok(())
    }

    fn execution_number(&self) -> u32 {
        self.execution_number
    }

    fn total_products(&self) -> usize {
        self.records.len()
    }
}
