//! Storage module for persisting harvest results
//!
//! This module handles all persistence for the harvester, including:
//! - SQLite database initialization and schema management
//! - Execution numbering and status tracking per root site
//! - Title-deduplicated product storage
//! - An in-memory store for tests and offline runs

mod memory;
mod schema;
mod sqlite;
mod traits;

pub use memory::MemoryResultStore;
pub use sqlite::{SqliteResultStore, SqliteStorage};
pub use traits::{HarvestArchive, ResultStore, StorageError, StorageResult};

use crate::HarvestError;
use std::path::Path;

/// Opens (creating if needed) the harvest database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to open or initialize the database
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteStorage::new(path)
}

/// Represents one harvest execution in the database
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub id: i64,
    pub root_url: String,
    pub execution_number: u32,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub products_found: u64,
}

/// Status of a harvest execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
