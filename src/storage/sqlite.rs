//! SQLite storage implementation
//!
//! `SqliteStorage` owns the connection and answers archive queries.
//! `SqliteStorage::begin_execution` turns it into a `SqliteResultStore`
//! that accepts the products of one execution.

use crate::harvest::ProductRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{HarvestArchive, ResultStore, StorageError, StorageResult};
use crate::storage::{ExecutionRecord, RunStatus};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;

const EXECUTION_COLUMNS: &str = "id, root_url, execution_number, started_at, finished_at, \
                                 config_hash, status, products_found";

const PRODUCT_COLUMNS: &str = "title, url, name, price, currency, availability, description, \
                               image_url, sku, brand, harvested_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // WAL keeps every committed append durable without blocking readers
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Starts a new execution for `root_url`
    ///
    /// Allocates the next execution number for the site and records the
    /// execution as running. With `dedup_across_runs`, titles accepted by
    /// earlier executions of the same site count as already seen.
    ///
    /// # Arguments
    ///
    /// * `root_url` - Normalised root URL of the harvested site
    /// * `config_hash` - Hash of the configuration file
    /// * `dedup_across_runs` - Whether prior titles block re-acceptance
    pub fn begin_execution(
        self,
        root_url: &str,
        config_hash: &str,
        dedup_across_runs: bool,
    ) -> StorageResult<SqliteResultStore> {
        let execution_number: u32 = self.conn.query_row(
            "SELECT COALESCE(MAX(execution_number), 0) + 1 FROM executions WHERE root_url = ?1",
            params![root_url],
            |row| row.get(0),
        )?;

        let seen = if dedup_across_runs {
            self.titles_for_root(root_url)?
        } else {
            HashSet::new()
        };

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO executions (root_url, execution_number, started_at, config_hash, status)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                root_url,
                execution_number,
                now,
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        let execution_id = self.conn.last_insert_rowid();

        tracing::debug!(
            "Execution {} for {} started ({} titles already seen)",
            execution_number,
            root_url,
            seen.len()
        );

        Ok(SqliteResultStore {
            storage: self,
            execution_id,
            execution_number,
            seen,
            stored: 0,
            dirty: false,
        })
    }

    fn titles_for_root(&self, root_url: &str) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.title FROM products p
             JOIN executions e ON p.execution_id = e.id
             WHERE e.root_url = ?1",
        )?;

        let titles = stmt
            .query_map(params![root_url], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(titles)
    }
}

fn execution_from_row(row: &Row<'_>) -> rusqlite::Result<ExecutionRecord> {
    Ok(ExecutionRecord {
        id: row.get(0)?,
        root_url: row.get(1)?,
        execution_number: row.get(2)?,
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        config_hash: row.get(5)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(6)?)
            .unwrap_or(RunStatus::Running),
        products_found: row.get::<_, i64>(7)? as u64,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<ProductRecord> {
    let harvested_at: String = row.get(10)?;
    let harvested_at = DateTime::parse_from_rfc3339(&harvested_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ProductRecord {
        title: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        price: row.get(3)?,
        currency: row.get(4)?,
        availability: row.get(5)?,
        description: row.get(6)?,
        image_url: row.get(7)?,
        sku: row.get(8)?,
        brand: row.get(9)?,
        harvested_at,
    })
}

impl HarvestArchive for SqliteStorage {
    fn list_executions(&self, root_url: &str) -> StorageResult<Vec<ExecutionRecord>> {
        let sql = format!(
            "SELECT {} FROM executions WHERE root_url = ?1 ORDER BY execution_number",
            EXECUTION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let executions = stmt
            .query_map(params![root_url], execution_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(executions)
    }

    fn latest_execution(&self, root_url: &str) -> StorageResult<Option<ExecutionRecord>> {
        let sql = format!(
            "SELECT {} FROM executions WHERE root_url = ?1 ORDER BY execution_number DESC LIMIT 1",
            EXECUTION_COLUMNS
        );
        let execution = self
            .conn
            .query_row(&sql, params![root_url], execution_from_row)
            .optional()?;
        Ok(execution)
    }

    fn find_execution(
        &self,
        root_url: &str,
        execution_number: u32,
    ) -> StorageResult<Option<ExecutionRecord>> {
        let sql = format!(
            "SELECT {} FROM executions WHERE root_url = ?1 AND execution_number = ?2",
            EXECUTION_COLUMNS
        );
        let execution = self
            .conn
            .query_row(&sql, params![root_url, execution_number], execution_from_row)
            .optional()?;
        Ok(execution)
    }

    fn products_for_execution(&self, execution_id: i64) -> StorageResult<Vec<ProductRecord>> {
        let sql = format!(
            "SELECT {} FROM products WHERE execution_id = ?1 ORDER BY id",
            PRODUCT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let products = stmt
            .query_map(params![execution_id], product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(products)
    }

    fn count_products(&self, execution_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM products WHERE execution_id = ?1",
            params![execution_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Result store writing one execution's products to SQLite
///
/// Each `append` commits its own transaction, so accepted records survive a
/// crash even before the final `save`.
pub struct SqliteResultStore {
    storage: SqliteStorage,
    execution_id: i64,
    execution_number: u32,
    seen: HashSet<String>,
    stored: usize,
    dirty: bool,
}

impl SqliteResultStore {
    pub fn execution_id(&self) -> i64 {
        self.execution_id
    }

    /// Read access to the underlying database
    pub fn archive(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Saves, then records when and how the execution ended
    pub fn finish(&mut self, status: RunStatus) -> StorageResult<()> {
        self.save()?;
        self.mark_finished(status)
    }

    /// Records when and how the execution ended without saving first
    ///
    /// Used once a save has already failed, so the execution does not stay
    /// `running` forever.
    pub fn mark_finished(&mut self, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.storage.conn.execute(
            "UPDATE executions SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, self.execution_id],
        )?;
        if updated == 0 {
            return Err(StorageError::ExecutionNotFound(self.execution_id.to_string()));
        }

        tracing::debug!(
            "Execution {} finished with status {}",
            self.execution_number,
            status
        );
        Ok(())
    }

    /// Gives the storage back for archive queries
    pub fn into_storage(self) -> SqliteStorage {
        self.storage
    }
}

impl ResultStore for SqliteResultStore {
    fn seen_titles(&self) -> &HashSet<String> {
        &self.seen
    }

    fn append(&mut self, records: Vec<ProductRecord>) -> StorageResult<usize> {
        let mut accepted: HashSet<String> = HashSet::new();

        let tx = self.storage.conn.transaction()?;
        {
            let sql = format!(
                "INSERT OR IGNORE INTO products (execution_id, {})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                PRODUCT_COLUMNS
            );
            let mut stmt = tx.prepare(&sql)?;

            for record in &records {
                if self.seen.contains(&record.title) || accepted.contains(&record.title) {
                    continue;
                }

                let changed = stmt.execute(params![
                    self.execution_id,
                    record.title,
                    record.url,
                    record.name,
                    record.price,
                    record.currency,
                    record.availability,
                    record.description,
                    record.image_url,
                    record.sku,
                    record.brand,
                    record.harvested_at.to_rfc3339(),
                ])?;

                if changed == 1 {
                    accepted.insert(record.title.clone());
                }
            }
        }
        tx.commit()?;

        let count = accepted.len();
        self.seen.extend(accepted);
        self.stored += count;
        if count > 0 {
            self.dirty = true;
        }

        Ok(count)
    }

    fn save(&mut self) -> StorageResult<()> {
        if !self.dirty {
            return Ok(());
        }

        self.storage.conn.execute(
            "UPDATE executions SET products_found = ?1 WHERE id = ?2",
            params![self.stored as i64, self.execution_id],
        )?;
        self.storage
            .conn
            .query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_| Ok(()))?;

        self.dirty = false;
        tracing::debug!(
            "Saved {} products for execution {}",
            self.stored,
            self.execution_number
        );
        Ok(())
    }

    fn execution_number(&self) -> u32 {
        self.execution_number
    }

    fn total_products(&self) -> usize {
        self.stored
    }
}
