//! Database schema definitions
//!
//! This module contains the SQL schema for the harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per harvest of a root site
CREATE TABLE IF NOT EXISTS executions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    root_url TEXT NOT NULL,
    execution_number INTEGER NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    products_found INTEGER NOT NULL DEFAULT 0,
    UNIQUE(root_url, execution_number)
);

CREATE INDEX IF NOT EXISTS idx_executions_root ON executions(root_url);

-- Accepted product records; the title is the dedup key within an execution
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id INTEGER NOT NULL REFERENCES executions(id),
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    name TEXT NOT NULL,
    price TEXT,
    currency TEXT,
    availability TEXT,
    description TEXT,
    image_url TEXT,
    sku TEXT,
    brand TEXT,
    harvested_at TEXT NOT NULL,
    UNIQUE(execution_id, title)
);

CREATE INDEX IF NOT EXISTS idx_products_execution ON products(execution_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
