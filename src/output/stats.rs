//! Statistics generation from the harvest database
//!
//! This module provides functionality for extracting and displaying
//! per-execution statistics for one root site.

use crate::storage::{ExecutionRecord, HarvestArchive, RunStatus};
use crate::Result;
use chrono::{DateTime, Utc};

/// Statistics for one execution
#[derive(Debug, Clone)]
pub struct ExecutionStatistics {
    pub execution: ExecutionRecord,

    /// Products actually stored for the execution
    pub stored_products: u64,

    /// Wall-clock duration, if the execution finished
    pub duration_seconds: Option<i64>,
}

/// Harvest statistics summary for one root site
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    pub root_url: String,

    /// Executions in ascending execution number
    pub executions: Vec<ExecutionStatistics>,

    /// Products stored across all executions
    pub total_products: u64,
}

impl HarvestStatistics {
    /// Number of executions that ended with `status`
    pub fn count_with_status(&self, status: RunStatus) -> usize {
        self.executions
            .iter()
            .filter(|e| e.execution.status == status)
            .count()
    }
}

/// Loads statistics for `root_url` from the archive
///
/// # Arguments
///
/// * `archive` - The storage backend to query
/// * `root_url` - Normalised root URL the executions were recorded under
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(archive: &dyn HarvestArchive, root_url: &str) -> Result<HarvestStatistics> {
    let mut executions = Vec::new();
    let mut total_products = 0;

    for execution in archive.list_executions(root_url)? {
        let stored_products = archive.count_products(execution.id)?;
        total_products += stored_products;
        let duration_seconds = duration_seconds(&execution.started_at, execution.finished_at.as_deref());
        executions.push(ExecutionStatistics {
            execution,
            stored_products,
            duration_seconds,
        });
    }

    Ok(HarvestStatistics {
        root_url: root_url.to_string(),
        executions,
        total_products,
    })
}

fn duration_seconds(started_at: &str, finished_at: Option<&str>) -> Option<i64> {
    let started = started_at.parse::<DateTime<Utc>>().ok()?;
    let finished = finished_at?.parse::<DateTime<Utc>>().ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Site: {}", stats.root_url);
    println!("  Executions: {}", stats.executions.len());
    println!("  Products stored: {}", stats.total_products);
    println!();

    if stats.executions.is_empty() {
        println!("No executions recorded for this site.");
        return;
    }

    println!("Executions:");
    for entry in &stats.executions {
        let execution = &entry.execution;
        let duration = entry
            .duration_seconds
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  #{:<4} {:<12} {:>6} products  {:>8}  started {}",
            execution.execution_number,
            execution.status.to_db_string(),
            entry.stored_products,
            duration,
            execution.started_at
        );
    }
    println!();

    println!(
        "Completed: {}  Interrupted: {}  Failed: {}  Running: {}",
        stats.count_with_status(RunStatus::Completed),
        stats.count_with_status(RunStatus::Interrupted),
        stats.count_with_status(RunStatus::Failed),
        stats.count_with_status(RunStatus::Running)
    );
}
