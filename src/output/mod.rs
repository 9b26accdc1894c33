//! Output module for reporting harvest results
//!
//! This module handles:
//! - Exporting an execution's products as JSON
//! - Loading and printing per-execution statistics

mod json;
pub mod stats;

pub use json::{export_products_json, results_file_name};
pub use stats::{load_statistics, print_statistics, ExecutionStatistics, HarvestStatistics};
