//! Harvest module: the iteration controller and the values it moves
//!
//! This module contains the core harvesting loop, including:
//! - Collaborator traits (frontier, title fetcher, classifier, detail fetcher)
//! - The stage state machine and per-iteration metrics
//! - The controller that sequences the stages and owns the dedup state
//! - `run_harvest`, which wires the HTTP collaborators and SQLite storage

mod controller;
mod state;
mod summary;
mod traits;
mod types;

pub use controller::{HarvestSettings, IterationController};
pub use state::{IterationMetrics, IterationState, Stage};
pub use summary::{RunSummary, StopReason};
pub use traits::{Classifier, DetailFetcher, Frontier, TitleFetcher};
pub use types::{normalize_title, ProductRecord, RenderMode, TitledUrl};

use crate::classify::build_classifier;
use crate::crawler::{HttpDetailFetcher, HttpTitleFetcher, SiteFrontier};
use crate::lifecycle::Lifecycle;
use crate::output::{export_products_json, results_file_name};
use crate::storage::{open_storage, RunStatus};
use crate::url::normalize_url;
use crate::Result;
use std::path::{Path, PathBuf};

/// Outcome of a full harvest run
#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub summary: RunSummary,
    pub root_url: String,
    pub execution_id: i64,
    /// JSON export of this execution's products
    pub results_path: PathBuf,
    pub exported: usize,
}

/// Runs one harvest of the configured root site
///
/// This is the main entry point for harvesting. It will:
/// 1. Open the database and begin a new execution for the root site
/// 2. Build the frontier, fetchers and classifier over the shared client
/// 3. Run the iteration controller until it stops
/// 4. Record the execution status and export the results as JSON
///
/// # Arguments
///
/// * `lifecycle` - Process-wide configuration, HTTP client and shutdown token
///
/// # Returns
///
/// * `Ok(HarvestReport)` - Run finished (including interrupted or failed stages)
/// * `Err(HarvestError)` - Setup, flush or export failed
pub async fn run_harvest(lifecycle: &Lifecycle) -> Result<HarvestReport> {
    let config = lifecycle.config();
    let root = normalize_url(&config.harvest.root_url)?;

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let store = storage.begin_execution(
        root.as_str(),
        lifecycle.config_hash(),
        config.output.dedup_across_runs,
    )?;
    let execution_id = store.execution_id();

    let client = lifecycle.client().clone();
    let frontier = SiteFrontier::new(
        client.clone(),
        root.clone(),
        &config.crawler,
        &config.user_agent.crawler_name,
    );
    let classifier = build_classifier(&config.classifier, client.clone())?;

    let mut controller = IterationController::new(
        HarvestSettings::from(&config.harvest),
        Box::new(frontier),
        Box::new(HttpTitleFetcher::new(client.clone())),
        classifier,
        Box::new(HttpDetailFetcher::new(client)),
        store,
    );

    let outcome = controller.run(lifecycle.shutdown()).await;
    let mut store = controller.into_store();

    let summary = match outcome {
        Ok(summary) => summary,
        Err(e) => {
            if let Err(finish_err) = store.mark_finished(RunStatus::Failed) {
                tracing::warn!("Could not mark execution as failed: {}", finish_err);
            }
            return Err(e);
        }
    };
    store.finish(summary.stop_reason.run_status())?;

    let storage = store.into_storage();
    let results_path =
        Path::new(&config.output.results_dir).join(results_file_name(&root, summary.execution_number));
    let exported = export_products_json(&storage, execution_id, &results_path)?;

    Ok(HarvestReport {
        summary,
        root_url: root.to_string(),
        execution_id,
        results_path,
        exported,
    })
}
