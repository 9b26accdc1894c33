//! The iteration controller
//!
//! Sequences discovery, title fetching, classification, detail fetching and
//! persistence one iteration at a time until the target yield is reached,
//! the frontier runs dry, a collaborator fails, or the shutdown token fires.
//! Every path out of the loop performs exactly one flush of the result store.

use crate::config::HarvestConfig;
use crate::harvest::state::{IterationMetrics, IterationState, Stage};
use crate::harvest::summary::{RunSummary, StopReason};
use crate::harvest::traits::{Classifier, DetailFetcher, Frontier, TitleFetcher};
use crate::harvest::types::{normalize_title, RenderMode, TitledUrl};
use crate::storage::ResultStore;
use crate::{HarvestError, Result};
use std::collections::HashSet;
use std::future::Future;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Limits the controller applies to each iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestSettings {
    /// Stop once this many products were accepted
    pub target_products: usize,
    /// URLs requested from the frontier per iteration
    pub batch_size: usize,
    /// Concurrency cap handed to the fetchers
    pub concurrency: usize,
    /// Titled URLs per classifier call
    pub classifier_batch_size: usize,
}

impl From<&HarvestConfig> for HarvestSettings {
    fn from(config: &HarvestConfig) -> Self {
        Self {
            target_products: config.target_products,
            batch_size: config.batch_size,
            concurrency: config.concurrent_requests,
            classifier_batch_size: config.classifier_batch_size,
        }
    }
}

/// Why an iteration ended early
enum Halt {
    Interrupted { stage: Stage },
    Failed { stage: Stage, error: HarvestError },
}

/// Coordinates the collaborators for one run over one root site
pub struct IterationController<S: ResultStore> {
    settings: HarvestSettings,
    frontier: Box<dyn Frontier>,
    titles: Box<dyn TitleFetcher>,
    classifier: Box<dyn Classifier>,
    details: Box<dyn DetailFetcher>,
    store: S,
    processed: HashSet<String>,
    state: IterationState,
    render_mode: Option<RenderMode>,
    flushed: bool,
}

impl<S: ResultStore> IterationController<S> {
    pub fn new(
        settings: HarvestSettings,
        frontier: Box<dyn Frontier>,
        titles: Box<dyn TitleFetcher>,
        classifier: Box<dyn Classifier>,
        details: Box<dyn DetailFetcher>,
        store: S,
    ) -> Self {
        Self {
            settings,
            frontier,
            titles,
            classifier,
            details,
            store,
            processed: HashSet::new(),
            state: IterationState::new(),
            render_mode: None,
            flushed: false,
        }
    }

    /// Runs iterations until a stop condition holds, then flushes once
    ///
    /// Collaborator failures and interrupts are not errors: both end the run
    /// normally with the matching `StopReason`. Only a failing flush is
    /// returned as `Err`, as [`HarvestError::FlushFailed`] carrying the
    /// summary of the run.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Cancelled by the operator interrupt; raced against
    ///   every collaborator await
    pub async fn run(&mut self, shutdown: &CancellationToken) -> Result<RunSummary> {
        self.state = IterationState::new();
        self.processed.clear();
        self.flushed = false;

        tracing::info!(
            "Starting execution {}: target {} products, batch {} URLs, concurrency {}",
            self.store.execution_number(),
            self.settings.target_products,
            self.settings.batch_size,
            self.settings.concurrency
        );

        let stop_reason = self.drive(shutdown).await;
        self.finalize(stop_reason)
    }

    /// Persists everything accepted so far, at most once per run
    ///
    /// # Returns
    ///
    /// `true` if this call performed the flush, `false` if it had already run
    pub fn flush(&mut self) -> Result<bool> {
        if self.flushed {
            return Ok(false);
        }
        // Latch first: a failing save must not be retried by a later call
        self.flushed = true;
        self.store.save()?;
        Ok(true)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// URLs taken from the frontier during the current run
    pub fn processed_urls(&self) -> &HashSet<String> {
        &self.processed
    }

    /// Rendering mode reported by the frontier probe, once it has run
    pub fn render_mode(&self) -> Option<RenderMode> {
        self.render_mode
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    async fn drive(&mut self, shutdown: &CancellationToken) -> StopReason {
        let mut init_metrics = IterationMetrics::new(0);
        match run_stage(
            Stage::Init,
            shutdown,
            &mut init_metrics,
            self.frontier.probe_rendering(),
        )
        .await
        {
            Ok(mode) => {
                tracing::info!("Site rendering mode: {}", mode);
                self.render_mode = Some(mode);
            }
            Err(halt) => return self.halted(halt),
        }

        loop {
            if shutdown.is_cancelled() {
                tracing::info!(
                    "Interrupt received; not starting iteration {}",
                    self.state.iteration + 1
                );
                return StopReason::Interrupted;
            }

            match self.run_iteration(shutdown).await {
                Ok(None) => {}
                Ok(Some(reason)) => return reason,
                Err(halt) => return self.halted(halt),
            }
        }
    }

    /// Runs one iteration; `Ok(Some(_))` means the loop should stop
    async fn run_iteration(
        &mut self,
        shutdown: &CancellationToken,
    ) -> std::result::Result<Option<StopReason>, Halt> {
        let iteration = self
            .state
            .begin_iteration()
            .map_err(|error| Halt::Failed {
                stage: Stage::Discover,
                error,
            })?;
        let mut metrics = IterationMetrics::new(iteration);
        tracing::debug!(iteration, "Iteration {} started", iteration);

        let batch = run_stage(
            Stage::Discover,
            shutdown,
            &mut metrics,
            self.frontier.next_batch(self.settings.batch_size),
        )
        .await?;
        metrics.discovered = batch.len();

        if batch.is_empty() {
            tracing::info!(
                iteration,
                "Frontier exhausted after {} URLs",
                self.processed.len()
            );
            return Ok(Some(StopReason::FrontierExhausted));
        }

        self.enter(Stage::DedupUrls, shutdown)?;
        let fresh_urls = dedup_urls(&mut self.processed, batch);
        metrics.fresh_urls = fresh_urls.len();

        self.enter(Stage::FetchTitles, shutdown)?;
        let titled = if fresh_urls.is_empty() {
            Vec::new()
        } else {
            run_stage(
                Stage::FetchTitles,
                shutdown,
                &mut metrics,
                self.titles
                    .fetch_titles(fresh_urls, self.settings.concurrency),
            )
            .await?
        };
        metrics.titled = titled.len();

        self.enter(Stage::DedupTitles, shutdown)?;
        let candidates = dedup_titles(self.store.seen_titles(), titled);
        metrics.fresh_titles = candidates.len();

        self.enter(Stage::Classify, shutdown)?;
        let products = if candidates.is_empty() {
            tracing::debug!(iteration, "No new titles; skipping classification");
            Vec::new()
        } else {
            run_stage(
                Stage::Classify,
                shutdown,
                &mut metrics,
                self.classifier
                    .select_products(candidates, self.settings.classifier_batch_size),
            )
            .await?
        };
        metrics.classified = products.len();

        self.enter(Stage::FetchDetails, shutdown)?;
        let records = if products.is_empty() {
            Vec::new()
        } else {
            run_stage(
                Stage::FetchDetails,
                shutdown,
                &mut metrics,
                self.details
                    .fetch_details(products, self.settings.concurrency),
            )
            .await?
        };
        metrics.detailed = records.len();

        self.enter(Stage::Persist, shutdown)?;
        if !records.is_empty() {
            let started = Instant::now();
            let stored = self.store.append(records).map_err(|e| Halt::Failed {
                stage: Stage::Persist,
                error: e.into(),
            })?;
            metrics.record(Stage::Persist, started.elapsed());
            metrics.stored = stored;
            self.state.record_accepted(stored);
        }

        self.enter(Stage::CheckStop, shutdown)?;
        self.state.complete_iteration();
        self.log_iteration(&metrics);

        if self.state.accepted >= self.settings.target_products {
            tracing::info!(
                iteration,
                "Target of {} products reached",
                self.settings.target_products
            );
            return Ok(Some(StopReason::TargetReached));
        }

        Ok(None)
    }

    /// Moves to `stage` unless an interrupt arrived at the boundary
    fn enter(&mut self, stage: Stage, shutdown: &CancellationToken) -> std::result::Result<(), Halt> {
        if shutdown.is_cancelled() {
            return Err(Halt::Interrupted { stage });
        }
        self.state
            .advance(stage)
            .map_err(|error| Halt::Failed { stage, error })
    }

    fn halted(&self, halt: Halt) -> StopReason {
        match halt {
            Halt::Interrupted { stage } => {
                tracing::warn!(
                    iteration = self.state.iteration,
                    stage = %stage,
                    "Interrupted during {}; discarding partial output of iteration {}",
                    stage,
                    self.state.iteration
                );
                StopReason::Interrupted
            }
            Halt::Failed { stage, error } => {
                tracing::error!(
                    iteration = self.state.iteration,
                    stage = %stage,
                    "Iteration {} failed during {}: {}",
                    self.state.iteration,
                    stage,
                    error
                );
                StopReason::StageFailed {
                    stage,
                    message: error.to_string(),
                }
            }
        }
    }

    fn log_iteration(&self, metrics: &IterationMetrics) {
        tracing::info!(
            iteration = metrics.iteration,
            urls = metrics.fresh_urls,
            titles = metrics.fresh_titles,
            products = metrics.classified,
            stored = metrics.stored,
            elapsed_ms = self.state.iteration_elapsed().as_millis() as u64,
            "Iteration {}: {} new products ({}/{} accepted, {} in store)",
            metrics.iteration,
            metrics.stored,
            self.state.accepted,
            self.settings.target_products,
            self.store.total_products()
        );

        for (stage, elapsed) in &metrics.timings {
            tracing::debug!(
                iteration = metrics.iteration,
                stage = %stage,
                "{} took {:.2}s",
                stage,
                elapsed.as_secs_f64()
            );
        }
    }

    fn finalize(&mut self, stop_reason: StopReason) -> Result<RunSummary> {
        self.state.finalize();

        let summary = RunSummary {
            execution_number: self.store.execution_number(),
            iterations: self.state.completed_iterations,
            accepted: self.state.accepted,
            elapsed: self.state.run_elapsed(),
            stop_reason,
        };

        if let Err(error) = self.flush() {
            tracing::error!("Harvest finished without a final save: {}", summary);
            return Err(HarvestError::FlushFailed {
                summary: Box::new(summary),
                source: Box::new(error),
            });
        }

        tracing::info!("Harvest finished: {}", summary);
        Ok(summary)
    }
}

/// Awaits one collaborator call, abandoning it if `shutdown` fires first
async fn run_stage<T, F>(
    stage: Stage,
    shutdown: &CancellationToken,
    metrics: &mut IterationMetrics,
    call: F,
) -> std::result::Result<T, Halt>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let outcome = tokio::select! {
        biased;
        _ = shutdown.cancelled() => None,
        result = call => Some(result),
    };
    metrics.record(stage, started.elapsed());

    match outcome {
        None => Err(Halt::Interrupted { stage }),
        Some(Ok(value)) => Ok(value),
        Some(Err(error)) => Err(Halt::Failed { stage, error }),
    }
}

/// Keeps URLs not processed before, recording every one of them as processed
fn dedup_urls(processed: &mut HashSet<String>, batch: Vec<String>) -> Vec<String> {
    batch
        .into_iter()
        .filter(|url| processed.insert(url.clone()))
        .collect()
}

/// Drops already-seen titles and repeats within the batch (first one wins)
fn dedup_titles(seen: &HashSet<String>, pages: Vec<TitledUrl>) -> Vec<TitledUrl> {
    let mut batch_titles = HashSet::new();
    pages
        .into_iter()
        .map(|mut page| {
            page.title = normalize_title(&page.title);
            page
        })
        .filter(|page| !seen.contains(&page.title) && batch_titles.insert(page.title.clone()))
        .collect()
}
