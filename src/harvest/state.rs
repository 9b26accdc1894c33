//! Loop state for the iteration controller
//!
//! `Stage` is the controller's state machine and `IterationState` holds the
//! counters and clocks of one run. `IterationMetrics` collects per-stage
//! timings for one iteration.

use crate::HarvestError;
use std::fmt;
use std::time::{Duration, Instant};

/// One state of the iteration controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Counters reset, rendering probe, cancellation armed
    Init,

    // ===== Per-iteration stages, in execution order =====
    /// Request a batch of URLs from the frontier
    Discover,

    /// Drop URLs already processed in this run
    DedupUrls,

    /// Fetch page titles
    FetchTitles,

    /// Drop titles already stored or repeated within the batch
    DedupTitles,

    /// Select product pages
    Classify,

    /// Fetch product details
    FetchDetails,

    /// Append records to the result store
    Persist,

    /// Evaluate the stopping condition
    CheckStop,

    // ===== Terminal =====
    /// Single flush, summary, return
    Finalize,
}

impl Stage {
    /// Returns true if `next` may follow this stage
    ///
    /// Stages advance in order; `CheckStop` loops back to `Discover`; any
    /// non-terminal stage may jump to `Finalize`.
    pub fn can_transition_to(&self, next: Stage) -> bool {
        use Stage::*;

        if next == Finalize {
            return *self != Finalize;
        }

        matches!(
            (self, next),
            (Init, Discover)
                | (Discover, DedupUrls)
                | (DedupUrls, FetchTitles)
                | (FetchTitles, DedupTitles)
                | (DedupTitles, Classify)
                | (Classify, FetchDetails)
                | (FetchDetails, Persist)
                | (Persist, CheckStop)
                | (CheckStop, Discover)
        )
    }

    /// Returns true if the stage awaits an external collaborator
    pub fn is_suspension_point(&self) -> bool {
        matches!(
            self,
            Self::Init | Self::Discover | Self::FetchTitles | Self::Classify | Self::FetchDetails
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalize)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Discover => "discover",
            Self::DedupUrls => "dedup_urls",
            Self::FetchTitles => "fetch_titles",
            Self::DedupTitles => "dedup_titles",
            Self::Classify => "classify",
            Self::FetchDetails => "fetch_details",
            Self::Persist => "persist",
            Self::CheckStop => "check_stop",
            Self::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counters and clocks for one run; reset by every run, never persisted
#[derive(Debug, Clone)]
pub struct IterationState {
    /// Number of the iteration currently executing (1-based, 0 before the first)
    pub iteration: u64,

    /// Iterations that reached `CheckStop`
    pub completed_iterations: u64,

    /// Products the store accepted during this run
    pub accepted: usize,

    pub run_started: Instant,
    pub iteration_started: Instant,
    stage: Stage,
}

impl IterationState {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            iteration: 0,
            completed_iterations: 0,
            accepted: 0,
            run_started: now,
            iteration_started: now,
            stage: Stage::Init,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Moves to `next`, rejecting transitions the state machine forbids
    pub fn advance(&mut self, next: Stage) -> Result<(), HarvestError> {
        if !self.stage.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        Ok(())
    }

    /// Enters `Discover` for a new iteration and returns its number
    pub fn begin_iteration(&mut self) -> Result<u64, HarvestError> {
        self.advance(Stage::Discover)?;
        self.iteration += 1;
        self.iteration_started = Instant::now();
        Ok(self.iteration)
    }

    pub fn complete_iteration(&mut self) {
        self.completed_iterations += 1;
    }

    pub fn record_accepted(&mut self, stored: usize) {
        self.accepted += stored;
    }

    /// Enters `Finalize`; idempotent
    pub fn finalize(&mut self) {
        self.stage = Stage::Finalize;
    }

    pub fn iteration_elapsed(&self) -> Duration {
        self.iteration_started.elapsed()
    }

    pub fn run_elapsed(&self) -> Duration {
        self.run_started.elapsed()
    }
}

impl Default for IterationState {
    fn default() -> Self {
        Self::new()
    }
}

/// Item counts and stage timings for one iteration
#[derive(Debug, Clone, Default)]
pub struct IterationMetrics {
    pub iteration: u64,
    pub discovered: usize,
    pub fresh_urls: usize,
    pub titled: usize,
    pub fresh_titles: usize,
    pub classified: usize,
    pub detailed: usize,
    pub stored: usize,
    pub timings: Vec<(Stage, Duration)>,
}

impl IterationMetrics {
    pub fn new(iteration: u64) -> Self {
        Self {
            iteration,
            ..Default::default()
        }
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.timings.push((stage, elapsed));
    }

    pub fn time_in(&self, stage: Stage) -> Duration {
        self.timings
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, d)| *d)
            .sum()
    }
}
