//! What a finished run reports

use crate::harvest::state::Stage;
use crate::storage::RunStatus;
use std::fmt;
use std::time::Duration;

/// Why the controller entered `Finalize`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Accepted products reached the configured target
    TargetReached,
    /// The frontier returned an empty batch
    FrontierExhausted,
    /// The shutdown token was cancelled
    Interrupted,
    /// A collaborator failed; the run stopped at this stage
    StageFailed { stage: Stage, message: String },
}

impl StopReason {
    /// Maps the stop reason onto the status recorded for the execution
    pub fn run_status(&self) -> RunStatus {
        match self {
            Self::TargetReached | Self::FrontierExhausted => RunStatus::Completed,
            Self::Interrupted => RunStatus::Interrupted,
            Self::StageFailed { .. } => RunStatus::Failed,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetReached => write!(f, "target reached"),
            Self::FrontierExhausted => write!(f, "no more URLs to process"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::StageFailed { stage, message } => {
                write!(f, "failed during {}: {}", stage, message)
            }
        }
    }
}

/// Final report of one controller run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub execution_number: u32,
    /// Iterations that ran through `CheckStop`
    pub iterations: u64,
    /// Products the store accepted during this run
    pub accepted: usize,
    pub elapsed: Duration,
    pub stop_reason: StopReason,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "execution {}: {} products accepted over {} iterations in {:.2}s ({})",
            self.execution_number,
            self.accepted,
            self.iterations,
            self.elapsed.as_secs_f64(),
            self.stop_reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_mapping() {
        assert_eq!(StopReason::TargetReached.run_status(), RunStatus::Completed);
        assert_eq!(StopReason::FrontierExhausted.run_status(), RunStatus::Completed);
        assert_eq!(StopReason::Interrupted.run_status(), RunStatus::Interrupted);
        assert_eq!(
            StopReason::StageFailed {
                stage: Stage::Classify,
                message: "boom".to_string()
            }
            .run_status(),
            RunStatus::Failed
        );
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            execution_number: 3,
            iterations: 2,
            accepted: 6,
            elapsed: Duration::from_millis(1500),
            stop_reason: StopReason::FrontierExhausted,
        };
        assert_eq!(
            summary.to_string(),
            "execution 3: 6 products accepted over 2 iterations in 1.50s (no more URLs to process)"
        );
    }
}
