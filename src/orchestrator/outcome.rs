//! Terminal results of an orchestration.

use crate::error::ToolstreamError;
use crate::types::Assessment;
use crate::validate::ValidationReport;

/// A run that produced a validated result.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub result: Assessment,
    pub report: ValidationReport,
    /// Raw text the result was validated from.
    pub final_text: String,
    pub rounds: u32,
    pub attempts: u32,
    /// The last round still requested operations; its text was used as is.
    pub round_cap_reached: bool,
}

/// How an invocation ended.
#[derive(Debug)]
pub enum OrchestrationOutcome {
    Completed(CompletedRun),
    Failed {
        error: ToolstreamError,
        attempts: u32,
    },
    Canceled {
        attempts: u32,
    },
}

impl OrchestrationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }

    /// The validated result, if the run completed.
    pub fn result(&self) -> Option<&Assessment> {
        match self {
            Self::Completed(run) => Some(&run.result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ToolstreamError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed(run) => run.attempts,
            Self::Failed { attempts, .. } | Self::Canceled { attempts } => *attempts,
        }
    }

    /// Convert into a `Result`, treating cancellation as an error.
    pub fn into_result(self) -> Result<CompletedRun, ToolstreamError> {
        match self {
            Self::Completed(run) => Ok(run),
            Self::Failed { error, .. } => Err(error),
            Self::Canceled { .. } => Err(ToolstreamError::Canceled),
        }
    }
}
