use serde::{Deserialize, Serialize};
use std::fmt;

/// Workflow state: one phase per pipeline stage plus the terminal outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Created, not yet executing
    #[default]
    Pending,
    ResearchPhase,
    CadPhase,
    SlicingPhase,
    PrintingPhase,
    /// Every step completed
    Completed,
    /// A step failed with retries exhausted or a non-retryable error
    Failed,
    /// Stopped by an external cancel request
    Cancelled,
}

impl WorkflowState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Check if the workflow is executing one of its phases
    pub fn is_active(&self) -> bool {
        self.phase_index().is_some()
    }

    /// Position of the phase in pipeline order
    pub fn phase_index(&self) -> Option<usize> {
        match self {
            Self::ResearchPhase => Some(0),
            Self::CadPhase => Some(1),
            Self::SlicingPhase => Some(2),
            Self::PrintingPhase => Some(3),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::ResearchPhase => "research_phase",
            Self::CadPhase => "cad_phase",
            Self::SlicingPhase => "slicing_phase",
            Self::PrintingPhase => "printing_phase",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkflowState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "research_phase" => Ok(Self::ResearchPhase),
            "cad_phase" => Ok(Self::CadPhase),
            "slicing_phase" => Ok(Self::SlicingPhase),
            "printing_phase" => Ok(Self::PrintingPhase),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid workflow state: {s}")),
        }
    }
}

/// Workflow step state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    /// Initial state when step is created
    #[default]
    Pending,
    /// Step is waiting on its capability (across retries)
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Invalid workflow step state: {s}")),
        }
    }
}
