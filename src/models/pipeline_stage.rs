use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state_machine::WorkflowState;

/// Fixed stages of the manufacturing pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Research,
    Cad,
    Slicing,
    Printing,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 4] = [Self::Research, Self::Cad, Self::Slicing, Self::Printing];

    /// Zero-based position in the pipeline
    pub fn index(&self) -> usize {
        match self {
            Self::Research => 0,
            Self::Cad => 1,
            Self::Slicing => 2,
            Self::Printing => 3,
        }
    }

    /// Workflow phase entered while this stage runs
    pub fn phase(&self) -> WorkflowState {
        match self {
            Self::Research => WorkflowState::ResearchPhase,
            Self::Cad => WorkflowState::CadPhase,
            Self::Slicing => WorkflowState::SlicingPhase,
            Self::Printing => WorkflowState::PrintingPhase,
        }
    }

    /// Human-readable step name
    pub fn step_name(&self) -> &'static str {
        match self {
            Self::Research => "Research & Requirements",
            Self::Cad => "CAD Model Generation",
            Self::Slicing => "Slicing",
            Self::Printing => "Printing",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Cad => "cad",
            Self::Slicing => "slicing",
            Self::Printing => "printing",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
