//! Error types for the orchestration core.
//!
//! Pipeline and workflow failures are typed so callers can tell which stage
//! or which step went wrong. Variant failures never surface here: the
//! coordinator records them on the variant instead.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::domain::{StageName, StepStatus, StepType, WorkflowStatus};

/// Failure reported by an external generation or fact-check provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider returned malformed output: {0}")]
    Malformed(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why a stage did not produce output
#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("deadline of {limit:?} exceeded")]
    TimedOut { limit: Duration },

    #[error("cancelled")]
    Cancelled,
}

/// A single generation stage failed, aborting the run
#[derive(Debug, Error)]
#[error("Stage '{stage}' failed: {cause}")]
pub struct StageError {
    pub stage: StageName,
    #[source]
    pub cause: StageFailure,
}

impl StageError {
    pub fn new(stage: StageName, cause: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.cause, StageFailure::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self.cause,
            StageFailure::TimedOut { .. } | StageFailure::Provider(ProviderError::Timeout(_))
        )
    }
}

/// Failure of a whole pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Stage(#[from] StageError),
}

impl PipelineError {
    /// The stage that failed
    pub fn stage(&self) -> StageName {
        match self {
            PipelineError::Stage(e) => e.stage,
        }
    }
}

/// Errors from the approval workflow engine
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Workflow {0} not found")]
    WorkflowNotFound(Uuid),

    #[error("Step {step_id} not found in workflow {workflow_id}")]
    StepNotFound { workflow_id: Uuid, step_id: Uuid },

    #[error("Invalid review configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Step {step_id} already resolved as {status:?}")]
    StepAlreadyResolved { step_id: Uuid, status: StepStatus },

    #[error("Content for the {step_type} step is already set")]
    ContentAlreadySet { step_type: StepType },

    #[error("Invalid feedback: {0}")]
    InvalidFeedback(String),

    #[error("Workflow {workflow_id} is closed ({status:?})")]
    WorkflowClosed {
        workflow_id: Uuid,
        status: WorkflowStatus,
    },

    #[error("Failed to persist workflow: {0:#}")]
    Store(anyhow::Error),
}

/// Failure of a pipeline run driven through review
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Errors from comparing two variants
#[derive(Debug, Error)]
pub enum ComparisonError {
    #[error("Variant '{0}' has not completed")]
    VariantNotCompleted(String),
}
