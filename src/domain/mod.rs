//! Domain types for the copyforge orchestrator.
//!
//! This module contains the core data structures:
//! - Request: Immutable pipeline input
//! - Artifact: Stage outputs and the assembled pipeline artifact
//! - Workflow: Human review state machine
//! - Variant: A/B variants and variant sets

pub mod artifact;
pub mod request;
pub mod variant;
pub mod workflow;

// Re-export commonly used types
pub use artifact::{
    fingerprint, Analysis, ArticleRecord, ClaimCheck, FactCheckSummary, ImageRef, Outline,
    OutlineSection, PipelineArtifact, PostSet, SocialPost, StageName, StageOutput, StageTiming,
    Verdict,
};
pub use request::{Audience, PipelineRequest, Tone};
pub use variant::{Variant, VariantSet, VariantStatus};
pub use workflow::{
    ContentData, Decision, Feedback, ReviewConfig, Step, StepContent, StepStatus, StepType,
    Workflow, WorkflowStatus,
};
