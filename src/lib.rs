//! copyforge - AI content pipeline orchestrator
//!
//! Turns a content request into a finished article through a fixed
//! sequence of AI stages, with optional human review and A/B variants.
//!
//! # Architecture
//!
//! - A pipeline run executes analyze, outline, write, fact check, image and
//!   social post stages in order and aborts on the first failure
//! - Approval workflows gate stage outputs behind reviewer decisions
//! - Variant sets run several parameterized pipelines concurrently and
//!   recommend one of them
//!
//! # Modules
//!
//! - `adapters`: Generation providers (Fabric, offline templates)
//! - `core`: Orchestrator, workflow engine, variant coordinator, comparison
//! - `domain`: Data structures (Request, Artifact, Workflow, Variant)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the pipeline for a request
//! copyforge run --request request.yaml
//!
//! # Generate tone variants and compare two of them
//! copyforge variants --request request.yaml --count 3 --strategy tone
//! copyforge compare <set-id> A B
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;

// Re-export main types at crate root for convenience
pub use core::{
    compare_versions, ApprovalWorkflowEngine, ComparisonAnalyzer, PipelineOrchestrator,
    VariantGenerationCoordinator, VariationStrategy,
};
pub use domain::{PipelineArtifact, PipelineRequest, Variant, VariantSet, Workflow};
pub use error::{ComparisonError, PipelineError, ReviewError, WorkflowError};
