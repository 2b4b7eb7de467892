//! Core orchestration logic.
//!
//! This module contains:
//! - Orchestrator: Sequential pipeline execution
//! - WorkflowEngine: Human approval state machine
//! - Variants: Concurrent A/B variant generation
//! - Comparison: Heuristic variant scoring
//! - Review: Pipeline runs fed into a workflow
//! - Limits and Store: Deadlines and record persistence

pub mod comparison;
pub mod limits;
pub mod orchestrator;
pub mod review;
pub mod store;
pub mod variants;
pub mod workflow_engine;

// Re-export commonly used types
pub use comparison::{
    compare_versions, recommend, Comparison, ComparisonAnalyzer, MetricWeights, Metrics,
    RecommendationRule,
};
pub use limits::RunLimits;
pub use orchestrator::{PipelineOrchestrator, StageListener};
pub use review::{run_under_review, ReviewedRun, WorkflowFeed};
pub use store::{article_history, get_record, put_record, FileStore, MemoryStore, RecordKind, Store};
pub use variants::{derive_variants, VariantGenerationCoordinator, VariationStrategy};
pub use workflow_engine::{next_update, ApprovalWorkflowEngine, UpdateKind, WorkflowUpdate};
