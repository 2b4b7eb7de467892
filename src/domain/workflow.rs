//! Human review workflows.
//!
//! A [`Workflow`] wraps the artifacts of one pipeline run in an ordered list
//! of review [`Step`]s. The state machine lives here as plain methods so the
//! engine only has to worry about locking, persistence and notification.
//!
//! Status transitions:
//! - `Draft`: created, nothing resolved yet
//! - `InReview`: some steps resolved, others pending
//! - `Completed`: every step approved, modified or skipped
//! - `Rejected`: a step was rejected (terminal)
//! - `Cancelled`: administrative stop (terminal)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::{FactCheckSummary, ImageRef, Outline, PipelineArtifact, PostSet};
use super::request::PipelineRequest;
use crate::error::WorkflowError;

/// Kind of review checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Outline,
    Content,
    Image,
    Social,
    Final,
}

impl StepType {
    /// Canonical step order
    pub const ORDER: [StepType; 5] = [
        StepType::Outline,
        StepType::Content,
        StepType::Image,
        StepType::Social,
        StepType::Final,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            StepType::Outline => "Outline review",
            StepType::Content => "Content review",
            StepType::Image => "Image review",
            StepType::Social => "Social posts review",
            StepType::Final => "Final approval",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StepType::Outline => "outline",
            StepType::Content => "content",
            StepType::Image => "image",
            StepType::Social => "social",
            StepType::Final => "final",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
    Modified,
    Skipped,
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    InReview,
    /// Part of the status vocabulary; step resolution alone ends in `Completed`
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl WorkflowStatus {
    /// Terminal states accept no further decisions
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Rejected | WorkflowStatus::Completed | WorkflowStatus::Cancelled
        )
    }
}

/// Draft body plus the fact-check attached to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentData {
    pub body: String,
    #[serde(default)]
    pub fact_check: Option<FactCheckSummary>,
}

/// Typed payload of a review step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StepContent {
    Outline(Outline),
    Content(ContentData),
    Image(ImageRef),
    Social(PostSet),
    Final(Box<PipelineArtifact>),
}

impl StepContent {
    /// The step type this payload belongs to
    pub fn step_type(&self) -> StepType {
        match self {
            StepContent::Outline(_) => StepType::Outline,
            StepContent::Content(_) => StepType::Content,
            StepContent::Image(_) => StepType::Image,
            StepContent::Social(_) => StepType::Social,
            StepContent::Final(_) => StepType::Final,
        }
    }
}

/// A reviewer's decision on a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Modified,
    Rejected,
    Skipped,
}

impl Decision {
    fn status(&self) -> StepStatus {
        match self {
            Decision::Approved => StepStatus::Approved,
            Decision::Modified => StepStatus::Modified,
            Decision::Rejected => StepStatus::Rejected,
            Decision::Skipped => StepStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub decision: Decision,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub suggestion: Option<String>,
    /// Reviewer rating, 1 to 5
    #[serde(default)]
    pub rating: Option<u8>,
}

impl Feedback {
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            comment: None,
            suggestion: None,
            rating: None,
        }
    }

    pub fn approve() -> Self {
        Self::new(Decision::Approved)
    }

    pub fn reject(comment: impl Into<String>) -> Self {
        Self::new(Decision::Rejected).with_comment(comment)
    }

    pub fn skip() -> Self {
        Self::new(Decision::Skipped)
    }

    pub fn modify(suggestion: impl Into<String>) -> Self {
        let mut feedback = Self::new(Decision::Modified);
        feedback.suggestion = Some(suggestion.into());
        feedback
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        match self.rating {
            Some(r) if !(1..=5).contains(&r) => Err(WorkflowError::InvalidFeedback(format!(
                "rating must be between 1 and 5, got {}",
                r
            ))),
            _ => Ok(()),
        }
    }
}

/// Which review steps a workflow includes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "enabled")]
    pub enable_outline_review: bool,
    #[serde(default = "enabled")]
    pub enable_content_review: bool,
    #[serde(default)]
    pub enable_image_review: bool,
    #[serde(default)]
    pub enable_social_review: bool,
    #[serde(default = "enabled")]
    pub enable_final_review: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            enable_outline_review: true,
            enable_content_review: true,
            enable_image_review: false,
            enable_social_review: false,
            enable_final_review: true,
        }
    }
}

impl ReviewConfig {
    /// A config with every review step disabled
    pub fn none() -> Self {
        Self {
            enable_outline_review: false,
            enable_content_review: false,
            enable_image_review: false,
            enable_social_review: false,
            enable_final_review: false,
        }
    }

    pub fn is_enabled(&self, step_type: StepType) -> bool {
        match step_type {
            StepType::Outline => self.enable_outline_review,
            StepType::Content => self.enable_content_review,
            StepType::Image => self.enable_image_review,
            StepType::Social => self.enable_social_review,
            StepType::Final => self.enable_final_review,
        }
    }

    /// Enabled step types in canonical order
    pub fn step_types(&self) -> Vec<StepType> {
        StepType::ORDER
            .into_iter()
            .filter(|t| self.is_enabled(*t))
            .collect()
    }
}

/// One reviewable checkpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    pub step_type: StepType,
    pub title: String,
    pub content: Option<StepContent>,
    pub status: StepStatus,
    pub feedback: Option<Feedback>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Step {
    fn new(step_type: StepType) -> Self {
        Self {
            id: Uuid::new_v4(),
            step_type,
            title: step_type.title().to_string(),
            content: None,
            status: StepStatus::Pending,
            feedback: None,
            resolved_at: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status != StepStatus::Pending
    }

    /// A pending step with content waiting for a decision
    pub fn is_actionable(&self) -> bool {
        !self.is_resolved() && self.content.is_some()
    }
}

/// The review state of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub request: PipelineRequest,
    pub steps: Vec<Step>,
    pub current_step_index: usize,
    pub status: WorkflowStatus,
    pub final_artifact: Option<PipelineArtifact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Build a workflow with one step per enabled review flag
    pub fn new(request: PipelineRequest, config: &ReviewConfig) -> Result<Self, WorkflowError> {
        let steps: Vec<Step> = config.step_types().into_iter().map(Step::new).collect();

        if steps.is_empty() {
            return Err(WorkflowError::InvalidConfiguration(
                "at least one review step must be enabled".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            request,
            steps,
            current_step_index: 0,
            status: WorkflowStatus::Draft,
            final_artifact: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn step(&self, step_id: Uuid) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    pub fn step_by_type(&self, step_type: StepType) -> Option<&Step> {
        self.steps.iter().find(|s| s.step_type == step_type)
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.current_step_index)
    }

    /// Store a stage artifact in its step.
    ///
    /// Returns `true` when the step was empty and is now actionable. Content
    /// for a step type this workflow does not review is ignored. A closed
    /// workflow refuses content.
    pub fn set_content(&mut self, content: StepContent) -> Result<bool, WorkflowError> {
        if self.status.is_closed() {
            return Err(WorkflowError::WorkflowClosed {
                workflow_id: self.id,
                status: self.status,
            });
        }
        let step_type = content.step_type();
        let Some(step) = self.steps.iter_mut().find(|s| s.step_type == step_type) else {
            return Ok(false);
        };

        if let Some(existing) = &step.content {
            return if *existing == content {
                Ok(false)
            } else {
                Err(WorkflowError::ContentAlreadySet { step_type })
            };
        }

        step.content = Some(content);
        self.updated_at = Utc::now();
        Ok(true)
    }

    /// Apply a reviewer decision to a step
    pub fn resolve(&mut self, step_id: Uuid, feedback: Feedback) -> Result<(), WorkflowError> {
        if self.status.is_closed() {
            return Err(WorkflowError::WorkflowClosed {
                workflow_id: self.id,
                status: self.status,
            });
        }
        feedback.validate()?;

        let workflow_id = self.id;
        let index = self
            .steps
            .iter()
            .position(|s| s.id == step_id)
            .ok_or(WorkflowError::StepNotFound {
                workflow_id,
                step_id,
            })?;

        let step = &mut self.steps[index];
        if step.is_resolved() {
            return Err(WorkflowError::StepAlreadyResolved {
                step_id,
                status: step.status,
            });
        }

        let now = Utc::now();
        let decision = feedback.decision;
        step.status = decision.status();
        step.feedback = Some(feedback);
        step.resolved_at = Some(now);
        self.updated_at = now;

        if decision == Decision::Rejected {
            self.status = WorkflowStatus::Rejected;
            return Ok(());
        }

        if index == self.current_step_index {
            self.current_step_index = (self.current_step_index + 1).min(self.steps.len() - 1);
        }

        self.status = if self.steps.iter().all(Step::is_resolved) {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::InReview
        };

        Ok(())
    }

    /// Administrative stop
    pub fn cancel(&mut self) -> Result<(), WorkflowError> {
        if self.status.is_closed() {
            return Err(WorkflowError::WorkflowClosed {
                workflow_id: self.id,
                status: self.status,
            });
        }
        self.status = WorkflowStatus::Cancelled;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_final_artifact(&mut self, artifact: PipelineArtifact) {
        self.final_artifact = Some(artifact);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow(config: ReviewConfig) -> Workflow {
        Workflow::new(PipelineRequest::new("coffee"), &config).unwrap()
    }

    fn outline() -> Outline {
        Outline {
            title: "Coffee".into(),
            sections: vec![],
        }
    }

    #[test]
    fn test_steps_follow_canonical_order() {
        let config = ReviewConfig {
            enable_outline_review: false,
            enable_content_review: true,
            enable_image_review: false,
            enable_social_review: true,
            enable_final_review: true,
        };
        let wf = workflow(config);
        let types: Vec<StepType> = wf.steps.iter().map(|s| s.step_type).collect();

        assert_eq!(types, vec![StepType::Content, StepType::Social, StepType::Final]);
        assert_eq!(wf.status, WorkflowStatus::Draft);
    }

    #[test]
    fn test_zero_steps_rejected() {
        let result = Workflow::new(PipelineRequest::new("x"), &ReviewConfig::none());
        assert!(matches!(result, Err(WorkflowError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_set_content_once() {
        let mut wf = workflow(ReviewConfig::default());

        assert!(wf.set_content(StepContent::Outline(outline())).unwrap());
        // Identical write is a no-op
        assert!(!wf.set_content(StepContent::Outline(outline())).unwrap());

        let other = Outline {
            title: "Tea".into(),
            sections: vec![],
        };
        let result = wf.set_content(StepContent::Outline(other));
        assert!(matches!(result, Err(WorkflowError::ContentAlreadySet { .. })));
    }

    #[test]
    fn test_set_content_for_unreviewed_type_is_ignored() {
        let mut wf = workflow(ReviewConfig::default());
        let posts = StepContent::Social(PostSet::default());

        assert!(!wf.set_content(posts).unwrap());
        assert!(wf.step_by_type(StepType::Social).is_none());
    }

    #[test]
    fn test_non_current_resolution_keeps_pointer() {
        let mut wf = workflow(ReviewConfig::default());
        let second = wf.steps[1].id;

        wf.resolve(second, Feedback::approve()).unwrap();

        assert_eq!(wf.current_step_index, 0);
        assert_eq!(wf.status, WorkflowStatus::InReview);
    }

    #[test]
    fn test_current_step_follows_index() {
        let mut wf = workflow(ReviewConfig::default());
        let first = wf.steps[0].id;
        assert_eq!(wf.current_step().map(|s| s.step_type), Some(StepType::Outline));

        wf.resolve(first, Feedback::approve()).unwrap();
        assert_eq!(wf.current_step().map(|s| s.id), Some(wf.steps[1].id));
    }

    #[test]
    fn test_rating_out_of_range() {
        let mut wf = workflow(ReviewConfig::default());
        let first = wf.steps[0].id;

        let result = wf.resolve(first, Feedback::approve().with_rating(9));
        assert!(matches!(result, Err(WorkflowError::InvalidFeedback(_))));
        assert_eq!(wf.steps[0].status, StepStatus::Pending);
    }

    #[test]
    fn test_resolve_after_rejection_is_closed() {
        let mut wf = workflow(ReviewConfig::default());
        let first = wf.steps[0].id;
        let second = wf.steps[1].id;

        wf.resolve(first, Feedback::reject("off topic")).unwrap();
        let result = wf.resolve(second, Feedback::approve());

        assert!(matches!(result, Err(WorkflowError::WorkflowClosed { .. })));
    }

    #[test]
    fn test_cancel() {
        let mut wf = workflow(ReviewConfig::default());
        wf.cancel().unwrap();

        assert_eq!(wf.status, WorkflowStatus::Cancelled);
        assert!(wf.cancel().is_err());
    }

    #[test]
    fn test_step_content_serialization() {
        let content = StepContent::Outline(outline());
        let json = serde_json::to_string(&content).unwrap();

        assert!(json.contains("\"type\":\"outline\""));
        let parsed: StepContent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.step_type(), StepType::Outline);
    }
}
