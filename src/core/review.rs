//! Pipeline runs fed into an approval workflow as they progress.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    ContentData, PipelineArtifact, PipelineRequest, ReviewConfig, StageOutput, StepContent,
};
use crate::error::{ReviewError, WorkflowError};

use super::orchestrator::{PipelineOrchestrator, StageListener};
use super::workflow_engine::ApprovalWorkflowEngine;

/// Maps stage outputs onto the review step that covers them
pub fn step_content(output: &StageOutput) -> Option<StepContent> {
    match output {
        StageOutput::Outline(outline) => Some(StepContent::Outline(outline.clone())),
        // The draft is reviewed together with its fact check
        StageOutput::FactCheck { content, summary } => Some(StepContent::Content(ContentData {
            body: content.clone(),
            fact_check: Some(summary.clone()),
        })),
        StageOutput::Image(image) => Some(StepContent::Image(image.clone())),
        StageOutput::SocialPosts(posts) => Some(StepContent::Social(posts.clone())),
        StageOutput::Analysis(_) | StageOutput::Draft(_) => None,
    }
}

/// Stage listener writing each completed stage into one workflow
pub struct WorkflowFeed<'a> {
    engine: &'a ApprovalWorkflowEngine,
    workflow_id: Uuid,
}

impl<'a> WorkflowFeed<'a> {
    pub fn new(engine: &'a ApprovalWorkflowEngine, workflow_id: Uuid) -> Self {
        Self {
            engine,
            workflow_id,
        }
    }
}

#[async_trait]
impl StageListener for WorkflowFeed<'_> {
    async fn on_stage_complete(&self, output: &StageOutput) {
        let Some(content) = step_content(output) else {
            return;
        };
        // The run keeps going even if the workflow refuses the content
        if let Err(e) = self.engine.set_step_content(self.workflow_id, content).await {
            warn!(
                workflow_id = %self.workflow_id,
                stage = %output.stage(),
                error = %e,
                "Failed to feed stage output into workflow"
            );
        }
    }
}

/// Result of a reviewed run
#[derive(Debug, Clone)]
pub struct ReviewedRun {
    pub workflow_id: Uuid,
    pub artifact: PipelineArtifact,
}

/// Create a workflow for `request` and run the pipeline into it.
///
/// A failed run cancels the workflow before the error is returned.
pub async fn run_under_review(
    orchestrator: &PipelineOrchestrator,
    engine: &ApprovalWorkflowEngine,
    request: &PipelineRequest,
    config: &ReviewConfig,
    cancel: &CancellationToken,
) -> Result<ReviewedRun, ReviewError> {
    let workflow_id = engine.create_workflow(request.clone(), config).await?;
    let feed = WorkflowFeed::new(engine, workflow_id);

    let artifact = match orchestrator
        .run_with(request, cancel, Some(&feed as &dyn StageListener))
        .await
    {
        Ok(artifact) => artifact,
        Err(e) => {
            if let Err(cancel_err) = engine.cancel_workflow(workflow_id).await {
                warn!(
                    %workflow_id,
                    error = %cancel_err,
                    "Failed to cancel workflow after failed run"
                );
            }
            return Err(e.into());
        }
    };

    // A reviewer may have closed the workflow while the run was in flight
    match engine
        .set_step_content(workflow_id, StepContent::Final(Box::new(artifact.clone())))
        .await
    {
        Ok(_) => {}
        Err(WorkflowError::WorkflowClosed { status, .. }) => {
            info!(%workflow_id, ?status, "Workflow closed before the final step was ready");
        }
        Err(e) => return Err(e.into()),
    }
    engine
        .set_final_artifact(workflow_id, artifact.clone())
        .await?;

    info!(%workflow_id, "Reviewed run ready for approval");
    Ok(ReviewedRun {
        workflow_id,
        artifact,
    })
}
