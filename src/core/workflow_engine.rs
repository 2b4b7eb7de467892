//! Approval workflow engine.
//!
//! Owns the workflow map and is the only writer to it. Each workflow sits
//! behind its own mutex so concurrent decisions on the same workflow are
//! serialized while different workflows proceed independently.
//!
//! Every operation works on a copy of the workflow and commits it only once
//! validation and persistence have succeeded, so a failed call leaves the
//! stored state untouched. Committed changes are broadcast to all
//! subscribers with the full updated workflow.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{
    Decision, Feedback, PipelineArtifact, PipelineRequest, ReviewConfig, StepContent, StepType,
    Workflow,
};
use crate::error::WorkflowError;

use super::store::{get_record, put_record, RecordKind, Store};

/// Buffered updates per subscriber before it starts lagging
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// What changed in a workflow update
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum UpdateKind {
    Created,
    StepActionable { step_id: Uuid, step_type: StepType },
    StepResolved { step_id: Uuid, decision: Decision },
    FinalArtifactSet,
    Cancelled,
}

/// A committed change, published to every subscriber
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowUpdate {
    pub kind: UpdateKind,
    pub workflow: Workflow,
}

pub struct ApprovalWorkflowEngine {
    workflows: RwLock<HashMap<Uuid, Arc<Mutex<Workflow>>>>,
    updates: broadcast::Sender<WorkflowUpdate>,
    store: Option<Arc<dyn Store>>,
}

impl Default for ApprovalWorkflowEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalWorkflowEngine {
    /// In-memory engine
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            workflows: RwLock::new(HashMap::new()),
            updates,
            store: None,
        }
    }

    /// Persist every committed workflow to `store`
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register an independent subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowUpdate> {
        self.updates.subscribe()
    }

    #[instrument(skip(self, request, config), fields(topic = %request.topic))]
    pub async fn create_workflow(
        &self,
        request: PipelineRequest,
        config: &ReviewConfig,
    ) -> Result<Uuid, WorkflowError> {
        let workflow = Workflow::new(request, config)?;
        let id = workflow.id;

        self.persist(&workflow).await?;
        self.workflows
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(workflow.clone())));

        info!(workflow_id = %id, steps = workflow.steps.len(), "Workflow created");
        self.publish(UpdateKind::Created, workflow);
        Ok(id)
    }

    pub async fn get_workflow(&self, workflow_id: Uuid) -> Result<Workflow, WorkflowError> {
        let entry = self.entry(workflow_id).await?;
        let workflow = entry.lock().await.clone();
        Ok(workflow)
    }

    /// Snapshot of every workflow, oldest first
    pub async fn list_workflows(&self) -> Vec<Workflow> {
        let entries: Vec<Arc<Mutex<Workflow>>> =
            self.workflows.read().await.values().cloned().collect();

        let mut workflows = Vec::with_capacity(entries.len());
        for entry in entries {
            workflows.push(entry.lock().await.clone());
        }
        workflows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        workflows
    }

    /// Store a stage artifact in the matching step.
    ///
    /// Returns `true` when the step was empty and has become actionable.
    #[instrument(skip(self, content), fields(workflow_id = %workflow_id, step_type = %content.step_type()))]
    pub async fn set_step_content(
        &self,
        workflow_id: Uuid,
        content: StepContent,
    ) -> Result<bool, WorkflowError> {
        let step_type = content.step_type();
        let (_, actionable) = self
            .mutate(workflow_id, |workflow| {
                if !workflow.set_content(content)? {
                    return Ok(None);
                }
                let step_id = workflow
                    .step_by_type(step_type)
                    .map(|s| s.id)
                    .ok_or_else(|| {
                        WorkflowError::InvalidConfiguration(format!("no {} step", step_type))
                    })?;
                Ok(Some(UpdateKind::StepActionable { step_id, step_type }))
            })
            .await?;

        if actionable {
            debug!("Step is now actionable");
        }
        Ok(actionable)
    }

    /// Apply a reviewer decision and return the updated workflow
    #[instrument(skip(self, feedback), fields(workflow_id = %workflow_id, step_id = %step_id, decision = ?feedback.decision))]
    pub async fn resolve_step(
        &self,
        workflow_id: Uuid,
        step_id: Uuid,
        feedback: Feedback,
    ) -> Result<Workflow, WorkflowError> {
        let decision = feedback.decision;
        let (workflow, _) = self
            .mutate(workflow_id, |workflow| {
                workflow.resolve(step_id, feedback)?;
                Ok(Some(UpdateKind::StepResolved { step_id, decision }))
            })
            .await?;

        info!(
            status = ?workflow.status,
            current_step_index = workflow.current_step_index,
            "Step resolved"
        );
        Ok(workflow)
    }

    /// Attach the completed pipeline artifact (allowed in any status)
    pub async fn set_final_artifact(
        &self,
        workflow_id: Uuid,
        artifact: PipelineArtifact,
    ) -> Result<(), WorkflowError> {
        self.mutate(workflow_id, |workflow| {
            workflow.set_final_artifact(artifact);
            Ok(Some(UpdateKind::FinalArtifactSet))
        })
        .await?;
        Ok(())
    }

    /// Administrative cancellation
    pub async fn cancel_workflow(&self, workflow_id: Uuid) -> Result<(), WorkflowError> {
        self.mutate(workflow_id, |workflow| {
            workflow.cancel()?;
            Ok(Some(UpdateKind::Cancelled))
        })
        .await?;
        info!(%workflow_id, "Workflow cancelled");
        Ok(())
    }

    /// Load every persisted workflow not already in memory
    pub async fn restore(&self) -> anyhow::Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };

        let mut restored = 0;
        for id in store.list(RecordKind::Workflow).await? {
            if self.workflows.read().await.contains_key(&id) {
                continue;
            }
            if let Some(workflow) =
                get_record::<Workflow>(store.as_ref(), RecordKind::Workflow, id).await?
            {
                self.workflows
                    .write()
                    .await
                    .entry(id)
                    .or_insert_with(|| Arc::new(Mutex::new(workflow)));
                restored += 1;
            }
        }

        debug!(restored, "Restored workflows from store");
        Ok(restored)
    }

    async fn entry(&self, workflow_id: Uuid) -> Result<Arc<Mutex<Workflow>>, WorkflowError> {
        self.workflows
            .read()
            .await
            .get(&workflow_id)
            .cloned()
            .ok_or(WorkflowError::WorkflowNotFound(workflow_id))
    }

    /// Run `change` on a copy of the workflow and commit it if it succeeds.
    ///
    /// `change` returns the update to publish, or `None` when nothing
    /// changed. Returns the resulting workflow and whether it changed.
    async fn mutate<F>(
        &self,
        workflow_id: Uuid,
        change: F,
    ) -> Result<(Workflow, bool), WorkflowError>
    where
        F: FnOnce(&mut Workflow) -> Result<Option<UpdateKind>, WorkflowError>,
    {
        let entry = self.entry(workflow_id).await?;
        let mut current = entry.lock().await;

        let mut draft = current.clone();
        let Some(kind) = change(&mut draft)? else {
            return Ok((draft, false));
        };

        self.persist(&draft).await?;
        *current = draft.clone();

        // Published under the lock so subscribers see updates in commit order
        self.publish(kind, draft.clone());
        Ok((draft, true))
    }

    async fn persist(&self, workflow: &Workflow) -> Result<(), WorkflowError> {
        if let Some(store) = &self.store {
            put_record(store.as_ref(), RecordKind::Workflow, workflow.id, workflow)
                .await
                .map_err(WorkflowError::Store)?;
        }
        Ok(())
    }

    fn publish(&self, kind: UpdateKind, workflow: Workflow) {
        // No subscribers is not an error
        if self.updates.send(WorkflowUpdate { kind, workflow }).is_err() {
            debug!("No workflow subscribers");
        }
    }
}

/// Drain a subscriber, logging lag instead of failing
pub async fn next_update(
    receiver: &mut broadcast::Receiver<WorkflowUpdate>,
) -> Option<WorkflowUpdate> {
    loop {
        match receiver.recv().await {
            Ok(update) => return Some(update),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Workflow subscriber lagged, updates dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
