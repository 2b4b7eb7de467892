//! Approval Workflow Integration Tests
//!
//! Step ordering, decisions, status transitions and subscriber fan-out.

use std::sync::Arc;

use copyforge::core::{next_update, ApprovalWorkflowEngine, MemoryStore, UpdateKind};
use copyforge::domain::{
    Feedback, Outline, PipelineRequest, ReviewConfig, StepContent, StepStatus, StepType,
    WorkflowStatus,
};
use copyforge::error::WorkflowError;

fn outline_image_content_config() -> ReviewConfig {
    ReviewConfig {
        enable_outline_review: true,
        enable_content_review: true,
        enable_image_review: true,
        enable_social_review: false,
        enable_final_review: false,
    }
}

#[tokio::test]
async fn test_approve_all_completes_workflow() {
    let engine = ApprovalWorkflowEngine::new();
    let id = engine
        .create_workflow(PipelineRequest::new("bread"), &outline_image_content_config())
        .await
        .unwrap();

    let workflow = engine.get_workflow(id).await.unwrap();
    let types: Vec<StepType> = workflow.steps.iter().map(|s| s.step_type).collect();
    assert_eq!(types, vec![StepType::Outline, StepType::Content, StepType::Image]);
    assert_eq!(workflow.status, WorkflowStatus::Draft);

    let step_ids: Vec<_> = workflow.steps.iter().map(|s| s.id).collect();
    let mut last = workflow;
    for (i, step_id) in step_ids.iter().enumerate() {
        last = engine
            .resolve_step(id, *step_id, Feedback::approve())
            .await
            .unwrap();
        if i < step_ids.len() - 1 {
            assert_eq!(last.status, WorkflowStatus::InReview);
        }
    }

    assert_eq!(last.status, WorkflowStatus::Completed);
    assert_eq!(last.current_step_index, 2);
    assert!(last.steps.iter().all(|s| s.status == StepStatus::Approved));
    assert!(last.steps.iter().all(|s| s.resolved_at.is_some()));
}

#[tokio::test]
async fn test_reject_first_step_stops_workflow() {
    let engine = ApprovalWorkflowEngine::new();
    let id = engine
        .create_workflow(PipelineRequest::new("bread"), &outline_image_content_config())
        .await
        .unwrap();
    let first = engine.get_workflow(id).await.unwrap().steps[0].id;

    let workflow = engine
        .resolve_step(id, first, Feedback::reject("off topic"))
        .await
        .unwrap();

    assert_eq!(workflow.status, WorkflowStatus::Rejected);
    assert_eq!(workflow.current_step_index, 0);
    assert_eq!(
        workflow.steps[0].feedback.as_ref().and_then(|f| f.comment.as_deref()),
        Some("off topic")
    );

    // Closed: nothing else can be resolved
    let second = workflow.steps[1].id;
    let result = engine.resolve_step(id, second, Feedback::approve()).await;
    assert!(matches!(result, Err(WorkflowError::WorkflowClosed { .. })));
}

#[tokio::test]
async fn test_mixed_decisions_complete() {
    let engine = ApprovalWorkflowEngine::new();
    let id = engine
        .create_workflow(PipelineRequest::new("bread"), &ReviewConfig::default())
        .await
        .unwrap();
    let ids: Vec<_> = engine
        .get_workflow(id)
        .await
        .unwrap()
        .steps
        .iter()
        .map(|s| s.id)
        .collect();

    engine
        .resolve_step(id, ids[0], Feedback::modify("Add a history section").with_rating(4))
        .await
        .unwrap();
    engine.resolve_step(id, ids[1], Feedback::skip()).await.unwrap();
    let workflow = engine
        .resolve_step(id, ids[2], Feedback::approve().with_rating(5))
        .await
        .unwrap();

    assert_eq!(workflow.status, WorkflowStatus::Completed);
    assert_eq!(workflow.steps[0].status, StepStatus::Modified);
    assert_eq!(workflow.steps[1].status, StepStatus::Skipped);
}

#[tokio::test]
async fn test_resolving_later_step_keeps_index() {
    let engine = ApprovalWorkflowEngine::new();
    let id = engine
        .create_workflow(PipelineRequest::new("bread"), &ReviewConfig::default())
        .await
        .unwrap();
    let last = engine.get_workflow(id).await.unwrap().steps[2].id;

    let workflow = engine.resolve_step(id, last, Feedback::approve()).await.unwrap();

    assert_eq!(workflow.current_step_index, 0);
    assert_eq!(workflow.status, WorkflowStatus::InReview);
}

#[tokio::test]
async fn test_zero_steps_rejected() {
    let engine = ApprovalWorkflowEngine::new();

    let result = engine
        .create_workflow(PipelineRequest::new("bread"), &ReviewConfig::none())
        .await;

    assert!(matches!(result, Err(WorkflowError::InvalidConfiguration(_))));
    assert!(engine.list_workflows().await.is_empty());
}

#[tokio::test]
async fn test_rating_out_of_range() {
    let engine = ApprovalWorkflowEngine::new();
    let id = engine
        .create_workflow(PipelineRequest::new("bread"), &ReviewConfig::default())
        .await
        .unwrap();
    let step = engine.get_workflow(id).await.unwrap().steps[0].id;

    let result = engine
        .resolve_step(id, step, Feedback::approve().with_rating(6))
        .await;

    assert!(matches!(result, Err(WorkflowError::InvalidFeedback(_))));
    let workflow = engine.get_workflow(id).await.unwrap();
    assert_eq!(workflow.steps[0].status, StepStatus::Pending);
}

#[tokio::test]
async fn test_content_conflict() {
    let engine = ApprovalWorkflowEngine::new();
    let id = engine
        .create_workflow(PipelineRequest::new("bread"), &ReviewConfig::default())
        .await
        .unwrap();

    let first = StepContent::Outline(Outline {
        title: "One".into(),
        sections: vec![],
    });
    let second = StepContent::Outline(Outline {
        title: "Two".into(),
        sections: vec![],
    });

    assert!(engine.set_step_content(id, first).await.unwrap());
    let result = engine.set_step_content(id, second).await;
    assert!(matches!(
        result,
        Err(WorkflowError::ContentAlreadySet {
            step_type: StepType::Outline
        })
    ));

    // Image is not reviewed by the default config
    let image = StepContent::Image(copyforge::domain::ImageRef {
        location: "x".into(),
        prompt: "y".into(),
    });
    assert!(!engine.set_step_content(id, image).await.unwrap());
}

#[tokio::test]
async fn test_every_subscriber_sees_every_update() {
    let engine = ApprovalWorkflowEngine::new();
    let mut first = engine.subscribe();
    let mut second = engine.subscribe();

    let id = engine
        .create_workflow(PipelineRequest::new("bread"), &ReviewConfig::default())
        .await
        .unwrap();
    let step = engine.get_workflow(id).await.unwrap().steps[0].id;
    engine.resolve_step(id, step, Feedback::approve()).await.unwrap();

    for receiver in [&mut first, &mut second] {
        let created = next_update(receiver).await.unwrap();
        assert_eq!(created.kind, UpdateKind::Created);
        assert_eq!(created.workflow.id, id);

        let resolved = next_update(receiver).await.unwrap();
        assert!(matches!(
            resolved.kind,
            UpdateKind::StepResolved { step_id, .. } if step_id == step
        ));
        assert_eq!(resolved.workflow.current_step_index, 1);
    }
}

#[tokio::test]
async fn test_concurrent_resolutions_are_serialized() {
    let engine = Arc::new(ApprovalWorkflowEngine::new());
    let id = engine
        .create_workflow(PipelineRequest::new("bread"), &ReviewConfig::default())
        .await
        .unwrap();
    let step = engine.get_workflow(id).await.unwrap().steps[0].id;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.resolve_step(id, step, Feedback::approve()).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert!(matches!(e, WorkflowError::StepAlreadyResolved { .. })),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(engine.get_workflow(id).await.unwrap().current_step_index, 1);
}

#[tokio::test]
async fn test_persisted_after_each_mutation() {
    use copyforge::core::{get_record, RecordKind};
    use copyforge::domain::Workflow;

    let store = Arc::new(MemoryStore::new());
    let engine = ApprovalWorkflowEngine::new().with_store(store.clone());
    let id = engine
        .create_workflow(PipelineRequest::new("bread"), &ReviewConfig::default())
        .await
        .unwrap();
    let step = engine.get_workflow(id).await.unwrap().steps[0].id;
    engine.resolve_step(id, step, Feedback::approve()).await.unwrap();

    let stored: Workflow = get_record(store.as_ref(), RecordKind::Workflow, id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, engine.get_workflow(id).await.unwrap());
    assert_eq!(stored.steps[0].status, StepStatus::Approved);
}
