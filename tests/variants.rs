//! Variant Generation Integration Tests
//!
//! Derivation, settle-all execution, failures, timeouts and recommendation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::ScriptedProvider;
use copyforge::core::{
    get_record, MemoryStore, PipelineOrchestrator, RecordKind, RunLimits,
    VariantGenerationCoordinator, VariationStrategy,
};
use copyforge::domain::{PipelineRequest, Tone, VariantSet, VariantStatus};

fn coordinator(provider: ScriptedProvider, limits: RunLimits) -> VariantGenerationCoordinator {
    let orchestrator = PipelineOrchestrator::new(Arc::new(provider)).with_limits(limits);
    VariantGenerationCoordinator::new(Arc::new(orchestrator))
}

#[tokio::test]
async fn test_tone_variants_named_in_order() {
    let set = coordinator(ScriptedProvider::new(), RunLimits::default())
        .run_variant_set(&PipelineRequest::new("espresso"), 3, &[VariationStrategy::Tone])
        .await;

    let names: Vec<&str> = set.variants.iter().map(|v| v.name.as_str()).collect();
    let tones: Vec<Tone> = set.variants.iter().map(|v| v.parameters.tone).collect();

    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(tones, vec![Tone::Polite, Tone::Friendly, Tone::Professional]);
    assert!(set.variants.iter().all(|v| v.status == VariantStatus::Completed));
    assert!(set
        .variants
        .iter()
        .all(|v| v.generation_time_seconds.is_some() && v.output.is_some()));
}

#[tokio::test]
async fn test_one_failing_variant_does_not_fail_set() {
    let provider = ScriptedProvider::new().failing_for_tone(Tone::Friendly);
    let set = coordinator(provider, RunLimits::default())
        .run_variant_set(&PipelineRequest::new("espresso"), 3, &[VariationStrategy::Tone])
        .await;

    let a = set.variant_by_name("A").unwrap();
    let b = set.variant_by_name("B").unwrap();
    let c = set.variant_by_name("C").unwrap();

    assert_eq!(a.status, VariantStatus::Completed);
    assert_eq!(b.status, VariantStatus::Failed);
    assert_eq!(c.status, VariantStatus::Completed);
    assert!(b.output.is_none());
    assert!(b.error.as_deref().unwrap().contains("write"));

    let recommended = set.recommended_variant_id.unwrap();
    assert!(recommended == a.id || recommended == c.id);
    assert_ne!(recommended, b.id);
}

#[tokio::test]
async fn test_slow_variant_times_out_while_siblings_complete() {
    let provider = ScriptedProvider::new().slow_for_tone(Tone::Polite, Duration::from_secs(30));
    let limits = RunLimits {
        variant_timeout_seconds: 1,
        ..Default::default()
    };

    let set = coordinator(provider, limits)
        .run_variant_set(&PipelineRequest::new("espresso"), 3, &[VariationStrategy::Tone])
        .await;

    let a = set.variant_by_name("A").unwrap();
    assert_eq!(a.status, VariantStatus::Failed);
    assert!(a.error.as_deref().unwrap().contains("deadline"));
    assert_eq!(set.completed().count(), 2);
    assert!(set.total_generation_time_seconds.unwrap() < 10.0);
}

#[tokio::test]
async fn test_count_bounds_variants() {
    let coordinator = coordinator(ScriptedProvider::new(), RunLimits::default());
    let base = PipelineRequest::new("espresso");

    let truncated = coordinator
        .run_variant_set(&base, 2, &[VariationStrategy::Length])
        .await;
    assert_eq!(truncated.variants.len(), 2);

    // Two strategies yield six candidates at most
    let concatenated = coordinator
        .run_variant_set(
            &base,
            10,
            &[VariationStrategy::Tone, VariationStrategy::Audience],
        )
        .await;
    assert_eq!(concatenated.variants.len(), 6);
    assert_eq!(concatenated.variants[5].name, "F");

    for set in [&truncated, &concatenated] {
        assert!(set.variants.iter().all(|v| v.status.is_terminal()));
    }
}

#[tokio::test]
async fn test_serial_generation_with_concurrency_one() {
    let limits = RunLimits {
        max_concurrent_variants: 1,
        ..Default::default()
    };
    let provider = ScriptedProvider::new();

    let set = coordinator(provider, limits)
        .run_variant_set(&PipelineRequest::new("espresso"), 3, &[VariationStrategy::Structure])
        .await;

    assert_eq!(set.completed().count(), 3);
}

#[tokio::test]
async fn test_all_failed_has_no_recommendation() {
    let provider = ScriptedProvider::new().failing_at(copyforge::domain::StageName::Analyze);

    let set = coordinator(provider, RunLimits::default())
        .run_variant_set(&PipelineRequest::new("espresso"), 3, &[VariationStrategy::Tone])
        .await;

    assert_eq!(set.failed_count(), 3);
    assert!(set.recommended_variant_id.is_none());
    assert!(set.completed_at.is_some());
}

#[tokio::test]
async fn test_variant_set_persisted() {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = PipelineOrchestrator::new(Arc::new(ScriptedProvider::new()));
    let coordinator =
        VariantGenerationCoordinator::new(Arc::new(orchestrator)).with_store(store.clone());

    let set = coordinator
        .run_variant_set(&PipelineRequest::new("espresso"), 2, &[VariationStrategy::Tone])
        .await;

    let stored: VariantSet = get_record(store.as_ref(), RecordKind::VariantSet, set.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, set);
}
