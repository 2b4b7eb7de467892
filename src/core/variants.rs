//! A/B variant generation.
//!
//! Strategies derive parameterized requests from a base request; the
//! coordinator runs one pipeline per variant concurrently and waits for
//! all of them to settle. A failing variant never fails the set.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn, Instrument};

use crate::domain::{Audience, PipelineArtifact, PipelineRequest, Tone, Variant, VariantSet};

use super::comparison::recommend;
use super::orchestrator::PipelineOrchestrator;
use super::store::{put_record, RecordKind, Store};

const TONES: [Tone; 3] = [Tone::Polite, Tone::Friendly, Tone::Professional];
const LENGTHS: [u32; 3] = [1500, 3000, 5000];
const AUDIENCES: [Audience; 3] = [Audience::Beginner, Audience::General, Audience::Expert];
const STRUCTURES: [(&str, &str); 3] = [
    (
        "story-led",
        "Open with a short real-world story and build the article around it.",
    ),
    (
        "how-to",
        "Structure the article as a step-by-step guide with numbered steps.",
    ),
    (
        "data-driven",
        "Lead with concrete numbers and statistics and cite a source for each.",
    ),
];

/// Dimension along which variants differ from the base request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationStrategy {
    Tone,
    Length,
    Structure,
    Audience,
}

impl VariationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariationStrategy::Tone => "tone",
            VariationStrategy::Length => "length",
            VariationStrategy::Structure => "structure",
            VariationStrategy::Audience => "audience",
        }
    }

    /// Variants for this strategy, lettered A, B, C in derivation order
    pub fn derive(&self, base: &PipelineRequest) -> Vec<Variant> {
        let variants = match self {
            VariationStrategy::Tone => TONES
                .iter()
                .map(|tone| {
                    Variant::new(
                        "",
                        format!("Tone: {}", tone),
                        base.derive().with_tone(*tone),
                    )
                })
                .collect(),
            VariationStrategy::Length => LENGTHS
                .iter()
                .map(|length| {
                    Variant::new(
                        "",
                        format!("Length: {} characters", length),
                        base.derive().with_target_length(*length),
                    )
                })
                .collect(),
            VariationStrategy::Structure => STRUCTURES
                .iter()
                .map(|(label, instruction)| {
                    let instructions = match &base.instructions {
                        Some(existing) if !existing.trim().is_empty() => {
                            format!("{}\n{}", existing.trim_end(), instruction)
                        }
                        _ => instruction.to_string(),
                    };
                    Variant::new(
                        "",
                        format!("Structure: {}", label),
                        base.derive().with_instructions(instructions),
                    )
                })
                .collect(),
            VariationStrategy::Audience => AUDIENCES
                .iter()
                .map(|audience| {
                    Variant::new(
                        "",
                        format!("Audience: {}", audience),
                        base.derive().with_audience(*audience),
                    )
                })
                .collect(),
        };
        letter(variants)
    }
}

impl fmt::Display for VariationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Apply strategies in order, concatenate, keep the first `count` and re-letter them
pub fn derive_variants(
    base: &PipelineRequest,
    count: usize,
    strategies: &[VariationStrategy],
) -> Vec<Variant> {
    let variants = strategies
        .iter()
        .flat_map(|strategy| strategy.derive(base))
        .take(count)
        .collect();
    letter(variants)
}

fn letter(mut variants: Vec<Variant>) -> Vec<Variant> {
    for (index, variant) in variants.iter_mut().enumerate() {
        variant.name = variant_name(index);
    }
    variants
}

/// A, B, ... Z, AA, AB, ...
pub fn variant_name(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Runs variant sets on top of a shared orchestrator
pub struct VariantGenerationCoordinator {
    orchestrator: Arc<PipelineOrchestrator>,
    store: Option<Arc<dyn Store>>,
}

impl VariantGenerationCoordinator {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self {
            orchestrator,
            store: None,
        }
    }

    /// Persist every finished variant set
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn run_variant_set(
        &self,
        base: &PipelineRequest,
        variant_count: usize,
        strategies: &[VariationStrategy],
    ) -> VariantSet {
        self.run_variant_set_with(base, variant_count, strategies, &CancellationToken::new())
            .await
    }

    #[instrument(skip(self, base, strategies, cancel), fields(request_id = %base.id))]
    pub async fn run_variant_set_with(
        &self,
        base: &PipelineRequest,
        variant_count: usize,
        strategies: &[VariationStrategy],
        cancel: &CancellationToken,
    ) -> VariantSet {
        let variants = derive_variants(base, variant_count, strategies);
        let mut set = VariantSet::new(base.clone(), variants);

        let limits = self.orchestrator.limits();
        let semaphore = Arc::new(Semaphore::new(limits.concurrency()));
        let timeout = limits.variant_timeout();

        info!(
            set_id = %set.id,
            variants = set.variants.len(),
            concurrency = limits.concurrency(),
            "Starting variant set"
        );
        let start = Instant::now();

        let mut handles = Vec::with_capacity(set.variants.len());
        for variant in set.variants.iter_mut() {
            variant.start();

            let orchestrator = Arc::clone(&self.orchestrator);
            let semaphore = Arc::clone(&semaphore);
            let request = variant.parameters.clone();
            let token = cancel.child_token();
            let span = tracing::info_span!("variant", variant = %variant.name);

            handles.push(tokio::spawn(
                async move { generate(orchestrator, request, token, semaphore, timeout).await }
                    .instrument(span),
            ));
        }

        // Wait for all; each result lands on its own variant
        let results = join_all(handles).await;
        for (variant, result) in set.variants.iter_mut().zip(results) {
            let outcome = result.unwrap_or_else(|e| Err(format!("variant task aborted: {}", e)));
            match outcome {
                Ok((artifact, seconds)) => {
                    info!(variant = %variant.name, elapsed_s = seconds, "Variant completed");
                    variant.complete(artifact, seconds);
                }
                Err(message) => {
                    error!(variant = %variant.name, error = %message, "Variant failed");
                    variant.fail(message);
                }
            }
        }

        set.total_generation_time_seconds = Some(start.elapsed().as_secs_f64());
        set.completed_at = Some(Utc::now());
        set.recommended_variant_id = recommend(&set.variants);

        info!(
            set_id = %set.id,
            completed = set.completed().count(),
            failed = set.failed_count(),
            recommended = ?set.recommended().map(|v| v.name.as_str()),
            "Variant set finished"
        );

        self.persist(&set).await;
        set
    }

    async fn persist(&self, set: &VariantSet) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = put_record(store.as_ref(), RecordKind::VariantSet, set.id, set).await {
            warn!(set_id = %set.id, error = %e, "Failed to persist variant set");
        }
    }
}

/// One variant's pipeline run under the concurrency gate and its own deadline
async fn generate(
    orchestrator: Arc<PipelineOrchestrator>,
    request: PipelineRequest,
    cancel: CancellationToken,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
) -> Result<(PipelineArtifact, f64), String> {
    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err("cancelled before generation started".to_string()),
        permit = semaphore.acquire_owned() => permit.map_err(|e| e.to_string())?,
    };

    let start = Instant::now();
    match tokio::time::timeout(timeout, orchestrator.run_with(&request, &cancel, None)).await {
        Ok(Ok(artifact)) => Ok((artifact, start.elapsed().as_secs_f64())),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("variant exceeded its deadline of {:?}", timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::TemplateProvider;
    use crate::domain::VariantStatus;

    fn coordinator() -> VariantGenerationCoordinator {
        let orchestrator = PipelineOrchestrator::new(Arc::new(TemplateProvider::new()));
        VariantGenerationCoordinator::new(Arc::new(orchestrator))
    }

    #[test]
    fn test_variant_names() {
        assert_eq!(variant_name(0), "A");
        assert_eq!(variant_name(2), "C");
        assert_eq!(variant_name(25), "Z");
        assert_eq!(variant_name(26), "AA");
        assert_eq!(variant_name(27), "AB");
    }

    #[test]
    fn test_tone_strategy() {
        let base = PipelineRequest::new("tea");
        let variants = derive_variants(&base, 3, &[VariationStrategy::Tone]);

        let tones: Vec<Tone> = variants.iter().map(|v| v.parameters.tone).collect();
        assert_eq!(tones, vec![Tone::Polite, Tone::Friendly, Tone::Professional]);
        assert!(variants.iter().all(|v| v.parameters.topic == "tea"));
        assert!(variants.iter().all(|v| v.parameters.id != base.id));
    }

    #[test]
    fn test_strategy_letters_its_own_variants() {
        let base = PipelineRequest::new("tea");

        for strategy in [VariationStrategy::Tone, VariationStrategy::Structure] {
            let names: Vec<String> = strategy.derive(&base).into_iter().map(|v| v.name).collect();
            assert_eq!(names, vec!["A", "B", "C"]);
        }
    }

    #[test]
    fn test_concatenation_and_truncation() {
        let base = PipelineRequest::new("tea");
        let strategies = [VariationStrategy::Length, VariationStrategy::Audience];

        let variants = derive_variants(&base, 5, &strategies);
        let names: Vec<&str> = variants.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D", "E"]);
        assert_eq!(variants[2].parameters.target_length, 5000);
        assert_eq!(variants[3].parameters.audience, Audience::Beginner);

        // Never pads past what the strategies produce
        assert_eq!(derive_variants(&base, 10, &strategies).len(), 6);
        assert!(derive_variants(&base, 3, &[]).is_empty());
    }

    #[test]
    fn test_structure_appends_instructions() {
        let base = PipelineRequest::new("tea").with_instructions("Mention Darjeeling.");
        let variants = VariationStrategy::Structure.derive(&base);

        assert_eq!(variants.len(), 3);
        for variant in &variants {
            let instructions = variant.parameters.instructions.as_deref().unwrap();
            assert!(instructions.starts_with("Mention Darjeeling.\n"));
        }
        assert_eq!(variants[1].description, "Structure: how-to");
    }

    #[tokio::test]
    async fn test_run_variant_set_completes_all() {
        let set = coordinator()
            .run_variant_set(&PipelineRequest::new("green tea"), 3, &[VariationStrategy::Tone])
            .await;

        assert_eq!(set.variants.len(), 3);
        assert!(set.variants.iter().all(|v| v.status == VariantStatus::Completed));
        assert!(set.completed_at.is_some());
        assert!(set.total_generation_time_seconds.is_some());
        assert!(set.recommended().unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_failed_variants_are_recorded_not_raised() {
        // Empty topic fails the analyze stage of the offline provider
        let set = coordinator()
            .run_variant_set(&PipelineRequest::new(""), 2, &[VariationStrategy::Audience])
            .await;

        assert_eq!(set.failed_count(), 2);
        assert!(set.variants.iter().all(|v| v.error.is_some()));
        assert!(set.recommended_variant_id.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_set_fails_every_variant() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let set = coordinator()
            .run_variant_set_with(
                &PipelineRequest::new("oolong"),
                3,
                &[VariationStrategy::Length],
                &cancel,
            )
            .await;

        assert_eq!(set.failed_count(), 3);
        assert!(set
            .variants
            .iter()
            .all(|v| !matches!(v.status, VariantStatus::Pending | VariantStatus::Generating)));
    }
}
