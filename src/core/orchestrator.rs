//! Sequential pipeline execution.
//!
//! Runs the generation stages in fixed order for one request, timing each
//! stage and aborting on the first failure. No partial artifact is ever
//! returned and nothing is retried.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{image_prompt, GenerationProvider, SocialPostParams};
use crate::domain::{
    ArticleRecord, PipelineArtifact, PipelineRequest, StageName, StageOutput, StageTiming,
};
use crate::error::{PipelineError, ProviderError, StageError, StageFailure};

use super::limits::RunLimits;
use super::store::{put_record, RecordKind, Store};

/// Observer notified after each stage completes
#[async_trait]
pub trait StageListener: Send + Sync {
    async fn on_stage_complete(&self, output: &StageOutput);
}

/// Runs the stage set for one request at a time
pub struct PipelineOrchestrator {
    provider: Arc<dyn GenerationProvider>,
    limits: RunLimits,
    /// Optional article history
    store: Option<Arc<dyn Store>>,
}

impl PipelineOrchestrator {
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self {
            provider,
            limits: RunLimits::default(),
            store: None,
        }
    }

    pub fn with_limits(mut self, limits: RunLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Record every successful run in the store's article history
    pub fn with_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    /// Execute the pipeline for a request
    pub async fn run(&self, request: &PipelineRequest) -> Result<PipelineArtifact, PipelineError> {
        self.run_with(request, &CancellationToken::new(), None).await
    }

    /// Execute the pipeline with cancellation and an optional stage listener
    #[instrument(
        skip(self, request, cancel, listener),
        fields(request_id = %request.id, provider = %self.provider.name())
    )]
    pub async fn run_with(
        &self,
        request: &PipelineRequest,
        cancel: &CancellationToken,
        listener: Option<&dyn StageListener>,
    ) -> Result<PipelineArtifact, PipelineError> {
        info!(topic = %request.topic, "Starting pipeline run");
        let run_start = Instant::now();
        let mut clock = StageClock::new(&self.limits, cancel);
        let provider = self.provider.as_ref();

        let analysis = clock
            .call(StageName::Analyze, provider.analyze(&request.topic))
            .await?;
        notify(listener, StageOutput::Analysis(analysis.clone())).await;

        let outline = clock
            .call(StageName::Outline, provider.outline(&analysis, request))
            .await?;
        notify(listener, StageOutput::Outline(outline.clone())).await;

        let content = clock
            .call(StageName::Write, provider.write(&outline, request))
            .await?;
        notify(listener, StageOutput::Draft(content.clone())).await;

        let fact_check = clock
            .call(
                StageName::FactCheck,
                provider.fact_check(&content, &request.topic),
            )
            .await?;
        notify(
            listener,
            StageOutput::FactCheck {
                content: content.clone(),
                summary: fact_check.clone(),
            },
        )
        .await;

        let prompt = image_prompt(request, &outline);
        let image = clock.call(StageName::Image, provider.image(&prompt)).await?;
        notify(listener, StageOutput::Image(image.clone())).await;

        let params = SocialPostParams {
            topic: request.topic.clone(),
            title: outline.title.clone(),
            content: content.clone(),
            tone: request.tone,
            audience: request.audience,
        };
        let social_posts = clock
            .call(StageName::SocialPosts, provider.social_posts(&params))
            .await?;
        notify(listener, StageOutput::SocialPosts(social_posts.clone())).await;

        let total_duration_ms = run_start.elapsed().as_millis() as u64;
        let artifact = PipelineArtifact {
            request_id: request.id,
            analysis,
            outline,
            content,
            fact_check,
            image,
            social_posts,
            timings: clock.into_timings(),
            total_duration_ms,
            completed_at: Utc::now(),
        };

        info!(
            total_duration_ms,
            content_length = artifact.content_length(),
            "Pipeline run completed"
        );

        self.record_history(request, &artifact).await;
        Ok(artifact)
    }

    /// History is best-effort: a store failure never fails a finished run
    async fn record_history(&self, request: &PipelineRequest, artifact: &PipelineArtifact) {
        let Some(store) = &self.store else {
            return;
        };

        let record = ArticleRecord::from_artifact(request, artifact);
        if let Err(e) = put_record(store.as_ref(), RecordKind::Article, record.id, &record).await {
            warn!(error = %e, "Failed to record article history");
        }
    }
}

async fn notify(listener: Option<&dyn StageListener>, output: StageOutput) {
    if let Some(listener) = listener {
        listener.on_stage_complete(&output).await;
    }
}

/// Enforces stage and run deadlines and records timings
struct StageClock<'a> {
    cancel: &'a CancellationToken,
    stage_timeout: Duration,
    run_timeout: Duration,
    deadline: tokio::time::Instant,
    timings: Vec<StageTiming>,
}

impl<'a> StageClock<'a> {
    fn new(limits: &RunLimits, cancel: &'a CancellationToken) -> Self {
        Self {
            cancel,
            stage_timeout: limits.stage_timeout(),
            run_timeout: limits.run_timeout(),
            deadline: tokio::time::Instant::now() + limits.run_timeout(),
            timings: Vec::with_capacity(StageName::ALL.len()),
        }
    }

    async fn call<T, F>(&mut self, stage: StageName, fut: F) -> Result<T, StageError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        if self.cancel.is_cancelled() {
            warn!(%stage, "Run cancelled before stage started");
            return Err(StageError::new(stage, StageFailure::Cancelled));
        }

        // The tighter of the stage timeout and what is left of the run budget
        let remaining = self
            .deadline
            .saturating_duration_since(tokio::time::Instant::now());
        let (budget, limit) = if remaining < self.stage_timeout {
            (remaining, self.run_timeout)
        } else {
            (self.stage_timeout, self.stage_timeout)
        };

        debug!(%stage, budget_ms = budget.as_millis() as u64, "Stage started");
        let started_at = Utc::now();
        let start = Instant::now();

        // An exhausted run budget must not let a ready provider slip through
        let result = if budget.is_zero() {
            Err(StageFailure::TimedOut { limit })
        } else {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(StageFailure::Cancelled),
                outcome = tokio::time::timeout(budget, fut) => match outcome {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(StageFailure::Provider(e)),
                    Err(_) => Err(StageFailure::TimedOut { limit }),
                },
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(value) => {
                debug!(%stage, duration_ms, "Stage completed");
                self.timings.push(StageTiming {
                    stage,
                    started_at,
                    finished_at: Utc::now(),
                    duration_ms,
                });
                Ok(value)
            }
            Err(cause) => {
                error!(%stage, duration_ms, error = %cause, "Stage failed, aborting run");
                Err(StageError::new(stage, cause))
            }
        }
    }

    fn into_timings(self) -> Vec<StageTiming> {
        self.timings
    }
}
