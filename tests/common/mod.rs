//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use copyforge::adapters::{GenerationProvider, SocialPostParams};
use copyforge::domain::{
    Analysis, FactCheckSummary, ImageRef, Outline, OutlineSection, PipelineArtifact,
    PipelineRequest, PostSet, SocialPost, StageName, Tone, Variant,
};
use copyforge::error::ProviderError;

/// Provider with scripted failures and delays that logs every stage call
#[derive(Default)]
pub struct ScriptedProvider {
    calls: Mutex<Vec<StageName>>,
    fail_at: Option<StageName>,
    fail_tone: Option<Tone>,
    delay: Option<(StageName, Duration)>,
    slow_tone: Option<(Tone, Duration)>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the given stage with `Unavailable`
    pub fn failing_at(mut self, stage: StageName) -> Self {
        self.fail_at = Some(stage);
        self
    }

    /// Fail the write stage for requests with this tone
    pub fn failing_for_tone(mut self, tone: Tone) -> Self {
        self.fail_tone = Some(tone);
        self
    }

    /// Sleep before answering the given stage
    pub fn with_delay(mut self, stage: StageName, delay: Duration) -> Self {
        self.delay = Some((stage, delay));
        self
    }

    /// Sleep in the write stage for requests with this tone
    pub fn slow_for_tone(mut self, tone: Tone, delay: Duration) -> Self {
        self.slow_tone = Some((tone, delay));
        self
    }

    pub fn calls(&self) -> Vec<StageName> {
        self.calls.lock().unwrap().clone()
    }

    async fn enter(&self, stage: StageName) -> Result<(), ProviderError> {
        self.calls.lock().unwrap().push(stage);

        if let Some((delayed, delay)) = self.delay {
            if delayed == stage {
                tokio::time::sleep(delay).await;
            }
        }
        if self.fail_at == Some(stage) {
            return Err(ProviderError::Unavailable(format!("scripted {} failure", stage)));
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, topic: &str) -> Result<Analysis, ProviderError> {
        self.enter(StageName::Analyze).await?;
        Ok(Analysis {
            summary: format!("About {}", topic),
            keywords: vec![topic.to_string()],
        })
    }

    async fn outline(
        &self,
        _analysis: &Analysis,
        request: &PipelineRequest,
    ) -> Result<Outline, ProviderError> {
        self.enter(StageName::Outline).await?;
        Ok(Outline {
            title: format!("Guide to {}", request.topic),
            sections: vec![OutlineSection {
                heading: "Basics".into(),
                points: vec!["What it is".into()],
            }],
        })
    }

    async fn write(
        &self,
        outline: &Outline,
        request: &PipelineRequest,
    ) -> Result<String, ProviderError> {
        self.enter(StageName::Write).await?;

        if let Some((tone, delay)) = self.slow_tone {
            if tone == request.tone {
                tokio::time::sleep(delay).await;
            }
        }
        if self.fail_tone == Some(request.tone) {
            return Err(ProviderError::Unavailable(format!(
                "scripted failure for {} tone",
                request.tone
            )));
        }

        Ok(format!(
            "# {}\n\nA {} article on {} for a {} audience.",
            outline.title, request.tone, request.topic, request.audience
        ))
    }

    async fn fact_check(
        &self,
        _content: &str,
        _topic: &str,
    ) -> Result<FactCheckSummary, ProviderError> {
        self.enter(StageName::FactCheck).await?;
        Ok(FactCheckSummary::default())
    }

    async fn image(&self, prompt: &str) -> Result<ImageRef, ProviderError> {
        self.enter(StageName::Image).await?;
        Ok(ImageRef {
            location: "scripted://image".into(),
            prompt: prompt.to_string(),
        })
    }

    async fn social_posts(&self, params: &SocialPostParams) -> Result<PostSet, ProviderError> {
        self.enter(StageName::SocialPosts).await?;
        Ok(PostSet {
            posts: vec![SocialPost {
                platform: "twitter".into(),
                text: params.title.clone(),
            }],
        })
    }
}

/// An artifact carrying the given article body
pub fn artifact_with_content(content: &str) -> PipelineArtifact {
    PipelineArtifact {
        request_id: Uuid::new_v4(),
        analysis: Analysis {
            summary: String::new(),
            keywords: vec![],
        },
        outline: Outline {
            title: "Test".into(),
            sections: vec![],
        },
        content: content.to_string(),
        fact_check: FactCheckSummary::default(),
        image: ImageRef {
            location: String::new(),
            prompt: String::new(),
        },
        social_posts: PostSet { posts: vec![] },
        timings: vec![],
        total_duration_ms: 0,
        completed_at: Utc::now(),
    }
}

/// A variant already completed with `content`
pub fn completed_variant(name: &str, tone: Tone, content: &str, seconds: f64) -> Variant {
    let mut variant = Variant::new(name, "test", PipelineRequest::new("topic").with_tone(tone));
    variant.start();
    variant.complete(artifact_with_content(content), seconds);
    variant
}
