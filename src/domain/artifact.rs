//! Artifacts produced by the generation stages.
//!
//! Each stage returns a typed output; the orchestrator assembles them into
//! a [`PipelineArtifact`] once every stage has succeeded.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::request::PipelineRequest;

/// Generation stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Analyze,
    Outline,
    Write,
    FactCheck,
    Image,
    SocialPosts,
}

impl StageName {
    /// Every stage in the fixed pipeline order
    pub const ALL: [StageName; 6] = [
        StageName::Analyze,
        StageName::Outline,
        StageName::Write,
        StageName::FactCheck,
        StageName::Image,
        StageName::SocialPosts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Analyze => "analyze",
            StageName::Outline => "outline",
            StageName::Write => "write",
            StageName::FactCheck => "fact_check",
            StageName::Image => "image",
            StageName::SocialPosts => "social_posts",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Topic analysis
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// One section of an outline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineSection {
    pub heading: String,
    #[serde(default)]
    pub points: Vec<String>,
}

/// Article outline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outline {
    pub title: String,
    pub sections: Vec<OutlineSection>,
}

/// Verdict on a single factual claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Supported,
    Disputed,
    Unverified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimCheck {
    pub claim: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub note: Option<String>,
}

/// Result of the fact-check stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactCheckSummary {
    pub claims: Vec<ClaimCheck>,
}

impl FactCheckSummary {
    pub fn supported(&self) -> usize {
        self.count(Verdict::Supported)
    }

    pub fn disputed(&self) -> usize {
        self.count(Verdict::Disputed)
    }

    fn count(&self, verdict: Verdict) -> usize {
        self.claims.iter().filter(|c| c.verdict == verdict).count()
    }
}

/// Reference to a generated image (URL or provider handle)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub location: String,
    /// Prompt that produced the image
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub platform: String,
    pub text: String,
}

/// Social posts promoting the article
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostSet {
    pub posts: Vec<SocialPost>,
}

/// Timing record for one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: StageName,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// The complete output of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    /// Id of the request that produced this artifact
    pub request_id: Uuid,
    pub analysis: Analysis,
    pub outline: Outline,
    /// Draft article body (markdown)
    pub content: String,
    pub fact_check: FactCheckSummary,
    pub image: ImageRef,
    pub social_posts: PostSet,
    /// Per-stage timings in execution order
    pub timings: Vec<StageTiming>,
    pub total_duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl PipelineArtifact {
    /// Stage → duration map for analytics
    pub fn durations(&self) -> BTreeMap<StageName, Duration> {
        self.timings
            .iter()
            .map(|t| (t.stage, Duration::from_millis(t.duration_ms)))
            .collect()
    }

    /// Article length in characters
    pub fn content_length(&self) -> usize {
        self.content.chars().count()
    }
}

/// Partial state handed to stage listeners as the run progresses
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Analysis(Analysis),
    Outline(Outline),
    Draft(String),
    FactCheck {
        content: String,
        summary: FactCheckSummary,
    },
    Image(ImageRef),
    SocialPosts(PostSet),
}

impl StageOutput {
    pub fn stage(&self) -> StageName {
        match self {
            StageOutput::Analysis(_) => StageName::Analyze,
            StageOutput::Outline(_) => StageName::Outline,
            StageOutput::Draft(_) => StageName::Write,
            StageOutput::FactCheck { .. } => StageName::FactCheck,
            StageOutput::Image(_) => StageName::Image,
            StageOutput::SocialPosts(_) => StageName::SocialPosts,
        }
    }
}

/// A generated article kept in history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: Uuid,
    /// Request that produced the article; repeated runs share it
    pub request_id: Uuid,
    pub request: PipelineRequest,
    pub title: String,
    /// SHA-256 of the article body (first 16 hex chars)
    pub fingerprint: String,
    pub content_length: usize,
    pub total_duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl ArticleRecord {
    pub fn from_artifact(request: &PipelineRequest, artifact: &PipelineArtifact) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id: artifact.request_id,
            request: request.clone(),
            title: artifact.outline.title.clone(),
            fingerprint: fingerprint(&artifact.content),
            content_length: artifact.content_length(),
            total_duration_ms: artifact.total_duration_ms,
            created_at: artifact.completed_at,
        }
    }
}

/// Hash content (first 16 chars of SHA256)
pub fn fingerprint(content: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..8])
}
