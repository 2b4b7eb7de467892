//! Provider interfaces for external systems.
//!
//! The orchestrator only depends on these contracts. Concrete providers:
//! - `FabricProvider`: runs Fabric patterns as subprocesses
//! - `TemplateProvider`: deterministic offline generation

pub mod fabric;
pub mod template;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Analysis, Audience, FactCheckSummary, ImageRef, Outline, PipelineRequest, PostSet, Tone,
};
use crate::error::ProviderError;

pub use fabric::{FabricPatterns, FabricProvider};
pub use template::TemplateProvider;

/// Inputs for the social-post stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPostParams {
    pub topic: String,
    pub title: String,
    /// Article body the posts should promote
    pub content: String,
    pub tone: Tone,
    pub audience: Audience,
}

/// The generation stage set.
///
/// Every method the orchestrator calls is part of the contract, including
/// the tone, audience and instruction parameters of the outline and write
/// stages. Implementations must not retry internally.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    async fn analyze(&self, topic: &str) -> Result<Analysis, ProviderError>;

    /// Outline from the analysis; uses audience, tone, topic and instructions
    async fn outline(
        &self,
        analysis: &Analysis,
        request: &PipelineRequest,
    ) -> Result<Outline, ProviderError>;

    /// Draft article from the outline; uses target length, tone and audience
    async fn write(
        &self,
        outline: &Outline,
        request: &PipelineRequest,
    ) -> Result<String, ProviderError>;

    async fn fact_check(&self, content: &str, topic: &str)
        -> Result<FactCheckSummary, ProviderError>;

    async fn image(&self, prompt: &str) -> Result<ImageRef, ProviderError>;

    async fn social_posts(&self, params: &SocialPostParams) -> Result<PostSet, ProviderError>;
}

/// Fact-check search provider
#[async_trait]
pub trait FactCheckProvider: Send + Sync {
    async fn extract_claims(&self, content: &str, topic: &str)
        -> Result<Vec<String>, ProviderError>;

    async fn verify(
        &self,
        claims: &[String],
        content: &str,
        topic: &str,
    ) -> Result<FactCheckSummary, ProviderError>;
}

/// Extract claims and verify them; no claims means nothing to verify
pub async fn check_facts(
    provider: &dyn FactCheckProvider,
    content: &str,
    topic: &str,
) -> Result<FactCheckSummary, ProviderError> {
    let claims = provider.extract_claims(content, topic).await?;
    if claims.is_empty() {
        tracing::debug!(topic, "No factual claims found, skipping verification");
        return Ok(FactCheckSummary::default());
    }
    provider.verify(&claims, content, topic).await
}

/// Build the image prompt from the request theme and outline title
pub fn image_prompt(request: &PipelineRequest, outline: &Outline) -> String {
    let theme = request.image_theme.trim();
    if theme.is_empty() {
        format!("Illustration for an article titled \"{}\"", outline.title)
    } else {
        format!(
            "Illustration for an article titled \"{}\", theme: {}",
            outline.title, theme
        )
    }
}
