//! Deterministic offline provider.
//!
//! Fills fixed templates from the request instead of calling a model. Used
//! for `--offline` runs and as a stand-in during tests.

use async_trait::async_trait;

use super::{check_facts, FactCheckProvider, GenerationProvider, SocialPostParams};
use crate::domain::{
    Analysis, Audience, ClaimCheck, FactCheckSummary, ImageRef, Outline, OutlineSection,
    PipelineRequest, PostSet, SocialPost, Tone, Verdict,
};
use crate::error::ProviderError;

#[derive(Debug, Clone, Default)]
pub struct TemplateProvider;

impl TemplateProvider {
    pub fn new() -> Self {
        Self
    }
}

fn opener(tone: Tone) -> &'static str {
    match tone {
        Tone::Polite => "We would like to walk you through",
        Tone::Friendly => "Let's dig into",
        Tone::Professional => "This section examines",
        Tone::Casual => "Here's the deal with",
    }
}

fn slug(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

#[async_trait]
impl GenerationProvider for TemplateProvider {
    fn name(&self) -> &str {
        "template"
    }

    async fn analyze(&self, topic: &str) -> Result<Analysis, ProviderError> {
        if topic.trim().is_empty() {
            return Err(ProviderError::Malformed("topic is empty".to_string()));
        }
        Ok(Analysis {
            summary: format!("Readers searching for {} want practical guidance.", topic),
            keywords: topic.split_whitespace().map(str::to_lowercase).collect(),
        })
    }

    async fn outline(
        &self,
        analysis: &Analysis,
        request: &PipelineRequest,
    ) -> Result<Outline, ProviderError> {
        let level = match request.audience {
            Audience::Beginner => "Getting Started",
            Audience::Expert => "Advanced Techniques",
            Audience::General | Audience::Business => "Key Ideas",
        };

        let mut sections = vec![
            OutlineSection {
                heading: format!("Why {} matters", request.topic),
                points: vec![analysis.summary.clone()],
            },
            OutlineSection {
                heading: level.to_string(),
                points: analysis.keywords.clone(),
            },
            OutlineSection {
                heading: "Wrapping up".to_string(),
                points: vec!["Summary and next steps".to_string()],
            },
        ];
        if let Some(instructions) = request.instructions.as_deref() {
            sections[1].points.push(instructions.to_string());
        }

        Ok(Outline {
            title: format!("A Guide to {}", request.topic),
            sections,
        })
    }

    async fn write(
        &self,
        outline: &Outline,
        request: &PipelineRequest,
    ) -> Result<String, ProviderError> {
        let target = request.target_length as usize;
        let mut body = format!("# {}\n", outline.title);

        let sentence = format!(
            "{} {} for a {} audience in a few steps.",
            opener(request.tone),
            request.topic,
            request.audience
        );

        for section in &outline.sections {
            body.push_str(&format!("\n## {}\n\n", section.heading));
            let budget = target / outline.sections.len().max(1);
            let mut written = 0;
            while written < budget {
                body.push_str(&sentence);
                body.push(' ');
                written += sentence.chars().count() + 1;
            }
            body.push('\n');
        }

        Ok(body.trim_end().to_string())
    }

    async fn fact_check(
        &self,
        content: &str,
        topic: &str,
    ) -> Result<FactCheckSummary, ProviderError> {
        check_facts(self, content, topic).await
    }

    async fn image(&self, prompt: &str) -> Result<ImageRef, ProviderError> {
        Ok(ImageRef {
            location: format!("template://image/{}", slug(prompt)),
            prompt: prompt.to_string(),
        })
    }

    async fn social_posts(&self, params: &SocialPostParams) -> Result<PostSet, ProviderError> {
        Ok(PostSet {
            posts: vec![
                SocialPost {
                    platform: "twitter".to_string(),
                    text: format!("New post: {} #{}", params.title, slug(&params.topic)),
                },
                SocialPost {
                    platform: "linkedin".to_string(),
                    text: format!(
                        "{} - written for {} readers.",
                        params.title, params.audience
                    ),
                },
            ],
        })
    }
}

#[async_trait]
impl FactCheckProvider for TemplateProvider {
    /// Sentences containing digits are treated as factual claims
    async fn extract_claims(
        &self,
        content: &str,
        _topic: &str,
    ) -> Result<Vec<String>, ProviderError> {
        Ok(content
            .split(['.', '!', '?'])
            .map(str::trim)
            .filter(|s| s.chars().any(|c| c.is_ascii_digit()))
            .map(str::to_string)
            .collect())
    }

    async fn verify(
        &self,
        claims: &[String],
        _content: &str,
        _topic: &str,
    ) -> Result<FactCheckSummary, ProviderError> {
        Ok(FactCheckSummary {
            claims: claims
                .iter()
                .map(|claim| ClaimCheck {
                    claim: claim.clone(),
                    verdict: Verdict::Unverified,
                    note: Some("offline provider cannot verify".to_string()),
                })
                .collect(),
        })
    }
}
