//! Heuristic scoring of generated variants.
//!
//! All scores are deterministic functions of the article text and request
//! parameters; nothing here calls a model.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Tone, Variant};
use crate::error::ComparisonError;

/// Target average sentence length in characters
pub const TARGET_SENTENCE_LENGTH: f64 = 75.0;

/// Article lengths (characters) that earn the engagement bonus
pub const ENGAGEMENT_SWEET_SPOT: RangeInclusive<usize> = 1500..=4000;

const SEO_BASE: f64 = 50.0;
const SEO_HEADING_CAP: f64 = 30.0;
const SEO_LINK_CAP: f64 = 15.0;
const SEO_IMAGE_CAP: f64 = 15.0;
const SEO_PER_ITEM: f64 = 5.0;

const ENGAGEMENT_BASE: f64 = 50.0;
const ENGAGEMENT_LENGTH_BONUS: f64 = 20.0;

/// Sentences of body text; headings and blank lines are ignored
fn sentences(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split(['.', '!', '?']))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// 100 minus the deviation of the average sentence length from the target, floored at 0
pub fn readability_score(text: &str) -> f64 {
    let sentences = sentences(text);
    if sentences.is_empty() {
        return 0.0;
    }

    let total: usize = sentences.iter().map(|s| s.chars().count()).sum();
    let average = total as f64 / sentences.len() as f64;
    (100.0 - (average - TARGET_SENTENCE_LENGTH).abs()).max(0.0)
}

pub fn seo_score(text: &str) -> f64 {
    let headings = text
        .lines()
        .filter(|line| line.trim_start().starts_with('#'))
        .count();
    let images = text.matches("![").count();
    let links = text.matches("](").count().saturating_sub(images);

    let score = SEO_BASE
        + (headings as f64 * SEO_PER_ITEM).min(SEO_HEADING_CAP)
        + (links as f64 * SEO_PER_ITEM).min(SEO_LINK_CAP)
        + (images as f64 * SEO_PER_ITEM).min(SEO_IMAGE_CAP);
    score.min(100.0)
}

fn tone_bonus(tone: Tone) -> f64 {
    match tone {
        Tone::Friendly => 20.0,
        Tone::Casual => 15.0,
        Tone::Polite => 10.0,
        Tone::Professional => 5.0,
    }
}

pub fn engagement_score(text: &str, tone: Tone) -> f64 {
    let length = text.chars().count();
    let mut score = ENGAGEMENT_BASE + tone_bonus(tone);
    if ENGAGEMENT_SWEET_SPOT.contains(&length) {
        score += ENGAGEMENT_LENGTH_BONUS;
    }
    score.min(100.0)
}

/// Length expressed as a 0-100 score relative to the sweet spot
fn length_score(length: usize) -> f64 {
    let (low, high) = (
        *ENGAGEMENT_SWEET_SPOT.start() as f64,
        *ENGAGEMENT_SWEET_SPOT.end() as f64,
    );
    let length = length as f64;
    if length < low {
        length / low * 100.0
    } else if length > high {
        high / length * 100.0
    } else {
        100.0
    }
}

/// The four comparison metrics for one side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub readability: f64,
    pub seo: f64,
    pub engagement: f64,
    /// Article length in characters
    pub length: usize,
}

impl Metrics {
    pub fn of(content: &str, tone: Tone) -> Self {
        Self {
            readability: readability_score(content),
            seo: seo_score(content),
            engagement: engagement_score(content, tone),
            length: content.chars().count(),
        }
    }

    fn weighted(&self, weights: &MetricWeights) -> f64 {
        self.readability * weights.readability
            + self.seo * weights.seo
            + self.engagement * weights.engagement
            + length_score(self.length) * weights.length
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    pub readability: f64,
    pub seo: f64,
    pub engagement: f64,
    pub length: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            readability: 0.4,
            seo: 0.2,
            engagement: 0.3,
            length: 0.1,
        }
    }
}

/// How the recommendation sentence picks a side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationRule {
    /// Higher readability wins; ties go to the first variant
    Readability,
    /// Weighted sum of all four metrics; ties go to the first variant
    Weighted(MetricWeights),
}

impl Default for RecommendationRule {
    fn default() -> Self {
        Self::Readability
    }
}

/// Side-by-side metrics for two completed variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub variant_a: Uuid,
    pub variant_b: Uuid,
    pub metrics_a: Metrics,
    pub metrics_b: Metrics,
    /// Id of the recommended side
    pub preferred: Uuid,
    pub recommendation: String,
}

#[derive(Debug, Clone, Default)]
pub struct ComparisonAnalyzer {
    rule: RecommendationRule,
}

impl ComparisonAnalyzer {
    pub fn new(rule: RecommendationRule) -> Self {
        Self { rule }
    }

    pub fn compare(&self, a: &Variant, b: &Variant) -> Result<Comparison, ComparisonError> {
        let metrics_a = completed_metrics(a)?;
        let metrics_b = completed_metrics(b)?;

        let (score_a, score_b, basis) = match &self.rule {
            RecommendationRule::Readability => {
                (metrics_a.readability, metrics_b.readability, "readability score")
            }
            RecommendationRule::Weighted(weights) => (
                metrics_a.weighted(weights),
                metrics_b.weighted(weights),
                "weighted score",
            ),
        };

        let (winner, loser, win_score, lose_score) = if score_b > score_a {
            (b, a, score_b, score_a)
        } else {
            (a, b, score_a, score_b)
        };

        let recommendation = if score_a == score_b {
            format!(
                "Versions {} and {} have the same {} ({:.1}); version {} is recommended.",
                a.name, b.name, basis, score_a, winner.name
            )
        } else {
            format!(
                "Version {} is recommended: its {} ({:.1}) is higher than version {}'s ({:.1}).",
                winner.name, basis, win_score, loser.name, lose_score
            )
        };

        Ok(Comparison {
            variant_a: a.id,
            variant_b: b.id,
            metrics_a,
            metrics_b,
            preferred: winner.id,
            recommendation,
        })
    }
}

fn completed_metrics(variant: &Variant) -> Result<Metrics, ComparisonError> {
    match (&variant.output, variant.is_completed()) {
        (Some(output), true) => Ok(Metrics::of(&output.content, variant.parameters.tone)),
        _ => Err(ComparisonError::VariantNotCompleted(variant.name.clone())),
    }
}

/// Compare two completed variants with the default readability rule
pub fn compare_versions(a: &Variant, b: &Variant) -> Result<Comparison, ComparisonError> {
    ComparisonAnalyzer::default().compare(a, b)
}

/// Characters produced per second of generation, for completed variants only
pub fn recommendation_score(variant: &Variant) -> Option<f64> {
    if !variant.is_completed() {
        return None;
    }
    let seconds = variant.generation_time_seconds.unwrap_or(0.0).max(1.0);
    Some(variant.content_length() as f64 / seconds)
}

/// Highest recommendation score wins; the first variant seen wins ties
pub fn recommend(variants: &[Variant]) -> Option<Uuid> {
    let mut best: Option<(Uuid, f64)> = None;
    for variant in variants {
        let Some(score) = recommendation_score(variant) else {
            continue;
        };
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((variant.id, score)),
        }
    }
    best.map(|(id, _)| id)
}
