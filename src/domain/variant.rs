//! Variants and variant sets (A/B generation).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::PipelineArtifact;
use super::request::PipelineRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl VariantStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VariantStatus::Completed | VariantStatus::Failed)
    }
}

/// One parameterized pipeline run inside a variant set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    /// Letter label (A, B, C, ...)
    pub name: String,
    pub description: String,
    pub parameters: PipelineRequest,
    pub status: VariantStatus,
    pub output: Option<PipelineArtifact>,
    pub generation_time_seconds: Option<f64>,
    /// Failure message for failed variants
    pub error: Option<String>,
}

impl Variant {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: PipelineRequest,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            parameters,
            status: VariantStatus::Pending,
            output: None,
            generation_time_seconds: None,
            error: None,
        }
    }

    /// Pending → Generating
    pub fn start(&mut self) {
        if self.status == VariantStatus::Pending {
            self.status = VariantStatus::Generating;
        }
    }

    /// Generating → Completed
    pub fn complete(&mut self, output: PipelineArtifact, generation_time_seconds: f64) {
        if self.status.is_terminal() {
            return;
        }
        self.status = VariantStatus::Completed;
        self.output = Some(output);
        self.generation_time_seconds = Some(generation_time_seconds);
    }

    /// Generating → Failed
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = VariantStatus::Failed;
        self.error = Some(error.into());
    }

    pub fn is_completed(&self) -> bool {
        self.status == VariantStatus::Completed
    }

    /// Length of the generated article, 0 when there is no output
    pub fn content_length(&self) -> usize {
        self.output
            .as_ref()
            .map(PipelineArtifact::content_length)
            .unwrap_or(0)
    }
}

/// A batch of variants generated from one base request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSet {
    pub id: Uuid,
    pub request: PipelineRequest,
    pub variants: Vec<Variant>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_generation_time_seconds: Option<f64>,
    pub recommended_variant_id: Option<Uuid>,
}

impl VariantSet {
    pub fn new(request: PipelineRequest, variants: Vec<Variant>) -> Self {
        Self {
            id: Uuid::new_v4(),
            request,
            variants,
            created_at: Utc::now(),
            completed_at: None,
            total_generation_time_seconds: None,
            recommended_variant_id: None,
        }
    }

    pub fn variant(&self, id: Uuid) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn variant_by_name(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name.eq_ignore_ascii_case(name))
    }

    pub fn recommended(&self) -> Option<&Variant> {
        self.recommended_variant_id.and_then(|id| self.variant(id))
    }

    pub fn completed(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter().filter(|v| v.is_completed())
    }

    pub fn failed_count(&self) -> usize {
        self.variants
            .iter()
            .filter(|v| v.status == VariantStatus::Failed)
            .count()
    }
}
