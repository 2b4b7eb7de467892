//! Pipeline requests.
//!
//! A request is created by the caller and never mutated. Variation
//! strategies derive new requests from a base one instead.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Writing tone requested for the article
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Polite,
    Friendly,
    Professional,
    Casual,
}

impl Default for Tone {
    fn default() -> Self {
        Self::Professional
    }
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Polite => "polite",
            Tone::Friendly => "friendly",
            Tone::Professional => "professional",
            Tone::Casual => "casual",
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intended readership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Beginner,
    General,
    Expert,
    Business,
}

impl Default for Audience {
    fn default() -> Self {
        Self::General
    }
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Beginner => "beginner",
            Audience::General => "general",
            Audience::Expert => "expert",
            Audience::Business => "business",
        }
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to a single pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    /// Request identifier (generated when omitted in YAML)
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Topic or primary keyword
    pub topic: String,

    #[serde(default)]
    pub tone: Tone,

    #[serde(default)]
    pub audience: Audience,

    /// Target article length in characters
    #[serde(default = "default_target_length")]
    pub target_length: u32,

    /// Theme used to build the image prompt
    #[serde(default)]
    pub image_theme: String,

    /// Free-text instructions passed to the outline stage
    #[serde(default)]
    pub instructions: Option<String>,
}

fn default_target_length() -> u32 {
    3000
}

impl PipelineRequest {
    /// Create a request with default tone, audience and length
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            tone: Tone::default(),
            audience: Audience::default(),
            target_length: default_target_length(),
            image_theme: String::new(),
            instructions: None,
        }
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_audience(mut self, audience: Audience) -> Self {
        self.audience = audience;
        self
    }

    pub fn with_target_length(mut self, target_length: u32) -> Self {
        self.target_length = target_length;
        self
    }

    pub fn with_image_theme(mut self, theme: impl Into<String>) -> Self {
        self.image_theme = theme.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Parse a request from YAML content
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        use anyhow::Context;
        serde_yaml::from_str(content).context("Failed to parse request YAML")
    }

    /// Derive a sibling request with a fresh id
    pub fn derive(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_yaml_defaults() {
        let request = PipelineRequest::from_yaml("topic: rust async\n").unwrap();

        assert_eq!(request.topic, "rust async");
        assert_eq!(request.tone, Tone::Professional);
        assert_eq!(request.audience, Audience::General);
        assert_eq!(request.target_length, 3000);
        assert!(request.instructions.is_none());
    }

    #[test]
    fn test_request_yaml_full() {
        let yaml = r#"
topic: home espresso
tone: friendly
audience: beginner
target_length: 1800
image_theme: warm kitchen
instructions: Mention grinder choice
"#;
        let request = PipelineRequest::from_yaml(yaml).unwrap();

        assert_eq!(request.tone, Tone::Friendly);
        assert_eq!(request.audience, Audience::Beginner);
        assert_eq!(request.target_length, 1800);
        assert_eq!(request.instructions.as_deref(), Some("Mention grinder choice"));
    }

    #[test]
    fn test_derive_keeps_parameters() {
        let base = PipelineRequest::new("tea").with_tone(Tone::Casual);
        let derived = base.derive();

        assert_ne!(base.id, derived.id);
        assert_eq!(derived.tone, Tone::Casual);
        assert_eq!(derived.topic, "tea");
    }
}
