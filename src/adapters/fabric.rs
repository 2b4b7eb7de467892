//! Fabric provider for AI pattern execution.
//!
//! Every stage maps to a Fabric pattern. The provider spawns
//! `fabric -p <pattern>`, pipes a plain-text brief to stdin and parses the
//! markdown that comes back into typed stage outputs.

use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{check_facts, FactCheckProvider, GenerationProvider, SocialPostParams};
use crate::domain::{
    Analysis, ClaimCheck, FactCheckSummary, ImageRef, Outline, OutlineSection, PipelineRequest,
    PostSet, SocialPost, Verdict,
};
use crate::error::ProviderError;

/// Pattern names used for each stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricPatterns {
    #[serde(default = "default_analyze")]
    pub analyze: String,
    #[serde(default = "default_outline")]
    pub outline: String,
    #[serde(default = "default_write")]
    pub write: String,
    #[serde(default = "default_extract_claims")]
    pub extract_claims: String,
    #[serde(default = "default_verify_claims")]
    pub verify_claims: String,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_social_posts")]
    pub social_posts: String,
}

fn default_analyze() -> String {
    "analyze_topic".to_string()
}
fn default_outline() -> String {
    "create_outline".to_string()
}
fn default_write() -> String {
    "write_essay".to_string()
}
fn default_extract_claims() -> String {
    "extract_claims".to_string()
}
fn default_verify_claims() -> String {
    "analyze_claims".to_string()
}
fn default_image() -> String {
    "create_image_prompt".to_string()
}
fn default_social_posts() -> String {
    "create_social_posts".to_string()
}

impl Default for FabricPatterns {
    fn default() -> Self {
        Self {
            analyze: default_analyze(),
            outline: default_outline(),
            write: default_write(),
            extract_claims: default_extract_claims(),
            verify_claims: default_verify_claims(),
            image: default_image(),
            social_posts: default_social_posts(),
        }
    }
}

/// Fabric provider using subprocess mode
pub struct FabricProvider {
    /// Path to the fabric binary (default: "fabric")
    binary_path: String,

    patterns: FabricPatterns,

    /// Timeout for a single pattern invocation
    call_timeout: Duration,
}

impl FabricProvider {
    /// Create a provider, preferring the `fabric-ai` binary (Homebrew install name)
    pub fn new(patterns: FabricPatterns, call_timeout: Duration) -> Self {
        let binary_path = if std::process::Command::new("fabric-ai")
            .arg("--help")
            .output()
            .is_ok()
        {
            "fabric-ai".to_string()
        } else {
            "fabric".to_string()
        };

        Self {
            binary_path,
            patterns,
            call_timeout,
        }
    }

    /// Create a provider with a custom binary path
    pub fn with_binary_path(
        binary_path: impl Into<String>,
        patterns: FabricPatterns,
        call_timeout: Duration,
    ) -> Self {
        Self {
            binary_path: binary_path.into(),
            patterns,
            call_timeout,
        }
    }

    pub fn binary_path(&self) -> &str {
        &self.binary_path
    }

    /// Check that fabric is available and can list patterns
    pub async fn health_check(&self) -> anyhow::Result<()> {
        let output = Command::new(&self.binary_path)
            .arg("-l")
            .output()
            .await
            .context("Failed to run fabric health check")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Fabric health check failed: {}", stderr);
        }

        Ok(())
    }

    /// Run a pattern with `input` on stdin and return stdout
    async fn execute(&self, pattern: &str, input: &str) -> Result<String, ProviderError> {
        debug!(pattern, input_bytes = input.len(), "Running fabric pattern");

        let mut child = Command::new(&self.binary_path)
            .args(["-p", pattern])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProviderError::Unavailable(format!(
                    "failed to spawn {} for pattern '{}': {}",
                    self.binary_path, pattern, e
                ))
            })?;

        // The stdin write counts against the call timeout: a child that never
        // reads would otherwise block us here
        let exchange = async move {
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(input.as_bytes())
                    .await
                    .context("Failed to write to fabric stdin")?;
                // Drop stdin to signal EOF
            }
            child.wait_with_output().await.with_context(|| {
                format!("Failed to wait for fabric process for pattern '{}'", pattern)
            })
        };

        let output = match timeout(self.call_timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => return Err(ProviderError::Timeout(self.call_timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(anyhow::anyhow!(
                "Fabric pattern '{}' failed with exit code {}: {}",
                pattern,
                exit_code,
                stderr.trim()
            )
            .into());
        }

        let stdout = String::from_utf8(output.stdout).context("Fabric output is not valid UTF-8")?;

        Ok(stdout)
    }
}

#[async_trait]
impl GenerationProvider for FabricProvider {
    fn name(&self) -> &str {
        "fabric"
    }

    async fn analyze(&self, topic: &str) -> Result<Analysis, ProviderError> {
        let output = self.execute(&self.patterns.analyze, topic).await?;
        parse_analysis(&output)
    }

    async fn outline(
        &self,
        analysis: &Analysis,
        request: &PipelineRequest,
    ) -> Result<Outline, ProviderError> {
        let mut brief = brief_header(request);
        brief.push_str("\nANALYSIS:\n");
        brief.push_str(&analysis.summary);
        if !analysis.keywords.is_empty() {
            brief.push_str(&format!("\nKEYWORDS: {}", analysis.keywords.join(", ")));
        }

        let output = self.execute(&self.patterns.outline, &brief).await?;
        parse_outline(&output)
    }

    async fn write(
        &self,
        outline: &Outline,
        request: &PipelineRequest,
    ) -> Result<String, ProviderError> {
        let mut brief = brief_header(request);
        brief.push_str(&format!(
            "TARGET LENGTH: {} characters\n\nOUTLINE:\n{}",
            request.target_length,
            render_outline(outline)
        ));

        let output = self.execute(&self.patterns.write, &brief).await?;
        let content = output.trim();
        if content.is_empty() {
            return Err(ProviderError::Malformed("empty draft".to_string()));
        }
        Ok(content.to_string())
    }

    async fn fact_check(
        &self,
        content: &str,
        topic: &str,
    ) -> Result<FactCheckSummary, ProviderError> {
        check_facts(self, content, topic).await
    }

    async fn image(&self, prompt: &str) -> Result<ImageRef, ProviderError> {
        let output = self.execute(&self.patterns.image, prompt).await?;
        let location = output
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| ProviderError::Malformed("empty image reference".to_string()))?;

        Ok(ImageRef {
            location: location.to_string(),
            prompt: prompt.to_string(),
        })
    }

    async fn social_posts(&self, params: &SocialPostParams) -> Result<PostSet, ProviderError> {
        let brief = format!(
            "TOPIC: {}\nTITLE: {}\nTONE: {}\nAUDIENCE: {}\n\nARTICLE:\n{}",
            params.topic, params.title, params.tone, params.audience, params.content
        );
        let output = self.execute(&self.patterns.social_posts, &brief).await?;
        Ok(parse_posts(&output))
    }
}

#[async_trait]
impl FactCheckProvider for FabricProvider {
    async fn extract_claims(
        &self,
        content: &str,
        topic: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let brief = format!("TOPIC: {}\n\n{}", topic, content);
        let output = self.execute(&self.patterns.extract_claims, &brief).await?;
        Ok(parse_list(&output))
    }

    async fn verify(
        &self,
        claims: &[String],
        _content: &str,
        topic: &str,
    ) -> Result<FactCheckSummary, ProviderError> {
        let listed: Vec<String> = claims.iter().map(|c| format!("- {}", c)).collect();
        let brief = format!("TOPIC: {}\n\nCLAIMS:\n{}", topic, listed.join("\n"));
        let output = self.execute(&self.patterns.verify_claims, &brief).await?;
        Ok(parse_verification(&output, claims))
    }
}

fn brief_header(request: &PipelineRequest) -> String {
    let mut brief = format!(
        "TOPIC: {}\nAUDIENCE: {}\nTONE: {}\n",
        request.topic, request.audience, request.tone
    );
    if let Some(instructions) = request.instructions.as_deref() {
        brief.push_str(&format!("INSTRUCTIONS: {}\n", instructions));
    }
    brief
}

/// Render an outline back to markdown
pub fn render_outline(outline: &Outline) -> String {
    let mut out = format!("# {}\n", outline.title);
    for section in &outline.sections {
        out.push_str(&format!("\n## {}\n", section.heading));
        for point in &section.points {
            out.push_str(&format!("- {}\n", point));
        }
    }
    out
}

fn parse_analysis(output: &str) -> Result<Analysis, ProviderError> {
    let mut summary = Vec::new();
    let mut keywords = Vec::new();

    for line in output.lines().map(str::trim) {
        if let Some(rest) = strip_prefix_ci(line, "keywords:") {
            keywords = rest
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
        } else if !line.is_empty() {
            summary.push(line);
        }
    }

    if summary.is_empty() {
        return Err(ProviderError::Malformed("empty analysis".to_string()));
    }

    Ok(Analysis {
        summary: summary.join("\n"),
        keywords,
    })
}

fn parse_outline(output: &str) -> Result<Outline, ProviderError> {
    let mut title = None;
    let mut sections: Vec<OutlineSection> = Vec::new();

    for line in output.lines().map(str::trim) {
        if let Some(heading) = line.strip_prefix("## ") {
            sections.push(OutlineSection {
                heading: heading.trim().to_string(),
                points: Vec::new(),
            });
        } else if let Some(heading) = line.strip_prefix("# ") {
            title.get_or_insert_with(|| heading.trim().to_string());
        } else if let Some(point) = bullet(line) {
            if let Some(section) = sections.last_mut() {
                section.points.push(point.to_string());
            }
        }
    }

    let title = title.ok_or_else(|| ProviderError::Malformed("outline has no title".to_string()))?;
    if sections.is_empty() {
        return Err(ProviderError::Malformed("outline has no sections".to_string()));
    }

    Ok(Outline { title, sections })
}

fn parse_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter_map(bullet)
        .map(str::to_string)
        .collect()
}

/// Lines look like `[SUPPORTED] claim | note`; unmentioned claims stay unverified
fn parse_verification(output: &str, claims: &[String]) -> FactCheckSummary {
    let mut checks: Vec<ClaimCheck> = Vec::new();

    for line in output.lines().map(str::trim) {
        let Some(rest) = line.strip_prefix('[') else {
            continue;
        };
        let Some((tag, body)) = rest.split_once(']') else {
            continue;
        };
        let verdict = match tag.trim().to_ascii_lowercase().as_str() {
            "supported" => Verdict::Supported,
            "disputed" => Verdict::Disputed,
            _ => Verdict::Unverified,
        };
        let (claim, note) = match body.split_once('|') {
            Some((claim, note)) => (claim.trim(), Some(note.trim().to_string())),
            None => (body.trim(), None),
        };
        checks.push(ClaimCheck {
            claim: claim.to_string(),
            verdict,
            note,
        });
    }

    for claim in claims {
        if !checks.iter().any(|c| c.claim == *claim) {
            checks.push(ClaimCheck {
                claim: claim.clone(),
                verdict: Verdict::Unverified,
                note: None,
            });
        }
    }

    FactCheckSummary { claims: checks }
}

/// `## platform` headings followed by the post text
fn parse_posts(output: &str) -> PostSet {
    let mut posts: Vec<SocialPost> = Vec::new();

    for line in output.lines() {
        if let Some(platform) = line.trim().strip_prefix("## ") {
            posts.push(SocialPost {
                platform: platform.trim().to_ascii_lowercase(),
                text: String::new(),
            });
        } else if let Some(post) = posts.last_mut() {
            if !post.text.is_empty() || !line.trim().is_empty() {
                post.text.push_str(line);
                post.text.push('\n');
            }
        }
    }

    for post in &mut posts {
        post.text = post.text.trim().to_string();
    }
    posts.retain(|p| !p.text.is_empty());

    PostSet { posts }
}

fn bullet(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(rest.trim());
    }
    let (number, rest) = line.split_once(". ")?;
    if !number.is_empty() && number.chars().all(|c| c.is_ascii_digit()) {
        Some(rest.trim())
    } else {
        None
    }
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    if line.len() >= prefix.len()
        && line.is_char_boundary(prefix.len())
        && line[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(line[prefix.len()..].trim())
    } else {
        None
    }
}
