//! Command-line interface for copyforge.
//!
//! Provides commands for running the content pipeline, generating and
//! comparing A/B variants, reviewing workflows and browsing history.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::adapters::{FabricProvider, GenerationProvider, TemplateProvider};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    article_history, get_record, run_under_review, ApprovalWorkflowEngine, ComparisonAnalyzer,
    FileStore, MetricWeights, PipelineOrchestrator, RecommendationRule, RecordKind, Store,
    VariantGenerationCoordinator, VariationStrategy,
};
use crate::domain::{
    Decision, Feedback, PipelineArtifact, PipelineRequest, StepType, VariantSet, VariantStatus,
    Workflow,
};

/// copyforge - AI content pipeline with human review and A/B variants
#[derive(Parser, Debug)]
#[command(name = "copyforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline for one request
    Run {
        /// Request YAML file
        #[arg(short, long)]
        request: PathBuf,

        /// Use the offline template provider instead of Fabric
        #[arg(long, env = "COPYFORGE_OFFLINE")]
        offline: bool,

        /// Create an approval workflow fed by the run
        #[arg(long)]
        review: bool,
    },

    /// Generate a set of A/B variants
    Variants {
        /// Request YAML file
        #[arg(short, long)]
        request: PathBuf,

        /// Maximum number of variants
        #[arg(short, long, default_value = "3")]
        count: usize,

        /// Variation strategies, applied in order
        #[arg(short, long, value_enum, required = true)]
        strategy: Vec<StrategyArg>,

        /// Use the offline template provider instead of Fabric
        #[arg(long, env = "COPYFORGE_OFFLINE")]
        offline: bool,
    },

    /// Compare two variants of a stored variant set
    Compare {
        /// Variant set ID (UUID)
        set_id: String,

        /// First variant name (e.g. A)
        a: String,

        /// Second variant name (e.g. B)
        b: String,

        /// Recommend on all four metrics instead of readability alone
        #[arg(long)]
        weighted: bool,
    },

    /// List recently generated articles
    History {
        /// Maximum number of articles to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show a workflow's steps and status
    Workflow {
        /// Workflow ID (UUID)
        workflow_id: String,
    },

    /// Resolve a review step
    Resolve {
        /// Workflow ID (UUID)
        workflow_id: String,

        #[arg(value_enum)]
        step: StepArg,

        #[arg(value_enum)]
        decision: DecisionArg,

        #[arg(long)]
        comment: Option<String>,

        #[arg(long)]
        suggestion: Option<String>,

        /// Rating from 1 to 5
        #[arg(long)]
        rating: Option<u8>,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Variation strategy for CLI (maps to VariationStrategy)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    Tone,
    Length,
    Structure,
    Audience,
}

impl From<StrategyArg> for VariationStrategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Tone => VariationStrategy::Tone,
            StrategyArg::Length => VariationStrategy::Length,
            StrategyArg::Structure => VariationStrategy::Structure,
            StrategyArg::Audience => VariationStrategy::Audience,
        }
    }
}

/// Review step for CLI (maps to StepType)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StepArg {
    Outline,
    Content,
    Image,
    Social,
    Final,
}

impl From<StepArg> for StepType {
    fn from(s: StepArg) -> Self {
        match s {
            StepArg::Outline => StepType::Outline,
            StepArg::Content => StepType::Content,
            StepArg::Image => StepType::Image,
            StepArg::Social => StepType::Social,
            StepArg::Final => StepType::Final,
        }
    }
}

/// Reviewer decision for CLI (maps to Decision)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DecisionArg {
    Approve,
    Modify,
    Reject,
    Skip,
}

impl From<DecisionArg> for Decision {
    fn from(d: DecisionArg) -> Self {
        match d {
            DecisionArg::Approve => Decision::Approved,
            DecisionArg::Modify => Decision::Modified,
            DecisionArg::Reject => Decision::Rejected,
            DecisionArg::Skip => Decision::Skipped,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                request,
                offline,
                review,
            } => run_pipeline(&request, offline, review).await,
            Commands::Variants {
                request,
                count,
                strategy,
                offline,
            } => {
                let strategies: Vec<VariationStrategy> =
                    strategy.into_iter().map(Into::into).collect();
                run_variants(&request, count, &strategies, offline).await
            }
            Commands::Compare {
                set_id,
                a,
                b,
                weighted,
            } => compare_variants(&set_id, &a, &b, weighted).await,
            Commands::History { limit } => show_history(limit).await,
            Commands::Workflow { workflow_id } => show_workflow(&workflow_id).await,
            Commands::Resolve {
                workflow_id,
                step,
                decision,
                comment,
                suggestion,
                rating,
            } => {
                let feedback = Feedback {
                    decision: decision.into(),
                    comment,
                    suggestion,
                    rating,
                };
                resolve_step(&workflow_id, step.into(), feedback).await
            }
            Commands::Config => show_config(),
        }
    }
}

fn load_request(path: &Path) -> Result<PipelineRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file: {}", path.display()))?;
    PipelineRequest::from_yaml(&content)
}

fn parse_id(kind: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).with_context(|| format!("Invalid {} ID: {}", kind, value))
}

async fn open_store() -> Result<Arc<dyn Store>> {
    Ok(Arc::new(FileStore::open_default().await?))
}

/// Offline template provider, or Fabric after a health check
async fn build_provider(
    cfg: &ResolvedConfig,
    offline: bool,
) -> Result<Arc<dyn GenerationProvider>> {
    if offline {
        return Ok(Arc::new(TemplateProvider::new()));
    }

    let patterns = cfg.fabric.patterns.clone();
    let call_timeout = cfg.limits.stage_timeout();
    let provider = match &cfg.fabric.binary {
        Some(binary) => FabricProvider::with_binary_path(binary, patterns, call_timeout),
        None => FabricProvider::new(patterns, call_timeout),
    };

    provider
        .health_check()
        .await
        .context("Fabric is not available (use --offline for template output)")?;
    Ok(Arc::new(provider))
}

async fn build_orchestrator(
    cfg: &ResolvedConfig,
    offline: bool,
    store: Arc<dyn Store>,
) -> Result<PipelineOrchestrator> {
    let provider = build_provider(cfg, offline).await?;
    Ok(PipelineOrchestrator::new(provider)
        .with_limits(cfg.limits.clone())
        .with_store(store))
}

/// Cancel the token on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n[Interrupted, cancelling]");
            child.cancel();
        }
    });
    token
}

/// Run the pipeline for a request file
async fn run_pipeline(request_path: &Path, offline: bool, review: bool) -> Result<()> {
    let cfg = config::config()?;
    let request = load_request(request_path)?;
    let store = open_store().await?;
    let orchestrator = build_orchestrator(cfg, offline, store.clone()).await?;
    let cancel = cancel_on_ctrl_c();

    if review {
        let engine = ApprovalWorkflowEngine::new().with_store(store);
        let run = run_under_review(&orchestrator, &engine, &request, &cfg.review, &cancel).await?;

        print_artifact(&run.artifact);
        let workflow = engine.get_workflow(run.workflow_id).await?;
        eprintln!();
        print_workflow(&workflow);
        eprintln!(
            "\n[Resolve steps with: copyforge resolve {} <step> <decision>]",
            run.workflow_id
        );
        return Ok(());
    }

    let artifact = orchestrator.run_with(&request, &cancel, None).await?;
    print_artifact(&artifact);
    eprintln!(
        "\n[Run for request {} completed in {}ms]",
        artifact.request_id, artifact.total_duration_ms
    );
    Ok(())
}

fn print_artifact(artifact: &PipelineArtifact) {
    println!("{}", artifact.content);
    println!();
    println!("Image: {}", artifact.image.location);
    for post in &artifact.social_posts.posts {
        println!();
        println!("[{}]", post.platform);
        println!("{}", post.text);
    }

    eprintln!();
    eprintln!("Stage timings:");
    for timing in &artifact.timings {
        eprintln!("  {:<14} {:>8}ms", timing.stage.to_string(), timing.duration_ms);
    }
    eprintln!(
        "Fact check: {} supported, {} disputed of {} claims",
        artifact.fact_check.supported(),
        artifact.fact_check.disputed(),
        artifact.fact_check.claims.len()
    );
}

/// Generate a variant set and print the summary
async fn run_variants(
    request_path: &Path,
    count: usize,
    strategies: &[VariationStrategy],
    offline: bool,
) -> Result<()> {
    let cfg = config::config()?;
    let request = load_request(request_path)?;
    let store = open_store().await?;
    let orchestrator = build_orchestrator(cfg, offline, store.clone()).await?;
    let coordinator = VariantGenerationCoordinator::new(Arc::new(orchestrator)).with_store(store);
    let cancel = cancel_on_ctrl_c();

    let set = coordinator
        .run_variant_set_with(&request, count, strategies, &cancel)
        .await;

    println!("Variant set: {}", set.id);
    println!();
    println!(
        "{:<6} {:<30} {:<12} {:>8} {:>10}",
        "NAME", "DESCRIPTION", "STATUS", "LENGTH", "SECONDS"
    );
    println!("{}", "-".repeat(70));
    for variant in &set.variants {
        let status = match variant.status {
            VariantStatus::Pending => "pending",
            VariantStatus::Generating => "generating",
            VariantStatus::Completed => "completed",
            VariantStatus::Failed => "failed",
        };
        println!(
            "{:<6} {:<30} {:<12} {:>8} {:>10.1}",
            variant.name,
            variant.description,
            status,
            variant.content_length(),
            variant.generation_time_seconds.unwrap_or(0.0)
        );
        if let Some(error) = &variant.error {
            println!("       error: {}", error);
        }
    }

    println!();
    match set.recommended() {
        Some(variant) => println!("Recommended: {} ({})", variant.name, variant.description),
        None => println!("Recommended: none (no variant completed)"),
    }
    if let Some(seconds) = set.total_generation_time_seconds {
        println!("Total time: {:.1}s", seconds);
    }

    Ok(())
}

/// Compare two variants of a stored set
async fn compare_variants(set_id: &str, a: &str, b: &str, weighted: bool) -> Result<()> {
    let set_id = parse_id("variant set", set_id)?;
    let store = open_store().await?;
    let set: VariantSet = get_record(store.as_ref(), RecordKind::VariantSet, set_id)
        .await?
        .with_context(|| format!("Variant set {} not found", set_id))?;

    let variant_a = set
        .variant_by_name(a)
        .with_context(|| format!("Variant '{}' not found in set {}", a, set_id))?;
    let variant_b = set
        .variant_by_name(b)
        .with_context(|| format!("Variant '{}' not found in set {}", b, set_id))?;

    let rule = if weighted {
        RecommendationRule::Weighted(MetricWeights::default())
    } else {
        RecommendationRule::Readability
    };
    let comparison = ComparisonAnalyzer::new(rule).compare(variant_a, variant_b)?;

    println!(
        "{:<14} {:>10} {:>10}",
        "METRIC", variant_a.name, variant_b.name
    );
    println!("{}", "-".repeat(36));
    let (ma, mb) = (&comparison.metrics_a, &comparison.metrics_b);
    println!("{:<14} {:>10.1} {:>10.1}", "readability", ma.readability, mb.readability);
    println!("{:<14} {:>10.1} {:>10.1}", "seo", ma.seo, mb.seo);
    println!("{:<14} {:>10.1} {:>10.1}", "engagement", ma.engagement, mb.engagement);
    println!("{:<14} {:>10} {:>10}", "length", ma.length, mb.length);
    println!();
    println!("{}", comparison.recommendation);

    Ok(())
}

/// List recent articles
async fn show_history(limit: usize) -> Result<()> {
    let store = open_store().await?;
    let articles = article_history(store.as_ref(), limit).await?;

    if articles.is_empty() {
        println!("No articles found");
        return Ok(());
    }

    println!(
        "{:<20} {:<18} {:>8} {:<40}",
        "CREATED", "FINGERPRINT", "LENGTH", "TITLE"
    );
    println!("{}", "-".repeat(90));

    for article in articles {
        println!(
            "{:<20} {:<18} {:>8} {:<40}",
            article.created_at.format("%Y-%m-%d %H:%M"),
            article.fingerprint,
            article.content_length,
            article.title
        );
    }

    Ok(())
}

async fn restored_engine() -> Result<ApprovalWorkflowEngine> {
    let engine = ApprovalWorkflowEngine::new().with_store(open_store().await?);
    engine.restore().await?;
    Ok(engine)
}

fn print_workflow(workflow: &Workflow) {
    println!("Workflow: {}", workflow.id);
    println!("Topic: {}", workflow.request.topic);
    println!("Status: {:?}", workflow.status);
    println!();
    let current = workflow.current_step().map(|s| s.id);
    for step in &workflow.steps {
        let marker = if Some(step.id) == current { ">" } else { " " };
        let content = if step.content.is_some() { "ready" } else { "waiting" };
        println!(
            "{} {:<10} {:<10} {:<8}",
            marker,
            step.step_type.to_string(),
            format!("{:?}", step.status),
            content
        );
    }
}

async fn show_workflow(workflow_id: &str) -> Result<()> {
    let workflow_id = parse_id("workflow", workflow_id)?;
    let engine = restored_engine().await?;
    print_workflow(&engine.get_workflow(workflow_id).await?);
    Ok(())
}

async fn resolve_step(workflow_id: &str, step_type: StepType, feedback: Feedback) -> Result<()> {
    let workflow_id = parse_id("workflow", workflow_id)?;
    let engine = restored_engine().await?;

    let workflow = engine.get_workflow(workflow_id).await?;
    let step_id = workflow
        .step_by_type(step_type)
        .map(|s| s.id)
        .with_context(|| {
            format!("Workflow {} does not review the {} step", workflow_id, step_type)
        })?;

    let workflow = engine.resolve_step(workflow_id, step_id, feedback).await?;
    print_workflow(&workflow);
    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("copyforge configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:    {}", cfg.home.display());
    println!("  Records: {}", cfg.records_dir().display());
    println!();
    println!("Limits:");
    println!("  Stage timeout:   {}s", cfg.limits.stage_timeout_seconds);
    println!("  Run timeout:     {}s", cfg.limits.run_timeout_seconds);
    println!("  Variant timeout: {}s", cfg.limits.variant_timeout_seconds);
    println!("  Max concurrent variants: {}", cfg.limits.concurrency());
    println!();
    println!("Review steps:");
    for step_type in cfg.review.step_types() {
        println!("  {}", step_type);
    }
    println!();
    println!("Fabric:");
    println!(
        "  Binary: {}",
        cfg.fabric.binary.as_deref().unwrap_or("(auto-detect)")
    );
    let patterns = &cfg.fabric.patterns;
    println!("  Patterns:");
    println!("    analyze:        {}", patterns.analyze);
    println!("    outline:        {}", patterns.outline);
    println!("    write:          {}", patterns.write);
    println!("    extract_claims: {}", patterns.extract_claims);
    println!("    verify_claims:  {}", patterns.verify_claims);
    println!("    image:          {}", patterns.image);
    println!("    social_posts:   {}", patterns.social_posts);

    Ok(())
}
