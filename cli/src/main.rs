//! `factgraph` command line: builds cascade and interaction graph artifacts
//! from a JSONL post corpus.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use factgraph_core::config::{AppConfig, ArtifactFormat, SimilarityMode};
use ingestion::cascade::CascadeGraphBuilder;
use ingestion::embedding::{DeterministicEmbeddingService, EmbeddingService};
use ingestion::interaction::InteractionGraphBuilder;
use ingestion::reader::read_posts;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use storage::artifact::ArtifactStore;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "factgraph")]
#[command(about = "Build graph artifacts for fake-news detection")]
#[command(version)]
struct Cli {
    /// Directory holding default.toml and the RUN_MODE override
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,

    /// Output directory (overrides paths.output_dir)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Artifact encoding (overrides artifact.format)
    #[arg(long, global = true, value_enum)]
    format: Option<FormatArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// One reply-tree graph per post
    Cascade {
        /// JSONL corpus with a `cascade` list on each post
        input: PathBuf,
    },

    /// One corpus-wide similarity graph
    Interaction {
        /// Merged JSONL corpus with labels and splits
        input: PathBuf,

        /// Artifact name inside the output directory
        #[arg(long, default_value = "interaction_graph")]
        name: String,

        /// Project root for relative image paths (overrides paths.project_root)
        #[arg(long)]
        project_root: Option<PathBuf>,

        /// Neighbor search strategy (overrides similarity.mode)
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Json,
    Rkyv,
}

impl From<FormatArg> for ArtifactFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => ArtifactFormat::Json,
            FormatArg::Rkyv => ArtifactFormat::Rkyv,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Auto,
    Exact,
    Approximate,
}

impl From<ModeArg> for SimilarityMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Auto => SimilarityMode::Auto,
            ModeArg::Exact => SimilarityMode::Exact,
            ModeArg::Approximate => SimilarityMode::Approximate,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    factgraph_core::init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_from(&cli.config_dir)
        .with_context(|| format!("loading configuration from {}", cli.config_dir.display()))?;
    if let Some(output) = cli.output {
        config.paths.output_dir = output;
    }
    if let Some(format) = cli.format {
        config.artifact.format = format.into();
    }

    let embedder: Arc<dyn EmbeddingService> =
        Arc::new(DeterministicEmbeddingService::new(&config.embedding));
    let store = ArtifactStore::new(&config.paths.output_dir);

    match cli.command {
        Commands::Cascade { input } => run_cascade(&config, embedder, &store, input).await,
        Commands::Interaction {
            input,
            name,
            project_root,
            mode,
        } => {
            if let Some(root) = project_root {
                config.paths.project_root = root;
            }
            if let Some(mode) = mode {
                config.similarity.mode = mode.into();
            }
            run_interaction(&config, embedder, &store, input, &name).await
        }
    }
}

async fn run_cascade(
    config: &AppConfig,
    embedder: Arc<dyn EmbeddingService>,
    store: &ArtifactStore,
    input: PathBuf,
) -> Result<()> {
    let (posts, read_report) = read_posts(&input).await?;
    let builder = CascadeGraphBuilder::new(embedder);
    let (graphs, report) = builder
        .build_batch(&posts)
        .await
        .context("cascade batch aborted")?;

    let mut written = 0usize;
    for graph in &graphs {
        let Some(post_id) = graph.post_id() else {
            continue;
        };
        store
            .write(post_id, graph, config.artifact.format)
            .await
            .with_context(|| format!("writing cascade artifact for {post_id}"))?;
        written += 1;
    }

    info!(
        input = %input.display(),
        output = %store.dir().display(),
        malformed = read_report.malformed.len(),
        succeeded = report.succeeded,
        failed = report.failed,
        skipped = report.skipped,
        written,
        "cascade run finished"
    );
    for failure in &report.failures {
        warn!(post_id = %failure.post_id, code = %failure.code, cause = %failure.cause, "post not built");
    }
    if report.succeeded == 0 && !posts.is_empty() {
        bail!("no cascade graph could be built from {}", input.display());
    }
    Ok(())
}

async fn run_interaction(
    config: &AppConfig,
    embedder: Arc<dyn EmbeddingService>,
    store: &ArtifactStore,
    input: PathBuf,
    name: &str,
) -> Result<()> {
    let builder = InteractionGraphBuilder::new(
        embedder,
        &config.similarity,
        config.paths.project_root.clone(),
    );
    let (graph, read_report) = builder
        .build_from_jsonl(&input)
        .await
        .with_context(|| format!("building interaction graph from {}", input.display()))?;

    let path = store.write(name, &graph, config.artifact.format).await?;
    info!(
        path = %path.display(),
        malformed = read_report.malformed.len(),
        summary = %serde_json::to_string(&graph.summary())?,
        "interaction graph saved"
    );
    Ok(())
}
