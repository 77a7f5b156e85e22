//! canon-ingest - Run the entity pipeline over a batch of text units.
//!
//! Reads a JSON array of `{"id": ..., "text": ...}` units, extracts and
//! deduplicates entities, and prints the resulting graph delta with run stats
//! as JSON on stdout. Logs go to stderr.
//!
//! # Configuration
//!
//! - `--config canon.toml` (or `.yaml`/`.json`), otherwise defaults
//! - `CANON_*` environment variables override either source
//! - `OPENAI_API_KEY` when the `[llm]` or `[embedder]` section uses OpenAI
//!
//! With `--graph graph.json` the delta is merged into that graph file, which
//! is created when missing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use canon_core::{IngestionGraph, PipelineConfig, TextUnit};
use canon_embeddings::EmbedderFactory;
use canon_entities::EntityPipeline;
use canon_llm::LlmFactory;
use canon_ner::NerServiceClient;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with an array of text units ("-" for stdin)
    input: PathBuf,

    /// Pipeline configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the project id used for entity identifiers
    #[arg(short, long)]
    project: Option<String>,

    /// Graph file to merge the delta into
    #[arg(short, long)]
    graph: Option<PathBuf>,

    /// Skip LLM resolution of ambiguous pairs
    #[arg(long)]
    no_llm: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let args = Args::parse();

    let config = load_config(&args)?;
    let units = read_units(&args.input)?;
    tracing::info!(
        "Loaded {} text units for project '{}'",
        units.len(),
        config.project_id
    );

    let pipeline = build_pipeline(config)?;

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            watcher.cancel();
        }
    });

    let result = pipeline.run_with_cancel(&units, &cancel).await;
    let output = match result {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("Entity pipeline failed [{}]: {}", e.code().as_str(), e);
            pipeline.close();
            return Err(e.into());
        }
    };

    if let Some(ref path) = args.graph {
        let mut graph = read_graph(path)?;
        graph.apply(&output.delta);
        let json = serde_json::to_string_pretty(&graph)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write graph to {}", path.display()))?;
        tracing::info!(
            "Graph {} now holds {} nodes and {} relationships",
            path.display(),
            graph.nodes.len(),
            graph.relationships.len()
        );
    }

    let report = serde_json::json!({
        "delta": output.delta,
        "stats": output.stats,
        "duplicates": output.duplicates,
    });
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", rendered);

    pipeline.close();
    Ok(())
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match args.config {
        Some(ref path) => {
            let mut config = PipelineConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env();
            config
        }
        None => PipelineConfig::from_env(),
    };

    if let Some(ref project) = args.project {
        config.project_id = project.clone();
    }
    if args.no_llm {
        config.dedup.llm_enabled = false;
    }

    config.validate()?;
    Ok(config)
}

fn build_pipeline(config: PipelineConfig) -> Result<EntityPipeline> {
    let ner = Arc::new(NerServiceClient::new(&config.ner)?);
    tracing::info!("Using NER service at {}", ner.base_url());

    let mut builder = EntityPipeline::builder(config.clone())
        .classifier(ner.clone())
        .extractor(ner);

    if let Some(ref embedder) = config.embedder {
        let embedder = EmbedderFactory::from_config(embedder)?;
        tracing::info!("Embedding stage uses {}", embedder.model_name());
        builder = builder.embedder(embedder);
    }

    if config.dedup.llm_enabled {
        if let Some(ref llm) = config.llm {
            let llm = LlmFactory::from_config(llm)?;
            tracing::info!("LLM resolution uses {}", llm.model_name());
            builder = builder.llm(llm);
        }
    }

    Ok(builder.build()?)
}

fn read_units(path: &Path) -> Result<Vec<TextUnit>> {
    let content = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read units from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read units from {}", path.display()))?
    };

    serde_json::from_str(&content).context("Input must be a JSON array of {id, text} objects")
}

fn read_graph(path: &Path) -> Result<IngestionGraph> {
    if !path.exists() {
        return Ok(IngestionGraph::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read graph from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid graph file {}", path.display()))
}
