use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use critic::CritiqueOptions;
use extract::{EntityType, Oracle};
use pipeline::{
    AppConfig, ChunkSelection, OperationMode, OutputSink, Pipeline, PipelineError, PipelineOptions,
    Provider, base_filename, logging, server,
};
use resolve::KnowledgeGraph;

#[derive(Parser)]
#[command(name = "kgraph")]
#[command(
    version,
    about = "Extract, resolve and review knowledge graphs from document chunks",
    long_about = None
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Also append logs to this file
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk a document (or a directory of documents) into a chunk file
    Chunk {
        /// `.txt`/`.md` file or directory
        input: PathBuf,

        #[arg(short, long, default_value = "data/processed")]
        output_dir: PathBuf,
    },

    /// Extract entities and relationships from a chunk file
    Extract {
        /// Chunk file (JSON list, or an object with a "chunks" list)
        chunks_file: PathBuf,

        #[arg(short, long, default_value = "data/processed")]
        output_dir: PathBuf,

        /// Entity types to extract (default: all)
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        entity_types: Vec<EntityType>,

        /// Skip relationship extraction
        #[arg(long)]
        no_relationships: bool,

        /// Skip the critic pass
        #[arg(long)]
        no_critic: bool,

        /// Process at most this many chunks
        #[arg(long)]
        max_chunks: Option<usize>,

        /// Process only the chunk at this index
        #[arg(long)]
        chunk_index: Option<usize>,

        /// Process an inclusive range of chunks, e.g. 0-5
        #[arg(long)]
        chunk_range: Option<String>,

        /// Save resolved entities after every chunk of the entity phase
        #[arg(long)]
        update_after_each: bool,

        #[command(flatten)]
        critic: CriticArgs,

        #[command(flatten)]
        oracle: OracleArgs,
    },

    /// Run the critic over a saved knowledge graph
    Critique {
        /// `<base>_knowledge_graph.json` from an earlier run
        graph: PathBuf,

        /// The chunk file the graph was extracted from
        chunks_file: PathBuf,

        #[arg(short, long, default_value = "data/processed")]
        output_dir: PathBuf,

        #[command(flatten)]
        critic: CriticArgs,

        #[command(flatten)]
        oracle: OracleArgs,
    },

    /// Serve an output directory for review
    Serve {
        #[arg(short, long, default_value = "data/processed")]
        dir: PathBuf,

        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
}

#[derive(Args)]
struct CriticArgs {
    /// Also evaluate entities created from relationships
    #[arg(long)]
    include_auto_created: bool,
}

#[derive(Args)]
struct OracleArgs {
    /// Configuration file (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Preset used when no config file is given
    #[arg(long, value_enum, default_value_t = OperationMode::Balanced)]
    mode: OperationMode,

    #[arg(long, value_enum)]
    provider: Option<Provider>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    base_url: Option<String>,
}

impl OracleArgs {
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::for_mode(self.mode),
        };
        if let Some(provider) = self.provider {
            config.oracle.provider = provider;
        }
        if let Some(model) = &self.model {
            config.oracle.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            config.oracle.base_url = Some(base_url.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.json_logs, cli.log_file.as_deref())?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Chunk { input, output_dir } => {
            let chunks = ingest::load_chunks(&input).await?;
            OutputSink::new(output_dir, base_filename(&input))
                .save_chunks(&chunks)
                .await?;
            Ok(())
        }
        Commands::Extract {
            chunks_file,
            output_dir,
            entity_types,
            no_relationships,
            no_critic,
            max_chunks,
            chunk_index,
            chunk_range,
            update_after_each,
            critic,
            oracle,
        } => {
            let config = oracle.load_config()?;
            let selection =
                ChunkSelection::from_flags(chunk_index, chunk_range.as_deref(), max_chunks)?;
            let entity_types = if entity_types.is_empty() {
                EntityType::ALL.to_vec()
            } else {
                entity_types
            };
            let base = base_filename(&chunks_file);
            let options = PipelineOptions {
                entity_types,
                extract_relationships: !no_relationships,
                update_after_each,
                output_dir: Some(output_dir.clone()),
                base_filename: Some(base.clone()),
                selection,
                critique: (!no_critic).then(|| critique_options(&config, &critic)),
            };
            let sink = OutputSink::new(output_dir, base);
            run_extract(&config, &chunks_file, &options, sink, cancel).await
        }
        Commands::Critique {
            graph,
            chunks_file,
            output_dir,
            critic,
            oracle,
        } => {
            let config = oracle.load_config()?;
            let options = critique_options(&config, &critic);
            let sink = OutputSink::new(output_dir, base_filename(&chunks_file));
            run_critique(&config, &graph, &chunks_file, &options, sink, cancel).await
        }
        Commands::Serve { dir, port } => server::serve(dir, port, cancel).await,
    }
}

fn critique_options(config: &AppConfig, args: &CriticArgs) -> CritiqueOptions {
    CritiqueOptions {
        exclude_auto_created: !args.include_auto_created,
        concurrency: config.concurrency.max_concurrent_critic_calls,
    }
}

fn build_pipeline(config: &AppConfig, cancel: CancellationToken) -> Result<Pipeline> {
    let model = config.language_model()?;
    let oracle: Arc<dyn Oracle> = Arc::new(config.build_oracle(model, cancel.clone()));
    info!(
        provider = ?config.oracle.provider,
        model = %config.oracle.model,
        mode = ?config.mode,
        "Oracle ready"
    );
    Ok(Pipeline::new(oracle, cancel))
}

async fn run_extract(
    config: &AppConfig,
    chunks_file: &Path,
    options: &PipelineOptions,
    sink: OutputSink,
    cancel: CancellationToken,
) -> Result<()> {
    // Configuration problems surface before any chunk is read or any call made.
    options.validate()?;
    let pipeline = build_pipeline(config, cancel)?;

    let chunks = ingest::load_chunks(chunks_file).await?;
    info!(path = %chunks_file.display(), chunks = chunks.len(), "Loaded chunks");

    let outcome = match pipeline.run(&chunks, options).await {
        Ok(outcome) => outcome,
        Err(PipelineError::Cancelled) => {
            warn!("Run cancelled, nothing saved");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    sink.save_graph(&outcome.graph, &options.entity_types, &outcome.stats).await?;
    if let Some(report) = &outcome.critique {
        sink.save_critique(report).await?;
    }

    let metrics = pipeline.metrics();
    info!(
        dir = %sink.dir().display(),
        entities = outcome.graph.entity_count(),
        relationships = outcome.graph.relationships.len(),
        failures = outcome.failures.len(),
        oracle_calls = metrics.oracle.calls,
        cache_hits = metrics.oracle.cache_hits,
        "Extraction complete"
    );
    if let Some(report) = &outcome.critique {
        info!(
            confidence = report.overall_assessment.overall_confidence,
            review_tasks = report.review_tasks.len(),
            "Quality assessment"
        );
        for recommendation in &report.overall_assessment.recommendations {
            info!("Recommendation: {recommendation}");
        }
    }
    Ok(())
}

async fn run_critique(
    config: &AppConfig,
    graph_file: &Path,
    chunks_file: &Path,
    options: &CritiqueOptions,
    sink: OutputSink,
    cancel: CancellationToken,
) -> Result<()> {
    let pipeline = build_pipeline(config, cancel)?;

    let text = tokio::fs::read_to_string(graph_file)
        .await
        .with_context(|| format!("Failed to read {}", graph_file.display()))?;
    let graph: KnowledgeGraph = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse knowledge graph {}", graph_file.display()))?;
    let chunks = ingest::load_chunks(chunks_file).await?;

    let report = match pipeline.critique(&graph, &chunks, options).await {
        Ok(report) => report,
        Err(PipelineError::Cancelled) => {
            warn!("Critique cancelled, nothing saved");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    sink.save_critique(&report).await?;

    info!(
        entities = report.statistics.entities_evaluated,
        relationships = report.statistics.relationships_evaluated,
        review_tasks = report.review_tasks.len(),
        "Critique complete"
    );
    Ok(())
}
