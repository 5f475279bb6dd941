use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use docbrief_chunker::{Chunker, ChunkerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use docbrief_vector_store::{
    BackendKind, EmbeddingClient, EmbeddingConfig, SearchHit, SnapshotStatus, StoreState,
    VectorStore,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

mod documents;
mod prompt;

use documents::DocumentKind;

#[derive(Parser)]
#[command(name = "docbrief")]
#[command(about = "Chunk, embed and semantically search business documents", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Directory holding the index and text snapshots
    #[arg(long, global = true, default_value = ".docbrief")]
    store_dir: PathBuf,

    /// Override embedding backend (default: DOCBRIEF_EMBEDDING_BACKEND or hash)
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendFlag>,

    /// Override embedding model id
    #[arg(long, global = true)]
    model: Option<String>,

    /// Texts per embedding request
    #[arg(long, global = true)]
    batch_size: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk text documents and CSV rows into the store
    Ingest(IngestArgs),

    /// Semantic search over ingested chunks
    Query(QueryArgs),

    /// Show store statistics
    Stats(StatsArgs),

    /// Render a question-answering prompt from the best matching chunks
    Prompt(PromptArgs),
}

#[derive(Args)]
struct IngestArgs {
    /// Files or directories (.txt, .md, .csv)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Words per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Words shared by consecutive chunks
    #[arg(long, default_value_t = DEFAULT_OVERLAP)]
    overlap: usize,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct QueryArgs {
    /// Search query
    query: String,

    /// Number of results
    #[arg(short, long, default_value_t = 5)]
    k: usize,

    /// Show squared distances
    #[arg(long)]
    scores: bool,

    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct StatsArgs {
    /// Output JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct PromptArgs {
    /// Question to answer
    question: String,

    /// Number of passages to include
    #[arg(short, long, default_value_t = prompt::DEFAULT_PROMPT_K)]
    k: usize,
}

#[derive(Copy, Clone, ValueEnum)]
enum BackendFlag {
    Hash,
    Huggingface,
    Openai,
    Groq,
    Onnx,
}

impl BackendFlag {
    const fn as_kind(self) -> BackendKind {
        match self {
            BackendFlag::Hash => BackendKind::Hash,
            BackendFlag::Huggingface => BackendKind::HuggingFace,
            BackendFlag::Openai => BackendKind::OpenAi,
            BackendFlag::Groq => BackendKind::Groq,
            BackendFlag::Onnx => BackendKind::Onnx,
        }
    }
}

#[derive(Serialize)]
struct IngestedDocument {
    path: PathBuf,
    chunks: usize,
}

#[derive(Serialize)]
struct IngestOutput {
    documents: Vec<IngestedDocument>,
    added: usize,
    total: usize,
}

#[derive(Serialize)]
struct QueryOutput {
    query: String,
    results: Vec<SearchHit>,
}

#[derive(Serialize)]
struct StatsOutput {
    store_dir: PathBuf,
    backend: String,
    state: StoreState,
    entries: usize,
    dimension: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();

    // Keep stdout clean for JSON parsing
    let json_output = match &cli.command {
        Commands::Ingest(args) => args.json,
        Commands::Query(args) => args.json,
        Commands::Stats(args) => args.json,
        Commands::Prompt(_) => false,
    };
    if json_output {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    if !cli.verbose {
        builder.filter_module("ort", log::LevelFilter::Off);
    }
    builder.target(env_logger::Target::Stderr).init();

    let store = open_store(&cli).await?;

    match cli.command {
        Commands::Ingest(args) => run_ingest(&store, args).await?,
        Commands::Query(args) => run_query(&store, args).await?,
        Commands::Stats(args) => run_stats(&store, &cli.store_dir, args).await?,
        Commands::Prompt(args) => run_prompt(&store, args).await?,
    }

    Ok(())
}

fn embedding_config(cli: &Cli) -> Result<EmbeddingConfig> {
    let mut config = EmbeddingConfig::from_env().context("Invalid embedding environment")?;
    if let Some(backend) = cli.backend {
        config.set_backend(backend.as_kind());
    }
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    Ok(config)
}

async fn open_store(cli: &Cli) -> Result<VectorStore> {
    let config = embedding_config(cli)?;
    let client = EmbeddingClient::from_config(&config)
        .with_context(|| format!("Failed to set up the {} embedding backend", config.backend))?;
    Ok(VectorStore::open(&cli.store_dir, client).await)
}

async fn run_ingest(store: &VectorStore, args: IngestArgs) -> Result<()> {
    let chunker = Chunker::new(ChunkerConfig::new(args.chunk_size, args.overlap))
        .context("Invalid chunking parameters")?;
    let docs = documents::collect(&args.paths)?;

    let mut output = IngestOutput {
        documents: Vec::with_capacity(docs.len()),
        added: 0,
        total: store.len().await,
    };
    for doc in docs {
        let added = match doc.kind {
            DocumentKind::Text => store.add_document(&chunker, &doc.text).await,
            DocumentKind::Csv => store.add_csv(doc.text.as_bytes()).await,
        };
        let outcome = added.with_context(|| format!("Failed to ingest {}", doc.path.display()))?;
        if let SnapshotStatus::Failed(reason) = &outcome.snapshot {
            anyhow::bail!(
                "Ingested {} but the snapshot was not written: {reason}",
                doc.path.display()
            );
        }
        log::debug!("{}: {} chunks", doc.path.display(), outcome.added);
        output.added += outcome.added;
        output.total = outcome.total;
        output.documents.push(IngestedDocument {
            path: doc.path,
            chunks: outcome.added,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        eprintln!(
            "Ingested {} documents, {} chunks (store total: {})",
            output.documents.len(),
            output.added,
            output.total
        );
    }
    Ok(())
}

async fn run_query(store: &VectorStore, args: QueryArgs) -> Result<()> {
    let results = store
        .search_with_scores(&args.query, args.k)
        .await
        .context("Search failed")?;

    if args.json {
        let output = QueryOutput {
            query: args.query,
            results,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if results.is_empty() {
        eprintln!("No results (store is empty or k = 0)");
    }
    for (i, hit) in results.iter().enumerate() {
        if args.scores {
            println!("{}. (distance: {:.4}) {}", i + 1, hit.distance, hit.text);
        } else {
            println!("{}. {}", i + 1, hit.text);
        }
        println!();
    }
    Ok(())
}

async fn run_stats(store: &VectorStore, store_dir: &Path, args: StatsArgs) -> Result<()> {
    let output = StatsOutput {
        store_dir: store_dir.to_path_buf(),
        backend: store.client().backend_name().to_string(),
        state: store.state().await,
        entries: store.len().await,
        dimension: store.dimension().await,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Store:     {}", output.store_dir.display());
        println!("Backend:   {}", output.backend);
        println!("Entries:   {}", output.entries);
        println!(
            "Dimension: {}",
            output
                .dimension
                .map_or_else(|| "n/a".to_string(), |d| d.to_string())
        );
    }
    Ok(())
}

async fn run_prompt(store: &VectorStore, args: PromptArgs) -> Result<()> {
    let passages = store
        .search(&args.question, args.k)
        .await
        .context("Search failed")?;
    println!("{}", prompt::render_qa_prompt(&args.question, &passages));
    Ok(())
}
