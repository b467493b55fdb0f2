//! # text2vector CLI (`t2v`)
//!
//! Turns PDF, DOCX and TXT files (or raw strings) into embedding vectors,
//! optionally persisting them in a SQLite vector store for similarity
//! search. Results are printed to stdout as pretty JSON; logs go to stderr.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `t2v init` | Create the SQLite database and run schema migrations |
//! | `t2v detect <files>` | Print the detected format of each file |
//! | `t2v embed-text <texts>` | Embed raw strings into one aggregate vector |
//! | `t2v embed <files>` | Extract, batch and embed files; print per-file vectors |
//! | `t2v store <files>` | Embed files and persist their segments |
//! | `t2v search "<query>"` | Rank stored segments by similarity |
//!
//! ## Examples
//!
//! ```bash
//! t2v init --config ./config/t2v.toml
//! t2v embed report.pdf notes.txt --config ./config/t2v.toml
//! t2v search "quarterly revenue" --top-k 5 --config ./config/t2v.toml
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use text2vector::config::{self, Config};
use text2vector::detect::detect;
use text2vector::ingest::Ingestor;
use text2vector::logging::init_logging;
use text2vector::migrate;
use text2vector::sqlite_store::SqliteVectorStore;
use text2vector_core::models::{IngestionResult, Resource};

/// text2vector CLI: a document-to-vector ingestion gateway.
///
/// All commands except `detect` read a TOML configuration file given by
/// `--config`. See `config/t2v.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "t2v",
    about = "text2vector: turn PDF, DOCX and TXT files into embedding vectors",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/t2v.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the `segments` and
    /// `segment_vectors` tables. Idempotent.
    Init,

    /// Print the detected format of each file.
    Detect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Embed raw strings as one batch and print their mean vector.
    EmbedText {
        #[arg(required = true)]
        texts: Vec<String>,
    },

    /// Extract, batch and embed files; print per-file vectors.
    ///
    /// A failing file is reported with its error and does not stop the others.
    Embed {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Embed files and store their segments in the database.
    Store {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Search stored segments by similarity to a query.
    Search {
        query: String,

        /// Number of results to return.
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Detection needs no configuration.
    if let Commands::Detect { files } = &cli.command {
        init_logging("info");
        return run_detect(files);
    }

    let cfg = config::load_config(&cli.config)?;
    init_logging(&cfg.logging.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Detect { .. } => {}
        Commands::EmbedText { texts } => {
            let ingestor = Ingestor::from_config(&cfg)?;
            let embedding = ingestor.embed_texts(&texts).await?;
            print_json(&embedding)?;
        }
        Commands::Embed { files } => {
            let resources = read_resources(&files)?;
            let ingestor = Ingestor::from_config(&cfg)?;
            let results = ingestor.ingest(resources).await;
            print_json(&results)?;
        }
        Commands::Store { files } => {
            run_store(&cfg, &files).await?;
        }
        Commands::Search { query, top_k } => {
            let ingestor = Ingestor::from_config(&cfg)?;
            let store = SqliteVectorStore::open(&cfg).await?;
            let hits = ingestor.search(&query, top_k, &store).await?;
            print_json(&json!({
                "query": query,
                "topK": top_k,
                "results": hits,
            }))?;
        }
    }

    Ok(())
}

fn run_detect(files: &[PathBuf]) -> Result<()> {
    let mut out = Vec::with_capacity(files.len());
    for path in files {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = file_name(path);
        let entry = match detect(&bytes, Some(&filename)) {
            Ok(file_type) => json!({
                "filename": filename,
                "fileType": file_type,
                "mime": file_type.mime(),
            }),
            Err(e) => json!({
                "filename": filename,
                "error": { "kind": e.kind(), "reason": e.to_string() },
            }),
        };
        out.push(entry);
    }
    print_json(&out)
}

async fn run_store(cfg: &Config, files: &[PathBuf]) -> Result<()> {
    let resources = read_resources(files)?;
    let ingestor = Ingestor::from_config(cfg)?;
    let store = SqliteVectorStore::open(cfg).await?;
    let results = ingestor.store(resources, &store).await;

    let total_chunks: usize = results
        .iter()
        .filter(|r| r.is_ok())
        .map(|r| r.chunk_count)
        .sum();
    let stored = results.iter().filter(|r| r.is_ok()).count();
    let files = results
        .iter()
        .map(store_entry)
        .collect::<Result<Vec<serde_json::Value>>>()?;

    print_json(&json!({
        "message": format!("Stored {} chunk(s) from {} of {} file(s)", total_chunks, stored, results.len()),
        "totalChunks": total_chunks,
        "files": files,
    }))
}

fn store_entry(result: &IngestionResult) -> Result<serde_json::Value> {
    let mut entry = serde_json::to_value(result)?;
    if result.is_ok() {
        entry["status"] = json!({ "state": "stored" });
    }
    Ok(entry)
}

/// Read each file fully. Empty files are rejected here, before ingestion.
fn read_resources(paths: &[PathBuf]) -> Result<Vec<Resource>> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if bytes.is_empty() {
                bail!("File is empty: {}", path.display());
            }
            Ok(Resource::named(bytes, file_name(path)))
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
