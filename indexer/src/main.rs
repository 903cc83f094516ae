mod loader;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lexrag_core::config::{DEFAULT_OVERLAP, DEFAULT_TOP_K, DEFAULT_WINDOW_SIZE};
use lexrag_core::store::load_metadata;
use lexrag_core::{build_index, save_index, EngineConfig, IndexPaths, QueryHit, RetrievalEngine};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a chunked TF-IDF retrieval index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from one or more corpus directories (full rebuild)
    Build {
        /// Corpus directories; *.md, *.txt and *.jsonl files are read
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<String>,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Tokens per chunk
        #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
        window_size: usize,
        /// Tokens shared by consecutive chunks
        #[arg(long, default_value_t = DEFAULT_OVERLAP)]
        overlap: usize,
    },
    /// Rank indexed chunks against a free-text query
    Query {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Print hits as JSON
        #[arg(long, conflicts_with = "prompt")]
        json: bool,
        /// Print a question/context prompt for a downstream model
        #[arg(long)]
        prompt: bool,
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Show index statistics
    Stats {
        #[arg(long, default_value = "./index")]
        index: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, window_size, overlap } => {
            let config = EngineConfig::new(window_size, overlap, DEFAULT_TOP_K)?;
            build(&input, &output, &config)
        }
        Commands::Query { index, top_k, json, prompt, query } => {
            let config = EngineConfig { top_k, ..EngineConfig::default() };
            config.validate()?;
            let query = query.join(" ");
            let engine = RetrievalEngine::open(&IndexPaths::new(&index), config)
                .with_context(|| format!("opening index {index}; run `indexer build` first"))?;
            let hits = engine.query(&query);
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if prompt {
                println!("{}", render_prompt(&query, &hits));
            } else {
                println!("{}", render_contexts(&hits));
            }
            Ok(())
        }
        Commands::Stats { index } => {
            let paths = IndexPaths::new(&index);
            let engine = RetrievalEngine::open(&paths, EngineConfig::default())?;
            let meta = load_metadata(&paths)?;
            let mut report = serde_json::to_value(engine.summary())?;
            report["built_at"] = serde_json::Value::String(meta.built_at);
            report["chunking"] = serde_json::to_value(meta.chunking)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn build(input: &[String], output: &str, config: &EngineConfig) -> Result<()> {
    let docs = loader::load_documents(input)?;
    let index = build_index(&docs, config)?;
    save_index(&IndexPaths::new(output), &index, &config.chunking)?;
    tracing::info!(output, chunks = index.len(), "index build complete");
    println!("Indexed {} chunks to {}", index.len(), output);
    Ok(())
}

fn render_contexts(hits: &[QueryHit]) -> String {
    if hits.is_empty() {
        return "No relevant context found.".to_string();
    }
    let lines: Vec<String> = hits
        .iter()
        .map(|h| format!("[{:.4}] {}#{} {}", h.score, h.document_id, h.ordinal, h.text))
        .collect();
    format!("Top contexts:\n{}", lines.join("\n"))
}

fn render_prompt(query: &str, hits: &[QueryHit]) -> String {
    if hits.is_empty() {
        return "No relevant context found.".to_string();
    }
    let context: Vec<String> = hits.iter().map(|h| format!("[{}] {}", h.document_id, h.text.trim())).collect();
    format!(
        "Question: {query}\n\nContext:\n{}\n\nAnswer (template): Use the context above to answer concisely.",
        context.join("\n")
    )
}
