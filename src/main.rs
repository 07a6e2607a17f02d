//! ingestcore CLI
//!
//! A Document Manager and Video Pipeline for a retrieval-augmented knowledge
//! base, fronted by a small command surface for local operation and testing.
//!
//! Commands:
//!   ingest-file  - Ingest a local file (PDF, Word, Excel, PPT, Markdown,
//!                  HTML, or video)
//!   ingest-url   - Fetch and ingest a web page
//!   list         - List ingested documents, optionally filtered by product
//!   delete       - Delete a document and its chunks

mod commands;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ingestcore::Config;
use utils::expand_path;

#[derive(Parser)]
#[command(name = "ingestcore")]
#[command(about = "Document Manager and Video Pipeline for a knowledge base")]
#[command(version)]
struct Cli {
    /// Data directory for storing uploads, vectors, and metadata.
    #[arg(short, long)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a local file
    IngestFile {
        /// Path to the file to ingest
        path: PathBuf,

        /// Tenant/product this document belongs to
        #[arg(long, default_value = "")]
        product_id: String,
    },

    /// Fetch and ingest a web page
    IngestUrl {
        /// URL to fetch
        url: String,

        /// Tenant/product this document belongs to
        #[arg(long, default_value = "")]
        product_id: String,
    },

    /// List ingested documents
    List {
        /// Filter by product id
        #[arg(long, default_value = "")]
        product_id: String,
    },

    /// Delete a document and its chunks
    Delete {
        /// Document id to delete
        doc_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = expand_path(&data_dir);
    }
    std::fs::create_dir_all(&config.data_dir)?;

    match cli.command {
        Commands::IngestFile { path, product_id } => {
            commands::run_ingest_file(&config, &path, &product_id).await?;
        }
        Commands::IngestUrl { url, product_id } => {
            commands::run_ingest_url(&config, &url, &product_id).await?;
        }
        Commands::List { product_id } => {
            commands::run_list(&config, &product_id).await?;
        }
        Commands::Delete { doc_id } => {
            commands::run_delete(&config, &doc_id).await?;
        }
    }

    Ok(())
}
