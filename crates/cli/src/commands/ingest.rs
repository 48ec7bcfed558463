//! Ingest command handler.
//!
//! Loads thread exports and markdown pages into the corpus store. A table
//! that already holds rows is left untouched.

use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::{ingest_documents, ingest_threads, CorpusStore, IngestStats, UrlResolver};
use std::path::PathBuf;

/// Load thread exports and documentation pages into the store
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Directory of topic export JSON files (default: from config)
    #[arg(long)]
    pub threads: Option<PathBuf>,

    /// Directory of front-matter markdown pages (default: from config)
    #[arg(long)]
    pub documents: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command");

        let threads_dir = self.threads.clone().unwrap_or_else(|| config.threads_dir());
        let documents_dir = self
            .documents
            .clone()
            .unwrap_or_else(|| config.documents_dir());
        let resolver = UrlResolver::new(&config.forum_base_url, &config.docs_base_url);

        let mut store = CorpusStore::open(&config.database_path())?;
        let threads = ingest_threads(&mut store, &threads_dir, &config.chunking, &resolver)?;
        let documents = ingest_documents(&mut store, &documents_dir, &config.chunking)?;

        if self.json {
            let output = serde_json::json!({
                "threads": threads,
                "documents": documents,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_summary(&threads);
            print_summary(&documents);
        }

        Ok(())
    }
}

fn print_summary(stats: &IngestStats) {
    if stats.already_populated {
        println!("{}: already populated, skipped", stats.kind);
    } else {
        println!(
            "{}: {} chunks from {} files ({} skipped)",
            stats.kind, stats.chunks, stats.files, stats.skipped
        );
    }
}
