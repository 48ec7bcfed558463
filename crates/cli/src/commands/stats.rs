//! Stats command handler.

use clap::Args;
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::corpus_stats;

/// Show corpus statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let stats = corpus_stats(&config.database_path()).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Database: {}", config.database_path().display());
            println!(
                "Threads:   {} chunks, {} embedded, {} pending",
                stats.thread_chunks, stats.thread_embeddings, stats.thread_pending
            );
            println!(
                "Documents: {} chunks, {} embedded, {} pending",
                stats.document_chunks, stats.document_embeddings, stats.document_pending
            );
        }

        Ok(())
    }
}
