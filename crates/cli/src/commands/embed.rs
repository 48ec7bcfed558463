//! Embed command handler.
//!
//! Backfills missing embeddings, optionally clearing existing ones first.

use super::embedding_provider;
use clap::{Args, ValueEnum};
use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::{backfill, BackfillStats, SourceKind};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Thread,
    Document,
    All,
}

impl KindArg {
    fn kinds(self) -> Vec<SourceKind> {
        match self {
            KindArg::Thread => vec![SourceKind::Thread],
            KindArg::Document => vec![SourceKind::Document],
            KindArg::All => SourceKind::ALL.to_vec(),
        }
    }
}

/// Compute embeddings for chunks that have none
#[derive(Args, Debug)]
pub struct EmbedCommand {
    /// Which corpus to embed
    #[arg(long, value_enum, default_value = "all")]
    pub kind: KindArg,

    /// Clear existing embeddings and embed everything again
    #[arg(long)]
    pub reembed: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl EmbedCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing embed command");
        config.validate()?;

        let provider = embedding_provider(config)?;
        let store_path = config.database_path();

        let mut total = BackfillStats::default();
        let mut per_kind = Vec::new();
        for kind in self.kind.kinds() {
            let stats = backfill(
                &store_path,
                provider.as_ref(),
                &config.embedding,
                kind,
                self.reembed,
            )
            .await?;
            total.merge(&stats);
            per_kind.push((kind, stats));
        }

        if self.json {
            let by_kind: serde_json::Map<String, serde_json::Value> = per_kind
                .iter()
                .map(|(kind, stats)| Ok((kind.to_string(), serde_json::to_value(stats)?)))
                .collect::<Result<_, serde_json::Error>>()?;
            println!("{}", serde_json::to_string_pretty(&by_kind)?);
        } else {
            for (kind, stats) in &per_kind {
                println!(
                    "{}: {} of {} embedded, {} failed, {} split into {} parts",
                    kind, stats.embedded, stats.pending, stats.failed, stats.split, stats.parts_created
                );
            }
            if total.failed > 0 {
                println!("{} chunks failed and will be retried on the next run", total.failed);
            }
        }

        Ok(())
    }
}
