//! Ask command handler.
//!
//! Runs the answer pipeline once. The answer goes to stdout, logs to stderr.

use super::query_context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::Args;
use grounded_core::{config::AppConfig, AppError, AppResult};
use grounded_knowledge::{answer_question, QueryRequest};
use std::path::PathBuf;

/// Answer a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Image to attach (sent base64-encoded)
    #[arg(short, long)]
    pub image: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let ctx = query_context(config)?;

        let mut request = QueryRequest::new(self.question.clone());
        if let Some(path) = &self.image {
            let bytes = std::fs::read(path).map_err(|e| {
                AppError::Other(format!("Failed to read image {:?}: {}", path, e))
            })?;
            request = request.with_image(STANDARD.encode(bytes));
        }

        let answer = answer_question(&ctx, &request).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&answer)?);
        } else {
            println!("{}", answer.answer);
            if !answer.links.is_empty() {
                println!("\nSources:");
                for (i, link) in answer.links.iter().enumerate() {
                    println!("{}. {} - {}", i + 1, link.url, link.text);
                }
            }
        }

        Ok(())
    }
}
