//! Serve command handler.

use super::query_context;
use crate::server;
use clap::Args;
use grounded_core::{config::AppConfig, AppResult};

/// Run the HTTP question answering server
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Listen address (default: from config)
    #[arg(short, long)]
    pub bind: Option<String>,
}

impl ServeCommand {
    pub async fn execute(self, mut config: AppConfig) -> AppResult<()> {
        tracing::info!("Executing serve command");

        if let Some(bind) = self.bind {
            config.bind = bind;
        }

        let ctx = query_context(&config)?;
        server::serve(&config, ctx).await
    }
}
