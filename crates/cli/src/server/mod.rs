//! HTTP surface for question answering.

mod error;
mod handlers;
mod router;

use grounded_core::{config::AppConfig, AppResult};
use grounded_knowledge::QueryContext;
use std::sync::Arc;

pub use router::router;

/// Shared state for every request.
pub struct AppState {
    pub ctx: QueryContext,
    pub api_key_set: bool,
}

/// Bind `config.bind` and serve until the process is stopped.
pub async fn serve(config: &AppConfig, ctx: QueryContext) -> AppResult<()> {
    let state = Arc::new(AppState {
        ctx,
        api_key_set: config.api_key.is_some(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    tracing::info!("Listening on http://{}", config.bind);

    axum::serve(listener, router(state)).await?;
    Ok(())
}
