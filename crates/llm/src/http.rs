//! Mapping of HTTP outcomes onto the provider error taxonomy.
//!
//! Shared by the chat client here and the embedding client in the knowledge
//! crate, so both surface the same `RateLimited` / `ProviderTransient` /
//! `Unauthorized` split.

use grounded_core::AppError;
use reqwest::StatusCode;

/// Classify a non-success HTTP status.
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> AppError {
    let detail = format!("{} API error ({}): {}", provider, status, truncate(body, 300));

    match status {
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(detail),
        _ => AppError::ProviderTransient(detail),
    }
}

/// Classify a transport-level failure (connect, timeout, body decode).
pub fn classify_transport(provider: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::ProviderTransient(format!("{} request timed out: {}", provider, err))
    } else {
        AppError::ProviderTransient(format!("{} request failed: {}", provider, err))
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
