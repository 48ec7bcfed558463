//! Corpus and retrieval for grounded answering.
//!
//! Forum threads and documentation pages are chunked into a local SQLite
//! store, embedded in batches, and searched by cosine similarity. The
//! [`rag`] module turns ranked chunks into a cited answer.

pub mod backfill;
pub mod chunker;
pub mod embeddings;
pub mod enrich;
pub mod ingest;
pub mod rag;
pub mod search;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use backfill::backfill;
pub use embeddings::{create_provider, EmbeddingProvider, MockProvider, OpenAiEmbeddingProvider};
pub use ingest::{ingest_documents, ingest_threads};
pub use rag::{answer_question, Answer, Citation, QueryContext, QueryRequest};
pub use search::{cosine_similarity, search, SearchParams, UrlResolver};
pub use store::CorpusStore;
pub use types::{
    BackfillStats, Chunk, ChunkIndex, ChunkSource, CorpusStats, DocumentKey, DocumentMeta,
    IngestStats, QueryResult, SourceKind, ThreadMeta,
};

use grounded_core::{AppError, AppResult};
use std::path::Path;

/// Row and embedding counts of an existing store.
pub async fn corpus_stats(store_path: &Path) -> AppResult<CorpusStats> {
    let path = store_path.to_path_buf();
    blocking(move || CorpusStore::open_read_only(&path)?.stats()).await
}

/// Run blocking store work off the async runtime.
pub(crate) async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Other(format!("Store task failed: {}", e)))?
}
