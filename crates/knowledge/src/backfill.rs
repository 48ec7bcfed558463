//! Embedding backfill.
//!
//! Finds rows without an embedding and fills them in batches. Texts longer
//! than the provider's input limit are split into parts, and each part is
//! stored and embedded as its own row.

use crate::blocking;
use crate::chunker;
use crate::embeddings::EmbeddingProvider;
use crate::store::CorpusStore;
use crate::types::{BackfillStats, PendingEmbedding, SourceKind};
use futures::future::join_all;
use grounded_core::{AppResult, EmbeddingSettings};
use std::path::Path;
use tracing::{debug, info, warn};

/// Result of embedding one pending row, before it is written.
#[derive(Debug)]
enum Outcome {
    Whole {
        id: i64,
        embedding: Vec<f32>,
    },
    Split {
        parent_id: i64,
        parts: Vec<(String, Option<Vec<f32>>)>,
    },
    Failed {
        id: i64,
    },
}

/// Embed every pending row of `kind`.
///
/// With `reembed`, existing embeddings are cleared first. Failed rows are
/// logged and left pending for the next run.
pub async fn backfill(
    store_path: &Path,
    provider: &dyn EmbeddingProvider,
    settings: &EmbeddingSettings,
    kind: SourceKind,
    reembed: bool,
) -> AppResult<BackfillStats> {
    let path = store_path.to_path_buf();
    let pending = blocking(move || {
        let store = CorpusStore::open(&path)?;
        if reembed {
            store.clear_embeddings(kind)?;
        }
        store.embeddings_pending(kind)
    })
    .await?;

    let mut stats = BackfillStats {
        pending: pending.len() as u32,
        ..BackfillStats::default()
    };

    if pending.is_empty() {
        info!("No pending {} embeddings", kind);
        return Ok(stats);
    }

    info!(
        "Embedding {} pending {} chunks with {} ({})",
        pending.len(),
        kind,
        provider.provider_name(),
        provider.model_name()
    );

    let batch_size = settings.batch_size.max(1);
    let batch_count = pending.len().div_ceil(batch_size);

    for (batch_no, batch) in pending.chunks(batch_size).enumerate() {
        debug!("Batch {}/{} ({} items)", batch_no + 1, batch_count, batch.len());

        let outcomes = join_all(batch.iter().map(|item| embed_item(provider, settings, kind, item))).await;

        let path = store_path.to_path_buf();
        let batch_stats = blocking(move || write_outcomes(&path, kind, outcomes)).await?;
        stats.merge(&batch_stats);

        if batch_no + 1 < batch_count && !settings.batch_delay().is_zero() {
            tokio::time::sleep(settings.batch_delay()).await;
        }
    }

    info!(
        "Backfill for {} finished: {} embedded, {} failed, {} split into {} new parts",
        kind, stats.embedded, stats.failed, stats.split, stats.parts_created
    );

    Ok(stats)
}

async fn embed_item(
    provider: &dyn EmbeddingProvider,
    settings: &EmbeddingSettings,
    kind: SourceKind,
    item: &PendingEmbedding,
) -> Outcome {
    if item.content.chars().count() <= settings.max_input_chars {
        return match provider.embed(&item.content).await {
            Ok(embedding) => Outcome::Whole {
                id: item.id,
                embedding,
            },
            Err(e) => {
                warn!("Skipping {} chunk {}: {}", kind, item.id, e);
                Outcome::Failed { id: item.id }
            }
        };
    }

    let texts = chunker::split_to_limit(&item.content, settings.max_input_chars, settings.part_overlap);
    debug!(
        "{} chunk {} exceeds {} chars, splitting into {} parts",
        kind,
        item.id,
        settings.max_input_chars,
        texts.len()
    );

    let mut parts = Vec::with_capacity(texts.len());
    for (i, text) in texts.into_iter().enumerate() {
        let embedding = match provider.embed(&text).await {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(
                    "Skipping part {} of {} chunk {}: {}",
                    i + 1,
                    kind,
                    item.id,
                    e
                );
                None
            }
        };
        parts.push((text, embedding));
    }

    Outcome::Split {
        parent_id: item.id,
        parts,
    }
}

fn write_outcomes(path: &Path, kind: SourceKind, outcomes: Vec<Outcome>) -> AppResult<BackfillStats> {
    let store = CorpusStore::open(path)?;
    let mut stats = BackfillStats::default();

    for outcome in outcomes {
        match outcome {
            Outcome::Whole { id, embedding } => {
                if store.set_embedding(kind, id, &embedding)? {
                    stats.embedded += 1;
                }
            }
            Outcome::Failed { id } => {
                debug!("{} chunk {} left pending", kind, id);
                stats.failed += 1;
            }
            Outcome::Split { parent_id, parts } => {
                let total = parts.len() as u32;
                for (i, (text, embedding)) in parts.into_iter().enumerate() {
                    let inserted = store.insert_part(kind, parent_id, i as u32 + 1, total, &text)?;
                    if inserted.created {
                        stats.parts_created += 1;
                    }
                    match embedding {
                        Some(embedding) => {
                            if store.set_embedding(kind, inserted.id, &embedding)? {
                                stats.embedded += 1;
                            }
                        }
                        None => stats.failed += 1,
                    }
                }
                store.mark_split(kind, parent_id, total)?;
                stats.split += 1;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockProvider;
    use crate::types::{Chunk, ChunkIndex, ChunkSource, DocumentMeta};
    use async_trait::async_trait;
    use grounded_core::AppError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn settings() -> EmbeddingSettings {
        EmbeddingSettings {
            provider: "mock".into(),
            dimensions: 16,
            max_input_chars: 50,
            part_overlap: 10,
            batch_size: 2,
            batch_delay_ms: 0,
            ..EmbeddingSettings::default()
        }
    }

    fn doc(index: u32, content: &str) -> Chunk {
        Chunk::new(
            ChunkSource::Document(DocumentMeta {
                doc_title: "Guide".into(),
                original_url: String::new(),
                downloaded_at: String::new(),
            }),
            ChunkIndex::Whole(index),
            content,
        )
    }

    /// Fails on any text containing "poison".
    #[derive(Debug, Default)]
    struct FlakyProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        fn provider_name(&self) -> &str {
            "flaky"
        }

        fn model_name(&self) -> &str {
            "flaky"
        }

        fn dimensions(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if texts.iter().any(|t| t.contains("poison")) {
                return Err(AppError::ProviderTransient("boom".into()));
            }
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_backfill_fills_pending_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kb.db");
        let mut store = CorpusStore::open(&path).unwrap();
        store
            .insert_chunks(&[doc(0, "alpha"), doc(1, "beta"), doc(2, "gamma")])
            .unwrap();

        let provider = MockProvider::new(16);
        let stats = backfill(&path, &provider, &settings(), SourceKind::Document, false)
            .await
            .unwrap();

        assert_eq!(stats.pending, 3);
        assert_eq!(stats.embedded, 3);
        assert_eq!(stats.failed, 0);
        assert!(store
            .embeddings_pending(SourceKind::Document)
            .unwrap()
            .is_empty());

        // second run has nothing to do
        let again = backfill(&path, &provider, &settings(), SourceKind::Document, false)
            .await
            .unwrap();
        assert_eq!(again.pending, 0);
    }

    #[tokio::test]
    async fn test_failures_stay_pending() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kb.db");
        let mut store = CorpusStore::open(&path).unwrap();
        store
            .insert_chunks(&[doc(0, "fine"), doc(1, "poison pill"), doc(2, "also fine")])
            .unwrap();

        let provider = FlakyProvider::default();
        let stats = backfill(&path, &provider, &settings(), SourceKind::Document, false)
            .await
            .unwrap();

        assert_eq!(stats.embedded, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);

        let pending = store.embeddings_pending(SourceKind::Document).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].content, "poison pill");
    }

    #[tokio::test]
    async fn test_oversized_text_is_split_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kb.db");
        let store = CorpusStore::open(&path).unwrap();
        let long = "Sentence number one is here. ".repeat(6);
        let parent = store.insert_chunk(&doc(0, &long)).unwrap();

        let provider = MockProvider::new(16);
        let stats = backfill(&path, &provider, &settings(), SourceKind::Document, false)
            .await
            .unwrap();

        assert_eq!(stats.split, 1);
        assert!(stats.parts_created >= 2);
        assert_eq!(stats.embedded, stats.parts_created);

        let scanned = store.scan_all_with_embedding(SourceKind::Document).unwrap();
        assert_eq!(scanned.len() as u32, stats.parts_created);
        assert!(scanned
            .iter()
            .all(|c| c.content.chars().count() <= settings().max_input_chars));
        assert!(scanned.iter().all(|c| c.index.is_part() && c.index.index() == 0));
        assert!(scanned.iter().all(|c| c.id != Some(parent)));

        let again = backfill(&path, &provider, &settings(), SourceKind::Document, false)
            .await
            .unwrap();
        assert_eq!(again.pending, 0);
        assert_eq!(store.count(SourceKind::Document).unwrap() as u32, 1 + stats.parts_created);
    }

    #[tokio::test]
    async fn test_parts_fit_input_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kb.db");
        let store = CorpusStore::open(&path).unwrap();
        let sentences = (0..40)
            .map(|i| format!("Line {} of the guide.", i))
            .collect::<Vec<_>>()
            .join(" ");
        store.insert_chunk(&doc(0, &sentences)).unwrap();

        let provider = MockProvider::new(16);
        let stats = backfill(&path, &provider, &settings(), SourceKind::Document, false)
            .await
            .unwrap();
        assert_eq!(stats.split, 1);
        assert_eq!(stats.failed, 0);

        let parts = store.scan_all_with_embedding(SourceKind::Document).unwrap();
        assert_eq!(parts.len() as u32, stats.parts_created);
        for part in &parts {
            assert!(part.content.chars().count() <= 50, "part too long: {:?}", part.content);
        }

        // nothing is re-split on the next run
        let again = backfill(&path, &provider, &settings(), SourceKind::Document, false)
            .await
            .unwrap();
        assert_eq!(again.pending, 0);
        assert_eq!(again.split, 0);
    }

    #[tokio::test]
    async fn test_reembed_recomputes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kb.db");
        let store = CorpusStore::open(&path).unwrap();
        let id = store.insert_chunk(&doc(0, "alpha")).unwrap();
        store
            .set_embedding(SourceKind::Document, id, &[0.0, 1.0])
            .unwrap();

        let provider = FlakyProvider::default();
        let stats = backfill(&path, &provider, &settings(), SourceKind::Document, true)
            .await
            .unwrap();
        assert_eq!(stats.embedded, 1);

        let scanned = store.scan_all_with_embedding(SourceKind::Document).unwrap();
        assert_eq!(scanned[0].embedding, Some(vec![1.0, 0.0]));
    }
}
