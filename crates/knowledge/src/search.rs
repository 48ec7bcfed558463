//! Similarity engine.
//!
//! Exact linear scan: every stored vector is scored against the query, hits
//! below the threshold are dropped, each source document contributes at
//! most a handful of chunks, and the survivors are ranked globally.

use crate::types::{Chunk, ChunkSource, DocumentKey, QueryResult, SourceKind};
use grounded_core::RetrievalSettings;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Cosine similarity of two vectors, clamped to [-1, 1].
///
/// Mismatched lengths, empty vectors, near-zero norms and non-finite
/// results score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if !(norm_a >= 1e-12 && norm_b >= 1e-12) {
        return 0.0;
    }

    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() {
        similarity.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Knobs for a single search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub similarity_threshold: f32,
    pub max_results: usize,
    /// Per-document cap
    pub max_context_chunks: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::from(&RetrievalSettings::default())
    }
}

impl From<&RetrievalSettings> for SearchParams {
    fn from(settings: &RetrievalSettings) -> Self {
        Self {
            similarity_threshold: settings.similarity_threshold,
            max_results: settings.max_results,
            max_context_chunks: settings.max_context_chunks,
        }
    }
}

impl SearchParams {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_max_context_chunks(mut self, max_context_chunks: usize) -> Self {
        self.max_context_chunks = max_context_chunks;
        self
    }
}

/// Turns stored URLs into absolute links.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlResolver {
    forum_base: String,
    docs_base: String,
}

impl UrlResolver {
    pub fn new(forum_base: &str, docs_base: &str) -> Self {
        Self {
            forum_base: forum_base.trim_end_matches('/').to_string(),
            docs_base: docs_base.trim_end_matches('/').to_string(),
        }
    }

    /// Post URL as stored at ingestion time.
    pub fn thread_url(&self, slug: &str, topic_id: i64, post_number: i64) -> String {
        format!("{}/t/{}/{}/{}", self.forum_base, slug, topic_id, post_number)
    }

    pub fn resolve(&self, source: &ChunkSource) -> String {
        match source {
            ChunkSource::Thread(meta) => {
                let url = meta.url.trim();
                if has_scheme(url) {
                    url.to_string()
                } else {
                    format!("{}/t/{}", self.forum_base, url.trim_start_matches('/'))
                }
            }
            ChunkSource::Document(meta) => {
                let url = meta.original_url.trim();
                if has_scheme(url) {
                    url.to_string()
                } else {
                    format!("{}/{}", self.docs_base, meta.doc_title)
                }
            }
        }
    }
}

fn has_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Rank `chunks` against `query`.
///
/// `chunks` must be in scan order (threads first, then documents, each in
/// row order); that order breaks similarity ties.
pub fn search(
    query: &[f32],
    chunks: &[Chunk],
    params: &SearchParams,
    resolver: &UrlResolver,
) -> Vec<QueryResult> {
    let mut groups: HashMap<(SourceKind, DocumentKey), Vec<QueryResult>> = HashMap::new();
    let mut considered = 0usize;

    for (ordinal, chunk) in chunks.iter().enumerate() {
        let Some(embedding) = chunk.embedding.as_deref() else {
            continue;
        };
        if embedding.iter().any(|v| !v.is_finite()) {
            tracing::warn!("Skipping chunk {:?} with a non-finite embedding", chunk.id);
            continue;
        }
        considered += 1;

        let similarity = cosine_similarity(query, embedding);
        if similarity < params.similarity_threshold {
            continue;
        }

        groups
            .entry((chunk.kind(), chunk.document_key()))
            .or_default()
            .push(QueryResult {
                url: resolver.resolve(&chunk.source),
                chunk: chunk.clone(),
                similarity,
                ordinal,
            });
    }

    let group_count = groups.len();
    let mut results: Vec<QueryResult> = groups
        .into_values()
        .flat_map(|mut group| {
            group.sort_by(rank);
            group.truncate(params.max_context_chunks);
            group
        })
        .collect();

    results.sort_by(rank);
    results.truncate(params.max_results);

    tracing::debug!(
        "Scored {} chunks, {} groups above {:.2}, returning {}",
        considered,
        group_count,
        params.similarity_threshold,
        results.len()
    );

    results
}

fn rank(a: &QueryResult, b: &QueryResult) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.ordinal.cmp(&b.ordinal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkIndex, DocumentMeta, ThreadMeta};

    fn resolver() -> UrlResolver {
        UrlResolver::new("https://forum.example", "https://docs.example/")
    }

    fn thread(post_id: i64, index: u32, embedding: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new(
            ChunkSource::Thread(ThreadMeta {
                post_id,
                topic_id: 1,
                topic_title: "Topic".into(),
                post_number: post_id,
                author: "a".into(),
                created_at: String::new(),
                likes: 0,
                url: format!("https://forum.example/t/topic/1/{}", post_id),
            }),
            ChunkIndex::Whole(index),
            format!("post {} chunk {}", post_id, index),
        );
        chunk.embedding = Some(embedding);
        chunk
    }

    fn doc(title: &str, index: u32, embedding: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new(
            ChunkSource::Document(DocumentMeta {
                doc_title: title.into(),
                original_url: String::new(),
                downloaded_at: String::new(),
            }),
            ChunkIndex::Whole(index),
            format!("{} chunk {}", title, index),
        );
        chunk.embedding = Some(embedding);
        chunk
    }

    #[test]
    fn test_cosine_bounds_and_degenerate_inputs() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_symmetric() {
        let a = [0.3, -0.2, 0.9];
        let b = [0.1, 0.4, -0.5];
        assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn test_threshold_filters() {
        let chunks = vec![thread(1, 0, vec![1.0, 0.0]), thread(2, 0, vec![0.0, 1.0])];
        let results = search(&[1.0, 0.0], &chunks, &SearchParams::default(), &resolver());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.content, "post 1 chunk 0");
    }

    #[test]
    fn test_group_cap_and_global_limit() {
        // post 1 has six matching chunks, post 2 has one
        let mut chunks: Vec<Chunk> = (0..6).map(|i| thread(1, i, vec![1.0, 0.1 * i as f32])).collect();
        chunks.push(thread(2, 0, vec![1.0, 0.05]));

        let params = SearchParams::default().with_max_context_chunks(4);
        let results = search(&[1.0, 0.0], &chunks, &params, &resolver());

        let from_post_1 = results
            .iter()
            .filter(|r| r.chunk.document_key() == DocumentKey::Post(1))
            .count();
        assert_eq!(from_post_1, 4);
        assert_eq!(results.len(), 5);

        // best four of post 1 are its lowest indices
        let mut kept: Vec<u32> = results
            .iter()
            .filter(|r| r.chunk.document_key() == DocumentKey::Post(1))
            .map(|r| r.chunk.index.index())
            .collect();
        kept.sort();
        assert_eq!(kept, vec![0, 1, 2, 3]);

        let limited = search(&[1.0, 0.0], &chunks, &params.with_max_results(2), &resolver());
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_sorted_desc_with_ordinal_ties() {
        let chunks = vec![
            doc("B", 0, vec![1.0, 0.0]),
            thread(5, 0, vec![1.0, 1.0]),
            doc("A", 0, vec![1.0, 0.0]),
        ];
        let results = search(&[1.0, 0.0], &chunks, &SearchParams::default(), &resolver());

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].ordinal, 0);
        assert_eq!(results[1].ordinal, 2);
        assert_eq!(results[2].ordinal, 1);
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[test]
    fn test_deterministic() {
        let chunks: Vec<Chunk> = (0..20)
            .map(|i| doc(&format!("D{}", i % 7), i, vec![1.0, (i % 5) as f32 * 0.1]))
            .collect();
        let first = search(&[1.0, 0.0], &chunks, &SearchParams::default(), &resolver());
        let second = search(&[1.0, 0.0], &chunks, &SearchParams::default(), &resolver());
        let ids = |r: &[QueryResult]| r.iter().map(|q| q.ordinal).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_malformed_embedding_excluded() {
        let mut broken = doc("Broken", 0, vec![]);
        broken.embedding = None;
        let params = SearchParams::default().with_threshold(-1.0);
        let results = search(&[1.0, 0.0], &[broken], &params, &resolver());
        assert!(results.is_empty());
    }

    #[test]
    fn test_cosine_non_finite_scores_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[f32::NAN, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[f32::INFINITY, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::NAN], &[f32::NAN]), 0.0);
    }

    #[test]
    fn test_non_finite_embedding_never_ranks() {
        let chunks = vec![
            thread(1, 0, vec![1.0, 0.0]),
            thread(2, 0, vec![f32::NAN, 0.0]),
            thread(3, 0, vec![f32::INFINITY, 1.0]),
        ];

        let results = search(&[1.0, 0.0], &chunks, &SearchParams::default(), &resolver());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.content, "post 1 chunk 0");
        assert!((results[0].similarity - 1.0).abs() < 1e-6);

        let permissive = SearchParams::default().with_threshold(-2.0);
        let results = search(&[1.0, 0.0], &chunks, &permissive, &resolver());
        assert_eq!(results.len(), 1);
        assert!(results.iter().all(|r| r.similarity.is_finite()));
    }

    #[test]
    fn test_low_similarity_corpus_is_empty() {
        // every stored vector scores below 0.5 against the query
        let chunks = vec![
            thread(1, 0, vec![0.4, 1.0]),
            doc("Docker", 0, vec![0.0, 1.0]),
            doc("Git", 0, vec![-1.0, 0.2]),
        ];
        let results = search(&[1.0, 0.0], &chunks, &SearchParams::default(), &resolver());
        assert!(results.is_empty());
    }

    #[test]
    fn test_url_resolution() {
        let r = resolver();
        let legacy = ChunkSource::Thread(ThreadMeta {
            post_id: 1,
            topic_id: 9,
            topic_title: String::new(),
            post_number: 3,
            author: String::new(),
            created_at: String::new(),
            likes: 0,
            url: "ga4-doubts/9/3".into(),
        });
        assert_eq!(r.resolve(&legacy), "https://forum.example/t/ga4-doubts/9/3");
        assert_eq!(r.thread_url("ga4-doubts", 9, 3), "https://forum.example/t/ga4-doubts/9/3");

        // a slug that merely starts with "http" is still relative
        let slug = ChunkSource::Thread(ThreadMeta {
            post_id: 2,
            topic_id: 9,
            topic_title: String::new(),
            post_number: 3,
            author: String::new(),
            created_at: String::new(),
            likes: 0,
            url: "http-status-codes/9/3".into(),
        });
        assert_eq!(r.resolve(&slug), "https://forum.example/t/http-status-codes/9/3");

        let plain_http = ChunkSource::Thread(ThreadMeta {
            post_id: 3,
            topic_id: 9,
            topic_title: String::new(),
            post_number: 1,
            author: String::new(),
            created_at: String::new(),
            likes: 0,
            url: "http://mirror.example/t/x/9/1".into(),
        });
        assert_eq!(r.resolve(&plain_http), "http://mirror.example/t/x/9/1");

        let bare = ChunkSource::Document(DocumentMeta {
            doc_title: "docker".into(),
            original_url: "  ".into(),
            downloaded_at: String::new(),
        });
        assert_eq!(r.resolve(&bare), "https://docs.example/docker");

        let schemeless = ChunkSource::Document(DocumentMeta {
            doc_title: "docker".into(),
            original_url: "docker.md".into(),
            downloaded_at: String::new(),
        });
        assert_eq!(r.resolve(&schemeless), "https://docs.example/docker");

        let linked = ChunkSource::Document(DocumentMeta {
            doc_title: "docker".into(),
            original_url: "https://tds.example/#/docker".into(),
            downloaded_at: String::new(),
        });
        assert_eq!(r.resolve(&linked), "https://tds.example/#/docker");
    }
}
