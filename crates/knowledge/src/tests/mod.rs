//! Cross-module tests: store, search, enrichment and the answer pipeline.

mod pipeline;

use crate::embeddings::EmbeddingProvider;
use crate::types::{Chunk, ChunkIndex, ChunkSource, DocumentMeta, ThreadMeta};
use async_trait::async_trait;
use grounded_core::AppResult;

/// Topic words mapped to fixed axes so tests control similarity exactly.
const TOPICS: [&[&str]; 3] = [
    &["podman", "docker", "container"],
    &["model", "gpt", "token"],
    &["deadline", "exam", "submission"],
];

/// Axis for chunk text no query should match.
pub(crate) const FILLER: usize = TOPICS.len();

const UNMATCHED: usize = TOPICS.len() + 1;
const DIMS: usize = TOPICS.len() + 2;

/// Embeds text as keyword counts per topic; text with no topic word lands
/// on an axis of its own.
#[derive(Debug, Default)]
pub(crate) struct TopicEmbedder;

#[async_trait]
impl EmbeddingProvider for TopicEmbedder {
    fn provider_name(&self) -> &str {
        "topic"
    }

    fn model_name(&self) -> &str {
        "topic-axes"
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| topic_vector(text)).collect())
    }
}

pub(crate) fn topic_vector(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMS];
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        let word = word.to_lowercase();
        if let Some(axis) = TOPICS.iter().position(|words| words.contains(&word.as_str())) {
            vector[axis] += 1.0;
        }
    }
    if vector.iter().all(|v| *v == 0.0) {
        vector[UNMATCHED] = 1.0;
    }
    vector
}

pub(crate) fn axis(n: usize) -> Vec<f32> {
    let mut vector = vec![0.0; DIMS];
    vector[n] = 1.0;
    vector
}

pub(crate) fn post_chunk(post_id: i64, index: u32, content: &str, embedding: Vec<f32>) -> Chunk {
    let mut chunk = Chunk::new(
        ChunkSource::Thread(ThreadMeta {
            post_id,
            topic_id: 100 + post_id,
            topic_title: format!("Topic {}", post_id),
            post_number: 1,
            author: "student".into(),
            created_at: "2025-01-01T00:00:00Z".into(),
            likes: 0,
            url: format!("https://forum.example/t/topic-{}/{}/1", post_id, 100 + post_id),
        }),
        ChunkIndex::Whole(index),
        content,
    );
    chunk.embedding = Some(embedding);
    chunk
}

pub(crate) fn page_chunk(title: &str, index: u32, content: &str, embedding: Vec<f32>) -> Chunk {
    let mut chunk = Chunk::new(
        ChunkSource::Document(DocumentMeta {
            doc_title: title.into(),
            original_url: format!("https://docs.example/#/{}", title),
            downloaded_at: String::new(),
        }),
        ChunkIndex::Whole(index),
        content,
    );
    chunk.embedding = Some(embedding);
    chunk
}
