//! Context enrichment: widen each hit with its neighbouring chunks.

use crate::store::CorpusStore;
use crate::types::QueryResult;
use grounded_core::AppResult;

/// Replace each result's content with `prev + " " + content + " " + next`.
///
/// Neighbours are the whole chunks at `index - 1` and `index + 1` of the same
/// document; a part looks around its parent's index. The output is
/// one-to-one with the input and keeps its order.
pub fn enrich(store: &CorpusStore, results: Vec<QueryResult>) -> AppResult<Vec<QueryResult>> {
    let mut enriched = Vec::with_capacity(results.len());

    for mut result in results {
        let kind = result.chunk.kind();
        let key = result.chunk.document_key();
        let index = result.chunk.index.index();

        let prev = match index.checked_sub(1) {
            Some(prev_index) => store.lookup_by_index(kind, &key, prev_index)?,
            None => None,
        };
        let next = store.lookup_by_index(kind, &key, index + 1)?;

        let mut parts: Vec<&str> = Vec::with_capacity(3);
        if let Some(prev) = &prev {
            parts.push(&prev.content);
        }
        parts.push(&result.chunk.content);
        if let Some(next) = &next {
            parts.push(&next.content);
        }

        let content = parts.join(" ");
        result.chunk.content = content;
        enriched.push(result);
    }

    tracing::debug!("Enriched {} results with adjacent chunks", enriched.len());
    Ok(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkIndex, ChunkSource, DocumentMeta};
    use tempfile::NamedTempFile;

    fn doc(title: &str, index: ChunkIndex, content: &str) -> Chunk {
        Chunk::new(
            ChunkSource::Document(DocumentMeta {
                doc_title: title.into(),
                original_url: String::new(),
                downloaded_at: String::new(),
            }),
            index,
            content,
        )
    }

    fn hit(chunk: Chunk, ordinal: usize) -> QueryResult {
        QueryResult {
            chunk,
            similarity: 0.9,
            url: "https://docs.example/x".into(),
            ordinal,
        }
    }

    #[test]
    fn test_enrich_neighbours() {
        let file = NamedTempFile::new().unwrap();
        let mut store = CorpusStore::open(file.path()).unwrap();
        store
            .insert_chunks(&[
                doc("Guide", ChunkIndex::Whole(0), "alpha"),
                doc("Guide", ChunkIndex::Whole(1), "beta"),
                doc("Guide", ChunkIndex::Whole(2), "gamma"),
                doc("Other", ChunkIndex::Whole(1), "unrelated"),
            ])
            .unwrap();

        let results = vec![
            hit(doc("Guide", ChunkIndex::Whole(1), "beta"), 1),
            hit(doc("Guide", ChunkIndex::Whole(0), "alpha"), 0),
            hit(doc("Guide", ChunkIndex::Whole(2), "gamma"), 2),
            hit(doc("Lonely", ChunkIndex::Whole(0), "solo"), 3),
        ];

        let enriched = enrich(&store, results).unwrap();
        assert_eq!(enriched.len(), 4);
        assert_eq!(enriched[0].chunk.content, "alpha beta gamma");
        assert_eq!(enriched[1].chunk.content, "alpha beta");
        assert_eq!(enriched[2].chunk.content, "beta gamma");
        assert_eq!(enriched[3].chunk.content, "solo");
        assert_eq!(enriched[0].ordinal, 1);
    }

    #[test]
    fn test_part_uses_parent_neighbours() {
        let file = NamedTempFile::new().unwrap();
        let mut store = CorpusStore::open(file.path()).unwrap();
        store
            .insert_chunks(&[
                doc("Guide", ChunkIndex::Whole(0), "before"),
                doc("Guide", ChunkIndex::Whole(1), "huge parent"),
                doc("Guide", ChunkIndex::Whole(2), "after"),
            ])
            .unwrap();

        let part = doc("Guide", ChunkIndex::Part { index: 1, part: 2, parts: 3 }, "middle slice");
        let enriched = enrich(&store, vec![hit(part, 0)]).unwrap();
        assert_eq!(enriched[0].chunk.content, "before middle slice after");
    }

    #[test]
    fn test_empty_input() {
        let file = NamedTempFile::new().unwrap();
        let store = CorpusStore::open(file.path()).unwrap();
        assert!(enrich(&store, Vec::new()).unwrap().is_empty());
    }
}
