//! Corpus type definitions.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Which corpus a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A forum post
    Thread,
    /// A documentation page
    Document,
}

impl SourceKind {
    /// Scan order used everywhere results must be reproducible.
    pub const ALL: [SourceKind; 2] = [SourceKind::Thread, SourceKind::Document];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Thread => "thread",
            SourceKind::Document => "document",
        }
    }

    /// Label placed in front of each context block of the grounding prompt.
    pub fn context_label(&self) -> &'static str {
        match self {
            SourceKind::Thread => "Discourse post",
            SourceKind::Document => "Documentation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "thread" | "threads" | "discourse" => Some(SourceKind::Thread),
            "document" | "documents" | "markdown" | "docs" => Some(SourceKind::Document),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a chunk within its document.
///
/// `Part` chunks are synthetic: they are created at embedding time when the
/// text at `index` is too long for the provider. They order right after the
/// whole chunk at the same index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkIndex {
    Whole(u32),
    Part { index: u32, part: u32, parts: u32 },
}

impl ChunkIndex {
    /// Position of the chunk (or its parent) within the document.
    pub fn index(&self) -> u32 {
        match *self {
            ChunkIndex::Whole(index) => index,
            ChunkIndex::Part { index, .. } => index,
        }
    }

    /// 1-based part number, 0 for whole chunks.
    pub fn part_number(&self) -> u32 {
        match *self {
            ChunkIndex::Whole(_) => 0,
            ChunkIndex::Part { part, .. } => part,
        }
    }

    /// Total number of parts, 0 for whole chunks.
    pub fn part_count(&self) -> u32 {
        match *self {
            ChunkIndex::Whole(_) => 0,
            ChunkIndex::Part { parts, .. } => parts,
        }
    }

    pub fn is_part(&self) -> bool {
        matches!(self, ChunkIndex::Part { .. })
    }

    /// Rebuild from the stored columns.
    pub fn from_columns(index: u32, part: u32, parts: u32) -> Self {
        if part == 0 {
            ChunkIndex::Whole(index)
        } else {
            ChunkIndex::Part { index, part, parts }
        }
    }
}

impl Ord for ChunkIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.index(), self.part_number()).cmp(&(other.index(), other.part_number()))
    }
}

impl PartialOrd for ChunkIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ChunkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkIndex::Whole(index) => write!(f, "{}", index),
            ChunkIndex::Part { index, part, parts } => {
                write!(f, "{}_part_{}_of_{}", index, part, parts)
            }
        }
    }
}

/// Identity of the logical parent used for adjacency and grouping.
///
/// Thread chunks group by post, not by topic: two posts of the same topic
/// are separate documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKey {
    Post(i64),
    Title(String),
}

/// Metadata of a forum post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMeta {
    pub post_id: i64,
    pub topic_id: i64,
    pub topic_title: String,
    pub post_number: i64,
    pub author: String,
    pub created_at: String,
    pub likes: i64,
    /// Absolute post URL, or a legacy `slug/topic/post` path
    pub url: String,
}

/// Metadata of a documentation page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub doc_title: String,
    /// May be empty when the page carried no front matter URL
    pub original_url: String,
    pub downloaded_at: String,
}

/// Source-specific metadata of a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChunkSource {
    Thread(ThreadMeta),
    Document(DocumentMeta),
}

impl ChunkSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ChunkSource::Thread(_) => SourceKind::Thread,
            ChunkSource::Document(_) => SourceKind::Document,
        }
    }

    pub fn document_key(&self) -> DocumentKey {
        match self {
            ChunkSource::Thread(meta) => DocumentKey::Post(meta.post_id),
            ChunkSource::Document(meta) => DocumentKey::Title(meta.doc_title.clone()),
        }
    }
}

/// The atomic retrievable unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Row id once stored
    pub id: Option<i64>,
    pub source: ChunkSource,
    pub index: ChunkIndex,
    pub content: String,
    /// Absent until backfilled. In scan results, `None` means the stored
    /// vector could not be decoded.
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn new(source: ChunkSource, index: ChunkIndex, content: impl Into<String>) -> Self {
        Self {
            id: None,
            source,
            index,
            content: content.into(),
            embedding: None,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    pub fn document_key(&self) -> DocumentKey {
        self.source.document_key()
    }
}

/// A row still waiting for its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEmbedding {
    pub id: i64,
    pub content: String,
}

/// A scored search hit. Never persisted.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub chunk: Chunk,
    pub similarity: f32,
    /// Resolved absolute URL
    pub url: String,
    /// Position in the scan, used to break similarity ties
    pub ordinal: usize,
}

/// Row counts per corpus, used by `stats` and `/health`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub thread_chunks: u64,
    pub document_chunks: u64,
    pub thread_embeddings: u64,
    pub document_embeddings: u64,
    pub thread_pending: u64,
    pub document_pending: u64,
}

/// Outcome of one ingestion pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestStats {
    pub kind: SourceKind,
    pub files: u32,
    pub chunks: u32,
    /// Posts or files dropped for being too short or malformed
    pub skipped: u32,
    /// The table already held rows, so nothing was read
    pub already_populated: bool,
}

impl IngestStats {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            files: 0,
            chunks: 0,
            skipped: 0,
            already_populated: false,
        }
    }
}

/// Outcome of one embedding backfill pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackfillStats {
    pub pending: u32,
    pub embedded: u32,
    pub failed: u32,
    /// Parent rows split into parts this run
    pub split: u32,
    pub parts_created: u32,
}

impl BackfillStats {
    pub fn merge(&mut self, other: &BackfillStats) {
        self.pending += other.pending;
        self.embedded += other.embedded;
        self.failed += other.failed;
        self.split += other.split;
        self.parts_created += other.parts_created;
    }
}
