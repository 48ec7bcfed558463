//! SQLite-backed corpus store.
//!
//! One table per source kind. Embeddings are kept next to the text as
//! little-endian `f32` blobs and scanned linearly at query time.

use crate::types::{
    Chunk, ChunkIndex, ChunkSource, CorpusStats, DocumentKey, DocumentMeta, PendingEmbedding,
    SourceKind, ThreadMeta,
};
use grounded_core::{AppError, AppResult};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS thread_chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL,
    topic_id INTEGER NOT NULL,
    topic_title TEXT NOT NULL,
    post_number INTEGER NOT NULL,
    author TEXT NOT NULL,
    created_at TEXT NOT NULL,
    likes INTEGER NOT NULL DEFAULT 0,
    url TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    part_number INTEGER NOT NULL DEFAULT 0,
    part_count INTEGER NOT NULL DEFAULT 0,
    parent_id INTEGER,
    split_parts INTEGER NOT NULL DEFAULT 0,
    content TEXT NOT NULL,
    embedding BLOB
);

CREATE INDEX IF NOT EXISTS idx_thread_chunks_post ON thread_chunks(post_id, chunk_index);
CREATE UNIQUE INDEX IF NOT EXISTS idx_thread_chunks_part ON thread_chunks(parent_id, part_number);

CREATE TABLE IF NOT EXISTS document_chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_title TEXT NOT NULL,
    original_url TEXT NOT NULL DEFAULT '',
    downloaded_at TEXT NOT NULL DEFAULT '',
    chunk_index INTEGER NOT NULL,
    part_number INTEGER NOT NULL DEFAULT 0,
    part_count INTEGER NOT NULL DEFAULT 0,
    parent_id INTEGER,
    split_parts INTEGER NOT NULL DEFAULT 0,
    content TEXT NOT NULL,
    embedding BLOB
);

CREATE INDEX IF NOT EXISTS idx_document_chunks_title ON document_chunks(doc_title, chunk_index);
CREATE UNIQUE INDEX IF NOT EXISTS idx_document_chunks_part ON document_chunks(parent_id, part_number);
"#;

const THREAD_COLUMNS: &str = "id, post_id, topic_id, topic_title, post_number, author, created_at, \
     likes, url, chunk_index, part_number, part_count, content, embedding";

const DOCUMENT_COLUMNS: &str = "id, doc_title, original_url, downloaded_at, chunk_index, \
     part_number, part_count, content, embedding";

/// Metadata columns copied from a parent row into its parts.
const THREAD_META_COLUMNS: &str =
    "post_id, topic_id, topic_title, post_number, author, created_at, likes, url, chunk_index";

const DOCUMENT_META_COLUMNS: &str = "doc_title, original_url, downloaded_at, chunk_index";

fn table(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Thread => "thread_chunks",
        SourceKind::Document => "document_chunks",
    }
}

fn columns(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Thread => THREAD_COLUMNS,
        SourceKind::Document => DOCUMENT_COLUMNS,
    }
}

fn store_err(context: &str) -> impl Fn(rusqlite::Error) -> AppError + '_ {
    move |e| AppError::Store(format!("{}: {}", context, e))
}

/// Row id of a part plus whether this call created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertedPart {
    pub id: i64,
    pub created: bool,
}

/// Handle on the corpus database.
///
/// Not `Sync`: open one per blocking task.
pub struct CorpusStore {
    conn: Connection,
}

impl CorpusStore {
    /// Open (or create) the store at `db_path` for reading and writing.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    AppError::Store(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path).map_err(store_err("Failed to open corpus database"))?;

        match conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0)) {
            Ok(mode) => tracing::trace!("Journal mode: {}", mode),
            Err(e) => tracing::debug!("Could not enable WAL: {}", e),
        }

        conn.execute_batch(SCHEMA)
            .map_err(store_err("Failed to create tables"))?;

        tracing::debug!("Opened corpus store at {:?}", db_path);
        Ok(Self { conn })
    }

    /// Open an existing store without write access. Used on the query path.
    pub fn open_read_only(db_path: &Path) -> AppResult<Self> {
        if !db_path.exists() {
            return Err(AppError::Store(format!(
                "Corpus database not found at {:?}. Run 'grounded ingest' first.",
                db_path
            )));
        }

        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(store_err("Failed to open corpus database"))?;

        Ok(Self { conn })
    }

    /// Insert one chunk and return its row id.
    pub fn insert_chunk(&self, chunk: &Chunk) -> AppResult<i64> {
        insert_row(&self.conn, chunk)
    }

    /// Insert many chunks in a single transaction.
    pub fn insert_chunks(&mut self, chunks: &[Chunk]) -> AppResult<usize> {
        let tx = self
            .conn
            .transaction()
            .map_err(store_err("Failed to begin transaction"))?;

        for chunk in chunks {
            insert_row(&tx, chunk)?;
        }

        tx.commit().map_err(store_err("Failed to commit chunks"))?;
        Ok(chunks.len())
    }

    /// Every row of `kind` that carries an embedding, in row order.
    ///
    /// A blob that does not decode is returned with `embedding: None`.
    pub fn scan_all_with_embedding(&self, kind: SourceKind) -> AppResult<Vec<Chunk>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE embedding IS NOT NULL ORDER BY id",
            columns(kind),
            table(kind)
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(store_err("Failed to prepare scan"))?;

        let chunks = stmt
            .query_map([], |row| row_to_chunk(kind, row))
            .map_err(store_err("Failed to scan chunks"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err("Failed to read chunk row"))?;

        let malformed = chunks.iter().filter(|c| c.embedding.is_none()).count();
        if malformed > 0 {
            tracing::warn!("{} {} chunks have malformed embeddings", malformed, kind);
        }

        tracing::debug!("Scanned {} {} chunks with embeddings", chunks.len(), kind);
        Ok(chunks)
    }

    /// The whole chunk at `index` of the document identified by `key`.
    pub fn lookup_by_index(
        &self,
        kind: SourceKind,
        key: &DocumentKey,
        index: u32,
    ) -> AppResult<Option<Chunk>> {
        let (key_column, key_value): (&str, rusqlite::types::Value) = match (kind, key) {
            (SourceKind::Thread, DocumentKey::Post(post_id)) => ("post_id", (*post_id).into()),
            (SourceKind::Document, DocumentKey::Title(title)) => ("doc_title", title.clone().into()),
            _ => {
                return Err(AppError::Store(format!(
                    "Document key {:?} does not belong to {} chunks",
                    key, kind
                )))
            }
        };

        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 AND chunk_index = ?2 AND part_number = 0 \
             ORDER BY id LIMIT 1",
            columns(kind),
            table(kind),
            key_column
        );

        self.conn
            .query_row(&sql, params![key_value, index as i64], |row| {
                row_to_chunk(kind, row)
            })
            .optional()
            .map_err(store_err("Failed to look up chunk"))
    }

    /// Rows still missing an embedding. Parents already split into parts are
    /// excluded.
    pub fn embeddings_pending(&self, kind: SourceKind) -> AppResult<Vec<PendingEmbedding>> {
        let sql = format!(
            "SELECT id, content FROM {} WHERE embedding IS NULL AND split_parts = 0 ORDER BY id",
            table(kind)
        );

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(store_err("Failed to prepare pending query"))?;

        let pending = stmt
            .query_map([], |row| {
                Ok(PendingEmbedding {
                    id: row.get(0)?,
                    content: row.get(1)?,
                })
            })
            .map_err(store_err("Failed to query pending embeddings"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err("Failed to read pending row"))?;

        Ok(pending)
    }

    /// Store `embedding` for row `id` unless one is already present.
    ///
    /// Returns whether the row was written.
    pub fn set_embedding(&self, kind: SourceKind, id: i64, embedding: &[f32]) -> AppResult<bool> {
        let sql = format!(
            "UPDATE {} SET embedding = ?1 WHERE id = ?2 AND embedding IS NULL",
            table(kind)
        );

        let changed = self
            .conn
            .execute(&sql, params![embedding_to_bytes(embedding), id])
            .map_err(store_err("Failed to store embedding"))?;

        Ok(changed > 0)
    }

    /// Drop every embedding of `kind` so the next backfill recomputes them.
    pub fn clear_embeddings(&self, kind: SourceKind) -> AppResult<usize> {
        let sql = format!(
            "UPDATE {} SET embedding = NULL WHERE embedding IS NOT NULL",
            table(kind)
        );

        let cleared = self
            .conn
            .execute(&sql, [])
            .map_err(store_err("Failed to clear embeddings"))?;

        tracing::info!("Cleared {} {} embeddings", cleared, kind);
        Ok(cleared)
    }

    /// Insert part `part` of `parts` for `parent_id`, copying the parent's
    /// metadata. An existing part with the same number is left untouched.
    pub fn insert_part(
        &self,
        kind: SourceKind,
        parent_id: i64,
        part: u32,
        parts: u32,
        content: &str,
    ) -> AppResult<InsertedPart> {
        if content.trim().is_empty() {
            return Err(AppError::Store("Refusing to store an empty part".to_string()));
        }

        let meta = match kind {
            SourceKind::Thread => THREAD_META_COLUMNS,
            SourceKind::Document => DOCUMENT_META_COLUMNS,
        };

        let sql = format!(
            "INSERT OR IGNORE INTO {table} ({meta}, part_number, part_count, parent_id, content) \
             SELECT {meta}, ?2, ?3, id, ?4 FROM {table} WHERE id = ?1",
            table = table(kind),
            meta = meta
        );

        let inserted = self
            .conn
            .execute(&sql, params![parent_id, part as i64, parts as i64, content])
            .map_err(store_err("Failed to insert part"))?;

        let id = self
            .conn
            .query_row(
                &format!(
                    "SELECT id FROM {} WHERE parent_id = ?1 AND part_number = ?2",
                    table(kind)
                ),
                params![parent_id, part as i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err("Failed to read part id"))?
            .ok_or_else(|| {
                AppError::Store(format!("Parent row {} not found in {}", parent_id, table(kind)))
            })?;

        Ok(InsertedPart {
            id,
            created: inserted > 0,
        })
    }

    /// Record that `id` has been replaced by `parts` parts.
    pub fn mark_split(&self, kind: SourceKind, id: i64, parts: u32) -> AppResult<()> {
        let sql = format!("UPDATE {} SET split_parts = ?1 WHERE id = ?2", table(kind));
        self.conn
            .execute(&sql, params![parts as i64, id])
            .map_err(store_err("Failed to mark split"))?;
        Ok(())
    }

    pub fn count(&self, kind: SourceKind) -> AppResult<u64> {
        self.count_where(kind, "1 = 1")
    }

    pub fn is_empty(&self, kind: SourceKind) -> AppResult<bool> {
        Ok(self.count(kind)? == 0)
    }

    pub fn stats(&self) -> AppResult<CorpusStats> {
        const EMBEDDED: &str = "embedding IS NOT NULL";
        const PENDING: &str = "embedding IS NULL AND split_parts = 0";

        Ok(CorpusStats {
            thread_chunks: self.count(SourceKind::Thread)?,
            document_chunks: self.count(SourceKind::Document)?,
            thread_embeddings: self.count_where(SourceKind::Thread, EMBEDDED)?,
            document_embeddings: self.count_where(SourceKind::Document, EMBEDDED)?,
            thread_pending: self.count_where(SourceKind::Thread, PENDING)?,
            document_pending: self.count_where(SourceKind::Document, PENDING)?,
        })
    }

    fn count_where(&self, kind: SourceKind, condition: &str) -> AppResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {}", table(kind), condition);
        self.conn
            .query_row(&sql, [], |row| row.get::<_, i64>(0).map(|v| v as u64))
            .map_err(store_err("Failed to count chunks"))
    }
}

fn insert_row(conn: &Connection, chunk: &Chunk) -> AppResult<i64> {
    if chunk.content.trim().is_empty() {
        return Err(AppError::Store("Refusing to store an empty chunk".to_string()));
    }

    let embedding = chunk.embedding.as_deref().map(embedding_to_bytes);
    let index = chunk.index;

    let result = match &chunk.source {
        ChunkSource::Thread(meta) => conn.execute(
            "INSERT INTO thread_chunks (post_id, topic_id, topic_title, post_number, author, \
             created_at, likes, url, chunk_index, part_number, part_count, content, embedding) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                meta.post_id,
                meta.topic_id,
                meta.topic_title,
                meta.post_number,
                meta.author,
                meta.created_at,
                meta.likes,
                meta.url,
                index.index() as i64,
                index.part_number() as i64,
                index.part_count() as i64,
                chunk.content,
                embedding,
            ],
        ),
        ChunkSource::Document(meta) => conn.execute(
            "INSERT INTO document_chunks (doc_title, original_url, downloaded_at, chunk_index, \
             part_number, part_count, content, embedding) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                meta.doc_title,
                meta.original_url,
                meta.downloaded_at,
                index.index() as i64,
                index.part_number() as i64,
                index.part_count() as i64,
                chunk.content,
                embedding,
            ],
        ),
    };

    result.map_err(store_err("Failed to insert chunk"))?;
    Ok(conn.last_insert_rowid())
}

fn row_to_chunk(kind: SourceKind, row: &Row<'_>) -> rusqlite::Result<Chunk> {
    let (source, offset) = match kind {
        SourceKind::Thread => (
            ChunkSource::Thread(ThreadMeta {
                post_id: row.get(1)?,
                topic_id: row.get(2)?,
                topic_title: row.get(3)?,
                post_number: row.get(4)?,
                author: row.get(5)?,
                created_at: row.get(6)?,
                likes: row.get(7)?,
                url: row.get(8)?,
            }),
            9,
        ),
        SourceKind::Document => (
            ChunkSource::Document(DocumentMeta {
                doc_title: row.get(1)?,
                original_url: row.get(2)?,
                downloaded_at: row.get(3)?,
            }),
            4,
        ),
    };

    let index = ChunkIndex::from_columns(
        row.get::<_, i64>(offset)? as u32,
        row.get::<_, i64>(offset + 1)? as u32,
        row.get::<_, i64>(offset + 2)? as u32,
    );
    let blob: Option<Vec<u8>> = row.get(offset + 4)?;

    Ok(Chunk {
        id: Some(row.get(0)?),
        source,
        index,
        content: row.get(offset + 3)?,
        embedding: blob.as_deref().and_then(bytes_to_embedding),
    })
}

/// Encode an embedding as little-endian `f32` bytes.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &value in embedding {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a stored embedding. `None` when the blob is empty, not a whole
/// number of floats, or holds a NaN or infinite component.
pub fn bytes_to_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.is_empty() || bytes.len() % 4 != 0 {
        return None;
    }

    let embedding: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    if embedding.iter().all(|v| v.is_finite()) {
        Some(embedding)
    } else {
        None
    }
}
