//! Corpus ingestion.
//!
//! Reads exported forum topics (`*.json`) and documentation pages (`*.md`
//! with YAML front matter), chunks them and stores the chunks without
//! embeddings. A kind whose table already holds rows is skipped entirely.

use crate::chunker;
use crate::search::UrlResolver;
use crate::store::CorpusStore;
use crate::types::{Chunk, ChunkIndex, ChunkSource, DocumentMeta, IngestStats, SourceKind, ThreadMeta};
use grounded_core::{AppError, AppResult, ChunkingSettings};
use scraper::Html;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Posts shorter than this (after HTML cleaning) carry no useful content.
pub const MIN_POST_CHARS: usize = 20;

#[derive(Debug, Deserialize)]
struct TopicExport {
    id: i64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    slug: String,
    #[serde(default)]
    post_stream: PostStream,
}

#[derive(Debug, Default, Deserialize)]
struct PostStream {
    #[serde(default)]
    posts: Vec<PostExport>,
}

#[derive(Debug, Deserialize)]
struct PostExport {
    id: i64,
    post_number: i64,
    #[serde(default)]
    username: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    like_count: i64,
    #[serde(default)]
    cooked: String,
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    title: Option<String>,
    original_url: Option<String>,
    downloaded_at: Option<serde_yaml::Value>,
}

/// Ingest every topic export under `dir`.
pub fn ingest_threads(
    store: &mut CorpusStore,
    dir: &Path,
    chunking: &ChunkingSettings,
    resolver: &UrlResolver,
) -> AppResult<IngestStats> {
    let mut stats = IngestStats::new(SourceKind::Thread);
    let Some(files) = prepare(store, dir, SourceKind::Thread, "json", &mut stats)? else {
        return Ok(stats);
    };

    for path in files {
        let chunks = match read_topic(&path, chunking, resolver, &mut stats) {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                stats.skipped += 1;
                continue;
            }
        };

        stats.files += 1;
        stats.chunks += store.insert_chunks(&chunks)? as u32;
    }

    info!(
        "Ingested {} thread chunks from {} files ({} skipped)",
        stats.chunks, stats.files, stats.skipped
    );
    Ok(stats)
}

/// Ingest every markdown page under `dir`.
pub fn ingest_documents(
    store: &mut CorpusStore,
    dir: &Path,
    chunking: &ChunkingSettings,
) -> AppResult<IngestStats> {
    let mut stats = IngestStats::new(SourceKind::Document);
    let Some(files) = prepare(store, dir, SourceKind::Document, "md", &mut stats)? else {
        return Ok(stats);
    };

    for path in files {
        let chunks = match read_page(&path, chunking) {
            Ok(chunks) if chunks.is_empty() => {
                debug!("{:?} has no content", path);
                stats.skipped += 1;
                continue;
            }
            Ok(chunks) => chunks,
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                stats.skipped += 1;
                continue;
            }
        };

        stats.files += 1;
        stats.chunks += store.insert_chunks(&chunks)? as u32;
    }

    info!(
        "Ingested {} document chunks from {} files ({} skipped)",
        stats.chunks, stats.files, stats.skipped
    );
    Ok(stats)
}

/// Check idempotence and list the input files. `None` means nothing to do.
fn prepare(
    store: &CorpusStore,
    dir: &Path,
    kind: SourceKind,
    extension: &str,
    stats: &mut IngestStats,
) -> AppResult<Option<Vec<PathBuf>>> {
    let existing = store.count(kind)?;
    if existing > 0 {
        info!(
            "Found {} existing {} chunks in database, skipping ingestion",
            existing, kind
        );
        stats.already_populated = true;
        return Ok(None);
    }

    if !dir.is_dir() {
        warn!("{} directory {:?} does not exist, nothing to ingest", kind, dir);
        return Ok(None);
    }

    let files = find_files(dir, extension);
    info!("Found {} {} files to process in {:?}", files.len(), kind, dir);
    Ok(Some(files))
}

fn find_files(dir: &Path, extension: &str) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some(extension))
        .collect()
}

fn read_topic(
    path: &Path,
    chunking: &ChunkingSettings,
    resolver: &UrlResolver,
    stats: &mut IngestStats,
) -> AppResult<Vec<Chunk>> {
    let raw = std::fs::read_to_string(path)?;
    let topic: TopicExport = serde_json::from_str(&raw)
        .map_err(|e| AppError::Ingest(format!("Invalid topic export: {}", e)))?;

    let mut chunks = Vec::new();

    for post in topic.post_stream.posts {
        let text = clean_html(&post.cooked);
        if text.chars().count() < MIN_POST_CHARS {
            stats.skipped += 1;
            continue;
        }

        let meta = ThreadMeta {
            post_id: post.id,
            topic_id: topic.id,
            topic_title: topic.title.clone(),
            post_number: post.post_number,
            author: post.username,
            created_at: post.created_at,
            likes: post.like_count,
            url: resolver.thread_url(&topic.slug, topic.id, post.post_number),
        };

        let pieces = chunker::chunk(&text, chunking.chunk_size, chunking.chunk_overlap);
        chunks.extend(pieces.into_iter().enumerate().map(|(i, content)| {
            Chunk::new(
                ChunkSource::Thread(meta.clone()),
                ChunkIndex::Whole(i as u32),
                content,
            )
        }));
    }

    Ok(chunks)
}

fn read_page(path: &Path, chunking: &ChunkingSettings) -> AppResult<Vec<Chunk>> {
    let raw = std::fs::read_to_string(path)?;
    let (front, body) = split_front_matter(&raw);

    let front: FrontMatter = match front {
        Some(yaml) => serde_yaml::from_str(yaml).unwrap_or_else(|e| {
            warn!("Ignoring malformed front matter in {:?}: {}", path, e);
            FrontMatter::default()
        }),
        None => FrontMatter::default(),
    };

    let title = front
        .title
        .filter(|t| !t.trim().is_empty())
        .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .unwrap_or_default();

    let meta = DocumentMeta {
        doc_title: title,
        original_url: front.original_url.unwrap_or_default(),
        downloaded_at: front.downloaded_at.map(yaml_scalar).unwrap_or_default(),
    };

    let pieces = chunker::chunk(body, chunking.chunk_size, chunking.chunk_overlap);
    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(i, content)| {
            Chunk::new(
                ChunkSource::Document(meta.clone()),
                ChunkIndex::Whole(i as u32),
                content,
            )
        })
        .collect())
}

/// Split a leading `---` delimited block from the body.
fn split_front_matter(raw: &str) -> (Option<&str>, &str) {
    let Some(rest) = raw
        .strip_prefix("---\n")
        .or_else(|| raw.strip_prefix("---\r\n"))
    else {
        return (None, raw);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }

    (None, raw)
}

fn yaml_scalar(value: serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Visible text of a post body, whitespace collapsed.
pub fn clean_html(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(html);
    let mut text = String::with_capacity(html.len());

    for node in fragment.root_element().descendants() {
        let Some(fragment_text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| matches!(el.name(), "script" | "style"))
        });
        if !hidden {
            text.push_str(fragment_text);
            text.push(' ');
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
