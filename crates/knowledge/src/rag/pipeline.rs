//! End-to-end answering: query text, retrieval, enrichment, synthesis.

use crate::blocking;
use crate::embeddings::EmbeddingProvider;
use crate::enrich::enrich;
use crate::rag::query::query_text;
use crate::rag::synthesize::synthesize;
use crate::rag::types::{Answer, QueryRequest};
use crate::search::{search, SearchParams, UrlResolver};
use crate::store::CorpusStore;
use crate::types::{QueryResult, SourceKind};
use grounded_core::{AppConfig, AppError, AppResult, GenerationSettings, RetrievalSettings};
use grounded_llm::LlmClient;
use grounded_prompt::{load_prompt, PromptDefinition, ANSWER_PROMPT_ID, VISION_PROMPT_ID};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Everything a query needs, shared across requests.
#[derive(Clone)]
pub struct QueryContext {
    pub store_path: PathBuf,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmClient>,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
    pub resolver: UrlResolver,
    pub answer_prompt: PromptDefinition,
    pub vision_prompt: PromptDefinition,
}

impl QueryContext {
    /// Build from configuration. Prompts may be overridden per workspace.
    pub fn from_config(
        config: &AppConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmClient>,
    ) -> AppResult<Self> {
        Ok(Self {
            store_path: config.database_path(),
            embedder,
            llm,
            retrieval: config.retrieval.clone(),
            generation: config.generation.clone(),
            resolver: UrlResolver::new(&config.forum_base_url, &config.docs_base_url),
            answer_prompt: load_prompt(&config.workspace, ANSWER_PROMPT_ID)?,
            vision_prompt: load_prompt(&config.workspace, VISION_PROMPT_ID)?,
        })
    }
}

/// Ranked search hits alongside their neighbour-enriched counterparts.
///
/// Both vectors have the same length and order.
#[derive(Debug, Clone, Default)]
pub struct Retrieved {
    pub matched: Vec<QueryResult>,
    pub enriched: Vec<QueryResult>,
}

impl Retrieved {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matched.len()
    }
}

/// Embed `text` and return ranked results from both corpora, plain and enriched.
pub async fn retrieve(ctx: &QueryContext, text: &str) -> AppResult<Retrieved> {
    let query = ctx.embedder.embed(text).await?;

    let path = ctx.store_path.clone();
    let params = SearchParams::from(&ctx.retrieval);
    let resolver = ctx.resolver.clone();

    blocking(move || {
        let store = CorpusStore::open_read_only(&path)?;
        let mut chunks = Vec::new();
        for kind in SourceKind::ALL {
            chunks.extend(store.scan_all_with_embedding(kind)?);
        }
        tracing::debug!("Scanned {} chunks", chunks.len());

        let matched = search(&query, &chunks, &params, &resolver);
        let enriched = enrich(&store, matched.clone())?;
        Ok(Retrieved { matched, enriched })
    })
    .await
}

/// Answer a question, citing the sources used.
pub async fn answer_question(ctx: &QueryContext, request: &QueryRequest) -> AppResult<Answer> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(AppError::Other("Question must not be empty".to_string()));
    }

    let started = Instant::now();
    let text = query_text(
        ctx.llm.as_ref(),
        &ctx.vision_prompt,
        &ctx.generation,
        question,
        request.image.as_deref(),
    )
    .await;

    let retrieved = retrieve(ctx, &text).await?;
    if retrieved.is_empty() {
        tracing::info!("No chunks above {:.2}", ctx.retrieval.similarity_threshold);
        return Ok(Answer::no_information());
    }

    tracing::info!(
        "Retrieved {} chunks (best {:.3})",
        retrieved.len(),
        retrieved.matched[0].similarity
    );

    let answer = synthesize(
        ctx.llm.as_ref(),
        &ctx.answer_prompt,
        &ctx.generation,
        &ctx.retrieval,
        question,
        &retrieved.enriched,
        &retrieved.matched,
    )
    .await?;

    tracing::info!(
        "Answered with {} links in {:.2}s",
        answer.links.len(),
        started.elapsed().as_secs_f64()
    );

    Ok(answer)
}
