//! Answer pipeline against a real store with scripted providers.

use super::{axis, page_chunk, post_chunk, TopicEmbedder, FILLER};
use crate::rag::{answer_question, retrieve, Citation, QueryContext, QueryRequest};
use crate::search::UrlResolver;
use crate::store::CorpusStore;
use crate::types::Chunk;
use grounded_core::{AppError, GenerationSettings, RetrievalSettings};
use grounded_llm::MockLlmClient;
use grounded_prompt::{builtin_prompt, ANSWER_PROMPT_ID, VISION_PROMPT_ID};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    llm: Arc<MockLlmClient>,
    ctx: QueryContext,
}

fn fixture(chunks: &[Chunk]) -> Fixture {
    let dir = TempDir::new().unwrap();
    let store_path = dir.path().join("corpus.db");
    let mut store = CorpusStore::open(&store_path).unwrap();
    store.insert_chunks(chunks).unwrap();
    drop(store);

    let llm = Arc::new(MockLlmClient::new());
    let ctx = QueryContext {
        store_path,
        embedder: Arc::new(TopicEmbedder),
        llm: llm.clone(),
        retrieval: RetrievalSettings::default(),
        generation: GenerationSettings {
            provider: "mock".into(),
            rate_limit_backoff_ms: 0,
            transient_backoff_ms: 0,
            ..GenerationSettings::default()
        },
        resolver: UrlResolver::new("https://forum.example", "https://docs.example"),
        answer_prompt: builtin_prompt(ANSWER_PROMPT_ID).unwrap(),
        vision_prompt: builtin_prompt(VISION_PROMPT_ID).unwrap(),
    };

    Fixture { _dir: dir, llm, ctx }
}

fn corpus() -> Vec<Chunk> {
    vec![
        post_chunk(1, 0, "Use the gpt model named in the question.", axis(1)),
        post_chunk(1, 1, "Token counts are checked by the grader.", axis(1)),
        post_chunk(1, 2, "Thanks, that worked.", axis(FILLER)),
        page_chunk("podman", 0, "Containers are covered below.", axis(FILLER)),
        page_chunk("podman", 1, "We recommend Podman over Docker.", axis(0)),
        page_chunk("podman", 2, "Install it with the package manager of your distribution.", axis(FILLER)),
    ]
}

#[tokio::test]
async fn test_unrelated_question_gets_no_information_answer() {
    let f = fixture(&corpus());

    let answer = answer_question(&f.ctx, &QueryRequest::new("What is the capital of France?"))
        .await
        .unwrap();

    assert_eq!(
        answer.answer,
        "I couldn't find any relevant information in my knowledge base."
    );
    assert!(answer.links.is_empty());
    assert!(f.llm.requests().is_empty(), "No generation call without context");
}

#[tokio::test]
async fn test_retrieve_enriches_with_neighbours() {
    let f = fixture(&corpus());

    let retrieved = retrieve(&f.ctx, "Docker or Podman?").await.unwrap();

    assert_eq!(retrieved.len(), 1);
    assert_eq!(retrieved.enriched.len(), 1);
    assert_eq!(retrieved.enriched[0].url, "https://docs.example/#/podman");
    assert_eq!(
        retrieved.enriched[0].chunk.content,
        "Containers are covered below. We recommend Podman over Docker. Install it with the package manager of your distribution."
    );
    assert_eq!(retrieved.matched[0].chunk.content, "We recommend Podman over Docker.");
    assert_eq!(retrieved.matched[0].ordinal, retrieved.enriched[0].ordinal);
}

#[tokio::test]
async fn test_answer_cites_model_sources() {
    let f = fixture(&corpus());
    f.llm.push_reply(Ok(
        "Use the model from the question.\n\nSources:\n1. URL: [https://forum.example/t/topic-1/101/1], Text: [Use the gpt model]"
            .to_string(),
    ));

    let answer = answer_question(&f.ctx, &QueryRequest::new("Which gpt model should I use?"))
        .await
        .unwrap();

    assert_eq!(answer.answer, "Use the model from the question.");
    assert_eq!(
        answer.links,
        vec![Citation::new("https://forum.example/t/topic-1/101/1", "Use the gpt model")]
    );

    let requests = f.llm.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .prompt
        .contains("Discourse post (URL: https://forum.example/t/topic-1/101/1)"));
    assert!(requests[0].prompt.contains("Token counts are checked by the grader."));
}

#[tokio::test]
async fn test_answer_without_sources_cites_top_results() {
    let f = fixture(&corpus());

    let answer = answer_question(&f.ctx, &QueryRequest::new("Docker or Podman?"))
        .await
        .unwrap();

    assert_eq!(answer.answer, grounded_llm::DEFAULT_MOCK_REPLY);
    assert_eq!(answer.links.len(), 1);
    assert_eq!(
        answer.links[0],
        Citation::new("https://docs.example/#/podman", "We recommend Podman over Docker.")
    );

    // the model still saw the neighbours
    assert!(f.llm.requests()[0]
        .prompt
        .contains("Containers are covered below. We recommend Podman over Docker."));
}

#[tokio::test]
async fn test_image_description_steers_retrieval() {
    let f = fixture(&corpus());
    f.llm
        .push_reply(Ok("A screenshot of the gpt model picker".to_string()));
    f.llm.push_reply(Ok(
        "Pick the listed model.\nSources:\nhttps://forum.example/t/topic-1/101/1".to_string(),
    ));

    let request = QueryRequest::new("Which one should I pick?").with_image("aGk=");
    let answer = answer_question(&f.ctx, &request).await.unwrap();

    assert_eq!(answer.answer, "Pick the listed model.");
    let requests = f.llm.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].image.as_deref(), Some("aGk="));
    assert!(requests[1].image.is_none());
    assert!(requests[1].prompt.contains("Question: Which one should I pick?"));
}

#[tokio::test]
async fn test_vision_failure_falls_back_to_text() {
    let f = fixture(&corpus());
    f.llm
        .push_reply(Err(AppError::ProviderTransient("vision down".into())));

    let request = QueryRequest::new("Which one should I pick?").with_image("aGk=");
    let answer = answer_question(&f.ctx, &request).await.unwrap();

    assert_eq!(answer.links.len(), 0);
    assert_eq!(f.llm.requests().len(), 1);
}

#[tokio::test]
async fn test_empty_question_rejected() {
    let f = fixture(&corpus());
    let result = answer_question(&f.ctx, &QueryRequest::new("   ")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_missing_store_is_an_error() {
    let mut f = fixture(&[]);
    f.ctx.store_path = f.ctx.store_path.with_file_name("absent.db");

    let result = answer_question(&f.ctx, &QueryRequest::new("Docker or Podman?")).await;
    assert!(matches!(result, Err(AppError::Store(_))));
}
