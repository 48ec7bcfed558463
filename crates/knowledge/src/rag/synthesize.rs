//! Answer synthesis: grounding prompt, generation call, citation recovery.

use crate::rag::parse::parse_response;
use crate::rag::types::{push_unique, Answer, Citation};
use crate::types::QueryResult;
use grounded_core::{AppResult, GenerationSettings, RetrievalSettings};
use grounded_llm::{with_retry, LlmClient, LlmRequest, RetryPolicy};
use grounded_prompt::{build_prompt, PromptDefinition};
use std::collections::HashMap;

/// Context block handed to the model, one entry per result in rank order.
pub fn build_context(results: &[QueryResult], context_chars: usize) -> String {
    let mut context = String::new();
    for result in results {
        context.push_str(&format!(
            "\n\n{} (URL: {}):\n{}",
            result.chunk.kind().context_label(),
            result.url,
            truncate_chars(&result.chunk.content, context_chars)
        ));
    }
    context
}

/// Citations built from the top results when the model gave none.
pub fn fallback_citations(results: &[QueryResult], count: usize, snippet_chars: usize) -> Vec<Citation> {
    let mut links = Vec::new();
    for result in results.iter().take(count) {
        let content = &result.chunk.content;
        let snippet = truncate_chars(content, snippet_chars);
        let text = if snippet.len() < content.len() {
            format!("{}...", snippet)
        } else {
            snippet.to_string()
        };
        push_unique(&mut links, Citation::new(result.url.clone(), text));
    }
    links
}

/// Ask the model to answer `question` from `context` and parse its reply.
///
/// `context` holds the enriched results handed to the model; `matched` holds
/// the plain search hits, which are cited when the reply has no sources.
/// Both must be non-empty and ranked.
pub async fn synthesize(
    llm: &dyn LlmClient,
    prompt: &PromptDefinition,
    generation: &GenerationSettings,
    retrieval: &RetrievalSettings,
    question: &str,
    context: &[QueryResult],
    matched: &[QueryResult],
) -> AppResult<Answer> {
    let mut variables = HashMap::new();
    variables.insert("question".to_string(), question.to_string());
    variables.insert(
        "context".to_string(),
        build_context(context, retrieval.context_chars),
    );
    let built = build_prompt(prompt, variables)?;

    let mut request = LlmRequest::new(built.user, &generation.chat_model)
        .with_temperature(generation.temperature);
    if let Some(system) = built.system {
        request = request.with_system(system);
    }

    tracing::info!(
        "Generating answer from {} context blocks with {}",
        context.len(),
        generation.chat_model
    );

    let policy = RetryPolicy::from(generation);
    let response = with_retry(&policy, "answer generation", || llm.complete(&request)).await?;

    let mut answer = parse_response(&response.content);
    if answer.links.is_empty() {
        tracing::info!("No parsable sources in the response, citing top results instead");
        answer.links = fallback_citations(
            matched,
            retrieval.fallback_citations,
            retrieval.snippet_chars,
        );
    }

    Ok(answer)
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
