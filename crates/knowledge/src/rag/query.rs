//! Query text construction, including the optional image description step.

use grounded_core::{AppError, AppResult, GenerationSettings};
use grounded_llm::{LlmClient, LlmRequest};
use grounded_prompt::{build_prompt, PromptDefinition};
use std::collections::HashMap;

/// Ask the vision model what `image` shows with respect to `question`.
pub async fn describe_image(
    llm: &dyn LlmClient,
    prompt: &PromptDefinition,
    generation: &GenerationSettings,
    question: &str,
    image_base64: &str,
) -> AppResult<String> {
    let mut variables = HashMap::new();
    variables.insert("question".to_string(), question.to_string());
    let built = build_prompt(prompt, variables)?;

    let mut request = LlmRequest::new(built.user, generation.vision_model()).with_image(image_base64);
    if let Some(system) = built.system {
        request = request.with_system(system);
    }

    let response = llm.complete(&request).await?;
    let description = response.content.trim().to_string();
    if description.is_empty() {
        return Err(AppError::ProviderTransient(
            "Vision model returned an empty description".to_string(),
        ));
    }

    Ok(description)
}

/// Text to embed for a query.
///
/// With an image, the description is appended as `Image context:`. If the
/// description step fails for any reason the question alone is used.
pub async fn query_text(
    llm: &dyn LlmClient,
    prompt: &PromptDefinition,
    generation: &GenerationSettings,
    question: &str,
    image_base64: Option<&str>,
) -> String {
    let Some(image) = image_base64.filter(|img| !img.trim().is_empty()) else {
        return question.to_string();
    };

    match describe_image(llm, prompt, generation, question, image).await {
        Ok(description) => {
            tracing::debug!("Image description: {} chars", description.len());
            format!("{}\nImage context: {}", question, description)
        }
        Err(e) => {
            tracing::warn!("Image processing failed, continuing with text only: {}", e);
            question.to_string()
        }
    }
}
