//! RAG request and response types.

use serde::{Deserialize, Serialize};

/// Answer returned when retrieval finds nothing above the threshold.
pub const NO_INFORMATION_ANSWER: &str =
    "I couldn't find any relevant information in my knowledge base.";

/// A question, optionally with a base64-encoded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image_base64: impl Into<String>) -> Self {
        self.image = Some(image_base64.into());
        self
    }
}

/// A cited source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    pub text: String,
}

impl Citation {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
        }
    }
}

/// Final answer plus its sources. `links` never repeats a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub links: Vec<Citation>,
}

impl Answer {
    pub fn no_information() -> Self {
        Self {
            answer: NO_INFORMATION_ANSWER.to_string(),
            links: Vec::new(),
        }
    }
}

/// Append `citation` unless its URL is already present.
pub(crate) fn push_unique(links: &mut Vec<Citation>, citation: Citation) {
    if !links.iter().any(|existing| existing.url == citation.url) {
        links.push(citation);
    }
}
