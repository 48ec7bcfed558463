//! Parsing of generated answers into body and citations.

use crate::rag::types::{push_unique, Answer, Citation};
use regex::Regex;
use std::sync::OnceLock;

/// Headings that open the citation block, tried in order.
const SOURCE_HEADINGS: [&str; 4] = ["Sources:", "Source:", "References:", "Reference:"];

const DEFAULT_CITATION_TEXT: &str = "Source reference";

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)URL:\s*\[(.*?)\]|url:\s*\[(.*?)\]|\[(http[^\]]+)\]|URL:\s*(http\S+)|url:\s*(http\S+)|(http\S+)",
        )
        .expect("url pattern is valid")
    })
}

fn text_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)Text:\s*\[(.*?)\]|text:\s*\[(.*?)\]|["“”](.*?)["“”]|Text:\s*"(.*?)"|text:\s*"(.*?)""#,
        )
        .expect("text pattern is valid")
    })
}

fn list_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\d+\.\s*|-\s*)").expect("list marker pattern is valid"))
}

/// Split a model response into answer text and citations.
///
/// Everything before the first source heading is the answer. Without a
/// heading the whole response is the answer and no citations are returned.
pub fn parse_response(response: &str) -> Answer {
    let split = SOURCE_HEADINGS
        .iter()
        .find_map(|heading| response.split_once(heading));

    let Some((body, sources)) = split else {
        return Answer {
            answer: response.trim().to_string(),
            links: Vec::new(),
        };
    };

    let mut links = Vec::new();
    for line in sources.lines() {
        if let Some(citation) = parse_citation_line(line) {
            push_unique(&mut links, citation);
        }
    }

    tracing::debug!(
        "Parsed answer ({} chars) and {} sources",
        body.trim().len(),
        links.len()
    );

    Answer {
        answer: body.trim().to_string(),
        links,
    }
}

fn parse_citation_line(line: &str) -> Option<Citation> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let line = list_marker().replace(line, "");

    let url = first_group(url_pattern(), &line)?;
    if !url.starts_with("http") {
        return None;
    }

    let text = first_group(text_pattern(), &line)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_CITATION_TEXT.to_string());

    Some(Citation { url, text })
}

/// Trimmed value of the first non-empty capture group of the leftmost match.
fn first_group(pattern: &Regex, line: &str) -> Option<String> {
    let captures = pattern.captures(line)?;
    captures
        .iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str())
        .find(|s| !s.is_empty())
        .map(|s| s.trim().to_string())
}
