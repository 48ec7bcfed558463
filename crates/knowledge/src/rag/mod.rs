//! Question answering over the corpus.
//!
//! Builds the query text (optionally describing an attached image), retrieves
//! and enriches matching chunks, then asks the model for a cited answer.

pub mod parse;
pub mod pipeline;
pub mod query;
pub mod synthesize;
pub mod types;

pub use parse::parse_response;
pub use pipeline::{answer_question, retrieve, QueryContext, Retrieved};
pub use query::{describe_image, query_text};
pub use synthesize::{build_context, fallback_citations, synthesize};
pub use types::{Answer, Citation, QueryRequest, NO_INFORMATION_ANSWER};
