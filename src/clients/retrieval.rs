//! Knowledge-base retrieval boundary.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A retrieved passage with its relevance score.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub score: f32,
}

impl Passage {
    #[must_use]
    pub fn new(content: impl Into<String>, score: f32) -> Self {
        Self {
            content: content.into(),
            score,
        }
    }
}

/// Errors from a retrieval backend.
#[derive(Debug, Error, Diagnostic)]
pub enum RetrievalError {
    #[error("retrieval backend error: {0}")]
    #[diagnostic(code(convograph::retrieval::backend))]
    Backend(String),
}

/// A knowledge-base search backend.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` passages relevant to `query`, best first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError>;
}
