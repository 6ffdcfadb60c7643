//! Hybrid retrieval with rank fusion
//!
//! This module combines multiple independently ranked retrieval paths into
//! one ranked context list via Reciprocal Rank Fusion, with a BM25 lexical
//! scorer for keyword-style paths.

mod bm25;
mod fusion;
mod hybrid;

pub use bm25::{Bm25, Bm25Params};
pub use fusion::{reciprocal_rank_fusion, FusionConfig, FusionError};
pub use hybrid::{HybridRetriever, RetrievalError, Retriever};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A retrieved document with its relevance score
///
/// Produced by a retrieval path, consumed and discarded after fusion.
/// The `id` must be unique within a single retrieval path; it is the
/// deduplication key across paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within one retrieval path
    pub id: String,

    /// Document content handed to the generation stage
    pub content: String,

    /// Arbitrary metadata carried through fusion untouched
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Relevance score, reassigned during ranking and fusion
    pub score: f64,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
            score: 0.0,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }
}
