//! Hybrid retrieval across parallel paths
//!
//! Issues the query to every configured retrieval path concurrently and
//! fuses the ranked results with RRF. Join semantics are explicit: by
//! default every path must succeed before fusion runs, because RRF quality
//! degrades unpredictably when a path silently contributes nothing.
//!
//! Cancellation piggybacks on future cancellation: dropping the caller's
//! request future drops all in-flight path futures with it.

use crate::config::{JoinMode, RetrievalConfig};
use crate::retrieval::{reciprocal_rank_fusion, Document, FusionConfig};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Retrieval path '{path}' failed: {message}")]
    PathFailed { path: String, message: String },

    #[error("All retrieval paths failed: {failures:?}")]
    AllPathsFailed { failures: Vec<String> },

    #[error("Query text cannot be empty")]
    EmptyQuery,

    #[error("No retrieval paths configured")]
    NoPaths,
}

/// A single retrieval path producing a ranked document list
///
/// One independent call per path per query; implementations must not share
/// mutable state between calls. Only the ranked-output contract is
/// consumed here; the engine behind it (vector store, full-text index,
/// anything) is the implementor's business.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Path name used in logs and error reports
    fn name(&self) -> &str;

    /// Retrieve a ranked list for the query, best match first
    async fn retrieve(&self, query: &str) -> anyhow::Result<Vec<Document>>;
}

/// Fans a query out to all retrieval paths and fuses the ranked results
pub struct HybridRetriever {
    paths: Vec<Arc<dyn Retriever>>,
    fusion: FusionConfig,
    join_mode: JoinMode,
}

impl HybridRetriever {
    pub fn new(
        paths: Vec<Arc<dyn Retriever>>,
        config: &RetrievalConfig,
    ) -> crate::error::Result<Self> {
        if paths.is_empty() {
            return Err(RetrievalError::NoPaths.into());
        }

        let fusion = FusionConfig::new(config.rrf_k, config.top_k)?;

        Ok(Self {
            paths,
            fusion,
            join_mode: config.join_mode,
        })
    }

    /// Run all paths concurrently, join per the configured mode, fuse
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let mut in_flight: FuturesUnordered<_> = self
            .paths
            .iter()
            .map(|path| {
                let path = Arc::clone(path);
                async move {
                    path.retrieve(query)
                        .await
                        .map_err(|e| RetrievalError::PathFailed {
                            path: path.name().to_string(),
                            message: e.to_string(),
                        })
                }
            })
            .collect();

        let lists = match self.join_mode {
            JoinMode::RequireAll => {
                let mut lists = Vec::with_capacity(self.paths.len());
                while let Some(result) = in_flight.next().await {
                    // Fail fast: a partial set must never reach fusion
                    lists.push(result?);
                }
                lists
            }
            JoinMode::FirstSuccess => {
                let mut failures = Vec::new();
                let mut first = None;
                while let Some(result) = in_flight.next().await {
                    match result {
                        Ok(list) => {
                            first = Some(list);
                            break;
                        }
                        Err(e) => failures.push(e.to_string()),
                    }
                }
                match first {
                    Some(list) => vec![list],
                    None => return Err(RetrievalError::AllPathsFailed { failures }),
                }
            }
        };

        let candidates: usize = lists.iter().map(Vec::len).sum();
        tracing::debug!(paths = lists.len(), candidates, "fusing retrieval paths");

        Ok(reciprocal_rank_fusion(lists, &self.fusion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;

    struct FixedPath {
        name: String,
        docs: Vec<Document>,
    }

    #[async_trait]
    impl Retriever for FixedPath {
        fn name(&self) -> &str {
            &self.name
        }

        async fn retrieve(&self, _query: &str) -> anyhow::Result<Vec<Document>> {
            Ok(self.docs.clone())
        }
    }

    struct FailingPath;

    #[async_trait]
    impl Retriever for FailingPath {
        fn name(&self) -> &str {
            "failing"
        }

        async fn retrieve(&self, _query: &str) -> anyhow::Result<Vec<Document>> {
            anyhow::bail!("index unavailable")
        }
    }

    fn fixed(name: &str, ids: &[&str]) -> Arc<dyn Retriever> {
        Arc::new(FixedPath {
            name: name.to_string(),
            docs: ids
                .iter()
                .map(|id| Document::new(*id, format!("content {}", id)))
                .collect(),
        })
    }

    #[tokio::test]
    async fn test_fuses_all_paths() {
        let retriever = HybridRetriever::new(
            vec![fixed("vector", &["a", "b", "c"]), fixed("lexical", &["b", "a"])],
            &RetrievalConfig::default(),
        )
        .unwrap();

        let fused = retriever.retrieve("top products").await.unwrap();

        assert_eq!(fused.len(), 3);
        // a and b appear in both paths; the tie between them breaks by id
        assert_eq!(fused[0].id, "a");
        assert_eq!(fused[1].id, "b");
        assert_eq!(fused[2].id, "c");
    }

    #[tokio::test]
    async fn test_require_all_fails_on_any_path_error() {
        let retriever = HybridRetriever::new(
            vec![fixed("vector", &["a"]), Arc::new(FailingPath)],
            &RetrievalConfig::default(),
        )
        .unwrap();

        let result = retriever.retrieve("top products").await;
        assert!(matches!(result, Err(RetrievalError::PathFailed { .. })));
    }

    #[tokio::test]
    async fn test_first_success_tolerates_failed_path() {
        let config = RetrievalConfig {
            join_mode: JoinMode::FirstSuccess,
            ..RetrievalConfig::default()
        };
        let retriever = HybridRetriever::new(
            vec![Arc::new(FailingPath), fixed("vector", &["a", "b"])],
            &config,
        )
        .unwrap();

        let fused = retriever.retrieve("top products").await.unwrap();
        assert_eq!(fused.len(), 2);
    }

    #[tokio::test]
    async fn test_first_success_with_all_paths_failed() {
        let config = RetrievalConfig {
            join_mode: JoinMode::FirstSuccess,
            ..RetrievalConfig::default()
        };
        let retriever =
            HybridRetriever::new(vec![Arc::new(FailingPath)], &config).unwrap();

        let result = retriever.retrieve("top products").await;
        assert!(matches!(result, Err(RetrievalError::AllPathsFailed { .. })));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let retriever = HybridRetriever::new(
            vec![fixed("vector", &["a"])],
            &RetrievalConfig::default(),
        )
        .unwrap();

        let result = retriever.retrieve("   ").await;
        assert!(matches!(result, Err(RetrievalError::EmptyQuery)));
    }

    #[test]
    fn test_no_paths_rejected() {
        let result = HybridRetriever::new(Vec::new(), &RetrievalConfig::default());
        assert!(result.is_err());
    }
}
