//! Reciprocal Rank Fusion for combining ranked retrieval paths
//!
//! RRF depends only on rank positions, never on raw scores, so lists from
//! heterogeneous engines (cosine similarity, BM25, ...) combine without
//! cross-system normalization: `score(id) = Σ 1 / (k + rank + 1)` over all
//! lists containing the document, with 0-based ranks.

use crate::retrieval::Document;
use ahash::AHashMap;
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Invalid fusion configuration: top_k must be greater than 0")]
    InvalidTopK,

    #[error("Invalid fusion configuration: rrf_k must be positive, got {0}")]
    InvalidSmoothing(f64),
}

/// Configuration for the fusion algorithm
#[derive(Debug, Clone)]
pub struct FusionConfig {
    /// RRF smoothing constant (typically 60). Larger values flatten the
    /// score gap between high ranks.
    pub rrf_k: f64,

    /// Result count after fusion
    pub top_k: usize,
}

impl FusionConfig {
    pub fn new(rrf_k: f64, top_k: usize) -> Result<Self, FusionError> {
        if top_k == 0 {
            return Err(FusionError::InvalidTopK);
        }
        if rrf_k <= 0.0 {
            return Err(FusionError::InvalidSmoothing(rrf_k));
        }

        Ok(Self { rrf_k, top_k })
    }
}

/// Apply Reciprocal Rank Fusion to any number of ranked lists
///
/// Scores accumulate per document id across lists; the first-seen payload
/// is kept for each id. Documents with an empty id cannot be deduplicated
/// and are skipped. Ties on fused score break deterministically by id
/// ascending (stable sort with an explicit secondary key), so equal-score
/// orderings are reproducible across runs.
///
/// Fusing a single list preserves its original relative order.
pub fn reciprocal_rank_fusion(
    lists: Vec<Vec<Document>>,
    config: &FusionConfig,
) -> Vec<Document> {
    let mut scores: AHashMap<String, f64> = AHashMap::new();
    let mut payloads: AHashMap<String, Document> = AHashMap::new();

    for list in lists {
        for (rank, doc) in list.into_iter().enumerate() {
            if doc.id.is_empty() {
                continue;
            }

            let rrf_score = 1.0 / (config.rrf_k + rank as f64 + 1.0);
            *scores.entry(doc.id.clone()).or_insert(0.0) += rrf_score;
            payloads.entry(doc.id.clone()).or_insert(doc);
        }
    }

    let mut fused: Vec<Document> = scores
        .into_iter()
        .filter_map(|(id, score)| payloads.remove(&id).map(|doc| doc.with_score(score)))
        .collect();

    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    fused.truncate(config.top_k);

    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> Document {
        Document::new(id, format!("content of {}", id))
    }

    fn config(top_k: usize) -> FusionConfig {
        FusionConfig::new(60.0, top_k).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            FusionConfig::new(60.0, 0),
            Err(FusionError::InvalidTopK)
        ));
        assert!(matches!(
            FusionConfig::new(0.0, 5),
            Err(FusionError::InvalidSmoothing(_))
        ));
    }

    #[test]
    fn test_documents_in_both_lists_rank_higher() {
        let lists = vec![
            vec![doc("a"), doc("b"), doc("c")],
            vec![doc("b"), doc("a"), doc("d")],
        ];

        let fused = reciprocal_rank_fusion(lists, &config(10));

        assert_eq!(fused.len(), 4);
        // a and b appear in both lists, c and d in one each
        assert!(fused[0].id == "a" || fused[0].id == "b");
        assert!(fused[1].id == "a" || fused[1].id == "b");
    }

    #[test]
    fn test_equal_scores_tie_break_by_id() {
        // fused(a) = 1/61 + 1/62, fused(b) = 1/62 + 1/61: exactly equal
        let lists = vec![vec![doc("a"), doc("b"), doc("c")], vec![doc("b"), doc("a")]];

        let fused = reciprocal_rank_fusion(lists, &config(10));

        let a_score = 1.0 / 61.0 + 1.0 / 62.0;
        assert!((fused[0].score - a_score).abs() < 1e-12);
        assert!((fused[1].score - a_score).abs() < 1e-12);

        // Deterministic tie-break: id ascending
        assert_eq!(fused[0].id, "a");
        assert_eq!(fused[1].id, "b");
    }

    #[test]
    fn test_single_list_preserves_order() {
        let list: Vec<Document> = ["w", "x", "y", "z"].iter().map(|id| doc(id)).collect();

        let fused = reciprocal_rank_fusion(vec![list], &config(10));

        let ids: Vec<&str> = fused.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["w", "x", "y", "z"]);
    }

    #[test]
    fn test_rank_improvement_strictly_increases_score() {
        let baseline = reciprocal_rank_fusion(
            vec![vec![doc("a"), doc("b")], vec![doc("c"), doc("b")]],
            &config(10),
        );
        let improved = reciprocal_rank_fusion(
            vec![vec![doc("a"), doc("b")], vec![doc("b"), doc("c")]],
            &config(10),
        );

        let score_of = |fused: &[Document], id: &str| {
            fused.iter().find(|d| d.id == id).map(|d| d.score).unwrap()
        };

        assert!(score_of(&improved, "b") > score_of(&baseline, "b"));
    }

    #[test]
    fn test_truncates_to_top_k() {
        let lists = vec![vec![doc("a"), doc("b"), doc("c"), doc("d"), doc("e")]];

        let fused = reciprocal_rank_fusion(lists, &config(2));

        assert_eq!(fused.len(), 2);
        assert_eq!(fused[0].id, "a");
        assert_eq!(fused[1].id, "b");
    }

    #[test]
    fn test_empty_ids_skipped() {
        let lists = vec![vec![doc(""), doc("a")], vec![doc(""), doc("b")]];

        let fused = reciprocal_rank_fusion(lists, &config(10));

        assert_eq!(fused.len(), 2);
        assert!(fused.iter().all(|d| !d.id.is_empty()));
    }
}
