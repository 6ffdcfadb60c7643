//! BM25 lexical relevance scoring
//!
//! Term-frequency/length-normalized relevance between a tokenized query and
//! a tokenized document, given corpus-wide statistics computed once at
//! index time. Uses the Lucene IDF variant:
//! `ln(1 + (N - df + 0.5) / (df + 0.5))`.

use crate::error::{AskdbError, Result};
use ahash::{AHashMap, AHashSet};

/// BM25 tuning parameters
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    /// Term-frequency saturation. Larger values let repeated terms keep
    /// contributing; typical range 1.2-2.0.
    pub k1: f64,
    /// Document-length normalization strength, 0 (off) to 1 (full).
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// BM25 scorer over a fixed corpus
#[derive(Debug, Clone)]
pub struct Bm25 {
    avgdl: f64,
    idf: AHashMap<String, f64>,
    doc_count: usize,
    params: Bm25Params,
}

impl Bm25 {
    /// Build a scorer from a tokenized corpus with default parameters
    pub fn new(corpus: &[Vec<String>]) -> Result<Self> {
        Self::with_params(corpus, Bm25Params::default())
    }

    /// Build a scorer from a tokenized corpus with explicit parameters
    ///
    /// Fails on an empty corpus: corpus statistics would be degenerate and
    /// every score zero, which callers must not get silently.
    pub fn with_params(corpus: &[Vec<String>], params: Bm25Params) -> Result<Self> {
        if corpus.is_empty() {
            return Err(AskdbError::Config(
                "BM25 corpus must contain at least one document".to_string(),
            ));
        }

        let doc_count = corpus.len();
        let mut total_len = 0usize;
        let mut doc_freq: AHashMap<&str, usize> = AHashMap::new();

        for doc in corpus {
            total_len += doc.len();
            let unique: AHashSet<&str> = doc.iter().map(String::as_str).collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let avgdl = total_len as f64 / doc_count as f64;

        let mut idf = AHashMap::with_capacity(doc_freq.len());
        for (term, df) in doc_freq {
            let value =
                (1.0 + (doc_count as f64 - df as f64 + 0.5) / (df as f64 + 0.5)).ln();
            idf.insert(term.to_string(), value);
        }

        Ok(Self {
            avgdl,
            idf,
            doc_count,
            params,
        })
    }

    /// Score a tokenized query against a tokenized document
    ///
    /// Query terms absent from the document, or never seen at index time,
    /// contribute zero. The result is non-negative and non-decreasing in
    /// term frequency for a fixed document length.
    pub fn score(&self, query: &[String], doc: &[String]) -> f64 {
        let doc_len = doc.len() as f64;

        let mut tf_map: AHashMap<&str, usize> = AHashMap::new();
        for term in doc {
            *tf_map.entry(term.as_str()).or_insert(0) += 1;
        }

        let mut total = 0.0;
        for term in query {
            let tf = match tf_map.get(term.as_str()) {
                Some(&tf) => tf as f64,
                None => continue,
            };

            let idf = match self.idf.get(term.as_str()) {
                Some(&idf) => idf,
                None => continue,
            };

            let numerator = tf * (self.params.k1 + 1.0);
            let denominator = tf
                + self.params.k1
                    * (1.0 - self.params.b + self.params.b * doc_len / self.avgdl);

            total += idf * (numerator / denominator);
        }

        total
    }

    /// Average document length of the indexed corpus
    pub fn avgdl(&self) -> f64 {
        self.avgdl
    }

    /// Number of documents in the indexed corpus
    pub fn doc_count(&self) -> usize {
        self.doc_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    fn corpus() -> Vec<Vec<String>> {
        vec![
            tokens("monthly sales report by region"),
            tokens("product catalog and inventory"),
            tokens("sales of product lines last month"),
            tokens("customer churn analysis"),
        ]
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let result = Bm25::new(&[]);
        assert!(matches!(result, Err(AskdbError::Config(_))));
    }

    #[test]
    fn test_score_non_negative() {
        let bm = Bm25::new(&corpus()).unwrap();
        for doc in corpus() {
            let score = bm.score(&tokens("sales product region"), &doc);
            assert!(score >= 0.0, "score {} should be non-negative", score);
        }
    }

    #[test]
    fn test_empty_query_scores_zero() {
        let bm = Bm25::new(&corpus()).unwrap();
        assert_eq!(bm.score(&[], &tokens("monthly sales report")), 0.0);
    }

    #[test]
    fn test_out_of_vocabulary_query_scores_zero() {
        let bm = Bm25::new(&corpus()).unwrap();
        let score = bm.score(&tokens("zebra"), &tokens("zebra zebra zebra"));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_score_monotonic_in_term_frequency() {
        let bm = Bm25::new(&corpus()).unwrap();
        let query = tokens("sales");

        // Same document length, increasing tf of the query term
        let one = bm.score(&query, &tokens("sales report region churn"));
        let two = bm.score(&query, &tokens("sales sales region churn"));
        let three = bm.score(&query, &tokens("sales sales sales churn"));

        assert!(one > 0.0);
        assert!(two > one);
        assert!(three > two);
    }

    #[test]
    fn test_rare_term_outweighs_common_term() {
        let bm = Bm25::new(&corpus()).unwrap();

        // "churn" appears in one document, "sales" in two
        let doc = tokens("sales churn summary");
        let rare = bm.score(&tokens("churn"), &doc);
        let common = bm.score(&tokens("sales"), &doc);
        assert!(rare > common);
    }

    #[test]
    fn test_shorter_document_scores_higher() {
        let bm = Bm25::new(&corpus()).unwrap();
        let query = tokens("sales");

        let short = bm.score(&query, &tokens("sales report"));
        let long = bm.score(
            &query,
            &tokens("sales report with many additional trailing filler words"),
        );
        assert!(short > long);
    }
}
