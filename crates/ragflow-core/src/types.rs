//! Common types used across the ragflow system

use serde::{Deserialize, Serialize};

fn default_relevance() -> f32 {
    0.5
}

/// Verdict of an LLM grader
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Whether the graded item is valid
    pub score: bool,
    /// Grader certainty in `[0.0, 1.0]`
    #[serde(default = "default_relevance")]
    pub relevance_score: f32,
}

impl Evaluation {
    /// Create an evaluation, clamping the relevance into `[0.0, 1.0]`
    pub fn new(score: bool, relevance_score: f32) -> Self {
        let relevance_score = if relevance_score.is_nan() {
            default_relevance()
        } else {
            relevance_score.clamp(0.0, 1.0)
        };
        Self {
            score,
            relevance_score,
        }
    }

    /// Valid and strictly more certain than `threshold`
    pub fn passes(&self, threshold: f32) -> bool {
        self.score && self.relevance_score > threshold
    }
}

/// Result of an indexing operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexingResult {
    pub documents_indexed: usize,
    pub chunks_indexed: usize,
    pub chunks_failed: usize,
    pub errors: Vec<String>,
}

impl IndexingResult {
    /// Fold another result into this one
    pub fn merge(&mut self, other: IndexingResult) {
        self.documents_indexed += other.documents_indexed;
        self.chunks_indexed += other.chunks_indexed;
        self.chunks_failed += other.chunks_failed;
        self.errors.extend(other.errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_clamps() {
        assert_eq!(Evaluation::new(true, 1.7).relevance_score, 1.0);
        assert_eq!(Evaluation::new(true, -0.2).relevance_score, 0.0);
        assert_eq!(Evaluation::new(false, f32::NAN).relevance_score, 0.5);
    }

    #[test]
    fn test_evaluation_default_relevance() {
        let eval: Evaluation = serde_json::from_str(r#"{"score": true}"#).unwrap();
        assert!(eval.score);
        assert_eq!(eval.relevance_score, 0.5);
    }

    #[test]
    fn test_evaluation_passes_is_strict() {
        assert!(Evaluation::new(true, 0.66).passes(0.65));
        assert!(!Evaluation::new(true, 0.65).passes(0.65));
        assert!(!Evaluation::new(false, 0.99).passes(0.65));
    }

    #[test]
    fn test_indexing_result_merge() {
        let mut total = IndexingResult::default();
        total.merge(IndexingResult {
            documents_indexed: 1,
            chunks_indexed: 4,
            chunks_failed: 1,
            errors: vec!["boom".to_string()],
        });
        total.merge(IndexingResult {
            documents_indexed: 1,
            chunks_indexed: 2,
            chunks_failed: 0,
            errors: vec![],
        });

        assert_eq!(total.documents_indexed, 2);
        assert_eq!(total.chunks_indexed, 6);
        assert_eq!(total.chunks_failed, 1);
        assert_eq!(total.errors, vec!["boom".to_string()]);
    }
}
