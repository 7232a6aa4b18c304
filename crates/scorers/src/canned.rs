//! Deterministic scorer used as a test double.

use crate::{rank, ScoredTag, ScorerError, TagScorer, Vocabulary};
use std::collections::HashMap;
use std::path::PathBuf;

/// Returns the same fixed probability distribution for every image.
///
/// The distribution always sums to 1.0: explicitly scored tags keep their
/// relative weights and any remaining mass is spread uniformly over the rest
/// of the vocabulary.
pub struct CannedScorer {
    vocabulary: Vocabulary,
    probabilities: Vec<f32>,
}

impl CannedScorer {
    /// Uniform distribution over the whole vocabulary.
    pub fn uniform(vocabulary: Vocabulary) -> Self {
        let n = vocabulary.len().max(1);
        let probabilities = vec![1.0 / n as f32; vocabulary.len()];
        Self {
            vocabulary,
            probabilities,
        }
    }

    /// Distribution with the given per-tag weights; unknown tags are ignored.
    pub fn with_scores(vocabulary: Vocabulary, scores: &[(&str, f32)]) -> Self {
        let mut probabilities = vec![0.0f32; vocabulary.len()];
        let mut placed = 0usize;
        for (tag, weight) in scores {
            if let Some(i) = vocabulary.position(tag) {
                probabilities[i] = weight.max(0.0);
                placed += 1;
            }
        }
        let assigned: f32 = probabilities.iter().sum();
        let rest = vocabulary.len() - placed;
        if assigned < 1.0 && rest > 0 {
            let fill = (1.0 - assigned) / rest as f32;
            for p in probabilities.iter_mut().filter(|p| **p == 0.0) {
                *p = fill;
            }
        }
        let total: f32 = probabilities.iter().sum();
        if total > 0.0 {
            for p in probabilities.iter_mut() {
                *p /= total;
            }
        }
        Self {
            vocabulary,
            probabilities,
        }
    }
}

impl TagScorer for CannedScorer {
    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn classify_batch(
        &self,
        image_paths: &[PathBuf],
        top_k: usize,
    ) -> Result<HashMap<PathBuf, Vec<ScoredTag>>, ScorerError> {
        Ok(image_paths
            .iter()
            .filter(|p| p.exists())
            .map(|p| (p.clone(), rank(&self.probabilities, &self.vocabulary, top_k)))
            .collect())
    }
}
