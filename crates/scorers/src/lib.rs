//! Scorer abstractions for zero-shot image tagging.
//!
//! A scorer owns a fixed [`Vocabulary`] of candidate tag phrases and rates a
//! batch of raster images against all of them at once, returning a ranked
//! probability distribution per image. The [`ClipScorer`] backs this with a
//! CLIP ONNX export; [`CannedScorer`] is a deterministic stand-in for tests.

mod base_tags;
mod canned;
mod clip;

pub use canned::CannedScorer;
pub use clip::ClipScorer;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("model load failed: {0}")]
    ModelLoad(String),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// One candidate tag with its softmax probability for a given image.
///
/// Probabilities over the full vocabulary sum to 1.0 for each image; a single
/// value is not an independent confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredTag {
    pub tag: String,
    pub probability: f32,
}

/// Ordered, deduplicated set of candidate tag phrases.
///
/// The ordering is lexicographic and fixed at construction; it doubles as the
/// column ordering of every score matrix a scorer produces, so it must never
/// change for the lifetime of a scorer instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    tags: Vec<String>,
}

impl Vocabulary {
    /// Build the vocabulary from the built-in base set plus custom phrases.
    pub fn new(custom: &[String]) -> Self {
        Self::finish(
            base_tags::BASE_TAGS
                .iter()
                .map(|t| t.to_string())
                .chain(custom.iter().cloned())
                .collect(),
        )
    }

    /// Build a vocabulary from an explicit tag list only (no base set).
    pub fn from_tags(tags: &[&str]) -> Self {
        Self::finish(tags.iter().map(|t| t.to_string()).collect())
    }

    fn finish(tags: Vec<String>) -> Self {
        let mut tags: Vec<String> = tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        tags.sort();
        tags.dedup();
        Self { tags }
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn position(&self, tag: &str) -> Option<usize> {
        self.tags.iter().position(|t| t == tag)
    }
}

/// A stateful scoring service constructed once per run.
///
/// Implementations are blocking; the pipeline submits one batch at a time.
pub trait TagScorer: Send + Sync {
    fn vocabulary(&self) -> &Vocabulary;

    /// Score every image against the whole vocabulary and return the `top_k`
    /// highest-probability tags per image, sorted descending.
    ///
    /// Images that cannot be decoded are left out of the returned map; a
    /// missing key means "no tags available" for that path.
    fn classify_batch(
        &self,
        image_paths: &[PathBuf],
        top_k: usize,
    ) -> Result<HashMap<PathBuf, Vec<ScoredTag>>, ScorerError>;
}

/// Load custom tag phrases from a newline-delimited file.
///
/// A missing file is not an error and yields an empty list.
pub fn load_custom_tags(path: &Path) -> io::Result<Vec<String>> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Save custom tag phrases as a deduplicated, sorted, newline-delimited file.
pub fn save_custom_tags(path: &Path, tags: &[String]) -> io::Result<()> {
    let mut tags: Vec<String> = tags
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    let mut text = tags.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    fs::write(path, text)
}

/// In-place softmax over one image's logits.
pub(crate) fn softmax(row: &mut [f32]) {
    let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in row.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in row.iter_mut() {
            *v /= sum;
        }
    }
}

/// Rank a full-vocabulary distribution and keep the `top_k` best entries.
///
/// `probs` is indexed by vocabulary order; ties keep that order (stable sort).
pub(crate) fn rank(probs: &[f32], vocabulary: &Vocabulary, top_k: usize) -> Vec<ScoredTag> {
    let mut indices: Vec<usize> = (0..probs.len().min(vocabulary.len())).collect();
    indices.sort_by(|&a, &b| probs[b].partial_cmp(&probs[a]).unwrap_or(std::cmp::Ordering::Equal));
    indices
        .into_iter()
        .take(top_k)
        .map(|i| ScoredTag {
            tag: vocabulary.tags()[i].clone(),
            probability: probs[i],
        })
        .collect()
}
