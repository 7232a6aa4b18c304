//! CLIP ONNX scorer: a vision tower and a text tower in a joint embedding
//! space, used for zero-shot tag classification.
//!
//! The model directory must contain `visual.onnx`, `textual.onnx` and the
//! matching `tokenizer.json`. The text tower runs once at construction to
//! encode the whole vocabulary; only the vision tower is kept for scoring.

use crate::{rank, softmax, ScoredTag, ScorerError, TagScorer, Vocabulary};
use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::{Array2, Array4};
use ort::session::Session;
use ort::value::Tensor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const INPUT_SIZE: u32 = 224;
const CONTEXT_LENGTH: usize = 77;
// Temperature the CLIP training objective bakes into the similarity logits.
const LOGIT_SCALE: f32 = 100.0;
const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

#[derive(Debug)]
pub struct ClipScorer {
    // Session::run needs &mut; the scorer itself is shared immutably.
    vision: Mutex<Session>,
    vocabulary: Vocabulary,
    /// One L2-normalized embedding row per vocabulary tag, in vocabulary order.
    text_embeddings: Vec<Vec<f32>>,
}

impl ClipScorer {
    /// Load both towers and pre-encode the vocabulary built from the base tag
    /// set plus `custom_tags`.
    pub fn load(model_dir: &Path, custom_tags: &[String]) -> Result<Self, ScorerError> {
        let vision = build_session(&model_dir.join("visual.onnx"))?;
        let mut text = build_session(&model_dir.join("textual.onnx"))?;
        let tokenizer = tokenizers::Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| ScorerError::Tokenizer(e.to_string()))?;

        let vocabulary = Vocabulary::new(custom_tags);
        tracing::info!(
            "encoding {} vocabulary tags with the text tower",
            vocabulary.len()
        );
        let text_embeddings = encode_tags(&mut text, &tokenizer, vocabulary.tags())?;

        Ok(Self {
            vision: Mutex::new(vision),
            vocabulary,
            text_embeddings,
        })
    }

    fn embed_images(&self, images: &[DynamicImage]) -> Result<Vec<Vec<f32>>, ScorerError> {
        let size = INPUT_SIZE as usize;
        let mut pixels = Array4::<f32>::zeros((images.len(), 3, size, size));
        for (n, img) in images.iter().enumerate() {
            let chw = preprocess(img);
            for c in 0..3 {
                for y in 0..size {
                    for x in 0..size {
                        pixels[[n, c, y, x]] = chw[c * size * size + y * size + x];
                    }
                }
            }
        }

        let input = Tensor::from_array(pixels)
            .map_err(|e| ScorerError::Inference(e.to_string()))?;
        let mut session = self
            .vision
            .lock()
            .map_err(|_| ScorerError::Inference("vision session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs!["pixel_values" => input])
            .map_err(|e| ScorerError::Inference(e.to_string()))?;

        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| ScorerError::Inference("vision tower produced no output".into()))?;
        let (_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| ScorerError::Inference(e.to_string()))?;
        Ok(split_rows(data, images.len()))
    }
}

impl TagScorer for ClipScorer {
    fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    fn classify_batch(
        &self,
        image_paths: &[PathBuf],
        top_k: usize,
    ) -> Result<HashMap<PathBuf, Vec<ScoredTag>>, ScorerError> {
        let mut images = Vec::new();
        let mut kept_paths = Vec::new();
        for path in image_paths {
            match image::open(path) {
                Ok(img) => {
                    images.push(img);
                    kept_paths.push(path.clone());
                }
                Err(e) => {
                    tracing::debug!("excluding undecodable image {}: {e}", path.display());
                }
            }
        }
        if images.is_empty() {
            return Ok(HashMap::new());
        }

        let embeddings = self.embed_images(&images)?;
        let mut results = HashMap::with_capacity(kept_paths.len());
        for (path, mut embedding) in kept_paths.into_iter().zip(embeddings) {
            l2_normalize(&mut embedding);
            let mut logits: Vec<f32> = self
                .text_embeddings
                .iter()
                .map(|text| dot(&embedding, text) * LOGIT_SCALE)
                .collect();
            softmax(&mut logits);
            results.insert(path, rank(&logits, &self.vocabulary, top_k));
        }
        Ok(results)
    }
}

fn build_session(path: &Path) -> Result<Session, ScorerError> {
    if !path.exists() {
        return Err(ScorerError::ModelLoad(format!(
            "model file not found: {}",
            path.display()
        )));
    }
    Session::builder()
        .and_then(|mut b| b.commit_from_file(path))
        .map_err(|e| ScorerError::ModelLoad(e.to_string()))
}

/// Encode all tag phrases through the text tower, 64 phrases at a time, and
/// return one L2-normalized row per tag.
fn encode_tags(
    session: &mut Session,
    tokenizer: &tokenizers::Tokenizer,
    tags: &[String],
) -> Result<Vec<Vec<f32>>, ScorerError> {
    let mut rows = Vec::with_capacity(tags.len());
    for chunk in tags.chunks(64) {
        let batch = chunk.len();
        let mut ids = Array2::<i64>::zeros((batch, CONTEXT_LENGTH));
        let mut mask = Array2::<i64>::zeros((batch, CONTEXT_LENGTH));
        for (i, tag) in chunk.iter().enumerate() {
            let encoding = tokenizer
                .encode(tag.as_str(), true)
                .map_err(|e| ScorerError::Tokenizer(e.to_string()))?;
            for (j, &id) in encoding.get_ids().iter().take(CONTEXT_LENGTH).enumerate() {
                ids[[i, j]] = id as i64;
            }
            for (j, &m) in encoding
                .get_attention_mask()
                .iter()
                .take(CONTEXT_LENGTH)
                .enumerate()
            {
                mask[[i, j]] = m as i64;
            }
        }

        let ids = Tensor::from_array(ids).map_err(|e| ScorerError::Inference(e.to_string()))?;
        let mask = Tensor::from_array(mask).map_err(|e| ScorerError::Inference(e.to_string()))?;
        let outputs = session
            .run(ort::inputs!["input_ids" => ids, "attention_mask" => mask])
            .map_err(|e| ScorerError::Inference(e.to_string()))?;

        let (_, value) = outputs
            .iter()
            .next()
            .ok_or_else(|| ScorerError::Inference("text tower produced no output".into()))?;
        let (_shape, data) = value
            .try_extract_tensor::<f32>()
            .map_err(|e| ScorerError::Inference(e.to_string()))?;
        for mut row in split_rows(data, batch) {
            l2_normalize(&mut row);
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Resize to the model's square input and normalize channels, CHW layout.
fn preprocess(img: &DynamicImage) -> Vec<f32> {
    let size = INPUT_SIZE as usize;
    let resized = img
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom)
        .to_rgb8();
    let mut data = vec![0.0f32; 3 * size * size];
    for (x, y, pixel) in resized.enumerate_pixels() {
        let idx = y as usize * size + x as usize;
        for c in 0..3 {
            data[c * size * size + idx] =
                (pixel[c] as f32 / 255.0 - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }
    data
}

fn split_rows(data: &[f32], rows: usize) -> Vec<Vec<f32>> {
    if rows == 0 || data.len() % rows != 0 {
        return Vec::new();
    }
    let dim = data.len() / rows;
    data.chunks(dim).map(<[f32]>::to_vec).collect()
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preprocess_produces_chw_tensor_of_expected_size() {
        let img = DynamicImage::new_rgb8(640, 480);
        let data = preprocess(&img);
        assert_eq!(data.len(), 3 * 224 * 224);
        // A black image normalizes to -mean/std per channel.
        let expected = (0.0 - CLIP_MEAN[0]) / CLIP_STD[0];
        assert!((data[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn l2_normalize_yields_unit_vector() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_leaves_zero_vector_alone() {
        let mut v = vec![0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn split_rows_partitions_evenly() {
        let rows = split_rows(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2);
        assert_eq!(rows, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn split_rows_rejects_uneven_data() {
        assert!(split_rows(&[1.0, 2.0, 3.0], 2).is_empty());
    }

    #[test]
    fn missing_model_reports_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClipScorer::load(dir.path(), &[]).unwrap_err();
        assert!(matches!(err, ScorerError::ModelLoad(_)));
    }
}
