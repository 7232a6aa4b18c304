//! Staging: bounded-resolution temporary rasters for classification.
//!
//! Originals are never touched; every staged artifact lives in a scratch
//! directory that the orchestrator removes at the end of the run.

use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, Rgb};
use rawloader::{RawImage, RawImageData};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Well-known scratch location, relative to the working directory.
pub const STAGING_DIR: &str = ".photosort-staging";

/// Longest edge of a staged raster, matching the scorer's input resolution.
pub const TARGET_EDGE: u32 = 224;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("raw decode failed: {0}")]
    Raw(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub struct Stager {
    scratch: PathBuf,
}

impl Stager {
    /// Create the scratch directory (idempotent) and return a stager bound
    /// to it.
    pub fn create(scratch: &Path) -> io::Result<Self> {
        fs::create_dir_all(scratch)?;
        Ok(Self {
            scratch: scratch.to_path_buf(),
        })
    }

    pub fn scratch(&self) -> &Path {
        &self.scratch
    }

    /// Downsample a JPEG into the scratch directory under its original
    /// basename.
    pub fn stage_jpeg(&self, original: &Path) -> Result<PathBuf, StageError> {
        let img = bound_to_target(image::open(original)?);
        let name = original
            .file_name()
            .ok_or_else(|| StageError::Raw(format!("no file name: {}", original.display())))?;
        let staged = self.scratch.join(name);
        img.save(&staged)?;
        Ok(staged)
    }

    /// Demosaic a RAW file with its camera white balance (no automatic
    /// brightening), downsample, and write a JPEG into the scratch directory.
    pub fn stage_raw(&self, original: &Path) -> Result<PathBuf, StageError> {
        let raw = rawloader::decode_file(original).map_err(|e| StageError::Raw(e.to_string()))?;
        let rgb = demosaic_half(&raw)
            .ok_or_else(|| StageError::Raw("unsupported sensor layout".to_string()))?;
        let img = bound_to_target(DynamicImage::ImageRgb8(rgb));
        let stem = original
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| StageError::Raw(format!("no file stem: {}", original.display())))?;
        let staged = self.scratch.join(format!("{stem}.jpg"));
        img.save(&staged)?;
        Ok(staged)
    }

    /// Best-effort recursive removal of the scratch directory.
    pub fn cleanup(&self) -> io::Result<()> {
        fs::remove_dir_all(&self.scratch)
    }
}

fn bound_to_target(img: DynamicImage) -> DynamicImage {
    if img.width().max(img.height()) > TARGET_EDGE {
        img.resize(TARGET_EDGE, TARGET_EDGE, FilterType::Lanczos3)
    } else {
        img
    }
}

/// 2x2 superpixel demosaic: each Bayer quad becomes one RGB pixel.
///
/// Black levels are subtracted, values normalized against the white level,
/// camera white-balance multipliers applied (normalized to green), and the
/// result sRGB-encoded. Brightness is left exactly where the sensor put it.
fn demosaic_half(raw: &RawImage) -> Option<ImageBuffer<Rgb<u8>, Vec<u8>>> {
    let data = match &raw.data {
        RawImageData::Integer(d) => d,
        RawImageData::Float(_) => return None,
    };
    if raw.cpp != 1 || raw.width < 2 || raw.height < 2 {
        return None;
    }

    let wb = camera_wb(raw.wb_coeffs);
    let out_w = raw.width / 2;
    let out_h = raw.height / 2;
    let mut out = ImageBuffer::new(out_w as u32, out_h as u32);

    for by in 0..out_h {
        for bx in 0..out_w {
            let mut acc = [0.0f32; 3];
            let mut cnt = [0.0f32; 3];
            for dy in 0..2 {
                for dx in 0..2 {
                    let y = by * 2 + dy;
                    let x = bx * 2 + dx;
                    let cfa_color = raw.cfa.color_at(y, x);
                    // Both green sites land on the same output channel.
                    let channel = match cfa_color {
                        0 => 0,
                        1 | 3 => 1,
                        2 => 2,
                        _ => continue,
                    };
                    let black = raw.blacklevels[cfa_color] as f32;
                    let white = raw.whitelevels[cfa_color] as f32;
                    let range = (white - black).max(1.0);
                    let v = (data[y * raw.width + x] as f32 - black).max(0.0) / range;
                    acc[channel] += v;
                    cnt[channel] += 1.0;
                }
            }
            let mut px = [0u8; 3];
            for c in 0..3 {
                let v = if cnt[c] > 0.0 { acc[c] / cnt[c] } else { 0.0 };
                let v = (v * wb[c]).clamp(0.0, 1.0);
                px[c] = (srgb_encode(v) * 255.0).round() as u8;
            }
            out.put_pixel(bx as u32, by as u32, Rgb(px));
        }
    }
    Some(out)
}

/// Camera white-balance multipliers normalized so green stays at 1.0.
/// Missing or degenerate coefficients fall back to neutral.
fn camera_wb(coeffs: [f32; 4]) -> [f32; 3] {
    let g = coeffs[1];
    if !g.is_finite() || g <= 0.0 {
        return [1.0, 1.0, 1.0];
    }
    let scale = |c: f32| if c.is_finite() && c > 0.0 { c / g } else { 1.0 };
    [scale(coeffs[0]), 1.0, scale(coeffs[2])]
}

fn srgb_encode(v: f32) -> f32 {
    if v <= 0.003_130_8 {
        12.92 * v
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}
