//! Extension predicates, paired-file discovery, and capture-date extraction.

use crate::config::ProcessingMode;
use chrono::{NaiveDateTime, Timelike};
use std::fs;
use std::path::{Path, PathBuf};

pub const RAW_EXTENSIONS: &[&str] = &[
    "cr2", "cr3", "nef", "arw", "raf", "orf", "rw2", "dng", "pef",
];

pub const JPEG_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "cr2", "cr3", "nef", "arw", "raf",
    "orf", "rw2", "dng", "pef",
];

fn ext_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn is_image_file(path: &Path) -> bool {
    ext_lower(path).is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_raw_file(path: &Path) -> bool {
    ext_lower(path).is_some_and(|e| RAW_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_jpeg_file(path: &Path) -> bool {
    ext_lower(path).is_some_and(|e| JPEG_EXTENSIONS.contains(&e.as_str()))
}

/// Whether a file belongs to the active processing mode's selection.
pub fn matches_mode(path: &Path, mode: ProcessingMode) -> bool {
    match mode {
        ProcessingMode::JpgAndRaw => is_image_file(path),
        ProcessingMode::RawOnly => is_raw_file(path),
    }
}

/// Find a sibling of `path` sharing its stem with one of the given extensions.
///
/// Both lower- and upper-case spellings of each extension are probed. The
/// `exists` capability keeps this pure for tests.
pub fn find_paired_file(
    path: &Path,
    extensions: &[&str],
    exists: &dyn Fn(&Path) -> bool,
) -> Option<PathBuf> {
    let own_ext = ext_lower(path)?;
    let stem = path.file_stem()?.to_str()?;
    let dir = path.parent()?;
    for ext in extensions {
        if ext.eq_ignore_ascii_case(&own_ext) {
            continue;
        }
        for spelled in [ext.to_ascii_lowercase(), ext.to_ascii_uppercase()] {
            let candidate = dir.join(format!("{stem}.{spelled}"));
            if exists(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

/// Best date available for a photo: EXIF capture time first, file modification
/// time second. `None` means the file should be skipped.
///
/// EXIF-derived timestamps are truncated to hour precision; the mtime
/// fallback keeps full precision.
pub fn capture_date(path: &Path) -> Option<NaiveDateTime> {
    exif_date(path).or_else(|| mtime_date(path))
}

fn exif_date(path: &Path) -> Option<NaiveDateTime> {
    let file = fs::File::open(path).ok()?;
    let mut reader = std::io::BufReader::new(&file);
    let data = exif::Reader::new().read_from_container(&mut reader).ok()?;
    for tag in [exif::Tag::DateTimeOriginal, exif::Tag::DateTime] {
        let Some(field) = data.get_field(tag, exif::In::PRIMARY) else {
            continue;
        };
        if let Some(date) = parse_exif_datetime(&field.display_value().to_string()) {
            return date.with_minute(0).and_then(|d| d.with_second(0));
        }
    }
    None
}

fn parse_exif_datetime(value: &str) -> Option<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y:%m:%d %H:%M:%S"] {
        if let Ok(date) = NaiveDateTime::parse_from_str(value.trim(), format) {
            return Some(date);
        }
    }
    None
}

fn mtime_date(path: &Path) -> Option<NaiveDateTime> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let local: chrono::DateTime<chrono::Local> = modified.into();
    Some(local.naive_local())
}
