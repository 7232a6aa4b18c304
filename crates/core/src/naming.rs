//! Filename and path derivation: sanitization, tag cleaning, camera-prefix
//! rules, and collision resolution.
//!
//! Everything here is pure. Functions that need to know whether a path is
//! occupied take an `exists` capability so tests can use in-memory fakes.

use crate::config::RunOptions;
use chrono::NaiveDateTime;
use scorers::ScoredTag;
use std::path::{Path, PathBuf};

/// Base name used when sanitization leaves nothing usable.
const FALLBACK_BASE: &str = "photo";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Year/month subtree for a capture date, e.g. `2023/06-June`.
pub fn month_dir(date: &NaiveDateTime) -> PathBuf {
    PathBuf::from(date.format("%Y").to_string()).join(date.format("%m-%B").to_string())
}

/// Restrict to filename-safe characters, turn whitespace runs into
/// underscores, collapse delimiter runs, and trim stray delimiters.
/// Idempotent.
pub fn sanitize(input: &str, delimiter: &str) -> String {
    let filtered: String = input
        .chars()
        .filter(|&c| {
            c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-') || delimiter.contains(c)
        })
        .collect();

    let mut collapsed = String::with_capacity(filtered.len());
    let mut in_space = false;
    for c in filtered.chars() {
        if c == ' ' {
            if !in_space {
                collapsed.push('_');
                in_space = true;
            }
        } else {
            collapsed.push(c);
            in_space = false;
        }
    }

    let doubled = format!("{delimiter}{delimiter}");
    while collapsed.contains(&doubled) {
        collapsed = collapsed.replace(&doubled, delimiter);
    }

    let mut out = collapsed.as_str();
    while let Some(stripped) = out.strip_prefix(delimiter) {
        out = stripped;
    }
    while let Some(stripped) = out.strip_suffix(delimiter) {
        out = stripped;
    }
    out.to_string()
}

/// Turn a vocabulary phrase into a filename fragment, or `None` when nothing
/// survives cleaning.
pub fn clean_tag(tag: &str) -> Option<String> {
    let stripped = strip_photo_prefix(tag);
    let kept: String = stripped
        .chars()
        .filter(|&c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect();
    let joined = kept.split_whitespace().collect::<Vec<_>>().join("_");
    (!joined.is_empty()).then_some(joined)
}

/// Strip a leading "a photo of (a|an|the)? " prefix, case-insensitively.
fn strip_photo_prefix(tag: &str) -> &str {
    const PREFIX: &str = "a photo of ";
    let lower = tag.to_ascii_lowercase();
    if !lower.starts_with(PREFIX) {
        return tag;
    }
    let rest = &tag[PREFIX.len()..];
    let rest_lower = &lower[PREFIX.len()..];
    for article in ["a ", "an ", "the "] {
        if rest_lower.starts_with(article) {
            return &rest[article.len()..];
        }
    }
    rest
}

struct PrefixRule {
    applies: fn(&str) -> bool,
    extract: fn(&str) -> Option<String>,
}

fn stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

/// Camera naming conventions, highest priority first.
static PREFIX_RULES: &[PrefixRule] = &[
    PrefixRule {
        applies: |name| name.starts_with("SFH_"),
        extract: |_| Some("SFH".to_string()),
    },
    // Fujifilm: keep the whole frame counter token.
    PrefixRule {
        applies: |name| name.starts_with("DSCF"),
        extract: |name| stem(name).split('_').next().map(str::to_string),
    },
    // Canon
    PrefixRule {
        applies: |name| name.starts_with("IMG_"),
        extract: |name| stem(name).split('_').next().map(str::to_string),
    },
    // Sony
    PrefixRule {
        applies: |name| name.starts_with("DSC") || name.starts_with("_DSC"),
        extract: |name| stem(name).split('.').next().map(str::to_string),
    },
];

/// Leading token recovered from a camera's filename convention, if any.
pub fn camera_prefix(original_name: &str) -> Option<String> {
    PREFIX_RULES
        .iter()
        .find(|rule| (rule.applies)(original_name))
        .and_then(|rule| (rule.extract)(original_name))
        .filter(|p| !p.is_empty())
}

/// Derive the destination filename for one photo.
///
/// Components, joined by the configured delimiter: sanitized prefix (custom,
/// or recovered from the camera convention) then `YYYYMMDD_HHMMSS` timestamp
/// then the cleaned tag fragments. Tags are filtered by the confidence
/// threshold first and only then cut to `top_tags`. The extension is carried
/// over lower-cased. Referentially transparent.
pub fn derive_filename(
    original_name: &str,
    taken_at: &NaiveDateTime,
    ranked_tags: &[ScoredTag],
    options: &RunOptions,
) -> String {
    let prefix = if options.prefix.is_empty() {
        camera_prefix(original_name)
    } else {
        let sanitized = sanitize(&options.prefix, &options.delimiter);
        (!sanitized.is_empty()).then_some(sanitized)
    };

    let tags: Vec<String> = ranked_tags
        .iter()
        .filter(|t| t.probability >= options.confidence_threshold)
        .take(options.top_tags)
        .filter_map(|t| clean_tag(&t.tag))
        .collect();

    let mut parts: Vec<String> = Vec::new();
    if let Some(p) = prefix {
        parts.push(p);
    }
    parts.push(taken_at.format(TIMESTAMP_FORMAT).to_string());
    if !tags.is_empty() {
        parts.push(tags.join(&options.delimiter));
    }

    let mut base = sanitize(&parts.join(&options.delimiter), &options.delimiter);
    if base.is_empty() {
        base = FALLBACK_BASE.to_string();
    }

    match Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
    {
        Some(ext) => format!("{base}.{}", ext.to_ascii_lowercase()),
        None => base,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveTarget {
    /// The desired path is occupied by the source file itself.
    AlreadyInPlace,
    /// First free path, possibly suffixed `_1`, `_2`, ...
    Free(PathBuf),
}

/// Resolve where a file may actually land given an occupied-path probe.
///
/// The suffix counter increments strictly, so the loop terminates as soon as
/// a free name appears. `source` must be given in the same (resolved) form as
/// `desired` for the already-in-place check to be meaningful.
pub fn resolve_destination(
    desired: &Path,
    source: &Path,
    exists: &dyn Fn(&Path) -> bool,
) -> MoveTarget {
    if !exists(desired) {
        return MoveTarget::Free(desired.to_path_buf());
    }
    if desired == source {
        return MoveTarget::AlreadyInPlace;
    }

    let stem = desired
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(FALLBACK_BASE)
        .to_string();
    let ext = desired
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_string);
    let dir = desired.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();

    let mut counter = 1usize;
    loop {
        let name = match &ext {
            Some(e) => format!("{stem}_{counter}.{e}"),
            None => format!("{stem}_{counter}"),
        };
        let candidate = dir.join(name);
        if !exists(&candidate) {
            return MoveTarget::Free(candidate);
        }
        if candidate == source {
            return MoveTarget::AlreadyInPlace;
        }
        counter += 1;
    }
}
