use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_TOP_TAGS: usize = 5;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Classify JPEGs; RAW files ride along as paired siblings.
    #[default]
    JpgAndRaw,
    /// Classify RAW files themselves; plain JPEGs are not staged.
    RawOnly,
}

impl From<&str> for ProcessingMode {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "raw_only" | "raw-only" => ProcessingMode::RawOnly,
            _ => ProcessingMode::JpgAndRaw,
        }
    }
}

/// Immutable configuration for a single organization run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Custom filename prefix; empty means "derive one from camera naming".
    pub prefix: String,
    pub delimiter: String,
    /// Maximum number of tags embedded in a filename.
    pub top_tags: usize,
    /// Minimum probability a tag needs before it is eligible for a filename.
    pub confidence_threshold: f32,
    pub mode: ProcessingMode,
    /// Glob patterns excluded from the source scan.
    pub exclude: Vec<String>,
    /// Scratch directory for staged rasters, removed at run end.
    pub scratch_dir: PathBuf,
}

impl RunOptions {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            prefix: String::new(),
            delimiter: "_".to_string(),
            top_tags: DEFAULT_TOP_TAGS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            mode: ProcessingMode::default(),
            exclude: Vec::new(),
            scratch_dir: PathBuf::from(crate::staging::STAGING_DIR),
        }
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.delimiter.is_empty() {
            return Err(OptionsError::EmptyDelimiter);
        }
        if self.top_tags == 0 {
            return Err(OptionsError::NoTopTags);
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(OptionsError::ThresholdOutOfRange(self.confidence_threshold));
        }
        let parent = match self.destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !parent.is_dir() {
            return Err(OptionsError::MissingDestinationParent(parent));
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("tag delimiter must not be empty")]
    EmptyDelimiter,
    #[error("max tags per image must be at least 1")]
    NoTopTags,
    #[error("tag confidence threshold must be between 0.0 and 1.0, got {0}")]
    ThresholdOutOfRange(f32),
    #[error("parent of destination folder does not exist: {}", .0.display())]
    MissingDestinationParent(PathBuf),
}

/// Settings loadable from an optional TOML file, merged with CLI flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    #[serde(default)]
    pub naming: NamingDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: default_model_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsConfig {
    /// Newline-delimited custom tag phrases; a missing file is treated as empty.
    #[serde(default = "default_custom_tags_file")]
    pub custom_file: PathBuf,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            custom_file: default_custom_tags_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingDefaults {
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_top_tags")]
    pub top_tags: usize,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default)]
    pub mode: ProcessingMode,
}

impl Default for NamingDefaults {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            delimiter: default_delimiter(),
            top_tags: default_top_tags(),
            confidence_threshold: default_confidence_threshold(),
            mode: ProcessingMode::default(),
        }
    }
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_custom_tags_file() -> PathBuf {
    PathBuf::from("custom_tags.txt")
}

fn default_delimiter() -> String {
    "_".to_string()
}

fn default_top_tags() -> usize {
    DEFAULT_TOP_TAGS
}

fn default_confidence_threshold() -> f32 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

pub fn load(path: Option<&str>) -> anyhow::Result<AppConfig> {
    let mut settings = config::Config::builder();
    if let Some(p) = path {
        settings = settings.add_source(config::File::with_name(p));
    } else {
        settings = settings.add_source(config::File::with_name("photosort").required(false));
    }
    let cfg = settings.build()?;
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn valid_options(dir: &Path) -> RunOptions {
        RunOptions::new(dir.join("src"), dir.join("dest"))
    }

    #[test]
    fn default_options_validate() {
        let dir = tempfile::tempdir().unwrap();
        assert!(valid_options(dir.path()).validate().is_ok());
    }

    #[test]
    fn empty_delimiter_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = valid_options(dir.path());
        opts.delimiter.clear();
        assert!(matches!(opts.validate(), Err(OptionsError::EmptyDelimiter)));
    }

    #[test]
    fn zero_top_tags_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = valid_options(dir.path());
        opts.top_tags = 0;
        assert!(matches!(opts.validate(), Err(OptionsError::NoTopTags)));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = valid_options(dir.path());
        opts.confidence_threshold = 1.5;
        assert!(matches!(
            opts.validate(),
            Err(OptionsError::ThresholdOutOfRange(_))
        ));
    }

    #[test]
    fn missing_destination_parent_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = valid_options(dir.path());
        opts.destination = dir.path().join("absent").join("dest");
        assert!(matches!(
            opts.validate(),
            Err(OptionsError::MissingDestinationParent(_))
        ));
    }

    #[test]
    fn processing_mode_parses_from_strings() {
        assert_eq!(ProcessingMode::from("raw_only"), ProcessingMode::RawOnly);
        assert_eq!(ProcessingMode::from("raw-only"), ProcessingMode::RawOnly);
        assert_eq!(ProcessingMode::from("anything"), ProcessingMode::JpgAndRaw);
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let cfg = load(None).unwrap();
        assert_eq!(cfg.naming.delimiter, "_");
        assert_eq!(cfg.naming.top_tags, DEFAULT_TOP_TAGS);
        assert_eq!(cfg.model.dir, PathBuf::from("models"));
    }
}
