//! Pipeline controller: scan, stage, classify, move, clean up.
//!
//! One `Organizer` owns one run. Phases are strictly sequential and the only
//! mutable run state (tag cache and counters) is private to the instance, so
//! no synchronization is needed. Errors are absorbed at the smallest useful
//! scope: per file or per batch, never aborting the remainder of the run.
//! Only an unusable source directory fails the run outright.

use crate::config::{ProcessingMode, RunOptions};
use crate::files;
use crate::logsink::{LogLevel, LogSink};
use crate::naming::{self, MoveTarget};
use crate::staging::Stager;
use globset::{Glob, GlobSet, GlobSetBuilder};
use scorers::{ScoredTag, TagScorer};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Staged files scored per call; bounds the batch tensor, not concurrency.
const BATCH_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub processed: usize,
    pub skipped: usize,
    pub errored: usize,
}

pub struct Organizer {
    options: RunOptions,
    scorer: Arc<dyn TagScorer>,
    sink: LogSink,
    /// Full ranked distribution per original path, written once during the
    /// classify phase and read-only afterwards.
    cache: HashMap<PathBuf, Vec<ScoredTag>>,
    counters: RunCounters,
}

impl Organizer {
    pub fn new(options: RunOptions, scorer: Arc<dyn TagScorer>, sink: LogSink) -> Self {
        Self {
            options,
            scorer,
            sink,
            cache: HashMap::new(),
            counters: RunCounters::default(),
        }
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    /// Run the whole pipeline. Returns overall success: `true` iff no file
    /// errored. Partial failures are visible through counters and the log.
    pub fn organize(&mut self) -> bool {
        if let Err(e) = self.options.validate() {
            self.log(LogLevel::Error, format!("invalid options: {e}"));
            return false;
        }
        if fs::read_dir(&self.options.source).is_err() {
            self.log(
                LogLevel::Error,
                format!(
                    "source folder is not a readable directory: {}",
                    self.options.source.display()
                ),
            );
            return false;
        }
        let excludes = match build_globset(&self.options.exclude) {
            Ok(set) => set,
            Err(e) => {
                self.log(LogLevel::Error, format!("invalid exclude pattern: {e}"));
                return false;
            }
        };

        let selected = self.scan(&excludes);
        if selected.is_empty() {
            self.log(LogLevel::Info, "no image files found in the source folder");
            return true;
        }
        self.log(
            LogLevel::Info,
            format!("found {} image files to organize", selected.len()),
        );

        let stager = match Stager::create(&self.options.scratch_dir) {
            Ok(s) => {
                self.log(
                    LogLevel::Debug,
                    format!("created scratch directory {}", s.scratch().display()),
                );
                Some(s)
            }
            Err(e) => {
                self.log(
                    LogLevel::Warning,
                    format!("could not create scratch directory: {e}; files will be moved untagged"),
                );
                None
            }
        };

        if let Some(stager) = &stager {
            let staged = self.stage_all(stager, &selected);
            self.classify(&staged);
        }

        for path in &selected {
            self.move_one(path);
        }

        if let Some(stager) = &stager {
            match stager.cleanup() {
                Ok(()) => self.log(LogLevel::Debug, "removed scratch directory"),
                Err(e) => self.log(
                    LogLevel::Warning,
                    format!("could not remove scratch directory: {e}"),
                ),
            }
        }

        let c = self.counters;
        let ok = c.errored == 0;
        self.log(
            if ok { LogLevel::Success } else { LogLevel::Error },
            format!(
                "organization finished: {} processed, {} skipped, {} errored",
                c.processed, c.skipped, c.errored
            ),
        );
        ok
    }

    /// Walk the source tree and pick the files the active mode cares about.
    /// Non-RAW files sort first so that a classified JPEG, not its RAW
    /// sibling, drives each pair's destination name.
    fn scan(&self, excludes: &GlobSet) -> Vec<PathBuf> {
        let mut selected: Vec<PathBuf> = WalkDir::new(&self.options.source)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| !excludes.is_match(p))
            .filter(|p| files::matches_mode(p, self.options.mode))
            .collect();
        selected.sort_by_key(|p| (files::is_raw_file(p), p.clone()));
        selected
    }

    /// Produce staged rasters for the classifiable subset of the selection,
    /// keeping the mapping from staged path back to the original.
    fn stage_all(&mut self, stager: &Stager, selected: &[PathBuf]) -> Vec<(PathBuf, PathBuf)> {
        let mut staged = Vec::new();
        for path in selected {
            let result = match self.options.mode {
                ProcessingMode::JpgAndRaw => {
                    if !files::is_jpeg_file(path) {
                        continue;
                    }
                    stager.stage_jpeg(path)
                }
                ProcessingMode::RawOnly => {
                    if !files::is_raw_file(path) {
                        continue;
                    }
                    stager.stage_raw(path)
                }
            };
            match result {
                Ok(temp) => staged.push((temp, path.clone())),
                Err(e) => self.log(
                    LogLevel::Warning,
                    format!(
                        "could not stage {} for classification: {e}; it will be moved untagged",
                        path.display()
                    ),
                ),
            }
        }
        self.log(
            LogLevel::Info,
            format!("staged {} files for classification", staged.len()),
        );
        staged
    }

    /// Score staged files one batch at a time, caching the full ranked
    /// distribution per original path. A failing batch only costs its own
    /// files their tags.
    fn classify(&mut self, staged: &[(PathBuf, PathBuf)]) {
        if staged.is_empty() {
            return;
        }
        let top_k = self.scorer.vocabulary().len();
        let mut tagged = 0usize;
        for batch in staged.chunks(BATCH_SIZE) {
            let temp_paths: Vec<PathBuf> = batch.iter().map(|(t, _)| t.clone()).collect();
            match self.scorer.classify_batch(&temp_paths, top_k) {
                Ok(results) => {
                    for (temp, original) in batch {
                        if let Some(tags) = results.get(temp) {
                            self.cache.insert(original.clone(), tags.clone());
                            tagged += 1;
                        }
                    }
                    self.log(
                        LogLevel::Info,
                        format!("tagged {tagged} / {} images", staged.len()),
                    );
                }
                Err(e) => self.log(
                    LogLevel::Warning,
                    format!(
                        "classification failed for a batch of {}: {e}; those files stay untagged",
                        batch.len()
                    ),
                ),
            }
        }
    }

    fn move_one(&mut self, path: &Path) {
        if !path.exists() {
            // Relocated earlier in this pass as someone's paired sibling.
            self.counters.skipped += 1;
            self.log(
                LogLevel::Debug,
                format!("{} already relocated with its pair", path.display()),
            );
            return;
        }

        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            self.counters.skipped += 1;
            return;
        };

        let Some(taken_at) = files::capture_date(path) else {
            self.counters.skipped += 1;
            self.log(
                LogLevel::Warning,
                format!("could not determine a date for {file_name}; skipping"),
            );
            return;
        };

        let ranked = self.cache.get(path).cloned().unwrap_or_default();
        let new_name = naming::derive_filename(&file_name, &taken_at, &ranked, &self.options);
        let dest_dir = self.options.destination.join(naming::month_dir(&taken_at));
        if let Err(e) = fs::create_dir_all(&dest_dir) {
            self.counters.errored += 1;
            self.log(
                LogLevel::Error,
                format!("could not create {}: {e}", dest_dir.display()),
            );
            return;
        }
        let dest_dir = fs::canonicalize(&dest_dir).unwrap_or(dest_dir);
        let desired = dest_dir.join(&new_name);
        let source = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        match naming::resolve_destination(&desired, &source, &|p| p.exists()) {
            MoveTarget::AlreadyInPlace => {
                self.counters.skipped += 1;
                self.log(
                    LogLevel::Info,
                    format!("{file_name} is already organized; skipping"),
                );
            }
            MoveTarget::Free(dest) => match move_file(path, &dest) {
                Ok(()) => {
                    self.counters.processed += 1;
                    self.log(
                        LogLevel::Info,
                        format!(
                            "moved {file_name} -> {}",
                            dest.file_name().unwrap_or_default().to_string_lossy()
                        ),
                    );
                    self.move_paired(path, &dest);
                }
                Err(e) => {
                    self.counters.errored += 1;
                    self.log(LogLevel::Error, format!("failed to move {file_name}: {e}"));
                }
            },
        }
    }

    /// After a successful primary move, bring the complementary sibling
    /// (RAW for a JPEG, JPEG for a RAW) along under the same new base name.
    /// Failures here are logged only; the primary move stands.
    fn move_paired(&mut self, original: &Path, new_primary: &Path) {
        let complementary: &[&str] = if files::is_jpeg_file(original) {
            files::RAW_EXTENSIONS
        } else if files::is_raw_file(original) {
            files::JPEG_EXTENSIONS
        } else {
            return;
        };
        let Some(paired) = files::find_paired_file(original, complementary, &|p| p.exists())
        else {
            return;
        };

        let Some(ext) = paired.extension().and_then(|e| e.to_str()) else {
            return;
        };
        let Some(stem) = new_primary.file_stem().and_then(|s| s.to_str()) else {
            return;
        };
        let dest_dir = new_primary.parent().unwrap_or_else(|| Path::new("."));
        let desired = dest_dir.join(format!("{stem}.{}", ext.to_ascii_lowercase()));
        let source = fs::canonicalize(&paired).unwrap_or_else(|_| paired.clone());

        match naming::resolve_destination(&desired, &source, &|p| p.exists()) {
            MoveTarget::AlreadyInPlace => {
                self.log(
                    LogLevel::Debug,
                    format!("paired file {} already in place", paired.display()),
                );
            }
            MoveTarget::Free(dest) => match move_file(&paired, &dest) {
                Ok(()) => self.log(
                    LogLevel::Info,
                    format!(
                        "moved paired file {} -> {}",
                        paired.file_name().unwrap_or_default().to_string_lossy(),
                        dest.file_name().unwrap_or_default().to_string_lossy()
                    ),
                ),
                Err(e) => self.log(
                    LogLevel::Warning,
                    format!(
                        "failed to move paired file {}: {e}; keeping the primary move",
                        paired.display()
                    ),
                ),
            },
        }
    }

    fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        (self.sink)(message.as_ref(), level);
    }
}

/// Rename, falling back to copy-then-delete across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}
