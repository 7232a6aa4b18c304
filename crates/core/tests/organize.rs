use photosort_core::config::{ProcessingMode, RunOptions};
use photosort_core::files;
use photosort_core::logsink::null_sink;
use photosort_core::organizer::Organizer;
use scorers::{CannedScorer, ScoredTag, ScorerError, TagScorer, Vocabulary};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn test_vocabulary() -> Vocabulary {
    Vocabulary::from_tags(&[
        "a photo of a beach",
        "a photo of the sky",
        "a photo of a dog",
    ])
}

/// Beach and sky stay above a 0.05 threshold after normalization; dog falls
/// below it.
fn beach_scorer() -> Arc<dyn TagScorer> {
    Arc::new(CannedScorer::with_scores(
        test_vocabulary(),
        &[
            ("a photo of a beach", 0.8),
            ("a photo of the sky", 0.3),
            ("a photo of a dog", 0.01),
        ],
    ))
}

fn write_test_jpeg(path: &Path) {
    use image::{ImageBuffer, Rgb};
    let img = ImageBuffer::from_fn(320, 240, |x, y| {
        let intensity = ((x * y) % 256) as u8;
        Rgb([intensity, intensity / 2, 255 - intensity])
    });
    img.save(path).unwrap();
}

fn options(temp: &TempDir) -> RunOptions {
    let mut opts = RunOptions::new(temp.path().join("source"), temp.path().join("dest"));
    opts.prefix = "SFH".to_string();
    opts.top_tags = 2;
    opts.confidence_threshold = 0.05;
    opts.scratch_dir = temp.path().join("scratch");
    opts
}

/// Destination a file is expected to land at, given its pre-move mtime date.
fn expected_destination(opts: &RunOptions, source_file: &Path, base_suffix: &str) -> PathBuf {
    let date = files::capture_date(source_file).unwrap();
    opts.destination
        .join(date.format("%Y").to_string())
        .join(date.format("%m-%B").to_string())
        .join(format!(
            "SFH_{}{base_suffix}",
            date.format("%Y%m%d_%H%M%S")
        ))
}

#[test]
fn organizes_tagged_jpeg_into_dated_tree() {
    let temp = TempDir::new().unwrap();
    let opts = options(&temp);
    fs::create_dir_all(&opts.source).unwrap();
    let photo = opts.source.join("holiday.jpg");
    write_test_jpeg(&photo);
    let expected = expected_destination(&opts, &photo, "_beach_sky.jpg");

    let mut organizer = Organizer::new(opts.clone(), beach_scorer(), null_sink());
    assert!(organizer.organize());

    assert!(expected.exists(), "expected {}", expected.display());
    assert!(!photo.exists());
    assert!(!opts.scratch_dir.exists(), "scratch must be cleaned up");
    let counters = organizer.counters();
    assert_eq!(counters.processed, 1);
    assert_eq!(counters.errored, 0);
}

#[test]
fn moves_raw_sibling_with_its_jpeg() {
    let temp = TempDir::new().unwrap();
    let opts = options(&temp);
    fs::create_dir_all(&opts.source).unwrap();
    let jpeg = opts.source.join("IMG_0001.JPG");
    let raw = opts.source.join("IMG_0001.CR2");
    write_test_jpeg(&jpeg);
    fs::write(&raw, b"raw sensor payload").unwrap();

    let expected_jpeg = expected_destination(&opts, &jpeg, "_beach_sky.jpg");
    let expected_raw = expected_jpeg.with_extension("cr2");

    let mut organizer = Organizer::new(opts, beach_scorer(), null_sink());
    assert!(organizer.organize());

    assert!(expected_jpeg.exists(), "expected {}", expected_jpeg.display());
    assert!(expected_raw.exists(), "expected {}", expected_raw.display());
    assert!(!jpeg.exists());
    assert!(!raw.exists());

    // The RAW was selected too but had vanished by the time its turn came.
    let counters = organizer.counters();
    assert_eq!(counters.processed, 1);
    assert_eq!(counters.skipped, 1);
    assert_eq!(counters.errored, 0);
}

#[test]
fn occupied_destination_gets_a_suffix() {
    let temp = TempDir::new().unwrap();
    let opts = options(&temp);
    fs::create_dir_all(&opts.source).unwrap();
    let photo = opts.source.join("holiday.jpg");
    write_test_jpeg(&photo);

    let expected = expected_destination(&opts, &photo, "_beach_sky.jpg");
    fs::create_dir_all(expected.parent().unwrap()).unwrap();
    fs::write(&expected, b"someone else's photo").unwrap();

    let mut organizer = Organizer::new(opts, beach_scorer(), null_sink());
    assert!(organizer.organize());

    let suffixed = expected.with_file_name(format!(
        "{}_1.jpg",
        expected.file_stem().unwrap().to_string_lossy()
    ));
    assert!(suffixed.exists(), "expected {}", suffixed.display());
    assert_eq!(fs::read(&expected).unwrap(), b"someone else's photo");
    assert_eq!(organizer.counters().processed, 1);
}

#[test]
fn rerun_over_organized_tree_skips_instead_of_duplicating() {
    let temp = TempDir::new().unwrap();
    let opts = options(&temp);
    fs::create_dir_all(&opts.source).unwrap();
    let photo = opts.source.join("holiday.jpg");
    write_test_jpeg(&photo);
    let expected = expected_destination(&opts, &photo, "_beach_sky.jpg");

    let mut first = Organizer::new(opts.clone(), beach_scorer(), null_sink());
    assert!(first.organize());
    assert!(expected.exists());

    // Second pass reads the organized tree back as its own source.
    let mut rerun_opts = opts.clone();
    rerun_opts.source = opts.destination.clone();
    let mut second = Organizer::new(rerun_opts, beach_scorer(), null_sink());
    assert!(second.organize());

    let counters = second.counters();
    assert_eq!(counters.processed, 0);
    assert_eq!(counters.skipped, 1);
    assert!(expected.exists());
    let siblings: Vec<_> = fs::read_dir(expected.parent().unwrap())
        .unwrap()
        .collect();
    assert_eq!(siblings.len(), 1, "no duplicate may appear on re-run");
}

#[test]
fn missing_source_fails_fast() {
    let temp = TempDir::new().unwrap();
    let opts = options(&temp);
    // Source never created.
    let mut organizer = Organizer::new(opts.clone(), beach_scorer(), null_sink());
    assert!(!organizer.organize());
    assert_eq!(organizer.counters(), Default::default());
    assert!(!opts.destination.exists(), "nothing may be written");
}

#[test]
fn empty_source_succeeds_without_output() {
    let temp = TempDir::new().unwrap();
    let opts = options(&temp);
    fs::create_dir_all(&opts.source).unwrap();

    let mut organizer = Organizer::new(opts.clone(), beach_scorer(), null_sink());
    assert!(organizer.organize());
    assert_eq!(organizer.counters(), Default::default());
    assert!(!opts.destination.exists());
}

struct FailingScorer(Vocabulary);

impl TagScorer for FailingScorer {
    fn vocabulary(&self) -> &Vocabulary {
        &self.0
    }

    fn classify_batch(
        &self,
        _image_paths: &[PathBuf],
        _top_k: usize,
    ) -> Result<HashMap<PathBuf, Vec<ScoredTag>>, ScorerError> {
        Err(ScorerError::Inference("canned failure".to_string()))
    }
}

#[test]
fn scorer_failure_leaves_files_untagged_but_moved() {
    let temp = TempDir::new().unwrap();
    let opts = options(&temp);
    fs::create_dir_all(&opts.source).unwrap();
    let photo = opts.source.join("holiday.jpg");
    write_test_jpeg(&photo);
    let expected = expected_destination(&opts, &photo, ".jpg");

    let scorer = Arc::new(FailingScorer(test_vocabulary()));
    let mut organizer = Organizer::new(opts, scorer, null_sink());
    assert!(organizer.organize(), "a failing batch must not fail the run");

    assert!(expected.exists(), "expected {}", expected.display());
    let counters = organizer.counters();
    assert_eq!(counters.processed, 1);
    assert_eq!(counters.errored, 0);
}

#[test]
fn undecodable_jpeg_still_moves_without_tags() {
    let temp = TempDir::new().unwrap();
    let opts = options(&temp);
    fs::create_dir_all(&opts.source).unwrap();
    let broken = opts.source.join("broken.jpg");
    fs::write(&broken, b"not actually image data").unwrap();
    let expected = expected_destination(&opts, &broken, ".jpg");

    let mut organizer = Organizer::new(opts, beach_scorer(), null_sink());
    assert!(organizer.organize());

    assert!(expected.exists(), "expected {}", expected.display());
    assert_eq!(organizer.counters().processed, 1);
}

#[test]
fn excluded_globs_are_left_alone() {
    let temp = TempDir::new().unwrap();
    let mut opts = options(&temp);
    opts.exclude = vec!["*.tmp.jpg".to_string()];
    fs::create_dir_all(&opts.source).unwrap();
    let kept = opts.source.join("keep.jpg");
    let excluded = opts.source.join("scratchpad.tmp.jpg");
    write_test_jpeg(&kept);
    write_test_jpeg(&excluded);

    let mut organizer = Organizer::new(opts.clone(), beach_scorer(), null_sink());
    assert!(organizer.organize());

    assert!(excluded.exists(), "excluded file must not move");
    assert!(!kept.exists());
    assert_eq!(organizer.counters().processed, 1);
}
