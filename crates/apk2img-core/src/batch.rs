//! Parallel batch orchestration over pre-extracted artifact directories.
//!
//! Samples are independent, so encoding fans out across a rayon pool; the
//! only shared state is the atomic progress counters. Per-sample problems
//! land in the batch report; only consistency errors (corrupt store, layout
//! mismatch) abort a run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::raster::{encode, save_png, RasterConfig};
use crate::report::{BatchReport, SampleOutcome, SampleReport};
use crate::store::SampleStore;
use crate::vector::{vector_to_bytes, LabelRule, Vectorizer};
use crate::vocab::Vocabulary;

/// Artifact blob names the extractor produces, and the raster category each
/// one feeds. The extractor owns producing the blobs; this module only maps
/// them onto channels.
pub const ARTIFACT_CHANNELS: [(&str, &str); 4] = [
    ("AndroidManifest.xml", "xml"),
    ("resources.arsc", "arsc"),
    ("classes.dex", "dex"),
    ("classes.jar", "jar"),
];

#[derive(Debug, Clone)]
pub struct EncodeConfig {
    /// Directory of per-sample subdirectories holding extracted blobs.
    pub input_dir: PathBuf,
    /// Root that receives the `<category>_images/` directories.
    pub output_dir: PathBuf,
    pub raster: RasterConfig,
}

/// Atomic progress tracking shared with a driving thread. No mutex, so the
/// workers never contend with whoever is polling.
pub struct BatchProgress {
    pub total: AtomicUsize,
    pub processed: AtomicUsize,
    pub failed: AtomicUsize,
    pub cancel: AtomicBool,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self {
            total: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            cancel: AtomicBool::new(false),
        }
    }
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Immediate subdirectories of `input_dir`, sorted: each one is one
/// extracted sample, keyed by its directory name.
pub fn collect_sample_dirs(input_dir: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect();
    dirs.sort();
    dirs
}

/// Encode every artifact of every sample into per-category rasters.
/// Blocking; call from a background thread when driving a UI.
pub fn run_encode(config: &EncodeConfig, progress: &Arc<BatchProgress>) -> Result<BatchReport> {
    let samples = collect_sample_dirs(&config.input_dir);
    progress.total.store(samples.len(), Ordering::Relaxed);
    info!(samples = samples.len(), "encode batch starting");

    for (_, category) in ARTIFACT_CHANNELS {
        fs::create_dir_all(config.output_dir.join(format!("{category}_images")))?;
    }

    let reports: Vec<SampleReport> = samples
        .par_iter()
        .filter_map(|dir| {
            if progress.cancel.load(Ordering::Relaxed) {
                return None;
            }
            let identity = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let outcome = encode_sample(dir, &identity, config);
            if matches!(outcome, SampleOutcome::Failed { .. }) {
                progress.failed.fetch_add(1, Ordering::Relaxed);
            }
            progress.processed.fetch_add(1, Ordering::Relaxed);
            Some(SampleReport { identity, outcome })
        })
        .collect();

    Ok(BatchReport::new(reports))
}

fn encode_sample(dir: &Path, identity: &str, config: &EncodeConfig) -> SampleOutcome {
    let mut encoded = 0usize;
    let mut missing = Vec::new();

    for (blob_name, category) in ARTIFACT_CHANNELS {
        let blob_path = dir.join(blob_name);
        if !blob_path.is_file() {
            missing.push(category.to_string());
            continue;
        }

        let result = fs::read(&blob_path)
            .map_err(crate::error::PipelineError::Io)
            .and_then(|data| encode(&data, &config.raster))
            .and_then(|img| {
                let out = config
                    .output_dir
                    .join(format!("{category}_images"))
                    .join(format!("{identity}.png"));
                save_png(&img, &out)
            });
        match result {
            Ok(()) => encoded += 1,
            Err(e) => {
                return SampleOutcome::Failed {
                    error: format!("{category}: {e}"),
                }
            }
        }
    }

    if encoded == 0 {
        SampleOutcome::Skipped { missing }
    } else {
        if !missing.is_empty() {
            warn!(identity, ?missing, "artifacts absent, channels not produced");
        }
        SampleOutcome::Encoded { channels: encoded }
    }
}

/// Vectorize every stored row against a vocabulary built from the full
/// store, then rasterize each vector into the static-feature channel.
///
/// The vocabulary is built once, before any vectorization, from a store
/// that must no longer be receiving writes; the layout is then fixed for
/// the whole run.
pub fn run_vectorize(
    store_path: &Path,
    output_dir: &Path,
    raster: &RasterConfig,
    label_rule: &dyn LabelRule,
    vocab_out: Option<&Path>,
    progress: &Arc<BatchProgress>,
) -> Result<BatchReport> {
    let rows = SampleStore::load_all(store_path)?;
    let vocab = Vocabulary::build(&rows)?;
    if let Some(path) = vocab_out {
        vocab.save(path)?;
        info!(path = %path.display(), "vocabulary snapshot written");
    }
    let vectorizer = Vectorizer::new(vocab);
    info!(
        rows = rows.len(),
        vector_len = vectorizer.vector_len(),
        "vectorize batch starting"
    );

    progress.total.store(rows.len(), Ordering::Relaxed);
    let static_dir = output_dir.join("static_images");
    fs::create_dir_all(&static_dir)?;

    let results: Vec<Result<Option<SampleReport>>> = rows
        .par_iter()
        .map(|row| {
            if progress.cancel.load(Ordering::Relaxed) {
                return Ok(None);
            }
            // A layout mismatch is a programming error and aborts the batch;
            // everything else is captured per sample.
            let vector = vectorizer.vectorize(row, label_rule)?;
            let outcome = match encode(&vector_to_bytes(&vector), raster).and_then(|img| {
                save_png(&img, &static_dir.join(format!("{}.png", row.stem())))
            }) {
                Ok(()) => SampleOutcome::Encoded { channels: 1 },
                Err(e) => {
                    progress.failed.fetch_add(1, Ordering::Relaxed);
                    SampleOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };
            progress.processed.fetch_add(1, Ordering::Relaxed);
            Ok(Some(SampleReport {
                identity: row.identity().to_string(),
                outcome,
            }))
        })
        .collect();

    let mut reports = Vec::with_capacity(results.len());
    for result in results {
        if let Some(report) = result? {
            reports.push(report);
        }
    }
    Ok(BatchReport::new(reports))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SampleOutcome;
    use crate::testutil::sample_row;
    use crate::vector::KeywordLabeler;

    fn write_sample_dir(root: &Path, name: &str, blobs: &[&str]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for blob in blobs {
            let data: Vec<u8> = (0..2000u32).map(|i| (i % 256) as u8).collect();
            fs::write(dir.join(blob), data).unwrap();
        }
    }

    #[test]
    fn encode_produces_rasters_for_present_artifacts() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_sample_dir(
            input.path(),
            "full",
            &[
                "AndroidManifest.xml",
                "resources.arsc",
                "classes.dex",
                "classes.jar",
            ],
        );
        write_sample_dir(input.path(), "partial", &["AndroidManifest.xml"]);
        write_sample_dir(input.path(), "empty", &[]);

        let config = EncodeConfig {
            input_dir: input.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            raster: RasterConfig::default(),
        };
        let progress = Arc::new(BatchProgress::new());
        let report = run_encode(&config, &progress).unwrap();

        assert_eq!(report.samples.len(), 3);
        assert_eq!(report.encoded_count(), 2);
        assert_eq!(report.skipped_count(), 1);
        assert!(output.path().join("xml_images/full.png").is_file());
        assert!(output.path().join("jar_images/full.png").is_file());
        assert!(output.path().join("xml_images/partial.png").is_file());
        assert!(!output.path().join("dex_images/partial.png").exists());
        assert_eq!(progress.processed.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn encode_reports_partial_samples_with_their_gaps() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_sample_dir(input.path(), "partial", &["classes.dex"]);

        let config = EncodeConfig {
            input_dir: input.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            raster: RasterConfig::default(),
        };
        let report = run_encode(&config, &Arc::new(BatchProgress::new())).unwrap();

        match &report.samples[0].outcome {
            SampleOutcome::Encoded { channels } => assert_eq!(*channels, 1),
            other => panic!("expected Encoded, got {other:?}"),
        }
    }

    #[test]
    fn cancel_short_circuits_remaining_samples() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        write_sample_dir(input.path(), "a", &["classes.dex"]);
        write_sample_dir(input.path(), "b", &["classes.dex"]);

        let config = EncodeConfig {
            input_dir: input.path().to_path_buf(),
            output_dir: output.path().to_path_buf(),
            raster: RasterConfig::default(),
        };
        let progress = Arc::new(BatchProgress::new());
        progress.cancel.store(true, Ordering::Relaxed);
        let report = run_encode(&config, &progress).unwrap();

        assert!(report.samples.is_empty());
        assert_eq!(progress.processed.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn vectorize_rasterizes_every_stored_row() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("output.csv");
        let output = tempfile::tempdir().unwrap();

        let mut store = SampleStore::open(&store_path).unwrap();
        store.append(sample_row("benign_calc.apk", &["A", "B"])).unwrap();
        store.append(sample_row("locker.apk", &["B", "C"])).unwrap();
        drop(store);

        let progress = Arc::new(BatchProgress::new());
        let vocab_path = dir.path().join("vocabulary.json");
        let report = run_vectorize(
            &store_path,
            output.path(),
            &RasterConfig::default(),
            &KeywordLabeler::new("benign"),
            Some(&vocab_path),
            &progress,
        )
        .unwrap();

        assert_eq!(report.samples.len(), 2);
        assert_eq!(report.encoded_count(), 2);
        assert!(output.path().join("static_images/benign_calc.png").is_file());
        assert!(output.path().join("static_images/locker.png").is_file());

        let vocab = Vocabulary::load(&vocab_path).unwrap();
        assert_eq!(vocab.permissions, vec!["A", "B", "C"]);
    }

    #[test]
    fn vectorize_refuses_an_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("output.csv");
        let output = tempfile::tempdir().unwrap();
        SampleStore::open(&store_path).unwrap();

        let err = run_vectorize(
            &store_path,
            output.path(),
            &RasterConfig::default(),
            &KeywordLabeler::new("benign"),
            None,
            &Arc::new(BatchProgress::new()),
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::PipelineError::EmptyCorpus));
    }
}
