//! Assembly of per-artifact rasters into five-channel samples.
//!
//! Raster file layout: `<root>/<category>_images/<identity>.png`, one 8-bit
//! grayscale file per artifact category per sample. The channel order is a
//! contract the downstream classifier depends on and is never permuted. A
//! sample missing any of the five rasters is reported and excluded, never
//! zero-filled into a "complete" stack.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use image::imageops;
use ndarray::Array3;
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::raster::{ResampleFilter, DEFAULT_HEIGHT, DEFAULT_WIDTH};

/// Channel order of every assembled tensor.
pub const CHANNEL_CATEGORIES: [&str; 5] = ["xml", "arsc", "dex", "jar", "static"];
pub const CHANNEL_COUNT: usize = CHANNEL_CATEGORIES.len();

const GRAY_MAX: f32 = u8::MAX as f32;

#[derive(Debug, Clone, Copy)]
pub struct AlignConfig {
    pub width: u32,
    pub height: u32,
    /// Used when a stored raster's dimensions disagree with the target.
    pub filter: ResampleFilter,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            filter: ResampleFilter::default(),
        }
    }
}

/// One complete five-channel sample.
#[derive(Debug, Clone)]
pub struct MultiChannelSample {
    pub identity: String,
    /// Shape `(height, width, 5)`, values in `[0, 1]`, channels in
    /// [`CHANNEL_CATEGORIES`] order.
    pub tensor: Array3<f32>,
}

/// Result of aligning a whole raster directory tree.
#[derive(Debug, Default)]
pub struct AlignBatch {
    pub samples: Vec<MultiChannelSample>,
    /// Identities excluded for missing channels, with the missing categories.
    pub incomplete: Vec<(String, Vec<String>)>,
    /// Identities whose rasters exist but could not be decoded.
    pub failed: Vec<(String, String)>,
}

/// Path of one channel raster for an identity.
pub fn channel_path(root: &Path, category: &str, identity: &str) -> PathBuf {
    root.join(format!("{category}_images"))
        .join(format!("{identity}.png"))
}

/// Assemble the five-channel tensor for one identity. Errors with
/// `IncompleteSample` naming every absent category when the stack cannot be
/// completed; decoding starts only once all five files are present.
pub fn align(root: &Path, identity: &str, config: &AlignConfig) -> Result<MultiChannelSample> {
    let paths: Vec<PathBuf> = CHANNEL_CATEGORIES
        .iter()
        .map(|category| channel_path(root, category, identity))
        .collect();

    let missing: Vec<String> = CHANNEL_CATEGORIES
        .iter()
        .zip(&paths)
        .filter(|(_, path)| !path.is_file())
        .map(|(category, _)| category.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::IncompleteSample {
            identity: identity.to_string(),
            missing,
        });
    }

    let (width, height) = (config.width as usize, config.height as usize);
    let mut tensor = Array3::<f32>::zeros((height, width, CHANNEL_COUNT));
    for (channel, path) in paths.iter().enumerate() {
        let raster = image::open(path)?.into_luma8();
        let raster = if raster.dimensions() == (config.width, config.height) {
            raster
        } else {
            imageops::resize(
                &raster,
                config.width,
                config.height,
                config.filter.as_filter_type(),
            )
        };
        for y in 0..height {
            for x in 0..width {
                let px = raster.get_pixel(x as u32, y as u32).0[0];
                tensor[[y, x, channel]] = px as f32 / GRAY_MAX;
            }
        }
    }

    Ok(MultiChannelSample {
        identity: identity.to_string(),
        tensor,
    })
}

/// Every identity with at least one raster under `root`: the sorted union of
/// PNG stems across the five category directories.
pub fn discover_identities(root: &Path) -> Result<Vec<String>> {
    let mut identities = BTreeSet::new();
    for category in CHANNEL_CATEGORIES {
        let dir = root.join(format!("{category}_images"));
        if !dir.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "png") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    identities.insert(stem.to_string());
                }
            }
        }
    }
    Ok(identities.into_iter().collect())
}

/// Align every discovered identity, accumulating completeness gaps instead
/// of stopping on them. Only I/O-level failures on present files are
/// reported as failed; absent channels exclude the identity.
pub fn align_all(root: &Path, config: &AlignConfig) -> Result<AlignBatch> {
    let mut batch = AlignBatch::default();
    for identity in discover_identities(root)? {
        match align(root, &identity, config) {
            Ok(sample) => batch.samples.push(sample),
            Err(PipelineError::IncompleteSample { identity, missing }) => {
                warn!(identity = %identity, ?missing, "sample excluded, channels missing");
                batch.incomplete.push((identity, missing));
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "sample excluded, raster unreadable");
                batch.failed.push((identity, e.to_string()));
            }
        }
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn write_raster(root: &Path, category: &str, identity: &str, value: u8, side: u32) {
        let dir = root.join(format!("{category}_images"));
        fs::create_dir_all(&dir).unwrap();
        let img = GrayImage::from_pixel(side, side, Luma([value]));
        img.save(dir.join(format!("{identity}.png"))).unwrap();
    }

    fn write_full_sample(root: &Path, identity: &str, value: u8) {
        for category in CHANNEL_CATEGORIES {
            write_raster(root, category, identity, value, 64);
        }
    }

    #[test]
    fn align_stacks_five_channels_in_order() {
        let dir = tempfile::tempdir().unwrap();
        // Give each channel a distinct constant so order is observable.
        for (i, category) in CHANNEL_CATEGORIES.iter().enumerate() {
            write_raster(dir.path(), category, "x", (i as u8 + 1) * 10, 64);
        }

        let sample = align(dir.path(), "x", &AlignConfig::default()).unwrap();
        assert_eq!(sample.tensor.dim(), (64, 64, 5));
        for (i, _) in CHANNEL_CATEGORIES.iter().enumerate() {
            let expected = ((i as u8 + 1) * 10) as f32 / 255.0;
            assert!((sample.tensor[[0, 0, i]] - expected).abs() < 1e-6);
            assert!((sample.tensor[[63, 63, i]] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn align_normalizes_into_unit_range() {
        let dir = tempfile::tempdir().unwrap();
        write_full_sample(dir.path(), "x", 255);

        let sample = align(dir.path(), "x", &AlignConfig::default()).unwrap();
        assert!(sample.tensor.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!((sample.tensor[[5, 5, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn align_resizes_mismatched_rasters() {
        let dir = tempfile::tempdir().unwrap();
        for category in CHANNEL_CATEGORIES {
            write_raster(dir.path(), category, "x", 100, 32);
        }

        let sample = align(dir.path(), "x", &AlignConfig::default()).unwrap();
        assert_eq!(sample.tensor.dim(), (64, 64, 5));
    }

    #[test]
    fn missing_channel_is_reported_not_fabricated() {
        let dir = tempfile::tempdir().unwrap();
        for category in ["xml", "arsc", "dex", "jar"] {
            write_raster(dir.path(), category, "x", 50, 64);
        }

        let err = align(dir.path(), "x", &AlignConfig::default()).unwrap_err();
        match err {
            PipelineError::IncompleteSample { identity, missing } => {
                assert_eq!(identity, "x");
                assert_eq!(missing, vec!["static"]);
            }
            other => panic!("expected IncompleteSample, got {other}"),
        }
    }

    #[test]
    fn align_all_excludes_incomplete_identities() {
        let dir = tempfile::tempdir().unwrap();
        write_full_sample(dir.path(), "complete", 10);
        for category in ["xml", "arsc", "dex", "jar"] {
            write_raster(dir.path(), category, "partial", 10, 64);
        }

        let batch = align_all(dir.path(), &AlignConfig::default()).unwrap();
        assert_eq!(batch.samples.len(), 1);
        assert_eq!(batch.samples[0].identity, "complete");
        assert_eq!(batch.incomplete.len(), 1);
        assert_eq!(batch.incomplete[0].0, "partial");
        assert_eq!(batch.incomplete[0].1, vec!["static"]);
        assert!(batch.failed.is_empty());
    }

    #[test]
    fn discovery_unions_stems_across_categories() {
        let dir = tempfile::tempdir().unwrap();
        write_raster(dir.path(), "xml", "b", 1, 8);
        write_raster(dir.path(), "static", "a", 1, 8);
        write_raster(dir.path(), "dex", "b", 1, 8);

        let identities = discover_identities(dir.path()).unwrap();
        assert_eq!(identities, vec!["a", "b"]);
    }

    #[test]
    fn unreadable_raster_is_a_per_sample_failure() {
        let dir = tempfile::tempdir().unwrap();
        write_full_sample(dir.path(), "x", 10);
        // Truncate one channel file into garbage.
        fs::write(channel_path(dir.path(), "dex", "x"), b"not a png").unwrap();

        let batch = align_all(dir.path(), &AlignConfig::default()).unwrap();
        assert!(batch.samples.is_empty());
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].0, "x");
    }
}
