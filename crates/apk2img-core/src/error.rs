//! Error types for the conversion pipeline.
//!
//! Variants split into three groups that batch code treats differently:
//! input errors (`Encoding`) are surfaced to the caller, consistency errors
//! (`CorruptStore`, `VectorLengthMismatch`, `EmptyCorpus`) abort the current
//! batch, and completeness gaps (`IncompleteSample`, `AlreadyExists`) are
//! recoverable: the affected sample is skipped and reported.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input bytes or target dimensions unusable for raster encoding.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// A vocabulary cannot be built from zero samples.
    #[error("cannot build a vocabulary from an empty corpus")]
    EmptyCorpus,

    /// A produced vector disagrees with the layout fixed at construction.
    /// Indicates a logic bug, fatal for the batch.
    #[error("vector length mismatch: expected {expected}, produced {produced}")]
    VectorLengthMismatch { expected: usize, produced: usize },

    /// Persisted store data does not match the expected schema.
    #[error("corrupt store {}: {reason}", .path.display())]
    CorruptStore { path: PathBuf, reason: String },

    /// Append of an identity the store already holds. The append was a no-op.
    #[error("identity {identity:?} already present in store")]
    AlreadyExists { identity: String },

    /// One or more of the five channel rasters is absent for an identity.
    #[error("incomplete sample {identity:?}: missing channels {missing:?}")]
    IncompleteSample {
        identity: String,
        missing: Vec<String>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Completeness gaps are skipped-and-reported; everything else aborts
    /// the operation that hit it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::IncompleteSample { .. } | PipelineError::AlreadyExists { .. }
        )
    }
}
