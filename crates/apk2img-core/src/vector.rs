//! Fixed-layout feature vectorization against a vocabulary.
//!
//! Layout, in order: the row's scalar fields, one multi-hot entry per
//! vocabulary token per category (vocabulary order, not row order), then the
//! label. The multi-hot section is what makes vectors from different samples
//! column-aligned and therefore stackable.

use std::collections::HashSet;

use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::row::{FeatureRow, SCALAR_FIELD_COUNT};
use crate::vocab::Vocabulary;

/// Classification policy injected into vectorization. The vectorizer only
/// fixes the label's position as the final element; how it is derived is the
/// caller's business.
pub trait LabelRule: Send + Sync {
    fn label(&self, row: &FeatureRow) -> u8;
}

/// Label 0 when the configured keyword occurs in the row's file name,
/// 1 otherwise.
#[derive(Debug, Clone)]
pub struct KeywordLabeler {
    pub benign_keyword: String,
}

impl KeywordLabeler {
    pub fn new(benign_keyword: impl Into<String>) -> Self {
        Self {
            benign_keyword: benign_keyword.into(),
        }
    }
}

impl LabelRule for KeywordLabeler {
    fn label(&self, row: &FeatureRow) -> u8 {
        if row.file_name.contains(&self.benign_keyword) {
            0
        } else {
            1
        }
    }
}

/// The same label for every row.
#[derive(Debug, Clone, Copy)]
pub struct FixedLabel(pub u8);

impl LabelRule for FixedLabel {
    fn label(&self, _row: &FeatureRow) -> u8 {
        self.0
    }
}

/// Vectorizes rows against one immutable vocabulary. The vector length is
/// fixed at construction; every row vectorized through the same instance
/// shares one column layout.
#[derive(Debug, Clone)]
pub struct Vectorizer {
    vocab: Vocabulary,
    expected_len: usize,
}

impl Vectorizer {
    pub fn new(vocab: Vocabulary) -> Self {
        let expected_len = SCALAR_FIELD_COUNT + vocab.multi_hot_len() + 1;
        Self {
            vocab,
            expected_len,
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Length of every vector this instance produces.
    pub fn vector_len(&self) -> usize {
        self.expected_len
    }

    pub fn vectorize(&self, row: &FeatureRow, label_rule: &dyn LabelRule) -> Result<Vec<f32>> {
        let mut out = Vec::with_capacity(self.expected_len);
        out.extend(row.scalars());
        multi_hot(&mut out, &self.vocab.permissions, &row.permissions, "permissions", row);
        multi_hot(&mut out, &self.vocab.actions, &row.actions, "actions", row);
        multi_hot(&mut out, &self.vocab.services, &row.services, "services", row);
        multi_hot(&mut out, &self.vocab.categories, &row.categories, "categories", row);
        out.push(label_rule.label(row) as f32);

        if out.len() != self.expected_len {
            return Err(PipelineError::VectorLengthMismatch {
                expected: self.expected_len,
                produced: out.len(),
            });
        }
        Ok(out)
    }
}

/// One entry per vocabulary token, in vocabulary order. Tokens on the row
/// that the vocabulary does not know are skipped and logged; they must never
/// shift the column layout.
fn multi_hot(
    out: &mut Vec<f32>,
    vocab_tokens: &[String],
    row_tokens: &[String],
    category: &str,
    row: &FeatureRow,
) {
    let present: HashSet<&str> = row_tokens.iter().map(String::as_str).collect();
    for token in vocab_tokens {
        out.push(if present.contains(token.as_str()) { 1.0 } else { 0.0 });
    }
    for token in row_tokens {
        if vocab_tokens.binary_search(token).is_err() {
            warn!(
                identity = %row.file_name,
                category,
                token = %token,
                "token absent from vocabulary, ignored"
            );
        }
    }
}

/// Convert a feature vector into the byte buffer fed to the raster encoder.
/// Values outside the 8-bit range saturate instead of wrapping, so a large
/// count pins to white rather than aliasing onto a small pixel value.
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector
        .iter()
        .map(|&v| v.clamp(0.0, 255.0).round() as u8)
        .collect()
}
