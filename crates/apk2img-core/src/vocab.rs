//! Deterministic feature vocabulary over manifest token sets.
//!
//! A vocabulary is the ordered set of distinct tokens seen across a corpus,
//! one list per category. Ordering is lexicographic by byte value, never
//! discovery or hash order: the position of each token defines a feature
//! vector column, and two builds from the same store contents must converge
//! on the same column layout on any machine.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::row::FeatureRow;

/// Bump when the snapshot layout changes. A model trained against a given
/// snapshot must be fed vectors built from that exact snapshot.
pub const VOCABULARY_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub version: u32,
    pub permissions: Vec<String>,
    pub actions: Vec<String>,
    pub services: Vec<String>,
    pub categories: Vec<String>,
}

impl Vocabulary {
    /// Build from every row of a corpus. The corpus must be complete before
    /// this runs: building while a store is still receiving writes would make
    /// the column layout depend on append timing.
    pub fn build(rows: &[FeatureRow]) -> Result<Self> {
        if rows.is_empty() {
            return Err(PipelineError::EmptyCorpus);
        }
        Ok(Self {
            version: VOCABULARY_VERSION,
            permissions: distinct_sorted(rows.iter().map(|r| &r.permissions)),
            actions: distinct_sorted(rows.iter().map(|r| &r.actions)),
            services: distinct_sorted(rows.iter().map(|r| &r.services)),
            categories: distinct_sorted(rows.iter().map(|r| &r.categories)),
        })
    }

    /// Total multi-hot entries a vector carries for this vocabulary.
    pub fn multi_hot_len(&self) -> usize {
        self.permissions.len() + self.actions.len() + self.services.len() + self.categories.len()
    }

    /// Persist a versioned snapshot. Pinning the snapshot is what lets a
    /// trained model keep its column layout across re-derivations.
    pub fn save(&self, path: &Path) -> Result<()> {
        serde_json::to_writer_pretty(File::create(path)?, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let vocab: Vocabulary = serde_json::from_reader(File::open(path)?)?;
        if vocab.version != VOCABULARY_VERSION {
            return Err(PipelineError::CorruptStore {
                path: path.to_path_buf(),
                reason: format!(
                    "vocabulary snapshot version {} (expected {VOCABULARY_VERSION})",
                    vocab.version
                ),
            });
        }
        Ok(vocab)
    }
}

fn distinct_sorted<'a, I>(sets: I) -> Vec<String>
where
    I: Iterator<Item = &'a Vec<String>>,
{
    let mut distinct = BTreeSet::new();
    for tokens in sets {
        for token in tokens {
            distinct.insert(token.clone());
        }
    }
    distinct.into_iter().collect()
}
