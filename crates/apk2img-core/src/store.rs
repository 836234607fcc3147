//! CSV-backed sample store: append-only, deduplicated on file-name identity.
//!
//! Every append rewrites the table through a temp file in the store's
//! directory and renames it over the original, so a partially written row is
//! never observable as valid data. The store is a single-writer resource:
//! callers appending from parallel workers wrap it in a `Mutex`, while loaded
//! rows can be read concurrently without locking.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::row::{FeatureRow, STORE_HEADER};

#[derive(Debug)]
pub struct SampleStore {
    path: PathBuf,
    rows: Vec<FeatureRow>,
    identities: HashSet<String>,
}

impl SampleStore {
    /// Open a store at `path`, creating a header-only file if none exists.
    /// Loading validates the persisted header against the expected schema.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let rows = if path.is_file() {
            read_rows(&path)?
        } else {
            Vec::new()
        };

        let identities = rows.iter().map(|r| r.identity().to_string()).collect();
        let store = Self {
            path,
            rows,
            identities,
        };
        if !store.path.is_file() {
            store.write_all()?;
        }
        Ok(store)
    }

    /// Append one row. Re-appending an identity already present is a no-op
    /// signalled as `AlreadyExists`, so re-analyzing a sample can never
    /// duplicate or corrupt the table.
    pub fn append(&mut self, row: FeatureRow) -> Result<()> {
        let identity = row.identity().to_string();
        if self.identities.contains(&identity) {
            debug!(identity = %identity, "append skipped, identity already stored");
            return Err(PipelineError::AlreadyExists { identity });
        }
        self.rows.push(row);
        self.identities.insert(identity);
        self.write_all()
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Most recently appended row with the given identity, if any.
    pub fn find_by_identity(&self, identity: &str) -> Option<&FeatureRow> {
        self.rows.iter().rev().find(|r| r.identity() == identity)
    }

    /// Load every row from a store file without keeping it open for writes.
    pub fn load_all(path: &Path) -> Result<Vec<FeatureRow>> {
        read_rows(path)
    }

    /// Rewrite the full table atomically: temp file in the same directory,
    /// then rename over the store path.
    fn write_all(&self) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file());
            writer.write_record(STORE_HEADER)?;
            for row in &self.rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| PipelineError::Io(e.error))?;
        Ok(())
    }
}

fn read_rows(path: &Path) -> Result<Vec<FeatureRow>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let headers = reader.headers()?;
    if headers.len() != STORE_HEADER.len()
        || headers.iter().zip(STORE_HEADER).any(|(found, want)| found != want)
    {
        return Err(PipelineError::CorruptStore {
            path: path.to_path_buf(),
            reason: format!("unexpected header {:?}", headers.iter().collect::<Vec<_>>()),
        });
    }

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: FeatureRow = record.map_err(|e| PipelineError::CorruptStore {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        rows.push(row);
    }
    Ok(rows)
}
