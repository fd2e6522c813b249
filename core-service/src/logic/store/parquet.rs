//! Local parquet backend.
//!
//! Writes go to a temporary file in the destination directory which is then
//! renamed over the artifact, so readers see either the old or the new file.

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use parquet::arrow::ArrowWriter;
use tempfile::NamedTempFile;

use super::{to_record_batch, StoreError, StoreRecord};
use crate::logic::dataset::read_parquet;

pub struct ParquetStore<R> {
    path: PathBuf,
    dimensions: Vec<String>,
    /// Serializes read-modify-write cycles on this artifact
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> R>,
}

impl<R: StoreRecord> ParquetStore<R> {
    pub fn new(path: impl Into<PathBuf>, dimensions: Vec<String>) -> Self {
        Self {
            path: path.into(),
            dimensions,
            write_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    /// Every stored row; an absent artifact is an empty store
    pub fn load(&self) -> Result<Vec<R>, StoreError> {
        if !self.path.exists() {
            log::debug!("No {} store at {}, starting empty", R::TABLE, self.path.display());
            return Ok(Vec::new());
        }

        let batch = read_parquet(&self.path).map_err(|e| StoreError::Decode {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        batch
            .rows()
            .map(|row| R::from_row(&row, &self.dimensions))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| StoreError::Schema {
                table: R::TABLE,
                source,
            })
    }

    /// Replace the artifact with `rows`
    pub fn persist(&self, rows: &[R]) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let batch = to_record_batch(rows, &self.dimensions)?;
        let mut tmp = NamedTempFile::new_in(&parent)?;
        {
            let mut writer = ArrowWriter::try_new(tmp.as_file_mut(), batch.schema(), None)?;
            writer.write(&batch)?;
            writer.close()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        log::debug!("Wrote {} {} rows to {}", rows.len(), R::TABLE, self.path.display());
        Ok(())
    }

    /// Load, transform and persist while holding the writer lock.
    /// Returns the rows that were written.
    pub fn update<F>(&self, mutate: F) -> Result<Vec<R>, StoreError>
    where
        F: FnOnce(Vec<R>) -> Vec<R>,
    {
        let _guard = self.write_lock.lock();
        let current = self.load()?;
        let next = mutate(current);
        self.persist(&next)?;
        Ok(next)
    }
}
