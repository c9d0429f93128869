#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV snapshots of the fetched datasets.
//!
//! The scrape step saves what it fetched; the generate step loads it back.
//! This lets a report be regenerated without hitting the remote services, and
//! lets the last good snapshot stand in when a fetch fails.
//!
//! A missing snapshot is not an error: [`SnapshotStore::load`] returns an
//! empty dataset so the report can still be produced.

use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use weston_brief_models::{CrimeEvent, Dataset, PermitSummaryEntry};

/// Errors that can occur while reading or writing snapshots.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// I/O error (directory creation, file write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot exists but is not valid CSV for its dataset.
    #[error("Snapshot {path}: {source}")]
    Csv {
        /// Snapshot file.
        path: PathBuf,
        /// Underlying error.
        source: csv::Error,
    },
}

/// A record type that can be stored as a snapshot.
pub trait SnapshotRecord: Serialize + DeserializeOwned {
    /// Dataset this record belongs to.
    const DATASET: Dataset;

    /// Column names, in the order the record's fields serialize.
    const HEADERS: &'static [&'static str];
}

impl SnapshotRecord for CrimeEvent {
    const DATASET: Dataset = Dataset::Crimes;
    const HEADERS: &'static [&'static str] =
        &["OCC_DATE", "OFFENCE", "MCI_CATEGORY", "NEIGHBOURHOOD_158", "DATE"];
}

impl SnapshotRecord for PermitSummaryEntry {
    const DATASET: Dataset = Dataset::Permits;
    const HEADERS: &'static [&'static str] = &["WORK", "COUNT"];
}

/// Reads and writes snapshots in a single directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Creates a store rooted at `dir`. The directory is created on first
    /// save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the snapshot for `dataset`.
    #[must_use]
    pub fn path(&self, dataset: Dataset) -> PathBuf {
        self.dir.join(dataset.file_name())
    }

    /// Writes `rows` as the snapshot for `T::DATASET`, replacing any
    /// previous snapshot. The header row is written even when `rows` is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the directory or file cannot be written.
    pub fn save<T: SnapshotRecord>(&self, rows: &[T]) -> Result<PathBuf, SnapshotError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(T::DATASET);
        let csv_err = |source| SnapshotError::Csv {
            path: path.clone(),
            source,
        };

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)
            .map_err(csv_err)?;
        writer.write_record(T::HEADERS).map_err(csv_err)?;
        for row in rows {
            writer.serialize(row).map_err(csv_err)?;
        }
        writer.flush()?;

        log::info!(
            "Saved {} {} rows to {}",
            rows.len(),
            T::DATASET,
            path.display()
        );
        Ok(path)
    }

    /// Reads the snapshot for `T::DATASET`. Returns an empty dataset when no
    /// snapshot has been saved.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the snapshot exists but cannot be read or
    /// parsed.
    pub fn load<T: SnapshotRecord>(&self) -> Result<Vec<T>, SnapshotError> {
        let path = self.path(T::DATASET);
        if !path.is_file() {
            log::warn!(
                "No {} snapshot at {}, using empty data",
                T::DATASET,
                path.display()
            );
            return Ok(Vec::new());
        }

        let csv_err = |source| SnapshotError::Csv {
            path: path.clone(),
            source,
        };
        let mut reader = csv::Reader::from_path(&path).map_err(csv_err)?;
        let rows = reader
            .deserialize::<T>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(csv_err)?;

        log::info!(
            "Loaded {} {} rows from {}",
            rows.len(),
            T::DATASET,
            path.display()
        );
        Ok(rows)
    }
}
