//! Flat-file JSON state storage.
//!
//! Each store owns one file that is fully rewritten on every save. Writes go
//! to a sibling temporary file first and are renamed into place, so a crash
//! mid-write leaves the previous state intact.
//!
//! # Example
//!
//! ```ignore
//! use autotrader_core::persistence::JsonStore;
//!
//! let store: JsonStore<RiskState> = JsonStore::new("data/risk_state.json");
//! let state = store.load()?.unwrap_or_else(|| RiskState::new(today));
//! store.save(&state)?;
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from state persistence operations.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// IO error reading/writing file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Typed handle to one JSON state file.
#[derive(Debug, Clone)]
pub struct JsonStore<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned,
{
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Rewrites the file with `value`.
    ///
    /// Creates parent directories if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory, temporary file, or rename fails.
    pub fn save(&self, value: &T) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), "Saved state file");
        Ok(())
    }

    /// Reads the file, `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<T>, PersistenceError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path)?;
        let value = serde_json::from_reader(BufReader::new(file))?;
        Ok(Some(value))
    }

    /// Deletes the file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists and cannot be removed.
    pub fn remove(&self) -> Result<(), PersistenceError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: u32,
    }

    fn temp_store() -> (TempDir, JsonStore<Counter>) {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path().join("nested").join("counter.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_loads_none() {
        let (_dir, store) = temp_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_creates_parent_and_overwrites() {
        let (_dir, store) = temp_store();
        store.save(&Counter { value: 1 }).unwrap();
        store.save(&Counter { value: 2 }).unwrap();

        assert_eq!(store.load().unwrap(), Some(Counter { value: 2 }));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let (_dir, store) = temp_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(store.load(), Err(PersistenceError::Json(_))));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (_dir, store) = temp_store();
        store.save(&Counter { value: 3 }).unwrap();
        store.remove().unwrap();
        store.remove().unwrap();
        assert!(!store.exists());
    }
}
