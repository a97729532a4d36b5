//! Connection handle for the file-backed store.
//!
//! Owns the base data directory and the per-collection file paths. Passed
//! down explicitly to every repository; there is no global client.

use anyhow::Result;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::storage::error::StorageError;

#[derive(Debug, Clone)]
pub struct CsvConnection {
    base_directory: PathBuf,
}

impl CsvConnection {
    /// Create a connection rooted at the given directory, creating it if
    /// needed.
    pub fn new(base_directory: impl Into<PathBuf>) -> Result<Self> {
        let base_directory = base_directory.into();
        fs::create_dir_all(&base_directory)
            .map_err(|e| StorageError::from_io(e, "creating data directory"))?;
        debug!("Opened data directory: {:?}", base_directory);
        Ok(Self { base_directory })
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    pub fn students_file_path(&self) -> PathBuf {
        self.base_directory.join("students.csv")
    }

    pub fn history_file_path(&self) -> PathBuf {
        self.base_directory.join("status_history.csv")
    }

    pub fn follow_ups_file_path(&self) -> PathBuf {
        self.base_directory.join("follow_ups.csv")
    }

    pub fn months_file_path(&self) -> PathBuf {
        self.base_directory.join("available_months.yaml")
    }

    /// Create a collection file with its header row if it is missing.
    pub fn ensure_csv_file_exists(&self, path: &Path, header: &str) -> Result<()> {
        if !path.exists() {
            fs::write(path, format!("{}\n", header))
                .map_err(|e| StorageError::from_io(e, "creating collection file"))?;
            debug!("Created collection file: {:?}", path);
        }
        Ok(())
    }

    /// Atomically replace a collection file's contents.
    pub fn atomic_write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, contents)
            .map_err(|e| StorageError::from_io(e, "writing collection file"))?;
        fs::rename(&temp_path, path)
            .map_err(|e| StorageError::from_io(e, "replacing collection file"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_creates_base_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("data");
        let conn = CsvConnection::new(&nested).unwrap();
        assert!(conn.base_directory().exists());
    }

    #[test]
    fn test_ensure_file_writes_header_once() {
        let temp_dir = TempDir::new().unwrap();
        let conn = CsvConnection::new(temp_dir.path()).unwrap();
        let path = conn.students_file_path();

        conn.ensure_csv_file_exists(&path, "id,nome").unwrap();
        std::fs::write(&path, "id,nome\nabc,Maria\n").unwrap();
        // A second ensure must not truncate existing data
        conn.ensure_csv_file_exists(&path, "id,nome").unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Maria"));
    }
}
