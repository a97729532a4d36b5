//! # CSV Status History Repository
//!
//! Append-only audit trail backing collection. Each successful status
//! transition appends exactly one row to `status_history.csv`; rows are
//! never rewritten except when a student is deleted and its rows are
//! swept.
//!
//! ## CSV Format
//!
//! ```csv
//! id,student_id,old_status,new_status,changed_by,changed_at
//! history::9be0...,student::1f2a...,inadimplente,mensagem-enviada,ana,2025-06-07T13:00:00+00:00
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::BufReader;
use std::sync::Arc;

use super::connection::CsvConnection;
use crate::domain::models::{CollectionStatus, StatusHistoryEntry};
use crate::storage::error::StorageError;
use crate::storage::traits::StatusHistoryStorage;

const HISTORY_HEADER: &str = "id,student_id,old_status,new_status,changed_by,changed_at";

/// CSV record structure for history rows
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryRecord {
    id: String,
    student_id: String,
    old_status: String,
    new_status: String,
    changed_by: String,
    changed_at: String,
}

impl From<&StatusHistoryEntry> for HistoryRecord {
    fn from(entry: &StatusHistoryEntry) -> Self {
        HistoryRecord {
            id: entry.id.clone(),
            student_id: entry.student_id.clone(),
            old_status: entry.old_status.as_str().to_string(),
            new_status: entry.new_status.as_str().to_string(),
            changed_by: entry.changed_by.clone(),
            changed_at: entry.changed_at.to_rfc3339(),
        }
    }
}

impl TryFrom<HistoryRecord> for StatusHistoryEntry {
    type Error = anyhow::Error;

    fn try_from(record: HistoryRecord) -> Result<Self> {
        let old_status = CollectionStatus::from_str(&record.old_status)
            .map_err(|e| StorageError::Malformed(format!("history {}: {}", record.id, e)))?;
        let new_status = CollectionStatus::from_str(&record.new_status)
            .map_err(|e| StorageError::Malformed(format!("history {}: {}", record.id, e)))?;
        let changed_at = DateTime::parse_from_rfc3339(&record.changed_at)
            .map_err(|e| {
                StorageError::Malformed(format!("history {} changed_at: {}", record.id, e))
            })?
            .with_timezone(&Utc);

        Ok(StatusHistoryEntry {
            id: record.id,
            student_id: record.student_id,
            old_status,
            new_status,
            changed_by: record.changed_by,
            changed_at,
        })
    }
}

/// CSV-based audit trail repository
#[derive(Clone)]
pub struct HistoryRepository {
    connection: Arc<CsvConnection>,
}

impl HistoryRepository {
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        Self { connection }
    }

    /// Read every history row, skipping malformed ones.
    fn read_all(&self) -> Result<Vec<StatusHistoryEntry>> {
        let path = self.connection.history_file_path();
        self.connection.ensure_csv_file_exists(&path, HISTORY_HEADER)?;

        let file =
            File::open(&path).map_err(|e| StorageError::from_io(e, "opening status_history"))?;
        let mut csv_reader = ReaderBuilder::new().from_reader(BufReader::new(file));

        let mut entries = Vec::new();
        for result in csv_reader.deserialize::<HistoryRecord>() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable history row: {}", e);
                    continue;
                }
            };
            match StatusHistoryEntry::try_from(record) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping malformed history row: {:#}", e),
            }
        }
        Ok(entries)
    }

    /// Rewrite the whole file. Only used by the delete sweep.
    fn write_all(&self, entries: &[StatusHistoryEntry]) -> Result<()> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        for entry in entries {
            writer.serialize(HistoryRecord::from(entry))?;
        }
        let rows = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flushing history writer: {}", e))?;
        // The header must survive an empty rewrite, or later appends would
        // be swallowed as a header row on read
        let mut buffer = format!("{}\n", HISTORY_HEADER).into_bytes();
        buffer.extend(rows);
        self.connection
            .atomic_write(&self.connection.history_file_path(), &buffer)
    }
}

impl StatusHistoryStorage for HistoryRepository {
    fn append_entry(&self, entry: &StatusHistoryEntry) -> Result<()> {
        let path = self.connection.history_file_path();
        self.connection.ensure_csv_file_exists(&path, HISTORY_HEADER)?;

        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|e| StorageError::from_io(e, "opening status_history for append"))?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.serialize(HistoryRecord::from(entry))?;
        writer.flush().map_err(|e| StorageError::from_io(e, "appending history row"))?;

        debug!(
            "Appended history entry for {}: {} -> {}",
            entry.student_id,
            entry.old_status.as_str(),
            entry.new_status.as_str()
        );
        Ok(())
    }

    fn list_for_student(&self, student_id: &str) -> Result<Vec<StatusHistoryEntry>> {
        // File order is append order, which is the ordering contract
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|e| e.student_id == student_id)
            .collect())
    }

    fn delete_for_student(&self, student_id: &str) -> Result<usize> {
        let all = self.read_all()?;
        let kept: Vec<StatusHistoryEntry> = all
            .iter()
            .filter(|e| e.student_id != student_id)
            .cloned()
            .collect();
        let removed = all.len() - kept.len();
        if removed > 0 {
            self.write_all(&kept)?;
            debug!("Removed {} history rows for {}", removed, student_id);
        }
        Ok(removed)
    }
}
