//! # CSV Follow-Up Repository
//!
//! Backing collection for timestamped follow-up notes, stored in
//! `follow_ups.csv`. Notes live independently of the owning student row
//! and of status transitions.

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use super::connection::CsvConnection;
use crate::domain::models::FollowUp;
use crate::storage::error::StorageError;
use crate::storage::traits::FollowUpStorage;

const FOLLOW_UPS_HEADER: &str = "id,student_id,content,created_by,created_at,updated_at";

/// CSV record structure for follow-up rows
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FollowUpRecord {
    id: String,
    student_id: String,
    content: String,
    created_by: String,
    created_at: String,
    updated_at: String,
}

impl From<&FollowUp> for FollowUpRecord {
    fn from(follow_up: &FollowUp) -> Self {
        FollowUpRecord {
            id: follow_up.id.clone(),
            student_id: follow_up.student_id.clone(),
            content: follow_up.content.clone(),
            created_by: follow_up.created_by.clone(),
            created_at: follow_up.created_at.to_rfc3339(),
            updated_at: follow_up.updated_at.to_rfc3339(),
        }
    }
}

impl TryFrom<FollowUpRecord> for FollowUp {
    type Error = anyhow::Error;

    fn try_from(record: FollowUpRecord) -> Result<Self> {
        let created_at = DateTime::parse_from_rfc3339(&record.created_at)
            .map_err(|e| {
                StorageError::Malformed(format!("follow-up {} created_at: {}", record.id, e))
            })?
            .with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(&record.updated_at)
            .map_err(|e| {
                StorageError::Malformed(format!("follow-up {} updated_at: {}", record.id, e))
            })?
            .with_timezone(&Utc);

        Ok(FollowUp {
            id: record.id,
            student_id: record.student_id,
            content: record.content,
            created_by: record.created_by,
            created_at,
            updated_at,
        })
    }
}

/// CSV-based follow-up repository
#[derive(Clone)]
pub struct FollowUpRepository {
    connection: Arc<CsvConnection>,
}

impl FollowUpRepository {
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        Self { connection }
    }

    fn read_all(&self) -> Result<Vec<FollowUp>> {
        let path = self.connection.follow_ups_file_path();
        self.connection.ensure_csv_file_exists(&path, FOLLOW_UPS_HEADER)?;

        let file =
            File::open(&path).map_err(|e| StorageError::from_io(e, "opening follow_ups"))?;
        let mut csv_reader = ReaderBuilder::new().from_reader(BufReader::new(file));

        let mut follow_ups = Vec::new();
        for result in csv_reader.deserialize::<FollowUpRecord>() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable follow-up row: {}", e);
                    continue;
                }
            };
            match FollowUp::try_from(record) {
                Ok(follow_up) => follow_ups.push(follow_up),
                Err(e) => warn!("Skipping malformed follow-up row: {:#}", e),
            }
        }
        Ok(follow_ups)
    }

    fn write_all(&self, follow_ups: &[FollowUp]) -> Result<()> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        for follow_up in follow_ups {
            writer.serialize(FollowUpRecord::from(follow_up))?;
        }
        let rows = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flushing follow-up writer: {}", e))?;
        let mut buffer = format!("{}\n", FOLLOW_UPS_HEADER).into_bytes();
        buffer.extend(rows);
        self.connection
            .atomic_write(&self.connection.follow_ups_file_path(), &buffer)
    }
}

impl FollowUpStorage for FollowUpRepository {
    fn store_follow_up(&self, follow_up: &FollowUp) -> Result<()> {
        let mut all = self.read_all()?;
        all.push(follow_up.clone());
        self.write_all(&all)?;
        debug!("Stored follow-up {} for {}", follow_up.id, follow_up.student_id);
        Ok(())
    }

    fn get_follow_up(&self, follow_up_id: &str) -> Result<Option<FollowUp>> {
        Ok(self.read_all()?.into_iter().find(|f| f.id == follow_up_id))
    }

    fn list_for_student(&self, student_id: &str) -> Result<Vec<FollowUp>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|f| f.student_id == student_id)
            .collect())
    }

    fn update_follow_up(&self, follow_up: &FollowUp) -> Result<()> {
        let mut all = self.read_all()?;
        match all.iter_mut().find(|f| f.id == follow_up.id) {
            Some(existing) => *existing = follow_up.clone(),
            None => {
                return Err(StorageError::NotFound(format!("follow-up {}", follow_up.id)).into())
            }
        }
        self.write_all(&all)
    }

    fn delete_follow_up(&self, follow_up_id: &str) -> Result<bool> {
        let mut all = self.read_all()?;
        let before = all.len();
        all.retain(|f| f.id != follow_up_id);
        if all.len() == before {
            return Ok(false);
        }
        self.write_all(&all)?;
        Ok(true)
    }

    fn delete_for_student(&self, student_id: &str) -> Result<usize> {
        let mut all = self.read_all()?;
        let before = all.len();
        all.retain(|f| f.student_id != student_id);
        let removed = before - all.len();
        if removed > 0 {
            self.write_all(&all)?;
            debug!("Removed {} follow-ups for {}", removed, student_id);
        }
        Ok(removed)
    }
}
