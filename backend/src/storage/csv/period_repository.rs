//! # Period Repository
//!
//! Backing collection for the month selector (`available_months.yaml`).
//! Stored labels may carry historical spellings; the service layer heals
//! them through the month normalizer on the way out.

use anyhow::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;

use super::connection::CsvConnection;
use crate::domain::models::ReportingPeriod;
use crate::domain::months;
use crate::storage::error::StorageError;
use crate::storage::traits::PeriodStorage;

/// YAML record structure for one period
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PeriodRecord {
    value: String,
    label: String,
    #[serde(default)]
    active: bool,
}

impl From<&ReportingPeriod> for PeriodRecord {
    fn from(period: &ReportingPeriod) -> Self {
        PeriodRecord {
            value: period.value.clone(),
            label: period.label.clone(),
            active: period.active,
        }
    }
}

impl From<PeriodRecord> for ReportingPeriod {
    fn from(record: PeriodRecord) -> Self {
        ReportingPeriod {
            value: record.value,
            label: record.label,
            active: record.active,
        }
    }
}

/// YAML-based reporting period repository
#[derive(Clone)]
pub struct PeriodRepository {
    connection: Arc<CsvConnection>,
}

impl PeriodRepository {
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        Self { connection }
    }

    fn read_all(&self) -> Result<Vec<ReportingPeriod>> {
        let path = self.connection.months_file_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                let classified = StorageError::from_io(e, "reading available_months");
                if classified.is_access_denied() {
                    warn!("Store denied period read; returning empty period list");
                    return Ok(Vec::new());
                }
                return Err(classified.into());
            }
        };
        let records: Vec<PeriodRecord> = serde_yaml::from_str(&contents)
            .map_err(|e| StorageError::Malformed(format!("available_months: {}", e)))?;
        Ok(records.into_iter().map(ReportingPeriod::from).collect())
    }

    fn write_all(&self, periods: &[ReportingPeriod]) -> Result<()> {
        let records: Vec<PeriodRecord> = periods.iter().map(PeriodRecord::from).collect();
        let contents = serde_yaml::to_string(&records)?;
        self.connection
            .atomic_write(&self.connection.months_file_path(), contents.as_bytes())
    }

    /// Whether two stored keys name the same semantic period.
    fn same_period(a: &str, b: &str) -> bool {
        if a.eq_ignore_ascii_case(b) {
            return true;
        }
        match (months::resolve_legacy_key(a), months::resolve_legacy_key(b)) {
            (Some(ka), Some(kb)) => ka == kb,
            _ => false,
        }
    }
}

impl PeriodStorage for PeriodRepository {
    fn list_periods(&self) -> Result<Vec<ReportingPeriod>> {
        let mut periods = self.read_all()?;
        periods.sort_by_key(|p| months::first_of_month(&p.value));
        Ok(periods)
    }

    fn get_period(&self, value: &str) -> Result<Option<ReportingPeriod>> {
        Ok(self
            .read_all()?
            .into_iter()
            .find(|p| Self::same_period(&p.value, value)))
    }

    fn store_period(&self, period: &ReportingPeriod) -> Result<()> {
        let mut all = self.read_all()?;
        match all.iter_mut().find(|p| Self::same_period(&p.value, &period.value)) {
            Some(existing) => *existing = period.clone(),
            None => all.push(period.clone()),
        }
        self.write_all(&all)?;
        debug!("Stored period {} ({})", period.value, period.label);
        Ok(())
    }

    fn delete_period(&self, value: &str) -> Result<bool> {
        let mut all = self.read_all()?;
        let before = all.len();
        all.retain(|p| !Self::same_period(&p.value, value));
        if all.len() == before {
            return Ok(false);
        }
        self.write_all(&all)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_repo() -> (PeriodRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let connection = CsvConnection::new(temp_dir.path()).unwrap();
        (PeriodRepository::new(Arc::new(connection)), temp_dir)
    }

    fn period(value: &str, label: &str) -> ReportingPeriod {
        ReportingPeriod {
            value: value.to_string(),
            label: label.to_string(),
            active: true,
        }
    }

    #[test]
    fn test_store_and_list_sorted() {
        let (repo, _temp_dir) = setup_test_repo();
        repo.store_period(&period("07-2025", "Julho/25")).unwrap();
        repo.store_period(&period("05-2025", "Maio/25")).unwrap();
        repo.store_period(&period("06-2025", "Junho/25")).unwrap();

        let listed = repo.list_periods().unwrap();
        let values: Vec<&str> = listed.iter().map(|p| p.value.as_str()).collect();
        assert_eq!(values, vec!["05-2025", "06-2025", "07-2025"]);
    }

    #[test]
    fn test_get_resolves_legacy_spelling() {
        let (repo, _temp_dir) = setup_test_repo();
        // A period stored under an old display spelling is still found by
        // its canonical key, and vice versa
        repo.store_period(&period("JUNHO/25", "JUNHO/25")).unwrap();
        assert!(repo.get_period("06-2025").unwrap().is_some());
        assert!(repo.get_period("junho/2025").unwrap().is_some());
        assert!(repo.get_period("07-2025").unwrap().is_none());
    }

    #[test]
    fn test_store_replaces_same_semantic_period() {
        let (repo, _temp_dir) = setup_test_repo();
        repo.store_period(&period("JUNHO/25", "JUNHO/25")).unwrap();
        repo.store_period(&period("06-2025", "Junho/25")).unwrap();

        let listed = repo.list_periods().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].value, "06-2025");
    }

    #[test]
    fn test_delete_period() {
        let (repo, _temp_dir) = setup_test_repo();
        repo.store_period(&period("06-2025", "Junho/25")).unwrap();
        assert!(repo.delete_period("JUNHO/25").unwrap());
        assert!(!repo.delete_period("06-2025").unwrap());
        assert!(repo.list_periods().unwrap().is_empty());
    }
}
