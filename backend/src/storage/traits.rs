//! # Storage Traits
//!
//! Interfaces the domain layer uses to reach the four backing collections
//! (students, status history, follow-ups, available months). The concrete
//! backend is interchangeable; the services never see file paths or rows.

use anyhow::Result;
use chrono::NaiveDate;

use crate::domain::models::{FollowUp, ReportingPeriod, StatusHistoryEntry, Student};

/// Student collection operations.
///
/// A student row alone is incomplete: every read that returns `Student`
/// values attaches the ordered status history and follow-up collections.
pub trait StudentStorage: Send + Sync {
    /// Insert or replace a single student by id
    fn upsert_student(&self, student: &Student) -> Result<()>;

    /// Insert or replace many students in fixed-size batches. A batch
    /// rejected by access control degrades to row-by-row writes; any other
    /// failure aborts. Returns the number of rows written.
    fn upsert_batch(&self, students: &[Student]) -> Result<usize>;

    /// Fetch one student with history and follow-ups attached
    fn get_student(&self, student_id: &str) -> Result<Option<Student>>;

    /// Case-insensitive lookup by period key, retrying known legacy
    /// spellings of the same period and healing their keys on a hit
    fn fetch_by_period(&self, period_key: &str) -> Result<Vec<Student>>;

    /// Load every student and keep the ones visible in the target period
    /// according to the vencimento rules (rollover-aware view)
    fn fetch_all_and_filter_by_vencimento(
        &self,
        target_period: &str,
        today: NaiveDate,
    ) -> Result<Vec<Student>>;

    /// Delete a student and its dependent history/follow-up rows.
    /// Permission failures on the dependent rows do not block the student
    /// deletion; a student-row failure aborts.
    fn delete_student(&self, student_id: &str) -> Result<()>;

    /// Delete every student whose period key matches any known spelling of
    /// the given period. Returns how many were removed.
    fn delete_by_period(&self, period_key: &str) -> Result<usize>;

    /// Whether any rows exist for the period (any spelling). Degrades to
    /// `false` when the store denies access.
    fn period_has_data(&self, period_key: &str) -> Result<bool>;
}

/// Append-only audit trail operations.
pub trait StatusHistoryStorage: Send + Sync {
    /// Append one entry. Entries are never mutated or reordered.
    fn append_entry(&self, entry: &StatusHistoryEntry) -> Result<()>;

    /// Entries for a student in append order, oldest first
    fn list_for_student(&self, student_id: &str) -> Result<Vec<StatusHistoryEntry>>;

    /// Remove a student's entries (only done when the student is deleted).
    /// Returns how many were removed.
    fn delete_for_student(&self, student_id: &str) -> Result<usize>;
}

/// Follow-up note operations.
pub trait FollowUpStorage: Send + Sync {
    fn store_follow_up(&self, follow_up: &FollowUp) -> Result<()>;

    fn get_follow_up(&self, follow_up_id: &str) -> Result<Option<FollowUp>>;

    /// Notes for a student in creation order, oldest first
    fn list_for_student(&self, student_id: &str) -> Result<Vec<FollowUp>>;

    fn update_follow_up(&self, follow_up: &FollowUp) -> Result<()>;

    /// Returns true if the note existed and was deleted
    fn delete_follow_up(&self, follow_up_id: &str) -> Result<bool>;

    /// Remove a student's notes. Returns how many were removed.
    fn delete_for_student(&self, student_id: &str) -> Result<usize>;
}

/// Reporting-period collection operations.
pub trait PeriodStorage: Send + Sync {
    /// All known periods, oldest first
    fn list_periods(&self) -> Result<Vec<ReportingPeriod>>;

    fn get_period(&self, value: &str) -> Result<Option<ReportingPeriod>>;

    /// Insert or replace a period by canonical key
    fn store_period(&self, period: &ReportingPeriod) -> Result<()>;

    /// Returns true if the period existed and was deleted
    fn delete_period(&self, value: &str) -> Result<bool>;
}
