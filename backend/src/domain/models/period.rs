//! Domain model for a reporting period ("month").
use serde::{Deserialize, Serialize};

/// A named collection scope. `value` is the canonical "MM-YYYY" key and is
/// unique; historical spellings of the same period ("JUNHO/25",
/// "junho/2025") are reconciled onto it, never stored as separate periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportingPeriod {
    pub value: String,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PeriodError {
    #[error("Unrecognized period key: {0}")]
    Unrecognized(String),
    #[error("Period already exists: {0}")]
    Duplicate(String),
}
