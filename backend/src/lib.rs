//! # Cobranca Tracker Backend
//!
//! Core of the delinquency-tracking board: the four-stage collection
//! workflow with its audit trail, the month/vencimento reconciliation
//! rules, and the repositories over the backing store. The REST layer in
//! [`rest`] is a thin wrapper; everything it does goes through the
//! services constructed here.

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

pub mod domain;
pub mod rest;
pub mod storage;

use domain::{ImportService, StatusTransitionEngine, StudentService};
use storage::csv::{CsvConnection, PeriodRepository, StudentRepository};

/// Main backend struct that wires the repositories into the services. The
/// connection handle is constructed once here and passed down explicitly;
/// nothing reaches for a global client.
pub struct Backend {
    pub student_service: StudentService,
    pub status_engine: StatusTransitionEngine,
    pub import_service: ImportService,
}

impl Backend {
    /// Create a backend rooted at the given data directory.
    pub fn new(data_directory: PathBuf) -> Result<Self> {
        let connection = Arc::new(CsvConnection::new(data_directory)?);

        let student_repository = StudentRepository::new(connection.clone());
        let period_repository = PeriodRepository::new(connection);

        let student_service = StudentService::new(student_repository.clone());
        let status_engine = StatusTransitionEngine::new(student_repository.clone());
        let import_service = ImportService::new(student_repository, period_repository);

        Ok(Backend {
            student_service,
            status_engine,
            import_service,
        })
    }
}
