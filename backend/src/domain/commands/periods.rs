//! Command and result types for period operations.

use crate::domain::models::{ReportingPeriod, Student};

#[derive(Debug, Clone)]
pub struct CreatePeriodCommand {
    /// Canonical key or any recognized legacy spelling
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct CreatePeriodResult {
    pub period: ReportingPeriod,
}

#[derive(Debug, Clone)]
pub struct RolloverCommand {
    /// Target period the previous month's open records are cloned into
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct RolloverResult {
    /// How many records were written; zero is an informational no-op
    pub written: usize,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeleteMonthCommand {
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct DeleteMonthResult {
    pub deleted_students: usize,
}

/// Output shape of the external tabular import; the transport that
/// produced it is not the core's concern.
#[derive(Debug, Clone)]
pub struct ImportedRow {
    pub nome: String,
    pub valor_devido: f64,
    pub data_vencimento: String,
    pub primeiro_contato: Option<String>,
    pub ultimo_contato: Option<String>,
    pub observacoes: Option<String>,
    pub follow_up: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImportRowsCommand {
    pub mes: String,
    pub rows: Vec<ImportedRow>,
}

#[derive(Debug, Clone)]
pub struct ImportRowsResult {
    pub imported: Vec<Student>,
}
