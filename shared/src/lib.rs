use serde::{Deserialize, Serialize};

/// Student ID in format: "student::<uuid>"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub nome: String,
    /// Course the student is enrolled in, when known
    pub curso: Option<String>,
    /// Amount owed (non-negative)
    pub valor_devido: f64,
    /// Due date as entered: "DD/MM/YYYY" or "DD/MM"
    pub data_vencimento: String,
    /// Days overdue; recomputed live while the account is open,
    /// frozen at the value observed when payment is recorded
    pub dias_atraso: i64,
    /// Legacy single free-text follow-up field
    pub follow_up: String,
    pub observacoes: String,
    /// First/last contact timestamps (RFC 3339), when recorded
    pub primeiro_contato: Option<String>,
    pub ultimo_contato: Option<String>,
    /// Payment date; required before the account can be closed
    pub data_pagamento: Option<String>,
    /// Reporting period key ("MM-YYYY")
    pub mes: String,
    /// Identity of whoever registered the record (edit permission)
    pub criado_por: Option<String>,
    pub status: CollectionStatus,
    /// Ordered audit trail of status changes
    pub historico: Vec<StatusHistoryEntry>,
    /// Ordered timestamped follow-up notes
    pub follow_ups: Vec<FollowUp>,
    pub created_at: String,
    pub updated_at: String,
}

/// The four stages of the collection workflow, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionStatus {
    Inadimplente,
    MensagemEnviada,
    RespostaRecebida,
    PagamentoFeito,
}

/// One audit record per successful status transition. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub id: String,
    pub student_id: String,
    pub old_status: CollectionStatus,
    pub new_status: CollectionStatus,
    pub changed_by: String,
    pub changed_at: String,
}

/// A timestamped collection note, distinct from the legacy `followUp` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUp {
    pub id: String,
    pub student_id: String,
    pub content: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A reporting period as shown in the month selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthOption {
    /// Canonical "MM-YYYY" key
    pub value: String,
    /// Display spelling, e.g. "Junho/25"
    pub label: String,
    pub active: bool,
}

/// Explicit mutation outcome handed back to callers. Replaces the old
/// convention of signaling a deletion by an object carrying only an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum StudentChange {
    Updated { student: Student },
    Deleted { id: String },
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterStudentRequest {
    pub nome: String,
    pub curso: Option<String>,
    pub valor_devido: f64,
    pub data_vencimento: String,
    pub mes: String,
    pub follow_up: Option<String>,
    pub observacoes: Option<String>,
    pub criado_por: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudentRequest {
    pub follow_up: Option<String>,
    pub observacoes: Option<String>,
    pub data_pagamento: Option<String>,
    pub primeiro_contato: Option<String>,
    pub ultimo_contato: Option<String>,
    /// Identity of whoever is editing; checked against `criadoPor`
    pub actor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    /// Identity recorded on the audit entry
    pub actor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRequest {
    pub content: String,
    pub actor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFollowUpRequest {
    pub actor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMonthRequest {
    /// Period key or any known legacy spelling of it
    pub month_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMonthRequest {
    pub value: String,
}

/// Shape produced by the external spreadsheet import; transport is not ours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedRow {
    pub nome: String,
    pub valor_devido: f64,
    pub data_vencimento: String,
    pub primeiro_contato: Option<String>,
    pub ultimo_contato: Option<String>,
    pub observacoes: Option<String>,
    pub follow_up: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRowsRequest {
    pub mes: String,
    pub rows: Vec<ImportedRow>,
}

// ---------------------------------------------------------------------------
// Responses. Success bodies carry `success: true`, failures are
// `{success: false, message}` with an appropriate HTTP status.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentListResponse {
    pub success: bool,
    pub students: Vec<Student>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResponse {
    pub success: bool,
    pub student: Student,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub success: bool,
    pub changed: bool,
    pub student: Student,
    /// Informational note for no-op transitions
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentChangeResponse {
    pub success: bool,
    pub change: StudentChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpResponse {
    pub success: bool,
    pub follow_up: FollowUp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthListResponse {
    pub success: bool,
    pub months: Vec<MonthOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthResponse {
    pub success: bool,
    pub month: MonthOption,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMonthResponse {
    pub success: bool,
    pub deleted_students: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    pub count: usize,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    pub success: bool,
    pub message: String,
}

impl FailureResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
