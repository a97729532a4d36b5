//! Command and result types for student operations.

use crate::domain::models::{FollowUp, Student};

#[derive(Debug, Clone)]
pub struct RegisterStudentCommand {
    pub nome: String,
    pub curso: Option<String>,
    pub valor_devido: f64,
    pub data_vencimento: String,
    pub mes: String,
    pub follow_up: Option<String>,
    pub observacoes: Option<String>,
    pub criado_por: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisterStudentResult {
    pub student: Student,
}

/// Field edits on a student record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateStudentCommand {
    pub student_id: String,
    pub follow_up: Option<String>,
    pub observacoes: Option<String>,
    pub data_pagamento: Option<String>,
    pub primeiro_contato: Option<String>,
    pub ultimo_contato: Option<String>,
    /// Identity of whoever is editing; checked against `criado_por`
    pub actor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DeleteStudentCommand {
    pub student_id: String,
}

/// Explicit mutation outcome. Deletion is signaled by its own variant,
/// never by a stripped-down student object.
#[derive(Debug, Clone, PartialEq)]
pub enum StudentChange {
    Updated(Student),
    Deleted(String),
}

#[derive(Debug, Clone)]
pub struct AdvanceStatusCommand {
    pub student_id: String,
    pub actor: String,
}

#[derive(Debug, Clone)]
pub struct RevertStatusCommand {
    pub student_id: String,
    pub actor: String,
}

/// Outcome of an advance/revert request. `changed` is false for the two
/// legal no-ops (advance at the terminal state, revert at the first).
#[derive(Debug, Clone)]
pub struct TransitionResult {
    pub student: Student,
    pub changed: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AddFollowUpCommand {
    pub student_id: String,
    pub content: String,
    pub actor: String,
}

#[derive(Debug, Clone)]
pub struct UpdateFollowUpCommand {
    pub follow_up_id: String,
    pub content: String,
    pub actor: String,
}

#[derive(Debug, Clone)]
pub struct DeleteFollowUpCommand {
    pub follow_up_id: String,
    pub actor: String,
}

#[derive(Debug, Clone)]
pub struct FollowUpResult {
    pub follow_up: FollowUp,
}
