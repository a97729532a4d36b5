//! Thin HTTP layer over the domain services. Handlers translate requests
//! into commands, map errors onto the `{success: false, message}` shape,
//! and never hold business rules of their own.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::domain::commands::periods::{
    CreatePeriodCommand, DeleteMonthCommand, ImportRowsCommand, ImportedRow, RolloverCommand,
};
use crate::domain::commands::students::{
    AddFollowUpCommand, AdvanceStatusCommand, DeleteFollowUpCommand, DeleteStudentCommand,
    RegisterStudentCommand, RevertStatusCommand, StudentChange, UpdateFollowUpCommand,
    UpdateStudentCommand,
};
use crate::domain::models::follow_up::FollowUpError;
use crate::domain::models::period::PeriodError;
use crate::domain::models::student::StudentValidationError;
use crate::domain::models::{self, CollectionStatus};
use crate::domain::TransitionError;
use crate::storage::StorageError;
use crate::Backend;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<Backend>,
    /// Period targeted by the legacy GET /import trigger
    pub import_target: String,
}

impl AppState {
    pub fn new(backend: Arc<Backend>, import_target: String) -> Self {
        Self {
            backend,
            import_target,
        }
    }
}

// ---------------------------------------------------------------------------
// DTO mapping
// ---------------------------------------------------------------------------

fn status_to_dto(status: CollectionStatus) -> shared::CollectionStatus {
    match status {
        CollectionStatus::Inadimplente => shared::CollectionStatus::Inadimplente,
        CollectionStatus::MensagemEnviada => shared::CollectionStatus::MensagemEnviada,
        CollectionStatus::RespostaRecebida => shared::CollectionStatus::RespostaRecebida,
        CollectionStatus::PagamentoFeito => shared::CollectionStatus::PagamentoFeito,
    }
}

fn history_to_dto(entry: models::StatusHistoryEntry) -> shared::StatusHistoryEntry {
    shared::StatusHistoryEntry {
        id: entry.id,
        student_id: entry.student_id,
        old_status: status_to_dto(entry.old_status),
        new_status: status_to_dto(entry.new_status),
        changed_by: entry.changed_by,
        changed_at: entry.changed_at.to_rfc3339(),
    }
}

fn follow_up_to_dto(follow_up: models::FollowUp) -> shared::FollowUp {
    shared::FollowUp {
        id: follow_up.id,
        student_id: follow_up.student_id,
        content: follow_up.content,
        created_by: follow_up.created_by,
        created_at: follow_up.created_at.to_rfc3339(),
        updated_at: follow_up.updated_at.to_rfc3339(),
    }
}

pub fn student_to_dto(student: models::Student) -> shared::Student {
    shared::Student {
        id: student.id,
        nome: student.nome,
        curso: student.curso,
        valor_devido: student.valor_devido,
        data_vencimento: student.data_vencimento,
        dias_atraso: student.dias_atraso,
        follow_up: student.follow_up,
        observacoes: student.observacoes,
        primeiro_contato: student.primeiro_contato,
        ultimo_contato: student.ultimo_contato,
        data_pagamento: student.data_pagamento,
        mes: student.mes,
        criado_por: student.criado_por,
        status: status_to_dto(student.status),
        historico: student.historico.into_iter().map(history_to_dto).collect(),
        follow_ups: student.follow_ups.into_iter().map(follow_up_to_dto).collect(),
        created_at: student.created_at.to_rfc3339(),
        updated_at: student.updated_at.to_rfc3339(),
    }
}

fn change_to_dto(change: StudentChange) -> shared::StudentChange {
    match change {
        StudentChange::Updated(student) => shared::StudentChange::Updated {
            student: student_to_dto(student),
        },
        StudentChange::Deleted(id) => shared::StudentChange::Deleted { id },
    }
}

fn period_to_dto(period: models::ReportingPeriod) -> shared::MonthOption {
    shared::MonthOption {
        value: period.value,
        label: period.label,
        active: period.active,
    }
}

/// Map a service error onto an HTTP status and the failure body.
fn failure(err: anyhow::Error) -> (StatusCode, Json<shared::FailureResponse>) {
    let status = if let Some(transition) = err.downcast_ref::<TransitionError>() {
        match transition {
            TransitionError::MissingFollowUp | TransitionError::MissingPaymentDate => {
                StatusCode::BAD_REQUEST
            }
            TransitionError::StudentNotFound(_) => StatusCode::NOT_FOUND,
            TransitionError::TransitionInFlight => StatusCode::CONFLICT,
        }
    } else if let Some(validation) = err.downcast_ref::<StudentValidationError>() {
        match validation {
            StudentValidationError::NotCreator => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        }
    } else if let Some(follow_up) = err.downcast_ref::<FollowUpError>() {
        match follow_up {
            FollowUpError::NotOwner => StatusCode::FORBIDDEN,
            FollowUpError::NotFound(_) => StatusCode::NOT_FOUND,
            FollowUpError::EmptyContent => StatusCode::BAD_REQUEST,
        }
    } else if let Some(period) = err.downcast_ref::<PeriodError>() {
        match period {
            PeriodError::Unrecognized(_) => StatusCode::BAD_REQUEST,
            PeriodError::Duplicate(_) => StatusCode::CONFLICT,
        }
    } else if let Some(storage) = err.downcast_ref::<StorageError>() {
        match storage {
            StorageError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {:#}", err);
    }
    (status, Json(shared::FailureResponse::new(err.to_string())))
}

// ---------------------------------------------------------------------------
// Students
// ---------------------------------------------------------------------------

/// Axum handler function for GET /api/months/:period/students
pub async fn list_students(
    State(state): State<AppState>,
    Path(period): Path<String>,
) -> impl IntoResponse {
    info!("GET /api/students/{}", period);

    match state.backend.student_service.list_visible_for_period(&period) {
        Ok(students) => (
            StatusCode::OK,
            Json(shared::StudentListResponse {
                success: true,
                students: students.into_iter().map(student_to_dto).collect(),
            }),
        )
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

/// Axum handler function for POST /api/students
pub async fn register_student(
    State(state): State<AppState>,
    Json(request): Json<shared::RegisterStudentRequest>,
) -> impl IntoResponse {
    info!("POST /api/students - nome: {}", request.nome);

    let command = RegisterStudentCommand {
        nome: request.nome,
        curso: request.curso,
        valor_devido: request.valor_devido,
        data_vencimento: request.data_vencimento,
        mes: request.mes,
        follow_up: request.follow_up,
        observacoes: request.observacoes,
        criado_por: request.criado_por,
    };
    match state.backend.student_service.register_student(command) {
        Ok(result) => (
            StatusCode::CREATED,
            Json(shared::StudentResponse {
                success: true,
                student: student_to_dto(result.student),
            }),
        )
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

/// Axum handler function for PUT /api/students/:id
pub async fn update_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Json(request): Json<shared::UpdateStudentRequest>,
) -> impl IntoResponse {
    info!("PUT /api/students/{}", student_id);

    let command = UpdateStudentCommand {
        student_id,
        follow_up: request.follow_up,
        observacoes: request.observacoes,
        data_pagamento: request.data_pagamento,
        primeiro_contato: request.primeiro_contato,
        ultimo_contato: request.ultimo_contato,
        actor: request.actor,
    };
    match state.backend.student_service.update_student(command) {
        Ok(change) => (
            StatusCode::OK,
            Json(shared::StudentChangeResponse {
                success: true,
                change: change_to_dto(change),
            }),
        )
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

/// Axum handler function for DELETE /api/students/:id
pub async fn delete_student(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> impl IntoResponse {
    info!("DELETE /api/students/{}", student_id);

    match state
        .backend
        .student_service
        .delete_student(DeleteStudentCommand { student_id })
    {
        Ok(change) => (
            StatusCode::OK,
            Json(shared::StudentChangeResponse {
                success: true,
                change: change_to_dto(change),
            }),
        )
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

fn transition_response(
    result: crate::domain::commands::students::TransitionResult,
) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(shared::TransitionResponse {
            success: true,
            changed: result.changed,
            student: student_to_dto(result.student),
            message: result.message,
        }),
    )
}

/// Axum handler function for POST /api/students/:id/advance
pub async fn advance_status(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Json(request): Json<shared::TransitionRequest>,
) -> impl IntoResponse {
    info!("POST /api/students/{}/advance by {}", student_id, request.actor);

    match state.backend.status_engine.advance(AdvanceStatusCommand {
        student_id,
        actor: request.actor,
    }) {
        Ok(result) => transition_response(result).into_response(),
        Err(e) => failure(e).into_response(),
    }
}

/// Axum handler function for POST /api/students/:id/revert
pub async fn revert_status(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Json(request): Json<shared::TransitionRequest>,
) -> impl IntoResponse {
    info!("POST /api/students/{}/revert by {}", student_id, request.actor);

    match state.backend.status_engine.revert(RevertStatusCommand {
        student_id,
        actor: request.actor,
    }) {
        Ok(result) => transition_response(result).into_response(),
        Err(e) => failure(e).into_response(),
    }
}

// ---------------------------------------------------------------------------
// Follow-ups
// ---------------------------------------------------------------------------

/// Axum handler function for POST /api/students/:id/follow-ups
pub async fn add_follow_up(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
    Json(request): Json<shared::FollowUpRequest>,
) -> impl IntoResponse {
    info!("POST /api/students/{}/follow-ups", student_id);

    match state.backend.student_service.add_follow_up(AddFollowUpCommand {
        student_id,
        content: request.content,
        actor: request.actor,
    }) {
        Ok(follow_up) => (
            StatusCode::CREATED,
            Json(shared::FollowUpResponse {
                success: true,
                follow_up: follow_up_to_dto(follow_up),
            }),
        )
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

/// Axum handler function for PUT /api/follow-ups/:id
pub async fn update_follow_up(
    State(state): State<AppState>,
    Path(follow_up_id): Path<String>,
    Json(request): Json<shared::FollowUpRequest>,
) -> impl IntoResponse {
    info!("PUT /api/follow-ups/{}", follow_up_id);

    match state.backend.student_service.update_follow_up(UpdateFollowUpCommand {
        follow_up_id,
        content: request.content,
        actor: request.actor,
    }) {
        Ok(follow_up) => (
            StatusCode::OK,
            Json(shared::FollowUpResponse {
                success: true,
                follow_up: follow_up_to_dto(follow_up),
            }),
        )
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

/// Axum handler function for DELETE /api/follow-ups/:id
pub async fn delete_follow_up(
    State(state): State<AppState>,
    Path(follow_up_id): Path<String>,
    Json(request): Json<shared::DeleteFollowUpRequest>,
) -> impl IntoResponse {
    info!("DELETE /api/follow-ups/{}", follow_up_id);

    match state.backend.student_service.delete_follow_up(DeleteFollowUpCommand {
        follow_up_id,
        actor: request.actor,
    }) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "success": true })),
        )
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

/// Axum handler function for GET /api/months
pub async fn list_months(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /api/months");

    match state.backend.import_service.list_periods() {
        Ok(periods) => (
            StatusCode::OK,
            Json(shared::MonthListResponse {
                success: true,
                months: periods.into_iter().map(period_to_dto).collect(),
            }),
        )
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

/// Axum handler function for POST /api/months
pub async fn create_month(
    State(state): State<AppState>,
    Json(request): Json<shared::CreateMonthRequest>,
) -> impl IntoResponse {
    info!("POST /api/months - value: {}", request.value);

    match state
        .backend
        .import_service
        .create_period(CreatePeriodCommand { value: request.value })
    {
        Ok(result) => (
            StatusCode::CREATED,
            Json(shared::MonthResponse {
                success: true,
                month: period_to_dto(result.period),
            }),
        )
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

/// Axum handler function for POST /delete-month
pub async fn delete_month(
    State(state): State<AppState>,
    Json(request): Json<shared::DeleteMonthRequest>,
) -> impl IntoResponse {
    info!("POST /delete-month - value: {:?}", request.month_value);

    let value = match request.month_value {
        Some(value) if !value.trim().is_empty() => value,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(shared::FailureResponse::new("monthValue is required")),
            )
                .into_response()
        }
    };

    match state.backend.import_service.delete_month(DeleteMonthCommand { value }) {
        Ok(result) => (
            StatusCode::OK,
            Json(shared::DeleteMonthResponse {
                success: true,
                deleted_students: result.deleted_students,
            }),
        )
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

/// Axum handler function for GET /import. Rollover into the configured
/// target period.
pub async fn import_previous_month(State(state): State<AppState>) -> impl IntoResponse {
    info!("GET /import - target: {}", state.import_target);

    match state.backend.import_service.rollover_period(RolloverCommand {
        target: state.import_target.clone(),
    }) {
        Ok(result) => (
            StatusCode::OK,
            Json(shared::ImportResponse {
                success: true,
                count: result.written,
                message: result.message,
            }),
        )
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

/// Axum handler function for POST /api/students/import. Intake of rows
/// produced by the external tabular source.
pub async fn import_rows(
    State(state): State<AppState>,
    Json(request): Json<shared::ImportRowsRequest>,
) -> impl IntoResponse {
    info!("POST /api/students/import - {} rows into {}", request.rows.len(), request.mes);

    let command = ImportRowsCommand {
        mes: request.mes,
        rows: request
            .rows
            .into_iter()
            .map(|row| ImportedRow {
                nome: row.nome,
                valor_devido: row.valor_devido,
                data_vencimento: row.data_vencimento,
                primeiro_contato: row.primeiro_contato,
                ultimo_contato: row.ultimo_contato,
                observacoes: row.observacoes,
                follow_up: row.follow_up,
            })
            .collect(),
    };
    match state.backend.import_service.import_rows(command) {
        Ok(result) => (
            StatusCode::CREATED,
            Json(shared::StudentListResponse {
                success: true,
                students: result.imported.into_iter().map(student_to_dto).collect(),
            }),
        )
            .into_response(),
        Err(e) => failure(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_state() -> (AppState, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let backend = Backend::new(temp_dir.path().to_path_buf()).unwrap();
        (
            AppState::new(Arc::new(backend), "07-2025".to_string()),
            temp_dir,
        )
    }

    #[test]
    fn test_failure_maps_error_classes_to_statuses() {
        let (status, _) = failure(TransitionError::MissingFollowUp.into());
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = failure(TransitionError::StudentNotFound("x".to_string()).into());
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = failure(TransitionError::TransitionInFlight.into());
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = failure(FollowUpError::NotOwner.into());
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = failure(StorageError::Connection("down".to_string()).into());
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let (status, _) = failure(anyhow::anyhow!("unexpected"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_student_dto_roundtrip_shape() {
        let (state, _tmp) = setup_test_state();
        let result = state
            .backend
            .student_service
            .register_student(RegisterStudentCommand {
                nome: "Maria".to_string(),
                curso: None,
                valor_devido: 100.0,
                data_vencimento: "10/06/2025".to_string(),
                mes: "06-2025".to_string(),
                follow_up: None,
                observacoes: None,
                criado_por: None,
            })
            .unwrap();

        let dto = student_to_dto(result.student.clone());
        assert_eq!(dto.id, result.student.id);
        assert_eq!(dto.status, shared::CollectionStatus::Inadimplente);
        assert_eq!(dto.mes, "06-2025");
        // Wire format is camelCase
        let json = serde_json::to_value(&dto).unwrap();
        assert!(json.get("valorDevido").is_some());
        assert!(json.get("dataVencimento").is_some());
        assert!(json.get("diasAtraso").is_some());
    }
}
