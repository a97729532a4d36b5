//! Status transition engine for the collection workflow.
//!
//! Owns the only path that moves a student between stages. Each successful
//! transition appends one audit entry attributed to the acting user; the
//! entry is durable only if its write succeeded, but a failed history
//! write never rolls back a status change that already landed (accepted
//! inconsistency window, logged).
//!
//! Transitions are two-phase: the engine mutates a pending clone of the
//! stored snapshot and persists it before handing it back. A failed
//! student write surfaces the storage error and leaves the last known-good
//! snapshot authoritative.

use anyhow::Result;
use chrono::{Local, Utc};
use log::{error, info, warn};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::commands::students::{
    AdvanceStatusCommand, RevertStatusCommand, TransitionResult,
};
use super::models::{CollectionStatus, StatusHistoryEntry, Student};
use super::vencimento;
use crate::storage::csv::StudentRepository;
use crate::storage::traits::{StatusHistoryStorage, StudentStorage};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransitionError {
    #[error("followUp must be filled in before leaving inadimplente")]
    MissingFollowUp,
    #[error("dataPagamento must be set before moving to pagamento-feito")]
    MissingPaymentDate,
    #[error("Student not found: {0}")]
    StudentNotFound(String),
    #[error("A transition for this student is already in flight; try again")]
    TransitionInFlight,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Direction {
    Forward,
    Backward,
}

/// Service owning the four-stage workflow state machine.
#[derive(Clone)]
pub struct StatusTransitionEngine {
    student_repository: StudentRepository,
    /// Student ids with a transition in flight. A second request for the
    /// same id is dropped, not queued; the caller retries.
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl StatusTransitionEngine {
    pub fn new(student_repository: StudentRepository) -> Self {
        Self {
            student_repository,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Move a student one stage forward. Advancing the terminal stage is a
    /// no-op reported as such, not an error.
    pub fn advance(&self, command: AdvanceStatusCommand) -> Result<TransitionResult> {
        info!("Advance requested for {} by {}", command.student_id, command.actor);
        self.transition(command.student_id, command.actor, Direction::Forward)
    }

    /// Move a student one stage back (undo). Reverting the first stage is
    /// a no-op reported as such.
    pub fn revert(&self, command: RevertStatusCommand) -> Result<TransitionResult> {
        info!("Revert requested for {} by {}", command.student_id, command.actor);
        self.transition(command.student_id, command.actor, Direction::Backward)
    }

    fn transition(
        &self,
        student_id: String,
        actor: String,
        direction: Direction,
    ) -> Result<TransitionResult> {
        {
            let mut guard = self.in_flight.lock().expect("in-flight guard poisoned");
            if !guard.insert(student_id.clone()) {
                warn!("Dropping concurrent transition request for {}", student_id);
                return Err(TransitionError::TransitionInFlight.into());
            }
        }

        let result = self.transition_locked(&student_id, &actor, direction);

        self.in_flight
            .lock()
            .expect("in-flight guard poisoned")
            .remove(&student_id);
        result
    }

    fn transition_locked(
        &self,
        student_id: &str,
        actor: &str,
        direction: Direction,
    ) -> Result<TransitionResult> {
        let snapshot = self
            .student_repository
            .get_student(student_id)?
            .ok_or_else(|| TransitionError::StudentNotFound(student_id.to_string()))?;

        let old_status = snapshot.status;
        let new_status = match direction {
            Direction::Forward => old_status.next(),
            Direction::Backward => old_status.previous(),
        };

        if old_status == new_status {
            let message = match direction {
                Direction::Forward => "Nothing to advance: payment already recorded",
                Direction::Backward => "Already at the first stage",
            };
            info!("{} for {}", message, student_id);
            return Ok(TransitionResult {
                student: snapshot,
                changed: false,
                message: Some(message.to_string()),
            });
        }

        if direction == Direction::Forward {
            self.validate_advance(&snapshot, new_status)?;
        }

        let now = Utc::now();
        let today = Local::now().date_naive();

        // Two-phase: mutate a pending clone, persist, only then hand it
        // back as confirmed. Days overdue are computed at this instant;
        // for a terminal transition this is the value that stays frozen.
        let mut pending = snapshot.clone();
        pending.status = new_status;
        pending.updated_at = now;
        pending.dias_atraso = vencimento::dias_atraso(&pending.data_vencimento, today);

        self.student_repository.upsert_student(&pending)?;

        let entry = StatusHistoryEntry {
            id: StatusHistoryEntry::generate_id(),
            student_id: pending.id.clone(),
            old_status,
            new_status,
            changed_by: actor.to_string(),
            changed_at: now,
        };
        match self.student_repository.history_repository().append_entry(&entry) {
            Ok(()) => pending.historico.push(entry),
            Err(e) => {
                // The status write already stands; losing the audit row is
                // the accepted inconsistency, not a reason to fail the user
                error!(
                    "History write failed for {} ({} -> {}), status change stands: {:#}",
                    pending.id,
                    old_status.as_str(),
                    new_status.as_str(),
                    e
                );
            }
        }

        info!(
            "Student {} moved {} -> {} by {}",
            pending.id,
            old_status.as_str(),
            new_status.as_str(),
            actor
        );
        Ok(TransitionResult {
            student: pending,
            changed: true,
            message: None,
        })
    }

    /// Preconditions for a forward move. Backward moves are always legal.
    fn validate_advance(&self, student: &Student, new_status: CollectionStatus) -> Result<()> {
        if student.status == CollectionStatus::Inadimplente && student.follow_up.trim().is_empty() {
            return Err(TransitionError::MissingFollowUp.into());
        }
        if new_status.is_terminal()
            && student
                .data_pagamento
                .as_deref()
                .map_or(true, |d| d.trim().is_empty())
        {
            return Err(TransitionError::MissingPaymentDate.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::CollectionStatus;
    use crate::storage::csv::CsvConnection;
    use tempfile::TempDir;

    fn setup_test() -> (StatusTransitionEngine, StudentRepository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let connection = Arc::new(CsvConnection::new(temp_dir.path()).unwrap());
        let repository = StudentRepository::new(connection);
        (StatusTransitionEngine::new(repository.clone()), repository, temp_dir)
    }

    fn seed_student(
        repository: &StudentRepository,
        status: CollectionStatus,
        follow_up: &str,
        data_pagamento: Option<&str>,
    ) -> Student {
        let now = Utc::now();
        let student = Student {
            id: Student::generate_id(),
            nome: "Carlos Lima".to_string(),
            curso: Some("Bateria".to_string()),
            valor_devido: 180.0,
            data_vencimento: "10/05/2024".to_string(),
            dias_atraso: 0,
            follow_up: follow_up.to_string(),
            observacoes: String::new(),
            primeiro_contato: None,
            ultimo_contato: None,
            data_pagamento: data_pagamento.map(|d| d.to_string()),
            mes: "05-2024".to_string(),
            criado_por: Some("ana".to_string()),
            status,
            historico: Vec::new(),
            follow_ups: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        repository.upsert_student(&student).unwrap();
        student
    }

    fn advance(engine: &StatusTransitionEngine, id: &str) -> Result<TransitionResult> {
        engine.advance(AdvanceStatusCommand {
            student_id: id.to_string(),
            actor: "ana".to_string(),
        })
    }

    fn revert(engine: &StatusTransitionEngine, id: &str) -> Result<TransitionResult> {
        engine.revert(RevertStatusCommand {
            student_id: id.to_string(),
            actor: "ana".to_string(),
        })
    }

    #[test]
    fn test_advance_appends_history_entry() {
        let (engine, repository, _tmp) = setup_test();
        let student = seed_student(&repository, CollectionStatus::Inadimplente, "Cobrado", None);

        let result = advance(&engine, &student.id).unwrap();
        assert!(result.changed);
        assert_eq!(result.student.status, CollectionStatus::MensagemEnviada);
        assert_eq!(result.student.historico.len(), 1);

        let stored = repository.get_student(&student.id).unwrap().unwrap();
        assert_eq!(stored.status, CollectionStatus::MensagemEnviada);
        assert_eq!(stored.historico.len(), 1);
        assert_eq!(stored.historico[0].old_status, CollectionStatus::Inadimplente);
        assert_eq!(stored.historico[0].new_status, CollectionStatus::MensagemEnviada);
        assert_eq!(stored.historico[0].changed_by, "ana");
    }

    #[test]
    fn test_advance_then_revert_restores_status_with_two_entries() {
        let (engine, repository, _tmp) = setup_test();
        let student = seed_student(&repository, CollectionStatus::Inadimplente, "Cobrado", None);

        advance(&engine, &student.id).unwrap();
        let reverted = revert(&engine, &student.id).unwrap();

        // Back where it started, but the trail shows both moves; the
        // revert is a new entry, not a cancellation of the first
        assert_eq!(reverted.student.status, CollectionStatus::Inadimplente);
        let stored = repository.get_student(&student.id).unwrap().unwrap();
        assert_eq!(stored.historico.len(), 2);
        assert_eq!(stored.historico[0].new_status, CollectionStatus::MensagemEnviada);
        assert_eq!(stored.historico[1].old_status, CollectionStatus::MensagemEnviada);
        assert_eq!(stored.historico[1].new_status, CollectionStatus::Inadimplente);
    }

    #[test]
    fn test_revert_at_first_stage_is_noop() {
        let (engine, repository, _tmp) = setup_test();
        let student = seed_student(&repository, CollectionStatus::Inadimplente, "Cobrado", None);

        let result = revert(&engine, &student.id).unwrap();
        assert!(!result.changed);
        assert_eq!(result.student.status, CollectionStatus::Inadimplente);
        assert!(result.message.unwrap().contains("first stage"));

        let stored = repository.get_student(&student.id).unwrap().unwrap();
        assert!(stored.historico.is_empty());
    }

    #[test]
    fn test_advance_at_terminal_is_noop() {
        let (engine, repository, _tmp) = setup_test();
        let student = seed_student(
            &repository,
            CollectionStatus::PagamentoFeito,
            "Cobrado",
            Some("15/05/2024"),
        );

        let result = advance(&engine, &student.id).unwrap();
        assert!(!result.changed);
        assert_eq!(result.student.status, CollectionStatus::PagamentoFeito);
        assert!(repository.get_student(&student.id).unwrap().unwrap().historico.is_empty());
    }

    #[test]
    fn test_advance_requires_follow_up_text() {
        let (engine, repository, _tmp) = setup_test();
        let student = seed_student(&repository, CollectionStatus::Inadimplente, "   ", None);

        let err = advance(&engine, &student.id).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TransitionError>(),
            Some(&TransitionError::MissingFollowUp)
        );
        // Nothing persisted, nothing appended
        let stored = repository.get_student(&student.id).unwrap().unwrap();
        assert_eq!(stored.status, CollectionStatus::Inadimplente);
        assert!(stored.historico.is_empty());
    }

    #[test]
    fn test_terminal_advance_requires_payment_date() {
        let (engine, repository, _tmp) = setup_test();
        let student =
            seed_student(&repository, CollectionStatus::RespostaRecebida, "Cobrado", None);

        let err = advance(&engine, &student.id).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TransitionError>(),
            Some(&TransitionError::MissingPaymentDate)
        );
        assert_eq!(
            repository.get_student(&student.id).unwrap().unwrap().status,
            CollectionStatus::RespostaRecebida
        );
    }

    #[test]
    fn test_terminal_advance_freezes_dias_atraso() {
        let (engine, repository, _tmp) = setup_test();
        let student = seed_student(
            &repository,
            CollectionStatus::RespostaRecebida,
            "Cobrado",
            Some("15/05/2024"),
        );

        let result = advance(&engine, &student.id).unwrap();
        assert!(result.changed);
        assert_eq!(result.student.status, CollectionStatus::PagamentoFeito);

        let today = Local::now().date_naive();
        let expected = vencimento::dias_atraso("10/05/2024", today);
        assert!(expected > 0);
        assert_eq!(result.student.dias_atraso, expected);
        // Terminal accounts report the stored value, not a live one
        assert_eq!(result.student.dias_atraso_em(today), expected);
    }

    #[test]
    fn test_missing_student_is_distinct_error() {
        let (engine, _repository, _tmp) = setup_test();
        let err = advance(&engine, "student::ghost").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TransitionError>(),
            Some(TransitionError::StudentNotFound(_))
        ));
    }

    #[test]
    fn test_concurrent_transition_is_dropped_not_queued() {
        let (engine, repository, _tmp) = setup_test();
        let student = seed_student(&repository, CollectionStatus::Inadimplente, "Cobrado", None);

        // Simulate an in-flight transition for this student
        engine
            .in_flight
            .lock()
            .unwrap()
            .insert(student.id.clone());

        let err = advance(&engine, &student.id).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TransitionError>(),
            Some(&TransitionError::TransitionInFlight)
        );
        // Dropped request touched nothing
        let stored = repository.get_student(&student.id).unwrap().unwrap();
        assert_eq!(stored.status, CollectionStatus::Inadimplente);
        assert!(stored.historico.is_empty());

        // After the in-flight one completes, a retry goes through once
        engine.in_flight.lock().unwrap().remove(&student.id);
        let result = advance(&engine, &student.id).unwrap();
        assert!(result.changed);
        assert_eq!(
            repository.get_student(&student.id).unwrap().unwrap().historico.len(),
            1
        );
    }

    #[test]
    fn test_guard_released_after_validation_failure() {
        let (engine, repository, _tmp) = setup_test();
        let student = seed_student(&repository, CollectionStatus::Inadimplente, "", None);

        // A rejected transition must not leave the student stuck busy
        let first = advance(&engine, &student.id).unwrap_err();
        assert_eq!(
            first.downcast_ref::<TransitionError>(),
            Some(&TransitionError::MissingFollowUp)
        );
        let second = advance(&engine, &student.id).unwrap_err();
        assert_eq!(
            second.downcast_ref::<TransitionError>(),
            Some(&TransitionError::MissingFollowUp)
        );
    }

    #[test]
    fn test_revert_from_terminal_returns_to_previous_stage() {
        let (engine, repository, _tmp) = setup_test();
        let student = seed_student(
            &repository,
            CollectionStatus::PagamentoFeito,
            "Cobrado",
            Some("15/05/2024"),
        );

        let result = revert(&engine, &student.id).unwrap();
        assert!(result.changed);
        assert_eq!(result.student.status, CollectionStatus::RespostaRecebida);
    }
}
