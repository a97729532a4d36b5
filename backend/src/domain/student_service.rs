//! Student record service: registration, field edits, follow-up notes and
//! deletion. Status moves are the transition engine's job, never this
//! service's.

use anyhow::{anyhow, Result};
use chrono::{Local, Utc};
use log::{info, warn};

use super::commands::students::{
    AddFollowUpCommand, DeleteFollowUpCommand, DeleteStudentCommand, RegisterStudentCommand,
    RegisterStudentResult, StudentChange, UpdateFollowUpCommand, UpdateStudentCommand,
};
use super::models::follow_up::FollowUpError;
use super::models::student::StudentValidationError;
use super::models::{CollectionStatus, FollowUp, Student};
use super::{months, vencimento};
use crate::storage::csv::StudentRepository;
use crate::storage::traits::{FollowUpStorage, StudentStorage};

/// Service for managing student records on the collection board.
#[derive(Clone)]
pub struct StudentService {
    student_repository: StudentRepository,
}

impl StudentService {
    pub fn new(student_repository: StudentRepository) -> Self {
        Self { student_repository }
    }

    /// Register a new delinquent account. New records always start at
    /// `inadimplente` with an empty audit trail.
    pub fn register_student(&self, command: RegisterStudentCommand) -> Result<RegisterStudentResult> {
        info!("Registering student: {}", command.nome);
        self.validate_register_command(&command)?;

        let mes = months::resolve_legacy_key(&command.mes)
            .ok_or_else(|| StudentValidationError::InvalidPeriodKey(command.mes.clone()))?;

        let now = Utc::now();
        let today = Local::now().date_naive();
        let student = Student {
            id: Student::generate_id(),
            nome: command.nome.trim().to_string(),
            curso: command.curso,
            valor_devido: command.valor_devido,
            data_vencimento: command.data_vencimento.trim().to_string(),
            dias_atraso: vencimento::dias_atraso(command.data_vencimento.trim(), today),
            follow_up: command.follow_up.unwrap_or_default(),
            observacoes: command.observacoes.unwrap_or_default(),
            primeiro_contato: None,
            ultimo_contato: None,
            data_pagamento: None,
            mes,
            criado_por: command.criado_por,
            status: CollectionStatus::Inadimplente,
            historico: Vec::new(),
            follow_ups: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        self.student_repository.upsert_student(&student)?;
        info!("Registered student {} ({})", student.nome, student.id);
        Ok(RegisterStudentResult { student })
    }

    /// Students visible in a period, rollover-aware, with days overdue
    /// refreshed for accounts that are still open.
    pub fn list_visible_for_period(&self, period_key: &str) -> Result<Vec<Student>> {
        let target = months::resolve_legacy_key(period_key)
            .ok_or_else(|| StudentValidationError::InvalidPeriodKey(period_key.to_string()))?;
        let today = Local::now().date_naive();
        let mut students = self
            .student_repository
            .fetch_all_and_filter_by_vencimento(&target, today)?;
        for student in &mut students {
            student.dias_atraso = student.dias_atraso_em(today);
        }
        Ok(students)
    }

    pub fn get_student(&self, student_id: &str) -> Result<Option<Student>> {
        let today = Local::now().date_naive();
        Ok(self.student_repository.get_student(student_id)?.map(|mut s| {
            s.dias_atraso = s.dias_atraso_em(today);
            s
        }))
    }

    /// Apply field edits. When the record has a creator and the editor is
    /// known, only the creator may edit.
    pub fn update_student(&self, command: UpdateStudentCommand) -> Result<StudentChange> {
        let mut student = self
            .student_repository
            .get_student(&command.student_id)?
            .ok_or_else(|| anyhow!("Student not found: {}", command.student_id))?;

        if let (Some(creator), Some(actor)) = (&student.criado_por, &command.actor) {
            if creator != actor {
                warn!(
                    "Edit on {} by {} rejected; record belongs to {}",
                    student.id, actor, creator
                );
                return Err(StudentValidationError::NotCreator.into());
            }
        }

        if let Some(follow_up) = command.follow_up {
            student.follow_up = follow_up;
        }
        if let Some(observacoes) = command.observacoes {
            student.observacoes = observacoes;
        }
        if let Some(data_pagamento) = command.data_pagamento {
            student.data_pagamento =
                if data_pagamento.trim().is_empty() { None } else { Some(data_pagamento) };
        }
        if let Some(primeiro_contato) = command.primeiro_contato {
            student.primeiro_contato = Some(primeiro_contato);
        }
        if let Some(ultimo_contato) = command.ultimo_contato {
            student.ultimo_contato = Some(ultimo_contato);
        }
        student.updated_at = Utc::now();

        self.student_repository.upsert_student(&student)?;
        info!("Updated student {}", student.id);
        Ok(StudentChange::Updated(student))
    }

    /// Delete a student and its dependent rows.
    pub fn delete_student(&self, command: DeleteStudentCommand) -> Result<StudentChange> {
        self.student_repository.delete_student(&command.student_id)?;
        Ok(StudentChange::Deleted(command.student_id))
    }

    // -- Follow-up notes ----------------------------------------------------

    pub fn add_follow_up(&self, command: AddFollowUpCommand) -> Result<FollowUp> {
        if command.content.trim().is_empty() {
            return Err(FollowUpError::EmptyContent.into());
        }
        // The student must exist; notes never dangle
        self.student_repository
            .get_student(&command.student_id)?
            .ok_or_else(|| anyhow!("Student not found: {}", command.student_id))?;

        let now = Utc::now();
        let follow_up = FollowUp {
            id: FollowUp::generate_id(),
            student_id: command.student_id,
            content: command.content.trim().to_string(),
            created_by: command.actor,
            created_at: now,
            updated_at: now,
        };
        self.student_repository
            .follow_up_repository()
            .store_follow_up(&follow_up)?;
        info!("Added follow-up {} to {}", follow_up.id, follow_up.student_id);
        Ok(follow_up)
    }

    /// Edit a note. Only its author may.
    pub fn update_follow_up(&self, command: UpdateFollowUpCommand) -> Result<FollowUp> {
        if command.content.trim().is_empty() {
            return Err(FollowUpError::EmptyContent.into());
        }
        let repository = self.student_repository.follow_up_repository();
        let mut follow_up = repository
            .get_follow_up(&command.follow_up_id)?
            .ok_or_else(|| FollowUpError::NotFound(command.follow_up_id.clone()))?;

        if follow_up.created_by != command.actor {
            return Err(FollowUpError::NotOwner.into());
        }

        follow_up.content = command.content.trim().to_string();
        follow_up.updated_at = Utc::now();
        repository.update_follow_up(&follow_up)?;
        Ok(follow_up)
    }

    /// Delete a note. Only its author may.
    pub fn delete_follow_up(&self, command: DeleteFollowUpCommand) -> Result<()> {
        let repository = self.student_repository.follow_up_repository();
        let follow_up = repository
            .get_follow_up(&command.follow_up_id)?
            .ok_or_else(|| FollowUpError::NotFound(command.follow_up_id.clone()))?;

        if follow_up.created_by != command.actor {
            return Err(FollowUpError::NotOwner.into());
        }

        repository.delete_follow_up(&command.follow_up_id)?;
        info!("Deleted follow-up {}", command.follow_up_id);
        Ok(())
    }

    fn validate_register_command(&self, command: &RegisterStudentCommand) -> Result<()> {
        if command.nome.trim().is_empty() {
            return Err(StudentValidationError::EmptyName.into());
        }
        if command.valor_devido < 0.0 {
            return Err(StudentValidationError::NegativeAmount.into());
        }
        Ok(())
    }
}
