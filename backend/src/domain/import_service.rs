//! Month rollover and period management.
//!
//! Opening a new reporting period carries forward every still-open record
//! from the previous one: clones with fresh identities and the new period
//! key, with the audit trail left behind to be re-established in the new
//! period. Closed (paid) records stay where they are.

use anyhow::Result;
use chrono::Utc;
use log::{info, warn};

use super::commands::periods::{
    CreatePeriodCommand, CreatePeriodResult, DeleteMonthCommand, DeleteMonthResult,
    ImportRowsCommand, ImportRowsResult, RolloverCommand, RolloverResult,
};
use super::models::period::PeriodError;
use super::models::{CollectionStatus, ReportingPeriod, Student};
use super::{months, vencimento};
use crate::storage::csv::{PeriodRepository, StudentRepository};
use crate::storage::traits::{PeriodStorage, StudentStorage};

/// Service for period lifecycle: creation, deletion, month-to-month
/// rollover and tabular import intake.
#[derive(Clone)]
pub struct ImportService {
    student_repository: StudentRepository,
    period_repository: PeriodRepository,
}

impl ImportService {
    pub fn new(student_repository: StudentRepository, period_repository: PeriodRepository) -> Self {
        Self {
            student_repository,
            period_repository,
        }
    }

    /// Clone every still-open record of the preceding period into the
    /// target one. Returns how many records were written; zero means the
    /// previous month had nothing open, which is not an error.
    pub fn rollover_period(&self, command: RolloverCommand) -> Result<RolloverResult> {
        let target = months::resolve_legacy_key(&command.target)
            .ok_or_else(|| PeriodError::Unrecognized(command.target.clone()))?;
        let previous = months::previous_period_key(&target)
            .ok_or_else(|| PeriodError::Unrecognized(target.clone()))?;

        info!("Rollover into {}: importing open records from {}", target, previous);

        // Degrades to false when the store denies the existence check
        if self.student_repository.period_has_data(&target)? {
            warn!("Target period {} already has data; import will add to it", target);
        }

        // fetch_by_period already falls back to the legacy spellings of
        // the previous period and heals what it finds
        let prior = self.student_repository.fetch_by_period(&previous)?;
        let open: Vec<&Student> = prior.iter().filter(|s| !s.status.is_terminal()).collect();

        if open.is_empty() {
            info!("No open records in {}; nothing to import", previous);
            return Ok(RolloverResult {
                written: 0,
                message: Some(format!("No open records found in {}", previous)),
            });
        }

        let now = Utc::now();
        let clones: Vec<Student> = open
            .iter()
            .map(|s| s.clone_into_period(&target, now))
            .collect();
        let written = self.student_repository.upsert_batch(&clones)?;

        self.ensure_period_exists(&target)?;
        info!("Imported {} open records from {} into {}", written, previous, target);
        Ok(RolloverResult {
            written,
            message: None,
        })
    }

    /// Intake for the external tabular source. Rows become fresh records
    /// with status forced to `inadimplente` and an empty trail, whatever
    /// the source claimed.
    pub fn import_rows(&self, command: ImportRowsCommand) -> Result<ImportRowsResult> {
        let mes = months::resolve_legacy_key(&command.mes)
            .ok_or_else(|| PeriodError::Unrecognized(command.mes.clone()))?;

        let now = Utc::now();
        let today = chrono::Local::now().date_naive();
        let students: Vec<Student> = command
            .rows
            .into_iter()
            .filter(|row| {
                if row.nome.trim().is_empty() {
                    warn!("Skipping imported row with empty name");
                    return false;
                }
                true
            })
            .map(|row| Student {
                id: Student::generate_id(),
                nome: row.nome.trim().to_string(),
                curso: None,
                valor_devido: row.valor_devido.max(0.0),
                data_vencimento: row.data_vencimento.trim().to_string(),
                dias_atraso: vencimento::dias_atraso(row.data_vencimento.trim(), today),
                follow_up: row.follow_up.unwrap_or_default(),
                observacoes: row.observacoes.unwrap_or_default(),
                primeiro_contato: row.primeiro_contato,
                ultimo_contato: row.ultimo_contato,
                data_pagamento: None,
                mes: mes.clone(),
                criado_por: None,
                status: CollectionStatus::Inadimplente,
                historico: Vec::new(),
                follow_ups: Vec::new(),
                created_at: now,
                updated_at: now,
            })
            .collect();

        let written = self.student_repository.upsert_batch(&students)?;
        self.ensure_period_exists(&mes)?;
        info!("Imported {} rows into {}", written, mes);
        Ok(ImportRowsResult { imported: students })
    }

    /// All known periods, labels healed to the current display spelling.
    pub fn list_periods(&self) -> Result<Vec<ReportingPeriod>> {
        let mut periods = self.period_repository.list_periods()?;
        for period in &mut periods {
            if let Some(canonical) = months::resolve_legacy_key(&period.value) {
                period.value = canonical;
            }
            period.label = months::to_display_name(&period.value);
        }
        Ok(periods)
    }

    /// Create a new reporting period. Spelling variants of an existing
    /// period are duplicates, not new periods.
    pub fn create_period(&self, command: CreatePeriodCommand) -> Result<CreatePeriodResult> {
        let value = months::resolve_legacy_key(&command.value)
            .ok_or_else(|| PeriodError::Unrecognized(command.value.clone()))?;

        if self.period_repository.get_period(&value)?.is_some() {
            return Err(PeriodError::Duplicate(value).into());
        }

        let period = ReportingPeriod {
            label: months::to_display_name(&value),
            value,
            active: true,
        };
        self.period_repository.store_period(&period)?;
        info!("Created period {} ({})", period.value, period.label);
        Ok(CreatePeriodResult { period })
    }

    /// Delete a period and every student stored under any of its
    /// spellings.
    pub fn delete_month(&self, command: DeleteMonthCommand) -> Result<DeleteMonthResult> {
        let value = months::resolve_legacy_key(&command.value)
            .unwrap_or_else(|| command.value.clone());

        let deleted_students = self.student_repository.delete_by_period(&value)?;
        let removed = self.period_repository.delete_period(&value)?;
        if !removed && deleted_students == 0 {
            warn!("Delete request for unknown period {}", command.value);
        }
        info!("Deleted period {} and {} students", value, deleted_students);
        Ok(DeleteMonthResult { deleted_students })
    }

    fn ensure_period_exists(&self, value: &str) -> Result<()> {
        if self.period_repository.get_period(value)?.is_none() {
            self.period_repository.store_period(&ReportingPeriod {
                value: value.to_string(),
                label: months::to_display_name(value),
                active: true,
            })?;
        }
        Ok(())
    }
}
