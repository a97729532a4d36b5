//! # CSV Student Repository
//!
//! Backing collection for student rows (`students.csv`) plus the glue that
//! makes a student record whole: every read attaches the ordered status
//! history and follow-up collections from their own repositories.
//!
//! Period lookups are case-insensitive and fall back to the known legacy
//! spellings of the requested period; rows found under a legacy spelling
//! get their key rewritten to the canonical form before being returned
//! (self-healing migration).
//!
//! Writes go out in fixed-size batches; a batch rejected by access control
//! degrades to row-by-row writes so one bad row does not void the batch.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use super::connection::CsvConnection;
use super::follow_up_repository::FollowUpRepository;
use super::history_repository::HistoryRepository;
use crate::domain::models::{CollectionStatus, Student};
use crate::domain::{months, vencimento};
use crate::storage::error::{is_access_denied, StorageError};
use crate::storage::traits::{FollowUpStorage, StatusHistoryStorage, StudentStorage};

/// Upsert batch size; bounds the size of a single write request.
const BATCH_SIZE: usize = 20;

const STUDENTS_HEADER: &str = "id,nome,curso,valor_devido,data_vencimento,dias_atraso,\
follow_up,observacoes,primeiro_contato,ultimo_contato,data_pagamento,mes,criado_por,\
status,created_at,updated_at";

/// CSV record structure for student rows. Sub-collections live in their
/// own files and are attached after deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StudentRecord {
    id: String,
    nome: String,
    curso: Option<String>,
    valor_devido: f64,
    data_vencimento: String,
    dias_atraso: i64,
    follow_up: String,
    observacoes: String,
    primeiro_contato: Option<String>,
    ultimo_contato: Option<String>,
    data_pagamento: Option<String>,
    mes: String,
    criado_por: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl From<&Student> for StudentRecord {
    fn from(student: &Student) -> Self {
        StudentRecord {
            id: student.id.clone(),
            nome: student.nome.clone(),
            curso: student.curso.clone(),
            valor_devido: student.valor_devido,
            data_vencimento: student.data_vencimento.clone(),
            dias_atraso: student.dias_atraso,
            follow_up: student.follow_up.clone(),
            observacoes: student.observacoes.clone(),
            primeiro_contato: student.primeiro_contato.clone(),
            ultimo_contato: student.ultimo_contato.clone(),
            data_pagamento: student.data_pagamento.clone(),
            mes: student.mes.clone(),
            criado_por: student.criado_por.clone(),
            status: student.status.as_str().to_string(),
            created_at: student.created_at.to_rfc3339(),
            updated_at: student.updated_at.to_rfc3339(),
        }
    }
}

impl TryFrom<StudentRecord> for Student {
    type Error = anyhow::Error;

    fn try_from(record: StudentRecord) -> Result<Self> {
        let status = CollectionStatus::from_str(&record.status)
            .map_err(|e| StorageError::Malformed(format!("student {}: {}", record.id, e)))?;
        let created_at = DateTime::parse_from_rfc3339(&record.created_at)
            .map_err(|e| {
                StorageError::Malformed(format!("student {} created_at: {}", record.id, e))
            })?
            .with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(&record.updated_at)
            .map_err(|e| {
                StorageError::Malformed(format!("student {} updated_at: {}", record.id, e))
            })?
            .with_timezone(&Utc);

        Ok(Student {
            id: record.id,
            nome: record.nome,
            curso: record.curso,
            valor_devido: record.valor_devido,
            data_vencimento: record.data_vencimento,
            dias_atraso: record.dias_atraso,
            follow_up: record.follow_up,
            observacoes: record.observacoes,
            primeiro_contato: record.primeiro_contato,
            ultimo_contato: record.ultimo_contato,
            data_pagamento: record.data_pagamento,
            mes: record.mes,
            criado_por: record.criado_por,
            status,
            historico: Vec::new(),
            follow_ups: Vec::new(),
            created_at,
            updated_at,
        })
    }
}

/// CSV-based student repository
#[derive(Clone)]
pub struct StudentRepository {
    connection: Arc<CsvConnection>,
    history_repository: HistoryRepository,
    follow_up_repository: FollowUpRepository,
}

impl StudentRepository {
    pub fn new(connection: Arc<CsvConnection>) -> Self {
        let history_repository = HistoryRepository::new(connection.clone());
        let follow_up_repository = FollowUpRepository::new(connection.clone());
        Self {
            connection,
            history_repository,
            follow_up_repository,
        }
    }

    pub fn history_repository(&self) -> &HistoryRepository {
        &self.history_repository
    }

    pub fn follow_up_repository(&self) -> &FollowUpRepository {
        &self.follow_up_repository
    }

    /// Read every student row without sub-collections, skipping malformed
    /// rows.
    fn read_students(&self) -> Result<Vec<Student>> {
        let path = self.connection.students_file_path();
        self.connection.ensure_csv_file_exists(&path, STUDENTS_HEADER)?;

        let file = File::open(&path).map_err(|e| StorageError::from_io(e, "opening students"))?;
        let mut csv_reader = ReaderBuilder::new().from_reader(BufReader::new(file));

        let mut students = Vec::new();
        for result in csv_reader.deserialize::<StudentRecord>() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable student row: {}", e);
                    continue;
                }
            };
            match Student::try_from(record) {
                Ok(student) => students.push(student),
                Err(e) => warn!("Skipping malformed student row: {:#}", e),
            }
        }
        Ok(students)
    }

    /// Like `read_students`, but list views degrade to empty instead of
    /// failing when the store denies access.
    fn read_students_or_empty(&self) -> Result<Vec<Student>> {
        match self.read_students() {
            Ok(students) => Ok(students),
            Err(e) if is_access_denied(&e) => {
                warn!("Store denied read access; returning empty student list");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    fn write_students(&self, students: &[Student]) -> Result<()> {
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        for student in students {
            writer.serialize(StudentRecord::from(student))?;
        }
        let rows = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flushing student writer: {}", e))?;
        let mut buffer = format!("{}\n", STUDENTS_HEADER).into_bytes();
        buffer.extend(rows);
        self.connection
            .atomic_write(&self.connection.students_file_path(), &buffer)
    }

    /// Attach the ordered sub-collections. Denied sub-collection reads are
    /// logged and leave the collection empty; a student row with no
    /// visible history beats no student at all.
    fn attach(&self, mut student: Student) -> Student {
        match self.history_repository.list_for_student(&student.id) {
            Ok(historico) => student.historico = historico,
            Err(e) => warn!("Could not load history for {}: {:#}", student.id, e),
        }
        match self.follow_up_repository.list_for_student(&student.id) {
            Ok(follow_ups) => student.follow_ups = follow_ups,
            Err(e) => warn!("Could not load follow-ups for {}: {:#}", student.id, e),
        }
        student
    }

    /// Merge a chunk of students into the collection file in one write.
    fn upsert_chunk(&self, chunk: &[Student]) -> Result<()> {
        let mut all = self.read_students()?;
        for student in chunk {
            match all.iter_mut().find(|s| s.id == student.id) {
                Some(existing) => *existing = student.clone(),
                None => all.push(student.clone()),
            }
        }
        self.write_students(&all)
    }

    /// Rows whose period key matches the given spelling, case-insensitive.
    fn rows_with_spelling<'a>(students: &'a [Student], spelling: &str) -> Vec<&'a Student> {
        students
            .iter()
            .filter(|s| s.mes.eq_ignore_ascii_case(spelling))
            .collect()
    }
}

impl StudentStorage for StudentRepository {
    fn upsert_student(&self, student: &Student) -> Result<()> {
        self.upsert_chunk(std::slice::from_ref(student))
    }

    fn upsert_batch(&self, students: &[Student]) -> Result<usize> {
        let mut written = 0;
        for chunk in students.chunks(BATCH_SIZE) {
            match self.upsert_chunk(chunk) {
                Ok(()) => written += chunk.len(),
                Err(e) if is_access_denied(&e) => {
                    // One rejected row must not void the whole batch
                    warn!(
                        "Batch of {} rejected by access control; retrying row by row",
                        chunk.len()
                    );
                    for student in chunk {
                        match self.upsert_student(student) {
                            Ok(()) => written += 1,
                            Err(row_err) if is_access_denied(&row_err) => {
                                warn!("Row {} rejected, skipping: {:#}", student.id, row_err);
                            }
                            Err(row_err) => return Err(row_err),
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }
        debug!("Upserted {} of {} students", written, students.len());
        Ok(written)
    }

    fn get_student(&self, student_id: &str) -> Result<Option<Student>> {
        Ok(self
            .read_students()?
            .into_iter()
            .find(|s| s.id == student_id)
            .map(|s| self.attach(s)))
    }

    fn fetch_by_period(&self, period_key: &str) -> Result<Vec<Student>> {
        let canonical = months::resolve_legacy_key(period_key)
            .unwrap_or_else(|| period_key.to_string());
        let all = self.read_students_or_empty()?;

        let direct = Self::rows_with_spelling(&all, &canonical);
        if !direct.is_empty() {
            return Ok(direct.into_iter().cloned().map(|s| self.attach(s)).collect());
        }

        // Zero rows under the canonical key: scan the legacy spellings of
        // this same period and heal whatever turns up
        for spelling in months::legacy_spellings(&canonical).into_iter().skip(1) {
            let hits = Self::rows_with_spelling(&all, &spelling);
            if hits.is_empty() {
                continue;
            }
            info!(
                "Found {} students under legacy spelling '{}'; migrating to '{}'",
                hits.len(),
                spelling,
                canonical
            );
            let mut healed: Vec<Student> = hits.into_iter().cloned().collect();
            for student in &mut healed {
                student.mes = canonical.clone();
            }
            if let Err(e) = self.upsert_batch(&healed) {
                // The healed keys are still returned; the rewrite retries
                // on the next fetch
                warn!("Could not persist legacy key migration: {:#}", e);
            }
            return Ok(healed.into_iter().map(|s| self.attach(s)).collect());
        }

        Ok(Vec::new())
    }

    fn fetch_all_and_filter_by_vencimento(
        &self,
        target_period: &str,
        today: NaiveDate,
    ) -> Result<Vec<Student>> {
        let visible: Vec<Student> = self
            .read_students_or_empty()?
            .into_iter()
            .filter(|s| vencimento::belongs_to_month(s, target_period, today))
            .map(|s| self.attach(s))
            .collect();
        debug!(
            "{} students visible in {} after vencimento filtering",
            visible.len(),
            target_period
        );
        Ok(visible)
    }

    fn delete_student(&self, student_id: &str) -> Result<()> {
        // Dependent rows first, best-effort: an access rejection there must
        // not leave the student undeletable
        match self.history_repository.delete_for_student(student_id) {
            Ok(removed) => debug!("Removed {} history rows for {}", removed, student_id),
            Err(e) if is_access_denied(&e) => {
                warn!("History cleanup denied for {}, continuing: {:#}", student_id, e)
            }
            Err(e) => return Err(e),
        }
        match self.follow_up_repository.delete_for_student(student_id) {
            Ok(removed) => debug!("Removed {} follow-ups for {}", removed, student_id),
            Err(e) if is_access_denied(&e) => {
                warn!("Follow-up cleanup denied for {}, continuing: {:#}", student_id, e)
            }
            Err(e) => return Err(e),
        }

        let mut all = self.read_students()?;
        let before = all.len();
        all.retain(|s| s.id != student_id);
        if all.len() == before {
            warn!("Attempted to delete a non-existent student: {}", student_id);
            return Ok(());
        }
        self.write_students(&all)?;
        info!("Deleted student {}", student_id);
        Ok(())
    }

    fn delete_by_period(&self, period_key: &str) -> Result<usize> {
        let canonical = months::resolve_legacy_key(period_key)
            .unwrap_or_else(|| period_key.to_string());
        let spellings: Vec<String> = months::legacy_spellings(&canonical)
            .into_iter()
            .map(|s| s.to_lowercase())
            .collect();

        let all = self.read_students()?;
        let (victims, kept): (Vec<Student>, Vec<Student>) = all
            .into_iter()
            .partition(|s| spellings.contains(&s.mes.to_lowercase()));

        if victims.is_empty() {
            return Ok(0);
        }

        for student in &victims {
            if let Err(e) = self.history_repository.delete_for_student(&student.id) {
                warn!("History cleanup failed for {}: {:#}", student.id, e);
            }
            if let Err(e) = self.follow_up_repository.delete_for_student(&student.id) {
                warn!("Follow-up cleanup failed for {}: {:#}", student.id, e);
            }
        }
        self.write_students(&kept)?;
        info!("Deleted {} students from period {}", victims.len(), canonical);
        Ok(victims.len())
    }

    fn period_has_data(&self, period_key: &str) -> Result<bool> {
        let canonical = months::resolve_legacy_key(period_key)
            .unwrap_or_else(|| period_key.to_string());
        let all = self.read_students_or_empty()?;
        Ok(months::legacy_spellings(&canonical)
            .iter()
            .any(|spelling| !Self::rows_with_spelling(&all, spelling).is_empty()))
    }
}
