//! Domain model for a delinquent student account and its audit trail.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::follow_up::FollowUp;

/// The four stages of the collection workflow, in order. `PagamentoFeito`
/// is terminal: the forward map sends it to itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollectionStatus {
    Inadimplente,
    MensagemEnviada,
    RespostaRecebida,
    PagamentoFeito,
}

impl CollectionStatus {
    /// Convert to the wire/storage string used since the first version.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Inadimplente => "inadimplente",
            CollectionStatus::MensagemEnviada => "mensagem-enviada",
            CollectionStatus::RespostaRecebida => "resposta-recebida",
            CollectionStatus::PagamentoFeito => "pagamento-feito",
        }
    }

    /// Parse from the storage string.
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "inadimplente" => Ok(CollectionStatus::Inadimplente),
            "mensagem-enviada" => Ok(CollectionStatus::MensagemEnviada),
            "resposta-recebida" => Ok(CollectionStatus::RespostaRecebida),
            "pagamento-feito" => Ok(CollectionStatus::PagamentoFeito),
            _ => Err(format!("Invalid collection status: {}", s)),
        }
    }

    /// Fixed successor map. Terminal maps to itself.
    pub fn next(&self) -> CollectionStatus {
        match self {
            CollectionStatus::Inadimplente => CollectionStatus::MensagemEnviada,
            CollectionStatus::MensagemEnviada => CollectionStatus::RespostaRecebida,
            CollectionStatus::RespostaRecebida => CollectionStatus::PagamentoFeito,
            CollectionStatus::PagamentoFeito => CollectionStatus::PagamentoFeito,
        }
    }

    /// Inverse of the successor map. The first stage maps to itself.
    pub fn previous(&self) -> CollectionStatus {
        match self {
            CollectionStatus::Inadimplente => CollectionStatus::Inadimplente,
            CollectionStatus::MensagemEnviada => CollectionStatus::Inadimplente,
            CollectionStatus::RespostaRecebida => CollectionStatus::MensagemEnviada,
            CollectionStatus::PagamentoFeito => CollectionStatus::RespostaRecebida,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CollectionStatus::PagamentoFeito)
    }
}

/// One audit record per successful transition. Append-only: entries are
/// never mutated or reordered, and are deleted only with their student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: String,
    pub student_id: String,
    pub old_status: CollectionStatus,
    pub new_status: CollectionStatus,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
}

impl StatusHistoryEntry {
    pub fn generate_id() -> String {
        format!("history::{}", Uuid::new_v4())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub nome: String,
    pub curso: Option<String>,
    pub valor_devido: f64,
    /// Due date as entered: "DD/MM/YYYY" or "DD/MM"
    pub data_vencimento: String,
    /// Recomputed from `data_vencimento` while the account is open; the
    /// stored value becomes authoritative once status is terminal.
    pub dias_atraso: i64,
    /// Legacy single free-text follow-up field
    pub follow_up: String,
    pub observacoes: String,
    pub primeiro_contato: Option<String>,
    pub ultimo_contato: Option<String>,
    pub data_pagamento: Option<String>,
    /// Reporting period key ("MM-YYYY")
    pub mes: String,
    pub criado_por: Option<String>,
    pub status: CollectionStatus,
    /// Ordered audit trail, oldest first
    pub historico: Vec<StatusHistoryEntry>,
    /// Ordered follow-up notes, oldest first
    pub follow_ups: Vec<FollowUp>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn generate_id() -> String {
        format!("student::{}", Uuid::new_v4())
    }

    /// Days overdue as of `today`. Returns the frozen stored value for
    /// terminal accounts, a live computation otherwise.
    pub fn dias_atraso_em(&self, today: NaiveDate) -> i64 {
        if self.status.is_terminal() {
            return self.dias_atraso;
        }
        crate::domain::vencimento::dias_atraso(&self.data_vencimento, today)
    }

    /// Clone this record into a new reporting period with a fresh identity.
    /// Status and values carry over; the audit trail and follow-up notes do
    /// not; they are re-established in the new period.
    pub fn clone_into_period(&self, target_period: &str, now: DateTime<Utc>) -> Student {
        Student {
            id: Student::generate_id(),
            nome: self.nome.clone(),
            curso: self.curso.clone(),
            valor_devido: self.valor_devido,
            data_vencimento: self.data_vencimento.clone(),
            dias_atraso: self.dias_atraso,
            follow_up: self.follow_up.clone(),
            observacoes: self.observacoes.clone(),
            primeiro_contato: self.primeiro_contato.clone(),
            ultimo_contato: self.ultimo_contato.clone(),
            data_pagamento: self.data_pagamento.clone(),
            mes: target_period.to_string(),
            criado_por: self.criado_por.clone(),
            status: self.status,
            historico: Vec::new(),
            follow_ups: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StudentValidationError {
    #[error("Name cannot be empty")]
    EmptyName,
    #[error("valorDevido cannot be negative")]
    NegativeAmount,
    #[error("Invalid period key: {0}")]
    InvalidPeriodKey(String),
    #[error("Only the creator of this record may edit it")]
    NotCreator,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_successor_map_is_linear_and_terminal() {
        assert_eq!(
            CollectionStatus::Inadimplente.next(),
            CollectionStatus::MensagemEnviada
        );
        assert_eq!(
            CollectionStatus::MensagemEnviada.next(),
            CollectionStatus::RespostaRecebida
        );
        assert_eq!(
            CollectionStatus::RespostaRecebida.next(),
            CollectionStatus::PagamentoFeito
        );
        // Terminal maps to itself
        assert_eq!(
            CollectionStatus::PagamentoFeito.next(),
            CollectionStatus::PagamentoFeito
        );
        assert!(CollectionStatus::PagamentoFeito.is_terminal());
    }

    #[test]
    fn test_predecessor_is_inverse_of_successor() {
        for status in [
            CollectionStatus::Inadimplente,
            CollectionStatus::MensagemEnviada,
            CollectionStatus::RespostaRecebida,
        ] {
            assert_eq!(status.next().previous(), status);
        }
        // First stage maps to itself
        assert_eq!(
            CollectionStatus::Inadimplente.previous(),
            CollectionStatus::Inadimplente
        );
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in [
            CollectionStatus::Inadimplente,
            CollectionStatus::MensagemEnviada,
            CollectionStatus::RespostaRecebida,
            CollectionStatus::PagamentoFeito,
        ] {
            assert_eq!(CollectionStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert!(CollectionStatus::from_str("pago").is_err());
    }

    #[test]
    fn test_clone_into_period_resets_identity_and_history() {
        let now = Utc::now();
        let mut original = Student {
            id: Student::generate_id(),
            nome: "Maria Souza".to_string(),
            curso: Some("Piano".to_string()),
            valor_devido: 350.0,
            data_vencimento: "10/05/2025".to_string(),
            dias_atraso: 12,
            follow_up: "Cobrada por telefone".to_string(),
            observacoes: String::new(),
            primeiro_contato: None,
            ultimo_contato: None,
            data_pagamento: None,
            mes: "05-2025".to_string(),
            criado_por: Some("ana".to_string()),
            status: CollectionStatus::MensagemEnviada,
            historico: Vec::new(),
            follow_ups: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        original.historico.push(StatusHistoryEntry {
            id: StatusHistoryEntry::generate_id(),
            student_id: original.id.clone(),
            old_status: CollectionStatus::Inadimplente,
            new_status: CollectionStatus::MensagemEnviada,
            changed_by: "ana".to_string(),
            changed_at: now,
        });

        let clone = original.clone_into_period("06-2025", now);
        assert_ne!(clone.id, original.id);
        assert_eq!(clone.mes, "06-2025");
        assert_eq!(clone.status, CollectionStatus::MensagemEnviada);
        assert_eq!(clone.valor_devido, 350.0);
        assert!(clone.historico.is_empty());
        assert!(clone.follow_ups.is_empty());
    }
}
