//! Domain model for a timestamped follow-up note.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A collection note attached to a student. Lives in its own backing
/// collection and is created, edited and deleted independently of status
/// transitions. Only the creator may edit or delete their own note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub id: String,
    pub student_id: String,
    pub content: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FollowUp {
    pub fn generate_id() -> String {
        format!("followup::{}", Uuid::new_v4())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FollowUpError {
    #[error("Follow-up content cannot be empty")]
    EmptyContent,
    #[error("Follow-up not found: {0}")]
    NotFound(String),
    #[error("Only the author of a follow-up may change it")]
    NotOwner,
}
