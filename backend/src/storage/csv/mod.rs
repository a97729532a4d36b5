//! # CSV Storage Module
//!
//! File-backed implementation of the storage traits. Each of the four
//! collections maps to one file under the data directory:
//!
//! ```text
//! data/
//! ├── students.csv
//! ├── status_history.csv
//! ├── follow_ups.csv
//! └── available_months.yaml
//! ```
//!
//! ## Features
//!
//! - Whole-file reads with schema-validated rows (malformed rows are
//!   logged and skipped, never propagated into the domain)
//! - Atomic writes via temp file + rename
//! - Batched upsert (batch size 20) with row-by-row fallback when a batch
//!   is rejected by access control
//! - Case-insensitive period lookup with legacy-spelling fallback and
//!   self-healing key rewrite

pub mod connection;
pub mod follow_up_repository;
pub mod history_repository;
pub mod period_repository;
pub mod student_repository;

pub use connection::CsvConnection;
pub use follow_up_repository::FollowUpRepository;
pub use history_repository::HistoryRepository;
pub use period_repository::PeriodRepository;
pub use student_repository::StudentRepository;
