//! # Storage Module
//!
//! Storage abstraction for the collection board. The domain layer talks to
//! the traits in [`traits`]; the file-backed implementation lives in
//! [`csv`]. Errors surface through the [`error::StorageError`] taxonomy so
//! callers can tell an access rejection from a connectivity failure.

pub mod csv;
pub mod error;
pub mod traits;

pub use csv::CsvConnection;
pub use error::StorageError;
pub use traits::{FollowUpStorage, PeriodStorage, StatusHistoryStorage, StudentStorage};
