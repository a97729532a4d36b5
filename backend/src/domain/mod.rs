//! Domain layer: models, commands and the services that own all business
//! rules. Storage is reached only through the trait objects in
//! `crate::storage`.

pub mod commands;
pub mod import_service;
pub mod models;
pub mod months;
pub mod status_service;
pub mod student_service;
pub mod vencimento;

pub use import_service::ImportService;
pub use status_service::{StatusTransitionEngine, TransitionError};
pub use student_service::StudentService;
