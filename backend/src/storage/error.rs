//! Storage error taxonomy.
//!
//! Every failure leaving the storage layer is one of these classes, so the
//! services can apply the degradation rules: reads with a sensible empty
//! default swallow `AccessDenied`, writes always surface it, and
//! `Connection` is shown to the user as a check-your-connection problem.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The store rejected the operation (filesystem permission error or an
    /// equivalent access-control response).
    #[error("Access to the data store was denied: {0}")]
    AccessDenied(String),

    /// The store could not be reached or the I/O failed mid-operation.
    #[error("Could not reach the data store, check your connection: {0}")]
    Connection(String),

    /// A record that was expected to exist is gone.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A stored row failed schema validation.
    #[error("Malformed record in the data store: {0}")]
    Malformed(String),
}

impl StorageError {
    /// Classify a raw I/O failure into the taxonomy.
    pub fn from_io(err: io::Error, context: &str) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => {
                StorageError::AccessDenied(format!("{}: {}", context, err))
            }
            io::ErrorKind::NotFound => StorageError::NotFound(format!("{}: {}", context, err)),
            _ => StorageError::Connection(format!("{}: {}", context, err)),
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, StorageError::AccessDenied(_))
    }
}

/// Whether an `anyhow` error wraps an access-control rejection. The batch
/// writer and the best-effort delete paths branch on this.
pub fn is_access_denied(err: &anyhow::Error) -> bool {
    err.downcast_ref::<StorageError>()
        .map(StorageError::is_access_denied)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let denied = StorageError::from_io(
            io::Error::new(io::ErrorKind::PermissionDenied, "no"),
            "students.csv",
        );
        assert!(denied.is_access_denied());

        let gone = StorageError::from_io(io::Error::new(io::ErrorKind::NotFound, "no"), "x");
        assert!(matches!(gone, StorageError::NotFound(_)));

        let broken = StorageError::from_io(io::Error::new(io::ErrorKind::BrokenPipe, "no"), "x");
        assert!(matches!(broken, StorageError::Connection(_)));
    }

    #[test]
    fn test_anyhow_downcast_helper() {
        let err: anyhow::Error = StorageError::AccessDenied("nope".to_string()).into();
        assert!(is_access_denied(&err));
        assert!(!is_access_denied(&anyhow::anyhow!("other")));
    }
}
