// src/errors.rs

use thiserror::Error;

/// Failures surfaced by a [`crate::adapter::ResourceAdapter`].
///
/// Native OS error codes are normalized into this closed set so the
/// orchestrator can classify outcomes instead of probing message strings.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The operation needs elevated privileges. Recoverable by re-launching
    /// elevated; never fatal to the process.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A required container (registry key, service, task) does not exist and
    /// cannot be created. Absence on *read* is `Ok(None)`, not this error.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// An external command exceeded the bounded wait. One-shot, no retry.
    #[error("command '{command}' timed out after {seconds} seconds")]
    Timeout { command: String, seconds: u64 },

    /// The value type cannot be stored in the targeted resource, or the
    /// resource kind does not support the requested transition (e.g. deleting
    /// a service).
    #[error("unsupported operation on {resource}: {reason}")]
    Unsupported { resource: String, reason: String },

    #[error("{0}")]
    Other(String),
}

impl AdapterError {
    /// Classifies an I/O error from the registry layer, keeping permission
    /// problems distinguishable from everything else.
    pub fn from_io(context: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                AdapterError::PermissionDenied(format!("{context}: {err}"))
            }
            std::io::ErrorKind::NotFound => AdapterError::NotFound(format!("{context}: {err}")),
            _ => AdapterError::Other(format!("{context}: {err}")),
        }
    }
}

/// Failures of the durable ledger file itself.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("failed to serialize ledger: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("ledger file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported ledger schema '{0}'")]
    UnsupportedSchema(String),
}
