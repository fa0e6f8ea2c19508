//! Error types for the custody service

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the custody service
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid keypair: {0}")]
    InvalidKeypair(String),

    // Input errors
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // Custody errors
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    // Ledger errors
    #[error("Ledger RPC failed during {operation}: {detail}")]
    LedgerUnavailable { operation: String, detail: String },

    #[error("Delegated execution unavailable: {0}")]
    DelegationUnavailable(String),

    // Persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Build a ledger error carrying the failed operation's context
    pub fn ledger(operation: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Error::LedgerUnavailable {
            operation: operation.into(),
            detail: detail.to_string(),
        }
    }

    /// Check if this error is retryable (transient)
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::LedgerUnavailable { .. })
    }

    /// Check if this error signals a failed security check
    ///
    /// These must never be downgraded to a success or a silent default.
    pub fn is_security_violation(&self) -> bool {
        matches!(self, Error::Integrity(_) | Error::Unauthorized(_))
    }
}

// Conversion from solana_client errors
impl From<solana_client::client_error::ClientError> for Error {
    fn from(e: solana_client::client_error::ClientError) -> Self {
        Error::ledger("rpc", e)
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::ledger("get_account", "connection refused").is_retryable());
        assert!(!Error::Conflict("duplicate".into()).is_retryable());

        assert!(Error::Integrity("tag mismatch".into()).is_security_violation());
        assert!(Error::Unauthorized("missing owner".into()).is_security_violation());
        assert!(!Error::NotFound("wallet".into()).is_security_violation());
    }

    #[test]
    fn test_ledger_error_context() {
        let err = Error::ledger("send_transaction", "timeout");
        assert_eq!(
            err.to_string(),
            "Ledger RPC failed during send_transaction: timeout"
        );
    }
}
