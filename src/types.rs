//! Crate-wide error and result types

use thiserror::Error;

/// Errors surfaced by civic-mirror services
///
/// The taxonomy separates "your data was rejected" (`Validation`, `NotFound`)
/// from "the system could not guarantee durability" (`LedgerUnavailable`) so
/// callers can tell them apart. `Config` failures are fatal and only occur
/// before the service accepts any request.
#[derive(Debug, Error)]
pub enum Error {
    /// Startup configuration is missing or malformed; the process refuses to start
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ledger submission or confirmation failed or timed out; no off-chain
    /// state was changed and the caller may retry the whole operation
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Request rejected before any ledger call was attempted
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation referenced an unknown complaint ID
    #[error("Not found: {0}")]
    NotFound(String),

    /// Off-chain store failure
    #[error("Database error: {0}")]
    Database(String),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code for HTTP responses
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG",
            Error::LedgerUnavailable(_) => "LEDGER_UNAVAILABLE",
            Error::Validation(_) => "VALIDATION",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Database(_) => "DATABASE",
            Error::Internal(_) => "INTERNAL",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Internal(format!("IO error: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_distinguish_rejection_from_unavailability() {
        let rejected = Error::Validation("missing title".into());
        let unavailable = Error::LedgerUnavailable("confirmation timed out".into());
        assert_ne!(rejected.code(), unavailable.code());
        assert_eq!(unavailable.code(), "LEDGER_UNAVAILABLE");
    }
}
