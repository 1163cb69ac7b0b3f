use thiserror::Error;

use kestrel_crypto::CryptoError;
use kestrel_store::StoreError;

/// Every failure a core operation can report. The HTTP layer maps each
/// variant to exactly one status code.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Bad password, or a missing, malformed, stale or superseded bearer.
    /// Deliberately carries no detail.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The account actor did not answer in time or is gone.
    #[error("Account unavailable")]
    Unavailable,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AccountResult<T> = Result<T, AccountError>;

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidMessage => Self::Validation(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<CryptoError> for AccountError {
    fn from(e: CryptoError) -> Self {
        Self::Internal(e.to_string())
    }
}
