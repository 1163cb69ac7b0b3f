use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Corrupt {what}: {reason}")]
    Corrupt { what: String, reason: String },

    #[error("Invalid message: type and payload must not contain spaces or newlines")]
    InvalidMessage,
}

pub type StoreResult<T> = Result<T, StoreError>;
