use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid opaque id length: {0}")]
    OpaqueIdLength(usize),

    #[error("invalid key length: {0}")]
    KeyLength(usize),

    #[error("malformed bearer")]
    MalformedBearer,

    #[error("password hashing failed: {0}")]
    Hash(String),
}
