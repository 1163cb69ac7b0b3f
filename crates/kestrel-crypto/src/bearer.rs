//! Bearer tokens: `<opaque id>.<random nonce>`.
//!
//! The token is stored verbatim on the account. Only the identity half is
//! parsed here; whether the token is *current* is decided by comparing it
//! byte-for-byte with the stored one.

use subtle::ConstantTimeEq;

use kestrel_types::b64;

use crate::error::CryptoError;
use crate::ident::OpaqueId;
use crate::rand::random_bytes;

pub const BEARER_SEPARATOR: char = '.';
const NONCE_LEN: usize = 16;

/// Mint a fresh bearer for the given identity.
pub fn make_bearer(opaque: &OpaqueId) -> String {
    let nonce = random_bytes::<NONCE_LEN>();
    format!("{}{}{}", opaque, BEARER_SEPARATOR, b64::encode(&nonce))
}

/// Extract the identity half of a bearer.
pub fn bearer_identity(bearer: &str) -> Result<OpaqueId, CryptoError> {
    let (id, nonce) = bearer
        .split_once(BEARER_SEPARATOR)
        .ok_or(CryptoError::MalformedBearer)?;
    if nonce.is_empty() || nonce.contains(BEARER_SEPARATOR) {
        return Err(CryptoError::MalformedBearer);
    }
    id.parse()
}

/// Constant-time comparison of a presented bearer with the stored one.
pub fn bearer_matches(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}
