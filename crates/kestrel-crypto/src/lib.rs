/// Kestrel Crypto Library
///
/// Server-side primitives only. The server never sees message plaintext or
/// private keys; what lives here is:
/// - opaque account ids (single-block AES over `(id, sn)`)
/// - bearer token format
/// - password hashing behind a pluggable trait

pub mod bearer;
pub mod error;
pub mod ident;
pub mod passwd;
pub mod rand;

pub use error::CryptoError;
pub use ident::{AccountId, IdCodec, OpaqueId};
