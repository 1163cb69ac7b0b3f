use argon2::Argon2;
use subtle::ConstantTimeEq;

use crate::error::CryptoError;
use crate::rand::random_bytes;

pub const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Derives password-verification material from a password and a salt.
///
/// The account store only ever keeps `(salt, hash(password, salt))`.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, passwd: &[u8], salt: &[u8]) -> Result<Vec<u8>, CryptoError>;

    fn verify(&self, passwd: &[u8], salt: &[u8], expected: &[u8]) -> bool {
        match self.hash(passwd, salt) {
            Ok(hash) => hash.ct_eq(expected).into(),
            Err(_) => false,
        }
    }
}

/// Argon2id with the crate's default parameters.
#[derive(Debug, Default, Clone)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, passwd: &[u8], salt: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut out = vec![0u8; HASH_LEN];
        Argon2::default()
            .hash_password_into(passwd, salt, &mut out)
            .map_err(|e| CryptoError::Hash(e.to_string()))?;
        Ok(out)
    }
}

pub fn generate_salt() -> [u8; SALT_LEN] {
    random_bytes::<SALT_LEN>()
}
