//! Opaque account identifiers.
//!
//! An [`AccountId`] is packed little-endian into one 16-byte block and
//! encrypted with the server key. Decryption never fails: a forged or stale
//! token still yields *some* id, so callers must compare the decoded `sn`
//! against the live account before trusting it.

use std::fmt;
use std::str::FromStr;

use aes::Aes256;
use aes::cipher::{BlockDecrypt, BlockEncrypt, Key, KeyInit};

use kestrel_types::b64;

use crate::error::CryptoError;

pub const OPAQUE_ID_LEN: usize = 16;

/// Internal identity of an account: a random id plus a sequence number that
/// is bumped on key rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountId {
    pub id: u64,
    pub sn: u64,
}

impl AccountId {
    pub fn new(id: u64, sn: u64) -> Self {
        Self { id, sn }
    }

    fn to_block(self) -> [u8; OPAQUE_ID_LEN] {
        let mut block = [0u8; OPAQUE_ID_LEN];
        block[..8].copy_from_slice(&self.id.to_le_bytes());
        block[8..].copy_from_slice(&self.sn.to_le_bytes());
        block
    }

    fn from_block(block: &[u8; OPAQUE_ID_LEN]) -> Self {
        let mut id = [0u8; 8];
        let mut sn = [0u8; 8];
        id.copy_from_slice(&block[..8]);
        sn.copy_from_slice(&block[8..]);
        Self {
            id: u64::from_le_bytes(id),
            sn: u64::from_le_bytes(sn),
        }
    }
}

/// Encrypted [`AccountId`]. The only identifier ever shown to other accounts.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpaqueId([u8; OPAQUE_ID_LEN]);

impl OpaqueId {
    pub fn from_bytes(bytes: [u8; OPAQUE_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&b64::encode(&self.0))
    }
}

impl fmt::Debug for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueId({})", self)
    }
}

impl FromStr for OpaqueId {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = b64::decode(s)?;
        let bytes: [u8; OPAQUE_ID_LEN] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| CryptoError::OpaqueIdLength(v.len()))?;
        Ok(Self(bytes))
    }
}

/// Reversible `AccountId <-> OpaqueId` mapping under a server-held key.
#[derive(Clone)]
pub struct IdCodec {
    cipher: Aes256,
}

impl IdCodec {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256::new(Key::<Aes256>::from_slice(key)),
        }
    }

    pub fn from_slice(key: &[u8]) -> Result<Self, CryptoError> {
        let cipher =
            Aes256::new_from_slice(key).map_err(|_| CryptoError::KeyLength(key.len()))?;
        Ok(Self { cipher })
    }

    pub fn encode(&self, id: AccountId) -> OpaqueId {
        let mut block = aes::Block::clone_from_slice(&id.to_block());
        self.cipher.encrypt_block(&mut block);
        let mut out = [0u8; OPAQUE_ID_LEN];
        out.copy_from_slice(&block);
        OpaqueId(out)
    }

    pub fn decode(&self, opaque: &OpaqueId) -> AccountId {
        let mut block = aes::Block::clone_from_slice(&opaque.0);
        self.cipher.decrypt_block(&mut block);
        let mut out = [0u8; OPAQUE_ID_LEN];
        out.copy_from_slice(&block);
        AccountId::from_block(&out)
    }
}

impl fmt::Debug for IdCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdCodec(..)")
    }
}
