use std::sync::Arc;

use parking_lot::RwLock;

use kestrel_crypto::passwd::PasswordHasher;
use kestrel_crypto::{AccountId, OpaqueId};
use kestrel_store::record::account_dir_name;

use crate::actor::AccountHandle;

/// The part of an account's session state that the boundary may read
/// without going through the actor. Only the actor publishes new values.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub id: AccountId,
    pub opaque: OpaqueId,
    /// Current bearer, empty until the first login.
    pub bearer: String,
}

/// Latest [`Credentials`], replaced whole on every publish.
pub type SharedCredentials = Arc<RwLock<Arc<Credentials>>>;

/// A registered account as seen by request handlers.
///
/// Identity and password material never change after registration and are
/// readable directly. Everything mutable lives on the actor behind `handle`.
pub struct Account {
    id: u64,
    username: String,
    salt: Vec<u8>,
    passwd: Vec<u8>,
    credentials: SharedCredentials,
    handle: AccountHandle,
}

impl Account {
    pub fn new(
        id: u64,
        username: String,
        salt: Vec<u8>,
        passwd: Vec<u8>,
        credentials: SharedCredentials,
        handle: AccountHandle,
    ) -> Self {
        Self {
            id,
            username,
            salt,
            passwd,
            credentials,
            handle,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Zero-padded id, as used for the account directory and in logs.
    pub fn dir_name(&self) -> String {
        account_dir_name(self.id)
    }

    pub fn credentials(&self) -> Arc<Credentials> {
        self.credentials.read().clone()
    }

    pub fn handle(&self) -> &AccountHandle {
        &self.handle
    }

    pub fn check_password(&self, hasher: &dyn PasswordHasher, passwd: &[u8]) -> bool {
        hasher.verify(passwd, &self.salt, &self.passwd)
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.dir_name())
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
