//! Copy-on-write directory of accounts.
//!
//! Readers take the current [`Snapshot`] by cloning one `Arc` under a read
//! lock. Writers serialize on a separate mutex, clone the maps outside the
//! read-write lock, insert, and swap the new snapshot in. Accounts are never
//! removed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use kestrel_crypto::AccountId;
use kestrel_crypto::rand::random_u64;

use crate::account::Account;
use crate::error::{AccountError, AccountResult};

const ID_ATTEMPTS: usize = 10;
const ID_MASK: u64 = u64::MAX >> 1;

/// An immutable view of every registered account.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    by_name: HashMap<String, Arc<Account>>,
    by_id: HashMap<u64, Arc<Account>>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn by_name(&self, username: &str) -> Option<&Arc<Account>> {
        self.by_name.get(username)
    }

    pub fn by_id(&self, id: u64) -> Option<&Arc<Account>> {
        self.by_id.get(&id)
    }

    pub fn contains_id(&self, id: u64) -> bool {
        self.by_id.contains_key(&id)
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    current: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    pub fn lookup_by_name(&self, username: &str) -> Option<Arc<Account>> {
        self.current.read().by_name(username).cloned()
    }

    /// Resolve a decoded identity. A sequence number that does not match the
    /// account's current one resolves to nothing.
    pub fn lookup_by_id(&self, id: AccountId) -> Option<Arc<Account>> {
        let account = self.current.read().by_id(id.id).cloned()?;
        if account.credentials().id.sn != id.sn {
            debug!("Stale sequence number {} for {}", id.sn, account.dir_name());
            return None;
        }
        Some(account)
    }

    /// Add an account, failing with `Conflict` if its name or id is taken.
    pub fn register(&self, account: Arc<Account>) -> AccountResult<()> {
        let _guard = self.writer.lock();

        let current = self.snapshot();
        if current.by_name.contains_key(account.username()) {
            return Err(AccountError::Conflict(format!(
                "username {} is taken",
                account.username()
            )));
        }
        if current.by_id.contains_key(&account.id()) {
            return Err(AccountError::Conflict(format!("id {} is taken", account.dir_name())));
        }

        let mut next = (*current).clone();
        next.by_name.insert(account.username().to_string(), account.clone());
        next.by_id.insert(account.id(), account.clone());
        *self.current.write() = Arc::new(next);

        info!("Registered {} as {}", account.username(), account.dir_name());
        Ok(())
    }

    /// Pick an unused, non-zero 63-bit id.
    ///
    /// The id is only reserved once [`register`](Self::register) succeeds, so
    /// callers must serialize allocation and registration.
    pub fn allocate_id(&self) -> u64 {
        let snapshot = self.snapshot();
        for _ in 0..ID_ATTEMPTS {
            let id = random_u64() & ID_MASK;
            if id != 0 && !snapshot.contains_id(id) {
                return id;
            }
        }

        let mut id = (random_u64() & ID_MASK).max(1);
        while snapshot.contains_id(id) {
            id = if id == ID_MASK { 1 } else { id + 1 };
        }
        id
    }
}
