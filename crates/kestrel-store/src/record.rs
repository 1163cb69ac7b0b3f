use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::info;

use kestrel_types::models::AccountRecord;

use crate::error::{StoreError, StoreResult};

pub const USERS_DIR: &str = "users";
const RECORD_FILE: &str = "user.json";
const INBOX_DIR: &str = "inbox";
const ID_WIDTH: usize = 19;

/// Directory of a single account: `<users_dir>/<zero-padded id>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPaths {
    dir: PathBuf,
}

impl AccountPaths {
    pub fn new(users_dir: &Path, id: u64) -> Self {
        Self {
            dir: users_dir.join(account_dir_name(id)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_file(&self) -> PathBuf {
        self.dir.join(RECORD_FILE)
    }

    pub fn inbox_dir(&self) -> PathBuf {
        self.dir.join(INBOX_DIR)
    }
}

pub fn account_dir_name(id: u64) -> String {
    format!("{:0width$}", id, width = ID_WIDTH)
}

pub fn parse_account_dir_name(name: &str) -> Option<u64> {
    if name.len() != ID_WIDTH || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

/// Create the account directory and its inbox.
pub async fn create_account_dirs(paths: &AccountPaths) -> StoreResult<()> {
    fs::create_dir_all(paths.inbox_dir()).await?;
    Ok(())
}

pub async fn load_record(paths: &AccountPaths) -> StoreResult<AccountRecord> {
    let bytes = fs::read(paths.record_file()).await?;
    let record = serde_json::from_slice(&bytes)?;
    Ok(record)
}

/// Write the record via a temp file and rename so a crash never leaves a
/// half-written `user.json`.
pub async fn save_record(paths: &AccountPaths, record: &AccountRecord) -> StoreResult<()> {
    let mut json = serde_json::to_vec_pretty(record)?;
    json.push(b'\n');

    let target = paths.record_file();
    let tmp = target.with_extension("json.tmp");
    fs::write(&tmp, &json).await?;
    fs::rename(&tmp, &target).await?;
    Ok(())
}

/// Every account directory under `users_dir`, as `(id, paths)`, sorted by id.
pub async fn list_accounts(users_dir: &Path) -> StoreResult<Vec<(u64, AccountPaths)>> {
    fs::create_dir_all(users_dir).await?;

    let mut found = Vec::new();
    let mut entries = fs::read_dir(users_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            info!("Skipping non-UTF-8 entry in {}", users_dir.display());
            continue;
        };
        if !entry.file_type().await?.is_dir() {
            info!("Not an account directory: {}", name);
            continue;
        }
        let Some(id) = parse_account_dir_name(name) else {
            info!("Invalid account id: {}", name);
            continue;
        };
        found.push((id, AccountPaths::new(users_dir, id)));
    }
    found.sort_by_key(|(id, _)| *id);
    Ok(found)
}

/// Reject records that cannot belong to a working account.
pub fn check_record(record: &AccountRecord) -> StoreResult<()> {
    if record.username.is_empty() {
        return Err(StoreError::Corrupt {
            what: RECORD_FILE.into(),
            reason: "empty username".into(),
        });
    }
    if record.salt.is_empty() || record.passwd.is_empty() {
        return Err(StoreError::Corrupt {
            what: RECORD_FILE.into(),
            reason: format!("missing password material for {}", record.username),
        });
    }
    Ok(())
}
