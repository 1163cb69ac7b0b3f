use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use kestrel_crypto::passwd::{PasswordHasher, generate_salt};
use kestrel_crypto::rand::random_u64;
use kestrel_crypto::{IdCodec, OpaqueId};
use kestrel_store::cleanup::remove_dir_best_effort;
use kestrel_store::config::ConfigFile;
use kestrel_store::inbox::{Inbox, InboxConfig};
use kestrel_store::record::{
    AccountPaths, USERS_DIR, check_record, create_account_dirs, list_accounts, load_record,
    save_record,
};
use kestrel_types::limits::{MAX_USERNAME_LEN, PREKEY_COUNT};
use kestrel_types::models::{AccountRecord, Message};

use crate::account::Account;
use crate::actor::{AccountInfo, AccountState, LoginOutcome, spawn};
use crate::error::{AccountError, AccountResult};
use crate::registry::Registry;
use crate::session::verify_bearer;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    /// Upper bound on every caller-to-actor round trip.
    pub actor_timeout: Duration,
    pub inbox: InboxConfig,
    pub prekey_target: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            actor_timeout: Duration::from_secs(10),
            inbox: InboxConfig::default(),
            prekey_target: PREKEY_COUNT,
        }
    }
}

/// One message to deliver on behalf of the sender.
#[derive(Debug, Clone)]
pub struct Outgoing {
    /// Recipient's opaque id, as text.
    pub to: String,
    pub kind: String,
    pub msg: String,
}

/// Server context: owns the registry, the id codec and the server config
/// file. Constructed once at startup and shared with every request.
pub struct AccountService {
    registry: Registry,
    codec: IdCodec,
    hasher: Arc<dyn PasswordHasher>,
    /// Also serializes registrations.
    config_file: Mutex<ConfigFile>,
    users_dir: PathBuf,
    settings: ServiceConfig,
}

impl AccountService {
    /// Load the server config and every account under `settings.data_dir`,
    /// spawning one actor per account.
    pub async fn open(settings: ServiceConfig, hasher: Arc<dyn PasswordHasher>) -> AccountResult<Self> {
        let config_file = ConfigFile::load_or_create(&settings.data_dir).await?;
        let codec = IdCodec::new(&config_file.config.aes_key()?);
        let users_dir = settings.data_dir.join(USERS_DIR);

        let service = Self {
            registry: Registry::new(),
            codec,
            hasher,
            config_file: Mutex::new(config_file),
            users_dir,
            settings,
        };
        service.load_accounts().await?;
        Ok(service)
    }

    async fn load_accounts(&self) -> AccountResult<()> {
        for (id, paths) in list_accounts(&self.users_dir).await? {
            match self.load_account(id, paths).await {
                Ok(account) => {
                    if let Err(e) = self.registry.register(account) {
                        error!("Skipping account {}: {}", id, e);
                    }
                }
                Err(e) => error!("Failed to load account {}: {}", id, e),
            }
        }
        info!("Loaded {} accounts", self.registry.snapshot().len());
        Ok(())
    }

    async fn load_account(&self, id: u64, paths: AccountPaths) -> AccountResult<Arc<Account>> {
        let record = load_record(&paths).await?;
        check_record(&record)?;
        let inbox = Inbox::load(paths.inbox_dir(), self.settings.inbox).await?;
        Ok(self.start_account(id, record, paths, inbox))
    }

    fn start_account(&self, id: u64, record: AccountRecord, paths: AccountPaths, inbox: Inbox) -> Arc<Account> {
        let username = record.username.clone();
        let salt = record.salt.clone();
        let passwd = record.passwd.clone();
        let state = AccountState::from_record(
            id,
            record,
            paths,
            inbox,
            self.codec.clone(),
            self.settings.prekey_target,
        );
        let credentials = state.published();
        let handle = spawn(state, self.settings.actor_timeout);
        Arc::new(Account::new(id, username, salt, passwd, credentials, handle))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Create an account, consuming `invitation`.
    pub async fn register(&self, invitation: &str, username: &str, passwd: Vec<u8>) -> AccountResult<()> {
        validate_username(username)?;

        let mut config_file = self.config_file.lock().await;
        if self.registry.lookup_by_name(username).is_some() {
            return Err(AccountError::Conflict(format!("username {} is taken", username)));
        }
        let previous = config_file.config.clone();
        if !config_file.config.consume_invitation(invitation, username) {
            warn!("Registration of {} with unknown invitation", username);
            return Err(AccountError::Forbidden("invalid invitation".into()));
        }

        let (id, paths, record) = match self.create_account(&config_file, username, passwd).await {
            Ok(created) => created,
            Err(e) => {
                config_file.config = previous;
                return Err(e);
            }
        };

        let inbox = Inbox::new(paths.inbox_dir(), self.settings.inbox);
        let account = self.start_account(id, record, paths, inbox);
        self.registry.register(account)
    }

    /// Persist a new account and the config that already has its invitation
    /// consumed. On failure nothing is left on disk for the account.
    async fn create_account(
        &self,
        config_file: &ConfigFile,
        username: &str,
        passwd: Vec<u8>,
    ) -> AccountResult<(u64, AccountPaths, AccountRecord)> {
        let salt = generate_salt().to_vec();
        let passwd = {
            let hasher = self.hasher.clone();
            let salt = salt.clone();
            tokio::task::spawn_blocking(move || hasher.hash(&passwd, &salt))
                .await
                .map_err(|e| AccountError::Internal(e.to_string()))??
        };

        let id = self.registry.allocate_id();
        let paths = AccountPaths::new(&self.users_dir, id);
        let record = AccountRecord {
            username: username.to_string(),
            salt,
            passwd,
            sn: random_u64(),
            ..Default::default()
        };
        create_account_dirs(&paths).await?;
        let saved = match save_record(&paths, &record).await {
            Ok(()) => config_file.save().await,
            Err(e) => Err(e),
        };
        if let Err(e) = saved {
            remove_dir_best_effort(paths.dir()).await;
            return Err(e.into());
        }
        Ok((id, paths, record))
    }

    /// Check the password, then rotate the session (and possibly the keys).
    pub async fn login(
        &self,
        username: &str,
        passwd: Vec<u8>,
        sig_key: String,
        master_key: String,
    ) -> AccountResult<LoginOutcome> {
        if sig_key.is_empty() || master_key.is_empty() {
            return Err(AccountError::Validation("keys must not be empty".into()));
        }
        let account = self
            .registry
            .lookup_by_name(username)
            .ok_or(AccountError::Unauthorized)?;

        let ok = {
            let account = account.clone();
            let hasher = self.hasher.clone();
            tokio::task::spawn_blocking(move || account.check_password(hasher.as_ref(), &passwd))
                .await
                .map_err(|e| AccountError::Internal(e.to_string()))?
        };
        if !ok {
            debug!("Wrong password for {}", account.dir_name());
            return Err(AccountError::Unauthorized);
        }

        account.handle().login(sig_key, master_key).await
    }

    pub fn authenticate(&self, bearer: &str) -> AccountResult<Arc<Account>> {
        verify_bearer(&self.registry, &self.codec, bearer)
    }

    fn resolve(&self, opaque: &str) -> Option<Arc<Account>> {
        let opaque: OpaqueId = opaque.parse().ok()?;
        self.registry.lookup_by_id(self.codec.decode(&opaque))
    }

    /// Deliver each message to its recipient's inbox, one round trip per
    /// recipient in order. Recipients that do not resolve are skipped.
    /// Returns whether the sender should upload more prekeys.
    pub async fn send(&self, sender: &Account, outgoing: Vec<Outgoing>, now: i64) -> AccountResult<bool> {
        for item in &outgoing {
            if item.kind.is_empty() || item.kind.contains([' ', '\n']) || item.msg.contains([' ', '\n']) {
                return Err(AccountError::Validation(
                    "type and msg must not contain spaces or newlines".into(),
                ));
            }
        }

        let from = sender.credentials().opaque.to_string();
        for item in outgoing {
            let Some(recipient) = self.resolve(&item.to) else {
                debug!("Dropping message from {} to unknown recipient", sender.dir_name());
                continue;
            };
            let message = Message {
                time: now,
                from: from.clone(),
                kind: item.kind,
                msg: item.msg,
            };
            recipient.handle().put_message(message).await?;
        }

        Ok(sender.handle().query_info().await?.need_prekeys)
    }

    /// Drain the account's inbox. Each returned message's `time` is its age.
    pub async fn recv(&self, account: &Account, now: i64) -> AccountResult<Vec<Message>> {
        account.handle().drain_inbox(now).await
    }

    /// One prekey per requested id, in order; empty where none is available.
    pub async fn fetch_prekeys(&self, ids: &[String]) -> AccountResult<Vec<String>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let key = match self.resolve(id) {
                Some(account) => account.handle().fetch_prekey().await?.unwrap_or_default(),
                None => String::new(),
            };
            out.push(key);
        }
        Ok(out)
    }

    /// Append prekeys; returns the live pool, unchanged if the batch did not fit.
    pub async fn add_prekeys(&self, account: &Account, prekeys: Vec<String>) -> AccountResult<Vec<String>> {
        Ok(account.handle().add_prekeys(prekeys).await?.live)
    }

    pub async fn user_info(&self, username: &str) -> AccountResult<AccountInfo> {
        let account = self
            .registry
            .lookup_by_name(username)
            .ok_or(AccountError::NotFound)?;
        account.handle().query_info().await
    }
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService")
            .field("users_dir", &self.users_dir)
            .field("accounts", &self.registry.snapshot().len())
            .finish_non_exhaustive()
    }
}

pub fn validate_username(username: &str) -> AccountResult<()> {
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(AccountError::Validation(format!(
            "username must be 1 to {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if username.contains(char::is_whitespace) {
        return Err(AccountError::Validation("username must not contain whitespace".into()));
    }
    Ok(())
}
