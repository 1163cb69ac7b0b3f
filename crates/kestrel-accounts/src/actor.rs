//! The per-account actor.
//!
//! One task per account owns [`AccountState`] and processes [`Command`]s one
//! at a time from a single FIFO queue. That queue is the only synchronization
//! for the account's keys, prekeys, inbox and bearer. A failed command
//! replies with an error; the task itself keeps running.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use kestrel_crypto::bearer::make_bearer;
use kestrel_crypto::{AccountId, IdCodec, OpaqueId};
use kestrel_store::inbox::Inbox;
use kestrel_store::record::{AccountPaths, account_dir_name, save_record};
use kestrel_types::models::{AccountRecord, Message};

use crate::account::{Credentials, SharedCredentials};
use crate::error::{AccountError, AccountResult};
use crate::prekeys::PrekeyPool;

const MAILBOX_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<AccountResult<T>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub bearer: String,
    pub need_prekeys: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPrekeysOutcome {
    /// False when the batch would have overflowed the pool and was dropped.
    pub applied: bool,
    pub live: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub opaque: OpaqueId,
    pub sig_key: String,
    pub master_key: String,
    pub need_prekeys: bool,
}

/// Commands accepted by an account actor. Each carries its own reply channel.
#[derive(Debug)]
pub enum Command {
    Login {
        sig_key: String,
        master_key: String,
        reply: Reply<LoginOutcome>,
    },
    PutMessage {
        message: Message,
        reply: Reply<()>,
    },
    DrainInbox {
        now: i64,
        reply: Reply<Vec<Message>>,
    },
    FetchPrekey {
        reply: Reply<Option<String>>,
    },
    AddPrekeys {
        prekeys: Vec<String>,
        reply: Reply<AddPrekeysOutcome>,
    },
    QueryInfo {
        reply: Reply<AccountInfo>,
    },
}

impl Command {
    /// True once the caller has stopped waiting, e.g. after a timeout.
    fn is_abandoned(&self) -> bool {
        match self {
            Command::Login { reply, .. } => reply.is_closed(),
            Command::PutMessage { reply, .. } => reply.is_closed(),
            Command::DrainInbox { reply, .. } => reply.is_closed(),
            Command::FetchPrekey { reply } => reply.is_closed(),
            Command::AddPrekeys { reply, .. } => reply.is_closed(),
            Command::QueryInfo { reply } => reply.is_closed(),
        }
    }
}

/// Cloneable sending side of an account's mailbox.
#[derive(Debug, Clone)]
pub struct AccountHandle {
    tx: mpsc::Sender<Command>,
    timeout: Duration,
}

impl AccountHandle {
    /// Submit a command and wait for its reply, bounded by the handle's timeout.
    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> AccountResult<T> {
        let (reply, rx) = oneshot::channel();
        let round_trip = async {
            self.tx
                .send(make(reply))
                .await
                .map_err(|_| AccountError::Unavailable)?;
            rx.await.map_err(|_| AccountError::Unavailable)?
        };
        match tokio::time::timeout(self.timeout, round_trip).await {
            Ok(res) => res,
            Err(_) => {
                warn!("Account actor did not answer within {:?}", self.timeout);
                Err(AccountError::Unavailable)
            }
        }
    }

    pub async fn login(&self, sig_key: String, master_key: String) -> AccountResult<LoginOutcome> {
        self.call(|reply| Command::Login {
            sig_key,
            master_key,
            reply,
        })
        .await
    }

    pub async fn put_message(&self, message: Message) -> AccountResult<()> {
        self.call(|reply| Command::PutMessage { message, reply }).await
    }

    pub async fn drain_inbox(&self, now: i64) -> AccountResult<Vec<Message>> {
        self.call(|reply| Command::DrainInbox { now, reply }).await
    }

    pub async fn fetch_prekey(&self) -> AccountResult<Option<String>> {
        self.call(|reply| Command::FetchPrekey { reply }).await
    }

    pub async fn add_prekeys(&self, prekeys: Vec<String>) -> AccountResult<AddPrekeysOutcome> {
        self.call(|reply| Command::AddPrekeys { prekeys, reply }).await
    }

    pub async fn query_info(&self) -> AccountResult<AccountInfo> {
        self.call(|reply| Command::QueryInfo { reply }).await
    }
}

/// Everything mutable about one account. Lives inside the actor task.
pub struct AccountState {
    id: u64,
    username: String,
    salt: Vec<u8>,
    passwd: Vec<u8>,
    sn: u64,
    bearer: String,
    sig_key: String,
    master_key: String,
    prekeys: PrekeyPool,
    inbox: Inbox,
    paths: AccountPaths,
    codec: IdCodec,
    published: SharedCredentials,
}

impl AccountState {
    pub fn from_record(
        id: u64,
        record: AccountRecord,
        paths: AccountPaths,
        inbox: Inbox,
        codec: IdCodec,
        prekey_target: usize,
    ) -> Self {
        let account_id = AccountId::new(id, record.sn);
        let published = Arc::new(RwLock::new(Arc::new(Credentials {
            id: account_id,
            opaque: codec.encode(account_id),
            bearer: record.bearer.clone(),
        })));
        Self {
            id,
            username: record.username,
            salt: record.salt,
            passwd: record.passwd,
            sn: record.sn,
            bearer: record.bearer,
            sig_key: record.sig_key,
            master_key: record.master_key,
            prekeys: PrekeyPool::from_keys(record.prekeys, prekey_target),
            inbox,
            paths,
            codec,
            published,
        }
    }

    /// Shared view of this account's credentials, updated by the actor.
    pub fn published(&self) -> SharedCredentials {
        self.published.clone()
    }

    fn account_id(&self) -> AccountId {
        AccountId::new(self.id, self.sn)
    }

    fn record(&self) -> AccountRecord {
        AccountRecord {
            username: self.username.clone(),
            salt: self.salt.clone(),
            passwd: self.passwd.clone(),
            bearer: self.bearer.clone(),
            sn: self.sn,
            sig_key: self.sig_key.clone(),
            master_key: self.master_key.clone(),
            prekeys: self.prekeys.to_vec(),
        }
    }

    async fn save(&self) -> AccountResult<()> {
        save_record(&self.paths, &self.record()).await?;
        Ok(())
    }

    fn publish(&self) {
        let id = self.account_id();
        *self.published.write() = Arc::new(Credentials {
            id,
            opaque: self.codec.encode(id),
            bearer: self.bearer.clone(),
        });
    }

    async fn handle(&mut self, cmd: Command) {
        if cmd.is_abandoned() {
            debug!("Skipping abandoned command for {}", account_dir_name(self.id));
            return;
        }
        match cmd {
            Command::Login {
                sig_key,
                master_key,
                reply,
            } => {
                let res = self.login(sig_key, master_key).await;
                send_reply(reply, res);
            }
            Command::PutMessage { message, reply } => {
                let res = self.inbox.add_message(&message).await.map_err(Into::into);
                send_reply(reply, res);
            }
            Command::DrainInbox { now, reply } => {
                let res = self.inbox.get_messages(now).await.map_err(Into::into);
                if let Err(Ok(messages)) = reply.send(res) {
                    self.requeue_messages(now, messages).await;
                }
            }
            Command::FetchPrekey { reply } => {
                let res = self.fetch_prekey().await;
                if let Err(Ok(Some(key))) = reply.send(res) {
                    self.return_prekey(key).await;
                }
            }
            Command::AddPrekeys { prekeys, reply } => {
                let res = self.add_prekeys(prekeys).await;
                send_reply(reply, res);
            }
            Command::QueryInfo { reply } => {
                send_reply(reply, Ok(self.info()));
            }
        }
    }

    /// Issue a new bearer, replacing the previous one. New keys bump the
    /// sequence number, which invalidates every opaque id and bearer handed
    /// out so far, and discard the prekeys and inbox tied to the old keys.
    async fn login(&mut self, sig_key: String, master_key: String) -> AccountResult<LoginOutcome> {
        let rotate = sig_key != self.sig_key || master_key != self.master_key;
        let sn = if rotate { self.sn.wrapping_add(1) } else { self.sn };
        let bearer = make_bearer(&self.codec.encode(AccountId::new(self.id, sn)));

        let mut record = self.record();
        record.sn = sn;
        record.bearer = bearer.clone();
        if rotate {
            record.sig_key = sig_key.clone();
            record.master_key = master_key.clone();
            record.prekeys.clear();
        }
        save_record(&self.paths, &record).await?;

        if rotate {
            info!("Account {} rotated keys (sn {} -> {})", account_dir_name(self.id), self.sn, sn);
            self.sn = sn;
            self.sig_key = sig_key;
            self.master_key = master_key;
            self.prekeys.clear();
            self.inbox.clear().await;
        }
        self.bearer = bearer.clone();
        self.publish();

        info!("Account {} logged in", account_dir_name(self.id));
        Ok(LoginOutcome {
            bearer,
            need_prekeys: self.prekeys.needs_replenishment(),
        })
    }

    async fn fetch_prekey(&mut self) -> AccountResult<Option<String>> {
        let Some(key) = self.prekeys.fetch() else {
            debug!("No prekeys left for {}", account_dir_name(self.id));
            return Ok(None);
        };
        if let Err(e) = self.save().await {
            self.prekeys.unfetch(key);
            return Err(e);
        }
        Ok(Some(key))
    }

    async fn add_prekeys(&mut self, prekeys: Vec<String>) -> AccountResult<AddPrekeysOutcome> {
        if prekeys
            .iter()
            .any(|k| k.is_empty() || k.contains(char::is_whitespace))
        {
            return Err(AccountError::Validation(
                "prekeys must be non-empty and contain no whitespace".into(),
            ));
        }

        let before = self.prekeys.len();
        let applied = self.prekeys.add(prekeys);
        if applied {
            if let Err(e) = self.save().await {
                self.prekeys.truncate(before);
                return Err(e);
            }
        } else {
            debug!(
                "Prekey batch for {} would exceed {}; ignored",
                account_dir_name(self.id),
                self.prekeys.max()
            );
        }
        Ok(AddPrekeysOutcome {
            applied,
            live: self.prekeys.to_vec(),
        })
    }

    /// Put drained messages back after their reader went away. `time` holds
    /// the age on the way in and is turned back into the acceptance time.
    async fn requeue_messages(&mut self, now: i64, messages: Vec<Message>) {
        warn!(
            "Drain for {} was abandoned; requeueing {} messages",
            account_dir_name(self.id),
            messages.len()
        );
        for mut message in messages {
            message.time = now - message.time;
            if let Err(e) = self.inbox.add_message(&message).await {
                warn!("Failed to requeue message for {}: {}", account_dir_name(self.id), e);
            }
        }
    }

    async fn return_prekey(&mut self, key: String) {
        warn!("Prekey fetch for {} was abandoned; key returned", account_dir_name(self.id));
        self.prekeys.unfetch(key);
        if let Err(e) = self.save().await {
            warn!("Failed to save returned prekey for {}: {:?}", account_dir_name(self.id), e);
        }
    }

    fn info(&self) -> AccountInfo {
        AccountInfo {
            opaque: self.codec.encode(self.account_id()),
            sig_key: self.sig_key.clone(),
            master_key: self.master_key.clone(),
            need_prekeys: self.prekeys.needs_replenishment(),
        }
    }
}

fn send_reply<T>(reply: Reply<T>, res: AccountResult<T>) {
    if reply.send(res).is_err() {
        debug!("Caller went away before the reply was sent");
    }
}

/// Start the actor task for `state` and return its mailbox.
pub fn spawn(state: AccountState, timeout: Duration) -> AccountHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
    tokio::spawn(run(state, rx));
    AccountHandle { tx, timeout }
}

async fn run(mut state: AccountState, mut rx: mpsc::Receiver<Command>) {
    debug!("Actor for {} started", account_dir_name(state.id));
    while let Some(cmd) = rx.recv().await {
        state.handle(cmd).await;
    }
    debug!("Actor for {} stopped", account_dir_name(state.id));
}
