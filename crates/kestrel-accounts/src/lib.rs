//! Accounts: per-account actors, the copy-on-write registry, prekey pools
//! and bearer sessions, tied together by [`AccountService`].
//!
//! Every mutation of an account's keys, prekeys, inbox or bearer happens on
//! that account's actor task. Everything else only reads published snapshots.

pub mod account;
pub mod actor;
pub mod error;
pub mod prekeys;
pub mod registry;
pub mod service;
pub mod session;

pub use account::{Account, Credentials};
pub use actor::{AccountHandle, AccountInfo, LoginOutcome};
pub use error::{AccountError, AccountResult};
pub use registry::Registry;
pub use service::{AccountService, Outgoing, ServiceConfig};
