//! File-backed persistence: per-account records, time-windowed inboxes and
//! the server config file.
//!
//! Layout under the data directory:
//!
//! ```text
//! config.json
//! users/
//!   0000000000000000042/
//!     user.json
//!     inbox/
//!       00000000000812345678
//! ```

pub mod cleanup;
pub mod config;
pub mod error;
pub mod inbox;
pub mod record;

pub use error::{StoreError, StoreResult};
