//! Protocol constants shared by the store, the account actors and the HTTP boundary.

pub const MINUTE: i64 = 60;
pub const HOUR: i64 = 60 * MINUTE;

/// How long an inbox part stays open for appends, measured from its first message.
pub const SWITCH_INBOX_SEC: i64 = 30 * MINUTE;

/// Maximum age of a message that is still delivered.
pub const MSG_EXPIRE_SEC: i64 = 2 * HOUR;

/// Tolerance added to the expiry window when filtering and expiring parts.
pub const EXPIRE_SLACK_SEC: i64 = 10;

/// Below this many prekeys the owner is asked to upload more.
pub const PREKEY_COUNT: usize = 100;
pub const PREKEY_MAX_COUNT: usize = 2 * PREKEY_COUNT;

pub const MAX_USERNAME_LEN: usize = 64;

// Request body limits, in bytes.
pub const REG_BODY_LIMIT: usize = 1024;
pub const LOGIN_BODY_LIMIT: usize = 16 * 1024;
pub const SEND_BODY_LIMIT: usize = 16 * 1024;
pub const RECV_BODY_LIMIT: usize = 4 * 1024;
pub const FETCH_PREKEYS_BODY_LIMIT: usize = 4 * 1024;
pub const ADD_PREKEYS_BODY_LIMIT: usize = 16 * 1024;
pub const USER_INFO_BODY_LIMIT: usize = 1024;
