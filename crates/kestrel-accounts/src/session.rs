//! Bearer verification at the boundary.

use std::sync::Arc;

use tracing::debug;

use kestrel_crypto::IdCodec;
use kestrel_crypto::bearer::{bearer_identity, bearer_matches};

use crate::account::Account;
use crate::error::{AccountError, AccountResult};
use crate::registry::Registry;

/// Resolve a bearer to its account. Every failure is the same
/// [`AccountError::Unauthorized`], whatever the cause.
pub fn verify_bearer(registry: &Registry, codec: &IdCodec, bearer: &str) -> AccountResult<Arc<Account>> {
    let opaque = bearer_identity(bearer).map_err(|e| {
        debug!("Rejecting bearer: {}", e);
        AccountError::Unauthorized
    })?;
    let account = registry
        .lookup_by_id(codec.decode(&opaque))
        .ok_or(AccountError::Unauthorized)?;

    let credentials = account.credentials();
    if credentials.bearer.is_empty() || !bearer_matches(&credentials.bearer, bearer) {
        debug!("Superseded bearer for {}", account.dir_name());
        return Err(AccountError::Unauthorized);
    }
    Ok(account)
}
