use std::sync::Arc;

use axum::{Extension, Json, extract::State};

use kestrel_accounts::Account;
use kestrel_types::api::{
    AddPrekeysRequest, AddPrekeysResponse, FetchPrekeysRequest, FetchPrekeysResponse,
};

use crate::auth::AppState;
use crate::error::ApiError;

/// Unauthenticated: anyone holding an opaque id may take one of its prekeys.
pub async fn fetch_prekeys(
    State(state): State<AppState>,
    Json(req): Json<FetchPrekeysRequest>,
) -> Result<Json<FetchPrekeysResponse>, ApiError> {
    let prekeys = state.accounts.fetch_prekeys(&req.ids).await?;
    Ok(Json(FetchPrekeysResponse { prekeys }))
}

pub async fn add_prekeys(
    State(state): State<AppState>,
    Extension(account): Extension<Arc<Account>>,
    Json(req): Json<AddPrekeysRequest>,
) -> Result<Json<AddPrekeysResponse>, ApiError> {
    let live_prekeys = state.accounts.add_prekeys(&account, req.prekeys).await?;
    Ok(Json(AddPrekeysResponse { live_prekeys }))
}
