use std::sync::Arc;

use axum::{Json, extract::State};
use tracing::info;

use kestrel_accounts::AccountService;
use kestrel_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub accounts: AccountService,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    state
        .accounts
        .register(&req.invitation, &req.username, req.passwd)
        .await?;
    info!("New account: {}", req.username);
    Ok(Json(RegisterResponse {}))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let out = state
        .accounts
        .login(&req.username, req.passwd, req.sig_key, req.master_key)
        .await?;
    Ok(Json(LoginResponse {
        bearer: out.bearer,
        need_prekeys: out.need_prekeys,
    }))
}
