use std::sync::Arc;

use axum::{Extension, Json, extract::State};

use kestrel_accounts::{Account, Outgoing};
use kestrel_types::api::{RecvItem, SendRequest, SendResponse};
use kestrel_types::time::now_secs;

use crate::auth::AppState;
use crate::error::ApiError;

pub async fn send(
    State(state): State<AppState>,
    Extension(account): Extension<Arc<Account>>,
    Json(req): Json<SendRequest>,
) -> Result<Json<SendResponse>, ApiError> {
    let outgoing = req
        .messages
        .into_iter()
        .map(|m| Outgoing {
            to: m.to,
            kind: m.kind,
            msg: m.msg,
        })
        .collect();
    let need_prekeys = state.accounts.send(&account, outgoing, now_secs()).await?;
    Ok(Json(SendResponse { need_prekeys }))
}

pub async fn recv(
    State(state): State<AppState>,
    Extension(account): Extension<Arc<Account>>,
) -> Result<Json<Vec<RecvItem>>, ApiError> {
    let messages = state.accounts.recv(&account, now_secs()).await?;
    let items = messages
        .into_iter()
        .map(|m| RecvItem {
            from: m.from,
            kind: m.kind,
            msg: m.msg,
            age_sec: m.time,
        })
        .collect();
    Ok(Json(items))
}
