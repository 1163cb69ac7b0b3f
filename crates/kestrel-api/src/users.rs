use axum::{Json, extract::State};

use kestrel_types::api::{UserInfoRequest, UserInfoResponse};

use crate::auth::AppState;
use crate::error::ApiError;

pub async fn user_info(
    State(state): State<AppState>,
    Json(req): Json<UserInfoRequest>,
) -> Result<Json<UserInfoResponse>, ApiError> {
    let info = state.accounts.user_info(&req.username).await?;
    Ok(Json(UserInfoResponse {
        id: info.opaque.to_string(),
        sig_key: info.sig_key,
        master_key: info.master_key,
    }))
}
