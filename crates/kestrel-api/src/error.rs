use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use kestrel_accounts::AccountError;

/// An [`AccountError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub AccountError);

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AccountError::Validation(_) => StatusCode::BAD_REQUEST,
            AccountError::Unauthorized => StatusCode::UNAUTHORIZED,
            AccountError::Forbidden(_) => StatusCode::FORBIDDEN,
            AccountError::NotFound => StatusCode::NOT_FOUND,
            AccountError::Conflict(_) => StatusCode::CONFLICT,
            AccountError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            AccountError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(e: AccountError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            AccountError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "internal error".to_string()
            }
            AccountError::Unavailable => {
                warn!("Request failed: account actor unavailable");
                self.0.to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
