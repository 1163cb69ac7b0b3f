use axum::{
    RequestExt,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use kestrel_accounts::AccountError;

use crate::auth::AppState;
use crate::error::ApiError;

/// Resolve the `Authorization: Bearer` header to an account and hand it to
/// the handler as `Extension<Arc<Account>>`. Anything else is a 401.
pub async fn require_bearer(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Ok(TypedHeader(Authorization(bearer))) =
        req.extract_parts::<TypedHeader<Authorization<Bearer>>>().await
    else {
        return ApiError(AccountError::Unauthorized).into_response();
    };

    match state.accounts.authenticate(bearer.token()) {
        Ok(account) => {
            req.extensions_mut().insert(account);
            next.run(req).await
        }
        Err(e) => ApiError(e).into_response(),
    }
}
