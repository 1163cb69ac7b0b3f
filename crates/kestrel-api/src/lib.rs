//! HTTP boundary: JSON handlers over [`kestrel_accounts::AccountService`].

pub mod auth;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod prekeys;
pub mod routes;
pub mod users;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
pub use routes::router;
