//! Session handling and request admission.

pub mod auth;
pub mod rate_limit;

pub use auth::{
    AuthenticatedUser, auth_middleware, generate_jwt, sign_login_assertion, validate_jwt,
    verify_login_assertion,
};
pub use rate_limit::{UserRateLimiters, user_rate_limit_middleware};

use axum::Router;

use crate::AppState;

/// Auth endpoints (`/api/v1/auth/*`).
pub fn create_router() -> Router<AppState> {
    auth::router()
}
