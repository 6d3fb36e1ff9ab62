//! Session authentication.
//!
//! Login accepts an identity assertion: a short-lived HS256 token the OAuth
//! bridge signs with `auth.login_secret` once the provider has verified the
//! user. A valid assertion is exchanged for an HS256 session token. The token travels either in the
//! `Authorization: Bearer` header or in the session cookie; WebSocket
//! clients may also pass it as `?token=`.

use axum::{
    Extension, Json, Router,
    body::Body,
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::api::Success;
use crate::domain::{NotificationSettings, Role, SensoryProfile, User, UserIdentity};
use crate::error::{ApiError, ApiResult};
use crate::store::users;

/// Message the web client matches on to redirect to the login page.
pub const UNAUTHED_MESSAGE: &str = "Please login (10001)";

/// Paths reachable without a session.
const PUBLIC_PATHS: &[&str] = &["/health", "/ready", "/api/v1/info", "/api/v1/auth/login"];
const PUBLIC_PREFIXES: &[&str] = &["/api/v1/shared/"];

/// Authentication error response.
#[derive(Debug, Serialize)]
pub struct AuthError {
    pub error: String,
    pub message: String,
}

impl AuthError {
    fn unauthenticated() -> Self {
        Self {
            error: "unauthorized".to_string(),
            message: UNAUTHED_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user open id).
    pub sub: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Display name at the time of login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The caller, resolved from the session token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i64,
    pub open_id: String,
    pub name: Option<String>,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("User {}", self.id))
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&User> for AuthenticatedUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            open_id: user.open_id.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

/// Claims of a login assertion.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityClaims {
    #[serde(flatten)]
    pub identity: UserIdentity,
    pub exp: i64,
    pub iat: i64,
}

/// Signs a login assertion for `identity`, valid for `ttl_secs`.
pub fn sign_login_assertion(identity: &UserIdentity, secret: &str, ttl_secs: u64) -> anyhow::Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = IdentityClaims {
        identity: identity.clone(),
        exp: now + i64::try_from(ttl_secs)?,
        iat: now,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Checks a login assertion's signature and expiry.
pub fn verify_login_assertion(assertion: &str, secret: &str) -> anyhow::Result<UserIdentity> {
    if secret.is_empty() {
        anyhow::bail!("auth.login_secret is not configured");
    }
    let token_data = decode::<IdentityClaims>(
        assertion,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims.identity)
}

/// Generate a session token.
pub fn generate_jwt(
    open_id: &str,
    name: Option<&str>,
    secret: &str,
    expiry_secs: u64,
) -> anyhow::Result<String> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: open_id.to_string(),
        exp: now + i64::try_from(expiry_secs)?,
        iat: now,
        name: name.map(String::from),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate a session token.
pub fn validate_jwt(token: &str, secret: &str) -> anyhow::Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

fn query_token(query: Option<&str>) -> Option<&str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// Pulls the session token from a request, in priority order.
fn extract_token<'a>(req: &'a Request<Body>, cookie_name: &str) -> Option<&'a str> {
    if let Some(token) = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        return Some(token.trim());
    }
    if let Some(token) = cookie_value(req.headers(), cookie_name) {
        return Some(token);
    }
    if req.uri().path() == "/ws" {
        return query_token(req.uri().query());
    }
    None
}

/// Resolves the session and stores an [`AuthenticatedUser`] in the request
/// extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    if is_public(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let Some(token) = extract_token(&req, &state.config.auth.cookie_name) else {
        return Err(AuthError::unauthenticated());
    };

    let claims = validate_jwt(token, state.config.jwt_secret()).map_err(|e| {
        tracing::debug!(error = %e, "Rejected session token");
        AuthError::unauthenticated()
    })?;

    let open_id = claims.sub;
    let user = state
        .store
        .call(move |conn| users::get_user_by_open_id(conn, &open_id))
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Session user lookup failed");
            AuthError::unauthenticated()
        })?
        .ok_or_else(AuthError::unauthenticated)?;

    req.extensions_mut().insert(AuthenticatedUser::from(&user));
    Ok(next.run(req).await)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/me", get(me))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/sensory-profile", put(update_sensory_profile))
        .route(
            "/api/v1/auth/notification-settings",
            put(update_notification_settings),
        )
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

fn session_cookie(name: &str, value: &str, max_age_secs: u64) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    ))
    .map_err(|e| ApiError::Internal(format!("invalid session cookie: {e}")))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub assertion: String,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Response> {
    let identity = verify_login_assertion(&body.assertion, state.config.login_secret()).map_err(|e| {
        tracing::warn!(error = %e, "Rejected login assertion");
        ApiError::Unauthorized("Identity assertion is invalid or expired".to_string())
    })?;
    if identity.open_id.trim().is_empty() {
        return Err(ApiError::bad_request("openId is required"));
    }

    let owner = state.config.auth.owner_open_id.clone();
    let user = state
        .store
        .call(move |conn| {
            let user = users::upsert_user(conn, &identity, owner.as_deref())?;
            users::get_or_create_default_workspace(conn, &user)?;
            Ok::<_, ApiError>(user)
        })
        .await?;

    let auth = &state.config.auth;
    let token = generate_jwt(
        &user.open_id,
        user.name.as_deref(),
        state.config.jwt_secret(),
        auth.token_expiry_secs,
    )
    .map_err(|e| ApiError::Internal(format!("failed to sign session: {e}")))?;

    tracing::info!(user_id = user.id, role = %user.role, "User signed in");

    let cookie = session_cookie(&auth.cookie_name, &token, auth.token_expiry_secs)?;
    let mut response = Json(LoginResponse { token, user }).into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<User>> {
    let user_id = user.id;
    let user = state
        .store
        .call(move |conn| users::get_user(conn, user_id))
        .await?
        .ok_or_else(|| ApiError::Unauthorized(UNAUTHED_MESSAGE.to_string()))?;
    Ok(Json(user))
}

async fn logout(State(state): State<AppState>) -> ApiResult<Response> {
    let cookie = session_cookie(&state.config.auth.cookie_name, "", 0)?;
    let mut response = Json(Success::ok()).into_response();
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SensoryProfileRequest {
    sensory_profile: SensoryProfile,
}

async fn update_sensory_profile(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<SensoryProfileRequest>,
) -> ApiResult<Json<Success>> {
    let user_id = user.id;
    state
        .store
        .call(move |conn| users::update_sensory_profile(conn, user_id, body.sensory_profile))
        .await?;
    Ok(Json(Success::ok()))
}

#[derive(Debug, Deserialize)]
struct NotificationSettingsRequest {
    settings: NotificationSettings,
}

async fn update_notification_settings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<NotificationSettingsRequest>,
) -> ApiResult<Json<Success>> {
    let user_id = user.id;
    state
        .store
        .call(move |conn| users::update_notification_settings(conn, user_id, &body.settings))
        .await?;
    Ok(Json(Success::ok()))
}
