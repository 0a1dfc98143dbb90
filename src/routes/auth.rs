use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Account, AccountRepository};
use crate::error::{AppError, AppResult};
use crate::routes::extract::{AppForm, AppJson};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// OAuth2 password-grant style form: the email travels as `username`.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub email: String,
}

impl From<Account> for AccountResponse {
    fn from(a: Account) -> Self {
        Self {
            id: a.id,
            email: a.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new account
async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(request): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AccountResponse>)> {
    let account = state
        .credentials
        .register(&state.db, &request.email, &request.password)
        .await?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

/// Exchange email and password for a bearer token
async fn login(
    State(state): State<Arc<AppState>>,
    AppForm(form): AppForm<LoginForm>,
) -> AppResult<Json<TokenResponse>> {
    let account = state
        .credentials
        .verify(&state.db, &form.username, &form.password)
        .await?;

    let issued = state.tokens.issue(&account.id)?;
    tracing::debug!("Issued access token for account {}", account.id);

    Ok(Json(TokenResponse {
        access_token: issued.token,
        token_type: "bearer",
        expires_at: issued.expires_at,
    }))
}

/// Get current account info
async fn me(
    State(state): State<Arc<AppState>>,
    AuthAccount(account_id): AuthAccount,
) -> AppResult<Json<AccountResponse>> {
    let account = AccountRepository::find_by_id(&state.db, &account_id)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(account.into()))
}

// ============================================================================
// Auth Extractor
// ============================================================================

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

/// Extractor for the authenticated account id.
///
/// Only the token is checked; no account lookup happens here.
pub struct AuthAccount(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|e| {
                    tracing::debug!("Missing or invalid Authorization header: {}", e);
                    AppError::Unauthorized
                })?;

        let token = bearer.token().trim();
        if token.is_empty() {
            tracing::debug!("Empty bearer token in Authorization header");
            return Err(AppError::Unauthorized);
        }

        let account_id = state.tokens.verify(token)?;

        tracing::debug!("Authenticated account: {}", account_id);
        Ok(AuthAccount(account_id))
    }
}
