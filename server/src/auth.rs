//! Accounts and stateless sessions.
//!
//! A login mints a bearer token `hex(email).expiry.hex(hmac)` signed with
//! the server secret. Nothing is stored per session; expiry is in the token
//! and the signature covers both fields. Password hashes are salted SHA-256
//! (registry passwords are machine-generated, see the payments webhook).

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::{
    database::is_unique_violation,
    error::AppError,
    state::AppState,
    utils::generate_password,
};

type HmacSha256 = Hmac<Sha256>;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Salt length for generated salts, bytes before hex encoding.
const SALT_BYTES: usize = 16;

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());

    hex::encode(hasher.finalize())
}

pub fn generate_salt() -> String {
    // Alphanumeric output, hex-alike length; uniqueness per user is all
    // that matters here.
    generate_password(SALT_BYTES * 2)
}

/// `hex(email).expiry_unix.hex(hmac(secret, "hex(email).expiry_unix"))`
pub fn mint_token(email: &str, expires_at: i64, secret: &[u8]) -> String {
    let payload = format!("{}.{expires_at}", hex::encode(email.as_bytes()));

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());

    format!("{payload}.{}", hex::encode(mac.finalize().into_bytes()))
}

/// Returns the token's email when the signature checks out and the token is
/// not expired. The HMAC comparison is constant-time.
pub fn verify_token(token: &str, now: i64, secret: &[u8]) -> Option<String> {
    let mut parts = token.splitn(3, '.');
    let email_hex = parts.next()?;
    let expiry: i64 = parts.next()?.parse().ok()?;
    let signature = hex::decode(parts.next()?).ok()?;

    if expiry <= now {
        return None;
    }

    let payload = format!("{email_hex}.{expiry}");
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature).ok()?;

    String::from_utf8(hex::decode(email_hex).ok()?).ok()
}

/// Extractor for routes behind a bearer token.
pub struct AuthUser {
    pub email: String,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        let token = header.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;
        let email = verify_token(
            token,
            Utc::now().timestamp(),
            state.config.auth_secret.as_bytes(),
        )
        .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser { email })
    }
}

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct RegisteredUser {
    pub id: i64,
    pub email: String,
}

#[derive(Serialize)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: i64,
}

pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Credentials>,
) -> Result<impl IntoResponse, AppError> {
    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') || payload.password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::MalformedPayload);
    }

    let salt = generate_salt();
    let hash = hash_password(&payload.password, &salt);

    let id = state.db.insert_user(&email, &hash, &salt).map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict
        } else {
            AppError::Database(e)
        }
    })?;

    info!("Registered account {email}");

    Ok((StatusCode::CREATED, Json(RegisteredUser { id, email })))
}

pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Credentials>,
) -> Result<Json<SessionToken>, AppError> {
    let email = payload.email.trim().to_lowercase();

    let user = state
        .db
        .user_by_email(&email)?
        .ok_or(AppError::Unauthorized)?;

    if hash_password(&payload.password, &user.salt) != user.password_hash {
        return Err(AppError::Unauthorized);
    }

    let expires_at =
        (Utc::now() + Duration::minutes(state.config.token_ttl_minutes)).timestamp();
    let token = mint_token(&user.email, expires_at, state.config.auth_secret.as_bytes());

    Ok(Json(SessionToken { token, expires_at }))
}

#[derive(Serialize)]
pub struct Account {
    pub email: String,
}

pub async fn me_handler(user: AuthUser) -> Json<Account> {
    Json(Account { email: user.email })
}
