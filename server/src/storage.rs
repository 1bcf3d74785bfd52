//! Generic key → JSON blob routes.
//!
//! The editor and frontend settings use this as a free-form store: one
//! table, upsert on write, last write wins, no versioning.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::Value;

use crate::{auth::AuthUser, error::AppError, state::AppState, utils::valid_storage_key};

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !valid_storage_key(&key) {
        return Err(AppError::MalformedPayload);
    }

    let raw = state.db.get_blob(&key)?.ok_or(AppError::NotFound)?;
    let value = serde_json::from_str(&raw)
        .map_err(|e| AppError::Internal(format!("stored blob is corrupt: {e}")))?;

    Ok(Json(value))
}

pub async fn put_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Result<StatusCode, AppError> {
    if !valid_storage_key(&key) {
        return Err(AppError::MalformedPayload);
    }

    let raw = serde_json::to_string(&value)
        .map_err(|e| AppError::Internal(format!("blob serialization failed: {e}")))?;
    state.db.put_blob(&key, &raw)?;

    Ok(StatusCode::NO_CONTENT)
}
