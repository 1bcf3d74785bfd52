//! Worshiper registry routes.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    auth::AuthUser,
    database::{WorshiperPatch, WorshiperRow, is_unique_violation},
    error::AppError,
    state::AppState,
    utils::sanitize,
};

#[derive(Deserialize)]
pub struct WorshiperPayload {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl WorshiperPayload {
    /// Names are required; a blank email collapses to NULL so the UNIQUE
    /// column only bites on real duplicates.
    fn validate(&self) -> Result<WorshiperPatch<'_>, AppError> {
        let first_name = self.first_name.trim();
        let last_name = self.last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(AppError::MalformedPayload);
        }

        let email = self
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty());
        if let Some(email) = email {
            if !email.contains('@') {
                return Err(AppError::MalformedPayload);
            }
        }

        Ok(WorshiperPatch {
            first_name,
            last_name,
            email,
            phone: self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()),
            note: self.note.as_deref(),
        })
    }
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub q: Option<String>,
}

pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Json(payload): Json<WorshiperPayload>,
) -> Result<impl IntoResponse, AppError> {
    let patch = payload.validate()?;

    let id = state.db.insert_worshiper(&patch).map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict
        } else {
            AppError::Database(e)
        }
    })?;

    info!("Created worshiper {id}");

    let row = state.db.worshiper(id)?.ok_or(AppError::NotFound)?;
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<WorshiperRow>>, AppError> {
    let filter = params
        .q
        .as_deref()
        .map(sanitize)
        .filter(|q| !q.is_empty());

    Ok(Json(state.db.list_worshipers(filter.as_deref())?))
}

pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<WorshiperRow>, AppError> {
    let row = state.db.worshiper(id)?.ok_or(AppError::NotFound)?;
    Ok(Json(row))
}

pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<WorshiperPayload>,
) -> Result<Json<WorshiperRow>, AppError> {
    let patch = payload.validate()?;

    let updated = state.db.update_worshiper(id, &patch).map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict
        } else {
            AppError::Database(e)
        }
    })?;
    if !updated {
        return Err(AppError::NotFound);
    }

    let row = state.db.worshiper(id)?.ok_or(AppError::NotFound)?;
    Ok(Json(row))
}

pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    _user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !state.db.delete_worshiper(id)? {
        return Err(AppError::NotFound);
    }

    info!("Deleted worshiper {id}");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(first: &str, last: &str, email: Option<&str>) -> WorshiperPayload {
        WorshiperPayload {
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: email.map(str::to_string),
            phone: None,
            note: None,
        }
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(payload("  ", "cohen", None).validate().is_err());
        assert!(payload("rivka", "", None).validate().is_err());
        assert!(payload("rivka", "cohen", None).validate().is_ok());
    }

    #[test]
    fn blank_email_collapses_to_none() {
        let p = payload("rivka", "cohen", Some("   "));
        let patch = p.validate().unwrap();
        assert_eq!(patch.email, None);

        let p = payload("rivka", "cohen", Some("not-an-email"));
        assert!(p.validate().is_err());

        let p = payload("rivka", "cohen", Some("rivka@shul.org"));
        assert_eq!(p.validate().unwrap().email, Some("rivka@shul.org"));
    }
}
