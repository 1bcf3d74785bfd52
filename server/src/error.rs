use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Already exists")]
    Conflict,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Mail provider error: {0}")]
    Mail(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub const fn status_code(&self) -> StatusCode {
        match self {
            AppError::MalformedPayload => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized | AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::Gateway(_) | AppError::Mail(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Upstream and storage failures are logged with detail and answered
        // without it.
        let body = match &self {
            AppError::Database(e) => {
                error!("database error: {e}");
                "Internal error".to_string()
            }
            AppError::Internal(e) => {
                error!("internal error: {e}");
                "Internal error".to_string()
            }
            AppError::Gateway(e) => {
                error!("gateway error: {e}");
                "Payment gateway error".to_string()
            }
            AppError::Mail(e) => {
                error!("mail provider error: {e}");
                "Mail provider error".to_string()
            }
            other => other.to_string(),
        };

        (status, body).into_response()
    }
}
