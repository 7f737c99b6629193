use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio_postgres::error::SqlState;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("CSRF verification failed")]
    Csrf,

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

/// Marker attached to error responses; the error page layer swaps the body
/// for the matching rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPage {
    NotFound,
    CsrfFailure,
    ServerError,
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Csrf => StatusCode::FORBIDDEN,
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Session(_)
            | AppError::Template(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let page = match self {
            AppError::NotFound(ref resource) => {
                tracing::debug!("Resource not found: {}", resource);
                Some(ErrorPage::NotFound)
            }
            AppError::Csrf => {
                tracing::warn!("Rejected form submission with a missing or stale CSRF token");
                Some(ErrorPage::CsrfFailure)
            }
            AppError::Validation(ref message) | AppError::Conflict(ref message) => {
                tracing::debug!("Rejected request: {}", message);
                None
            }
            AppError::Database(ref err) => {
                if err.contains("connection") || err.contains("unavailable") {
                    tracing::error!("PostgreSQL connection issue: {}", err);
                } else {
                    tracing::error!("PostgreSQL database error: {}", err);
                }
                Some(ErrorPage::ServerError)
            }
            AppError::Session(ref err) => {
                tracing::error!("Session store error: {}", err);
                Some(ErrorPage::ServerError)
            }
            AppError::Template(ref err) => {
                tracing::error!("Template rendering failed: {}", err);
                Some(ErrorPage::ServerError)
            }
            AppError::Internal(ref err) => {
                tracing::error!("Internal server error: {:#}", err);
                Some(ErrorPage::ServerError)
            }
        };

        match page {
            Some(page) => {
                let mut response = status.into_response();
                response.extensions_mut().insert(page);
                response
            }
            None => (status, self.to_string()).into_response(),
        }
    }
}

// PostgreSQL error mapping
impl From<tokio_postgres::Error> for AppError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.code() {
            Some(&SqlState::UNIQUE_VIOLATION) => {
                let message = if err.to_string().contains("username") {
                    "A user with that username already exists".to_string()
                } else if err.to_string().contains("slug") {
                    "A group with that slug already exists".to_string()
                } else {
                    "Resource already exists".to_string()
                };
                AppError::Conflict(message)
            }
            Some(&SqlState::FOREIGN_KEY_VIOLATION) => {
                AppError::Validation("Referenced resource does not exist".to_string())
            }
            Some(&SqlState::NOT_NULL_VIOLATION) => {
                AppError::Validation("Required field is missing".to_string())
            }
            Some(&SqlState::CHECK_VIOLATION) => {
                AppError::Validation("Data validation constraint violated".to_string())
            }
            Some(&SqlState::STRING_DATA_RIGHT_TRUNCATION) => {
                AppError::Validation("Text data exceeds maximum length".to_string())
            }
            Some(&SqlState::CONNECTION_EXCEPTION) |
            Some(&SqlState::CONNECTION_DOES_NOT_EXIST) |
            Some(&SqlState::CONNECTION_FAILURE) => {
                tracing::error!("PostgreSQL connection error: {}", err);
                AppError::Database("Database connection unavailable".to_string())
            }
            _ => {
                tracing::error!("Unhandled PostgreSQL error: {} (code: {:?})", err, err.code());
                AppError::Database("Database operation failed".to_string())
            }
        }
    }
}

// Connection pool error mapping
impl From<deadpool_postgres::PoolError> for AppError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Timeout(_) => {
                tracing::warn!("Database connection pool timeout: {}", err);
                AppError::Database("Database connection timeout".to_string())
            }
            deadpool_postgres::PoolError::Closed => {
                tracing::error!("Database connection pool is closed: {}", err);
                AppError::Database("Database service unavailable".to_string())
            }
            _ => {
                tracing::error!("Database connection pool error: {}", err);
                AppError::Database("Database connection unavailable".to_string())
            }
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Validation(format!("Malformed form upload: {}", err.body_text()))
    }
}
