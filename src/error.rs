use std::collections::BTreeMap;

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Field name to user-facing message, as rendered next to form inputs.
pub type FieldErrors = BTreeMap<&'static str, String>;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection could not be checked out of the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// The pool could not be built from the configuration.
    #[error("Pool configuration error: {0}")]
    PoolConfig(#[from] deadpool_postgres::CreatePoolError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The store is unreachable or closed the connection.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The page requires an authenticated session.
    #[error("Not authenticated")]
    Unauthenticated,

    /// The page is only meant for anonymous callers.
    #[error("Already authenticated")]
    AlreadyAuthenticated,

    /// A resource not found error.
    #[error("Resource not found")]
    NotFound,

    /// One or more form fields failed validation.
    #[error("Validation failed: {0:?}")]
    Validation(FieldErrors),

    /// A unique constraint was violated.
    #[error("Duplicate entity: {0}")]
    DuplicateEntity(String),

    /// A table or column name failed the identifier allow-list.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A column expected in a row was missing or had the wrong type.
    #[error("Missing data: {0}")]
    MissingData(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Builds a single-field validation error.
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field, message.into());
        AppError::Validation(errors)
    }

    /// Sorts a raw driver error into the taxonomy used by callers.
    ///
    /// A foreign-key violation means a referenced row is gone, so it reads as `NotFound`.
    pub fn from_store(e: tokio_postgres::Error) -> Self {
        if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            let constraint = e
                .as_db_error()
                .and_then(|db| db.constraint())
                .unwrap_or("unique")
                .to_string();
            return AppError::DuplicateEntity(constraint);
        }
        if e.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION) {
            return AppError::NotFound;
        }
        if e.is_closed() {
            return AppError::StoreUnavailable(e.to_string());
        }
        AppError::Database(e)
    }

    /// Whether the error means the backing store could not be reached.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            AppError::Pool(_) | AppError::PoolConfig(_) | AppError::StoreUnavailable(_) | AppError::Redis(_)
        )
    }
}

#[derive(Serialize)]
struct ValidationBody<'a> {
    errors: &'a FieldErrors,
}

fn redirect(location: &'static str) -> Response {
    (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable".to_string())
            }

            AppError::PoolConfig(ref e) => {
                tracing::error!("Pool configuration error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable".to_string())
            }

            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable".to_string())
            }

            AppError::StoreUnavailable(ref msg) => {
                tracing::error!("Store unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable".to_string())
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::Unauthenticated => {
                tracing::debug!("Guard: session required");
                return redirect("/login");
            }

            AppError::AlreadyAuthenticated => {
                tracing::debug!("Guard: session already open");
                return redirect("/home");
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }

            AppError::Validation(ref errors) => {
                tracing::debug!("Validation error: {:?}", errors);
                let body = sonic_rs::to_string(&ValidationBody { errors })
                    .unwrap_or_else(|_| r#"{"error":"Invalid input"}"#.to_string());
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    [(header::CONTENT_TYPE, "application/json")],
                    body,
                )
                    .into_response();
            }

            AppError::DuplicateEntity(ref constraint) => {
                tracing::debug!("Duplicate entity: {}", constraint);
                (StatusCode::CONFLICT, "Already exists".to_string())
            }

            AppError::InvalidIdentifier(ref name) => {
                tracing::error!("Rejected SQL identifier: {:?}", name);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::MissingData(ref column) => {
                tracing::error!("Missing column in row: {}", column);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
