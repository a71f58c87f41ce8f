//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and its mapping
//! onto HTTP responses.

use crate::config::ConfigError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;
use vibeprep_core::{PortError, ServiceError};

/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub detail: String,
}

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A failure reported by the auth or calendar services.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error while running the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be extracted: bad JSON, path or query parameters.
    #[error("{detail}")]
    Rejected { status: StatusCode, detail: String },

    /// An optional collaborator is not configured on this deployment.
    #[error("{0}")]
    Unavailable(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<PortError> for ApiError {
    fn from(e: PortError) -> Self {
        ApiError::Service(ServiceError::Port(e))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::Service(e) => match e {
                ServiceError::Conflict(_) => (StatusCode::CONFLICT, e.to_string()),
                ServiceError::InvalidOrExpired => (StatusCode::BAD_REQUEST, e.to_string()),
                ServiceError::NotVerified(_) => (StatusCode::FORBIDDEN, e.to_string()),
                ServiceError::Delivery(_) => (StatusCode::BAD_GATEWAY, e.to_string()),
                ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, e.to_string()),
                ServiceError::InvalidCredentials => (StatusCode::UNAUTHORIZED, e.to_string()),
                ServiceError::Unauthorized => {
                    return (
                        StatusCode::UNAUTHORIZED,
                        [(header::WWW_AUTHENTICATE, "Bearer")],
                        Json(ErrorResponse {
                            detail: e.to_string(),
                        }),
                    )
                        .into_response();
                }
                ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, e.to_string()),
                ServiceError::Port(PortError::NotFound(msg)) => {
                    (StatusCode::NOT_FOUND, msg.clone())
                }
                ServiceError::Port(port) => {
                    error!("Port failure: {:?}", port);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                    )
                }
            },
            ApiError::Rejected { status, detail } => (*status, detail.clone()),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            other => {
                error!("Internal error: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
