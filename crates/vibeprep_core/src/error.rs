//! crates/vibeprep_core/src/error.rs
//!
//! The error type surfaced by the auth and calendar services.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// An account with this email already exists.
    #[error("{0}")]
    Conflict(String),

    #[error("Invalid OTP or OTP has expired")]
    InvalidOrExpired,

    #[error("{0}")]
    NotVerified(String),

    /// The notification gateway could not deliver a message.
    #[error("Failed to send verification email: {0}")]
    Delivery(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Could not validate credentials")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Port(#[from] PortError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
