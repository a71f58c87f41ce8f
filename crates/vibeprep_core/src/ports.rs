//! crates/vibeprep_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the document store, the mail relay, the hashing scheme
//! and the LLM provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    CalendarDay, Claims, DayKey, NewUser, OptimizationRequest, OptimizedSchedule,
    PendingVerification, Slot, User,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflicting record: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports (Traits)
//=========================================================================================

/// Persists accounts and pending verifications.
///
/// Implementations only need single-record atomicity; nothing here spans records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // --- Accounts ---
    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>>;

    /// Inserts a new account. Fails with `PortError::Conflict` if the email is taken.
    async fn insert_user(&self, user: NewUser) -> PortResult<User>;

    /// Flips `is_verified` on an existing account. Returns `None` if there is no account.
    async fn mark_user_verified(&self, email: &str) -> PortResult<Option<User>>;

    // --- Pending verifications ---
    async fn find_pending(&self, email: &str) -> PortResult<Option<PendingVerification>>;

    /// Stores `record`, replacing whatever pending record existed for its email.
    async fn save_pending(&self, record: PendingVerification) -> PortResult<()>;

    /// Overwrites code and expiry on the existing record. Returns `false` if there was none.
    async fn rotate_pending_code(
        &self,
        email: &str,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<bool>;

    /// Removes the pending record for `email` if it still carries `otp`.
    /// Returns `false` if there was none, or it has been replaced since.
    async fn delete_pending(&self, email: &str, otp: &str) -> PortResult<bool>;
}

/// Persists one slot list per (user, year, month, date).
#[async_trait]
pub trait CalendarRepository: Send + Sync {
    async fn find_day(&self, key: &DayKey) -> PortResult<Option<CalendarDay>>;

    /// Writes `slots` as the whole slot list of the day, creating the day if needed.
    /// `updated_at` is always refreshed, `created_at` only set on insert.
    async fn upsert_day(&self, key: &DayKey, slots: &[Slot]) -> PortResult<CalendarDay>;

    /// Removes the day. Returns `false` if nothing matched.
    async fn delete_day(&self, key: &DayKey) -> PortResult<bool>;

    /// All days of a user, optionally narrowed to a year and/or month, ordered by date.
    async fn list_days(
        &self,
        user_id: &str,
        year: Option<i32>,
        month: Option<u32>,
    ) -> PortResult<Vec<CalendarDay>>;
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A formatted HTML email ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Delivers the message or fails as a whole.
    async fn send(&self, email: &OutgoingEmail) -> PortResult<()>;
}

pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> PortResult<String>;
    fn verify(&self, password: &str, password_hash: &str) -> PortResult<bool>;
}

pub trait TokenService: Send + Sync {
    /// Mints a signed, time-limited token whose subject is `subject`.
    fn issue(&self, subject: &str) -> PortResult<String>;
    /// Checks signature and expiry. Any failure is `PortError::Unauthorized`.
    fn verify(&self, token: &str) -> PortResult<Claims>;
}

pub trait OtpGenerator: Send + Sync {
    fn generate(&self) -> String;
}

#[async_trait]
pub trait ScheduleOptimizationService: Send + Sync {
    /// Asks the external strategy for a rewritten schedule.
    async fn optimize(&self, request: &OptimizationRequest) -> PortResult<OptimizedSchedule>;
}
