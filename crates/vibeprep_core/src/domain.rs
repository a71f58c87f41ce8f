//! crates/vibeprep_core/src/domain.rs
//!
//! Defines the core data structures for accounts, pending verifications and
//! the per-day study calendar.
//! Storage and HTTP layers convert to and from these types at their boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Accounts
//=========================================================================================

/// A registered account. Only ever created by a successful OTP verification.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub password_hash: String,
    pub class_name: String,
    pub target_exam: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// The draft of a `User` carried inside a pending verification.
///
/// This is persisted as an embedded document, hence the serde derives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub password_hash: String,
    pub class_name: String,
    pub target_exam: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for NewUser {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            phone_number: user.phone_number.clone(),
            password_hash: user.password_hash.clone(),
            class_name: user.class_name.clone(),
            target_exam: user.target_exam.clone(),
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

/// What a prospective user submits at signup. The password is still plaintext here.
#[derive(Debug, Clone)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub class_name: String,
    pub target_exam: String,
}

/// The transient record bridging signup and account creation.
/// At most one exists per email.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingVerification {
    pub email: String,
    pub otp: String,
    pub user_data: NewUser,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PendingVerification {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Claims carried by a bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// The account email.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// A freshly minted bearer token together with the account it was issued for.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub access_token: String,
    pub user: User,
}

//=========================================================================================
// Calendar
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

/// A unit of work placed in a time slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub status: TaskStatus,
}

/// A named interval within one day. `time_slot` is its identity within that day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub time_slot: String,
    #[serde(default)]
    pub task: Option<Task>,
}

impl Slot {
    pub fn empty(time_slot: impl Into<String>) -> Self {
        Self {
            time_slot: time_slot.into(),
            task: None,
        }
    }

    pub fn with_task(time_slot: impl Into<String>, task: Task) -> Self {
        Self {
            time_slot: time_slot.into(),
            task: Some(task),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.time_slot.trim().is_empty()
    }
}

/// The natural key of a calendar day: one document per (user, year, month, date).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DayKey {
    pub user_id: String,
    pub year: i32,
    pub month: u32,
    pub date: u32,
}

impl DayKey {
    pub fn new(user_id: impl Into<String>, year: i32, month: u32, date: u32) -> Self {
        Self {
            user_id: user_id.into(),
            year,
            month,
            date,
        }
    }

    /// The calendar date this key names, or `None` for triples like 2025-02-30.
    pub fn as_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.date)
    }

    /// `YYYY-MM-DD`, zero padded.
    pub fn date_label(&self) -> String {
        format!("{}-{:02}-{:02}", self.year, self.month, self.date)
    }
}

/// The stored slot list of a single day, already normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDay {
    pub key: DayKey,
    pub slots: Vec<Slot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Post-hoc filters for task search. `None` means "any".
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.priority.map_or(true, |p| task.priority == p)
    }
}

/// One search result: a task and where it sits in the calendar.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskHit {
    pub date: String,
    pub time_slot: String,
    pub task: Task,
}

//=========================================================================================
// Schedule optimization (external strategy)
//=========================================================================================

/// Everything the optimization strategy gets to see.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationRequest {
    pub user_id: String,
    pub psychometric_profile: serde_json::Value,
    pub current_schedule: Vec<ScheduledDay>,
}

/// A day of the current schedule as handed to the optimizer.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledDay {
    pub date: String,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedSlot {
    pub time_slot: String,
    #[serde(default)]
    pub task: Option<Task>,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedDay {
    pub date: String,
    pub slots: Vec<OptimizedSlot>,
}

/// The structured schedule returned by the optimization strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedSchedule {
    pub user_id: String,
    pub optimization_date: String,
    pub daily_schedules: Vec<OptimizedDay>,
    pub optimization_summary: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub psychometric_considerations: Vec<String>,
}
