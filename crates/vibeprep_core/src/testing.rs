//! crates/vibeprep_core/src/testing.rs
//!
//! In-memory adapters and test doubles for the core ports.
//! Compiled for this crate's tests and for dependents enabling `test-util`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    CalendarDay, Claims, DayKey, NewUser, PendingVerification, SignupForm, Slot, User,
};
use crate::ports::{
    CalendarRepository, CredentialHasher, CredentialStore, NotificationService, OtpGenerator,
    OutgoingEmail, PortError, PortResult, TokenService,
};
use crate::slots;

//=========================================================================================
// Credential store
//=========================================================================================

#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: RwLock<Vec<User>>,
    pending: RwLock<HashMap<String, PendingVerification>>,
}

impl InMemoryCredentialStore {
    pub async fn user(&self, email: &str) -> Option<User> {
        self.users.read().await.iter().find(|u| u.email == email).cloned()
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn pending(&self, email: &str) -> Option<PendingVerification> {
        self.pending.read().await.get(email).cloned()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// Moves the expiry of an existing pending record.
    pub async fn expire_pending(&self, email: &str, expires_at: DateTime<Utc>) {
        if let Some(record) = self.pending.write().await.get_mut(email) {
            record.expires_at = expires_at;
        }
    }

    /// Inserts an account directly, hashing with `PlainHasher`.
    pub async fn seed_user(&self, form: SignupForm, is_verified: bool) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: form.email,
            first_name: form.first_name,
            last_name: form.last_name,
            phone_number: form.phone_number,
            password_hash: PlainHasher.hash_str(&form.password),
            class_name: form.class_name,
            target_exam: form.target_exam,
            is_verified,
            created_at: Utc::now(),
        };
        self.users.write().await.push(user.clone());
        user
    }

    /// Stores a pending record, drafting the user from an existing account if there is one.
    pub async fn seed_pending(&self, email: &str, otp: &str, expires_at: DateTime<Utc>) {
        let now = Utc::now();
        let user_data = match self.user(email).await {
            Some(user) => NewUser::from(&user),
            None => NewUser {
                email: email.to_string(),
                first_name: "Seeded".into(),
                last_name: "User".into(),
                phone_number: String::new(),
                password_hash: PlainHasher.hash_str("password"),
                class_name: String::new(),
                target_exam: String::new(),
                is_verified: false,
                created_at: now,
            },
        };
        self.pending.write().await.insert(
            email.to_string(),
            PendingVerification {
                email: email.to_string(),
                otp: otp.to_string(),
                user_data,
                expires_at,
                created_at: now,
            },
        );
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        Ok(self.user(email).await)
    }

    async fn insert_user(&self, user: NewUser) -> PortResult<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == user.email) {
            return Err(PortError::Conflict(format!("User {} already exists", user.email)));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone_number: user.phone_number,
            password_hash: user.password_hash,
            class_name: user.class_name,
            target_exam: user.target_exam,
            is_verified: user.is_verified,
            created_at: user.created_at,
        };
        users.push(created.clone());
        Ok(created)
    }

    async fn mark_user_verified(&self, email: &str) -> PortResult<Option<User>> {
        let mut users = self.users.write().await;
        Ok(users.iter_mut().find(|u| u.email == email).map(|u| {
            u.is_verified = true;
            u.clone()
        }))
    }

    async fn find_pending(&self, email: &str) -> PortResult<Option<PendingVerification>> {
        Ok(self.pending(email).await)
    }

    async fn save_pending(&self, record: PendingVerification) -> PortResult<()> {
        self.pending
            .write()
            .await
            .insert(record.email.clone(), record);
        Ok(())
    }

    async fn rotate_pending_code(
        &self,
        email: &str,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut pending = self.pending.write().await;
        Ok(match pending.get_mut(email) {
            Some(record) => {
                record.otp = otp.to_string();
                record.expires_at = expires_at;
                true
            }
            None => false,
        })
    }

    async fn delete_pending(&self, email: &str, otp: &str) -> PortResult<bool> {
        let mut pending = self.pending.write().await;
        if pending.get(email).is_some_and(|record| record.otp == otp) {
            pending.remove(email);
            return Ok(true);
        }
        Ok(false)
    }
}

//=========================================================================================
// Calendar store
//=========================================================================================

/// A day as stored: the raw slot document, possibly in the legacy shape.
#[derive(Clone)]
struct StoredDay {
    slots: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct InMemoryCalendarStore {
    days: RwLock<HashMap<DayKey, StoredDay>>,
}

impl InMemoryCalendarStore {
    pub async fn day_count(&self) -> usize {
        self.days.read().await.len()
    }

    /// The normalized day, blank entries included.
    pub async fn raw_day(&self, key: &DayKey) -> Option<CalendarDay> {
        self.days
            .read()
            .await
            .get(key)
            .map(|stored| to_day(key, stored))
    }

    /// Stores an arbitrary JSON slot document, e.g. legacy string entries.
    pub async fn seed_raw(&self, key: &DayKey, raw: serde_json::Value) {
        let now = Utc::now();
        self.days.write().await.insert(
            key.clone(),
            StoredDay {
                slots: raw,
                created_at: now,
                updated_at: now,
            },
        );
    }
}

fn to_day(key: &DayKey, stored: &StoredDay) -> CalendarDay {
    CalendarDay {
        key: key.clone(),
        slots: slots::decode(stored.slots.clone()),
        created_at: stored.created_at,
        updated_at: stored.updated_at,
    }
}

#[async_trait]
impl CalendarRepository for InMemoryCalendarStore {
    async fn find_day(&self, key: &DayKey) -> PortResult<Option<CalendarDay>> {
        Ok(self.raw_day(key).await)
    }

    async fn upsert_day(&self, key: &DayKey, new_slots: &[Slot]) -> PortResult<CalendarDay> {
        let document =
            serde_json::to_value(new_slots).map_err(|e| PortError::Unexpected(e.to_string()))?;
        let now = Utc::now();
        let mut days = self.days.write().await;
        let entry = days.entry(key.clone()).or_insert_with(|| StoredDay {
            slots: serde_json::Value::Array(Vec::new()),
            created_at: now,
            updated_at: now,
        });
        entry.slots = document;
        entry.updated_at = now;
        Ok(to_day(key, entry))
    }

    async fn delete_day(&self, key: &DayKey) -> PortResult<bool> {
        Ok(self.days.write().await.remove(key).is_some())
    }

    async fn list_days(
        &self,
        user_id: &str,
        year: Option<i32>,
        month: Option<u32>,
    ) -> PortResult<Vec<CalendarDay>> {
        let days = self.days.read().await;
        let mut matching: Vec<CalendarDay> = days
            .iter()
            .filter(|(key, _)| {
                key.user_id == user_id
                    && year.map_or(true, |y| key.year == y)
                    && month.map_or(true, |m| key.month == m)
            })
            .map(|(key, stored)| to_day(key, stored))
            .collect();
        matching.sort_by_key(|day| (day.key.year, day.key.month, day.key.date));
        Ok(matching)
    }
}

//=========================================================================================
// Service doubles
//=========================================================================================

/// Records every message; can be told to fail the next `n` sends.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<OutgoingEmail>>,
    failures_left: AtomicUsize,
}

impl RecordingNotifier {
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.read().await.clone()
    }

    /// The code carried by the most recent message to `recipient`.
    pub async fn last_code_for(&self, recipient: &str) -> Option<String> {
        self.sent
            .read()
            .await
            .iter()
            .rev()
            .find(|m| m.recipients.iter().any(|r| r == recipient))
            .and_then(|m| extract_code(&m.html_body))
    }
}

fn extract_code(html: &str) -> Option<String> {
    let start = html.find(r#"class="otp-code">"#)? + r#"class="otp-code">"#.len();
    let rest = &html[start..];
    let end = rest.find('<')?;
    Some(rest[..end].trim().to_string())
}

#[async_trait]
impl NotificationService for RecordingNotifier {
    async fn send(&self, email: &OutgoingEmail) -> PortResult<()> {
        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(PortError::Unexpected("SMTP relay refused the message".into()));
        }
        self.sent.write().await.push(email.clone());
        Ok(())
    }
}

/// Hands out the scripted codes in order, then `000000`.
pub struct ScriptedOtp {
    codes: Mutex<VecDeque<String>>,
}

impl ScriptedOtp {
    pub fn new(codes: &[&str]) -> Self {
        Self {
            codes: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
        }
    }
}

impl OtpGenerator for ScriptedOtp {
    fn generate(&self) -> String {
        self.codes
            .lock()
            .ok()
            .and_then(|mut codes| codes.pop_front())
            .unwrap_or_else(|| "000000".to_string())
    }
}

/// Stores `plain:<password>`. Only for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHasher;

impl PlainHasher {
    fn hash_str(&self, password: &str) -> String {
        format!("plain:{password}")
    }
}

impl CredentialHasher for PlainHasher {
    fn hash(&self, password: &str) -> PortResult<String> {
        Ok(self.hash_str(password))
    }

    fn verify(&self, password: &str, password_hash: &str) -> PortResult<bool> {
        Ok(self.hash_str(password) == password_hash)
    }
}

/// Tokens of the form `token:<subject>` that never expire.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueTokens;

impl TokenService for OpaqueTokens {
    fn issue(&self, subject: &str) -> PortResult<String> {
        Ok(format!("token:{subject}"))
    }

    fn verify(&self, token: &str) -> PortResult<Claims> {
        let sub = token
            .strip_prefix("token:")
            .ok_or(PortError::Unauthorized)?;
        Ok(Claims {
            sub: sub.to_string(),
            iat: 0,
            exp: i64::MAX,
        })
    }
}
