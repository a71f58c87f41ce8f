//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `CredentialStore` and `CalendarRepository` ports from the `core` crate.
//! It handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;
use vibeprep_core::domain::{CalendarDay, DayKey, NewUser, PendingVerification, Slot, User};
use vibeprep_core::ports::{CalendarRepository, CredentialStore, PortError, PortResult};
use vibeprep_core::slots;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "id, email, first_name, last_name, phone_number, password_hash, \
                            class_name, target_exam, is_verified, created_at";

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    first_name: String,
    last_name: String,
    phone_number: String,
    password_hash: String,
    class_name: String,
    target_exam: String,
    is_verified: bool,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            phone_number: self.phone_number,
            password_hash: self.password_hash,
            class_name: self.class_name,
            target_exam: self.target_exam,
            is_verified: self.is_verified,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct PendingRecord {
    email: String,
    otp: String,
    user_data: Json<NewUser>,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}
impl PendingRecord {
    fn to_domain(self) -> PendingVerification {
        PendingVerification {
            email: self.email,
            otp: self.otp,
            user_data: self.user_data.0,
            expires_at: self.expires_at,
            created_at: self.created_at,
        }
    }
}

const DAY_COLUMNS: &str = "user_id, year, month, date, slots, created_at, updated_at";

/// A calendar row. `slots` is read as raw JSON; legacy and malformed entries
/// are normalized here rather than failing the whole row.
#[derive(FromRow)]
struct DayRecord {
    user_id: String,
    year: i32,
    month: i32,
    date: i32,
    slots: Json<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl DayRecord {
    fn to_domain(self) -> CalendarDay {
        CalendarDay {
            key: DayKey {
                user_id: self.user_id,
                year: self.year,
                month: self.month as u32,
                date: self.date as u32,
            },
            slots: slots::decode(self.slots.0),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// `CredentialStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CredentialStore for DbAdapter {
    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn insert_user(&self, user: NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone_number)
        .bind(&user.password_hash)
        .bind(&user.class_name)
        .bind(&user.target_exam)
        .bind(user.is_verified)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                PortError::Conflict(format!("User {} already exists", user.email))
            }
            other => unexpected(other),
        })?;
        Ok(record.to_domain())
    }

    async fn mark_user_verified(&self, email: &str) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET is_verified = TRUE WHERE email = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn find_pending(&self, email: &str) -> PortResult<Option<PendingVerification>> {
        let record = sqlx::query_as::<_, PendingRecord>(
            "SELECT email, otp, user_data, expires_at, created_at \
             FROM otp_verifications WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(PendingRecord::to_domain))
    }

    async fn save_pending(&self, record: PendingVerification) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO otp_verifications (email, otp, user_data, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (email) DO UPDATE SET \
                 otp = EXCLUDED.otp, \
                 user_data = EXCLUDED.user_data, \
                 expires_at = EXCLUDED.expires_at, \
                 created_at = EXCLUDED.created_at",
        )
        .bind(&record.email)
        .bind(&record.otp)
        .bind(Json(&record.user_data))
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn rotate_pending_code(
        &self,
        email: &str,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE otp_verifications SET otp = $2, expires_at = $3 WHERE email = $1",
        )
        .bind(email)
        .bind(otp)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_pending(&self, email: &str, otp: &str) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM otp_verifications WHERE email = $1 AND otp = $2")
            .bind(email)
            .bind(otp)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }
}

//=========================================================================================
// `CalendarRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl CalendarRepository for DbAdapter {
    async fn find_day(&self, key: &DayKey) -> PortResult<Option<CalendarDay>> {
        let record = sqlx::query_as::<_, DayRecord>(&format!(
            "SELECT {DAY_COLUMNS} FROM calendar_days \
             WHERE user_id = $1 AND year = $2 AND month = $3 AND date = $4"
        ))
        .bind(&key.user_id)
        .bind(key.year)
        .bind(key.month as i32)
        .bind(key.date as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(DayRecord::to_domain))
    }

    async fn upsert_day(&self, key: &DayKey, new_slots: &[Slot]) -> PortResult<CalendarDay> {
        let record = sqlx::query_as::<_, DayRecord>(&format!(
            "INSERT INTO calendar_days (user_id, year, month, date, slots, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) \
             ON CONFLICT (user_id, year, month, date) DO UPDATE SET \
                 slots = EXCLUDED.slots, \
                 updated_at = NOW() \
             RETURNING {DAY_COLUMNS}"
        ))
        .bind(&key.user_id)
        .bind(key.year)
        .bind(key.month as i32)
        .bind(key.date as i32)
        .bind(Json(new_slots))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn delete_day(&self, key: &DayKey) -> PortResult<bool> {
        let result = sqlx::query(
            "DELETE FROM calendar_days \
             WHERE user_id = $1 AND year = $2 AND month = $3 AND date = $4",
        )
        .bind(&key.user_id)
        .bind(key.year)
        .bind(key.month as i32)
        .bind(key.date as i32)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_days(
        &self,
        user_id: &str,
        year: Option<i32>,
        month: Option<u32>,
    ) -> PortResult<Vec<CalendarDay>> {
        let records = sqlx::query_as::<_, DayRecord>(&format!(
            "SELECT {DAY_COLUMNS} FROM calendar_days \
             WHERE user_id = $1 \
               AND ($2::INT IS NULL OR year = $2) \
               AND ($3::INT IS NULL OR month = $3) \
             ORDER BY year, month, date"
        ))
        .bind(user_id)
        .bind(year)
        .bind(month.map(|m| m as i32))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let days = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day_record(slots: serde_json::Value) -> DayRecord {
        let now = Utc::now();
        DayRecord {
            user_id: "u1".to_string(),
            year: 2025,
            month: 8,
            date: 15,
            slots: Json(slots),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn day_rows_normalize_mixed_slot_shapes() {
        let day = day_record(json!([
            "06:00-07:00",
            null,
            {"time_slot": "07:00-08:00", "task": {}},
            {"time_slot": "08:00-09:00", "task": {"task_id": "t1", "title": "Optics", "priority": "high"}}
        ]))
        .to_domain();

        assert_eq!(day.key, DayKey::new("u1", 2025, 8, 15));
        assert_eq!(day.slots.len(), 3);
        assert_eq!(day.slots[0], Slot::empty("06:00-07:00"));
        assert_eq!(day.slots[1], Slot::empty("07:00-08:00"));
        assert_eq!(day.slots[2].task.as_ref().unwrap().title, "Optics");
    }

    #[test]
    fn day_rows_with_a_non_array_document_read_as_empty() {
        assert!(day_record(json!({"oops": true})).to_domain().slots.is_empty());
    }

    // The tests below need a live Postgres reachable through DATABASE_URL:
    // `cargo test -p api -- --ignored`.

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            first_name: "Asha".to_string(),
            last_name: "Rao".to_string(),
            phone_number: "+91 90000 00000".to_string(),
            password_hash: "hash".to_string(),
            class_name: "12".to_string(),
            target_exam: "JEE".to_string(),
            is_verified: true,
            created_at: Utc::now(),
        }
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn duplicate_email_insert_is_a_conflict(pool: PgPool) {
        let db = DbAdapter::new(pool);
        db.insert_user(new_user("a@x.com")).await.unwrap();

        let err = db.insert_user(new_user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn pending_delete_only_removes_the_matching_code(pool: PgPool) {
        let db = DbAdapter::new(pool);
        let now = Utc::now();
        db.save_pending(PendingVerification {
            email: "a@x.com".to_string(),
            otp: "222222".to_string(),
            user_data: new_user("a@x.com"),
            expires_at: now + chrono::Duration::minutes(10),
            created_at: now,
        })
        .await
        .unwrap();

        assert!(!db.delete_pending("a@x.com", "111111").await.unwrap());
        assert!(db.find_pending("a@x.com").await.unwrap().is_some());
        assert!(db.delete_pending("a@x.com", "222222").await.unwrap());
        assert!(db.find_pending("a@x.com").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn list_days_filters_by_optional_year_and_month(pool: PgPool) {
        let db = DbAdapter::new(pool);
        for (year, month, date) in [(2025, 9, 1), (2025, 8, 15), (2024, 8, 2)] {
            db.upsert_day(&DayKey::new("u1", year, month, date), &[Slot::empty("a")])
                .await
                .unwrap();
        }
        db.upsert_day(&DayKey::new("u2", 2025, 8, 15), &[]).await.unwrap();

        let all = db.list_days("u1", None, None).await.unwrap();
        let order: Vec<_> = all.iter().map(|d| (d.key.year, d.key.month)).collect();
        assert_eq!(order, vec![(2024, 8), (2025, 8), (2025, 9)]);

        assert_eq!(db.list_days("u1", Some(2025), None).await.unwrap().len(), 2);
        assert_eq!(db.list_days("u1", None, Some(8)).await.unwrap().len(), 2);
        assert_eq!(db.list_days("u1", Some(2025), Some(8)).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn legacy_rows_read_back_through_find_day(pool: PgPool) {
        let db = DbAdapter::new(pool.clone());
        sqlx::query(
            "INSERT INTO calendar_days (user_id, year, month, date, slots, created_at, updated_at) \
             VALUES ('u1', 2025, 8, 15, $1, NOW(), NOW())",
        )
        .bind(Json(json!(["a", null, {"time_slot": "b", "task": {}}])))
        .execute(&pool)
        .await
        .unwrap();

        let day = db
            .find_day(&DayKey::new("u1", 2025, 8, 15))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(day.slots, vec![Slot::empty("a"), Slot::empty("b")]);
    }
}
