//! crates/vibeprep_core/src/calendar.rs
//!
//! Per-day slot lists: reading, appending, replacing, task assignment, deletion
//! and task search, plus the hand-off to the schedule optimization strategy.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::{
    CalendarDay, DayKey, OptimizationRequest, OptimizedSchedule, ScheduledDay, Slot, Task,
    TaskFilter, TaskHit,
};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{CalendarRepository, ScheduleOptimizationService};
use crate::slots;

pub struct CalendarService {
    repo: Arc<dyn CalendarRepository>,
}

impl CalendarService {
    pub fn new(repo: Arc<dyn CalendarRepository>) -> Self {
        Self { repo }
    }

    /// The visible slots of a day. A day that was never written reads as empty.
    pub async fn read(&self, key: &DayKey) -> ServiceResult<Vec<Slot>> {
        Ok(self
            .repo
            .find_day(key)
            .await?
            .map(|day| slots::visible(day.slots))
            .unwrap_or_default())
    }

    /// Adds the slots whose `time_slot` is new to the day; existing slots stay as they are.
    pub async fn append(&self, key: &DayKey, incoming: Vec<Slot>) -> ServiceResult<Vec<Slot>> {
        validate_date(key)?;
        validate_slots(&incoming)?;

        let existing = self
            .repo
            .find_day(key)
            .await?
            .map(|day| day.slots)
            .unwrap_or_default();
        let before = existing.len();
        let merged = slots::append_new(existing, incoming);

        let day = self.repo.upsert_day(key, &merged).await?;
        info!(
            user_id = %key.user_id,
            date = %key.date_label(),
            added = day.slots.len() - before,
            "Slots appended"
        );
        Ok(slots::visible(day.slots))
    }

    /// Overwrites the whole slot list of the day.
    pub async fn replace(&self, key: &DayKey, incoming: Vec<Slot>) -> ServiceResult<Vec<Slot>> {
        validate_date(key)?;
        validate_slots(&incoming)?;
        if let Some(dup) = slots::first_duplicate(&incoming) {
            return Err(ServiceError::Validation(format!(
                "Time slot '{dup}' appears more than once"
            )));
        }

        let day = self.repo.upsert_day(key, &incoming).await?;
        info!(user_id = %key.user_id, date = %key.date_label(), "Slots replaced");
        Ok(slots::visible(day.slots))
    }

    /// Sets the task of an existing slot, replacing any task it already had.
    pub async fn assign_task(
        &self,
        key: &DayKey,
        time_slot: &str,
        task: Task,
    ) -> ServiceResult<Task> {
        validate_date(key)?;
        let mut day_slots = self
            .repo
            .find_day(key)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Date not found in calendar".to_string()))?
            .slots;

        if !slots::assign_task(&mut day_slots, time_slot, task.clone()) {
            warn!(user_id = %key.user_id, date = %key.date_label(), %time_slot, "No such slot");
            return Err(ServiceError::NotFound(format!(
                "Time slot '{time_slot}' not found"
            )));
        }

        self.repo.upsert_day(key, &day_slots).await?;
        info!(
            user_id = %key.user_id,
            date = %key.date_label(),
            %time_slot,
            task_id = %task.task_id,
            "Task assigned"
        );
        Ok(task)
    }

    /// Removes the whole day.
    pub async fn delete(&self, key: &DayKey) -> ServiceResult<()> {
        validate_date(key)?;
        if !self.repo.delete_day(key).await? {
            return Err(ServiceError::NotFound(
                "No slots found for the specified date".to_string(),
            ));
        }
        info!(user_id = %key.user_id, date = %key.date_label(), "Day deleted");
        Ok(())
    }

    /// Scans the user's days (narrowed by year/month) and keeps tasks matching the filter.
    pub async fn search(&self, user_id: &str, filter: &TaskFilter) -> ServiceResult<Vec<TaskHit>> {
        let days = self
            .repo
            .list_days(user_id, filter.year, filter.month)
            .await?;

        let hits = days
            .into_iter()
            .flat_map(|day| {
                let date = day.key.date_label();
                day.slots.into_iter().filter_map(move |slot| {
                    let task = slot.task?;
                    Some(TaskHit {
                        date: date.clone(),
                        time_slot: slot.time_slot,
                        task,
                    })
                })
            })
            .filter(|hit| filter.matches(&hit.task))
            .collect();
        Ok(hits)
    }

    /// Every stored day of the user, slots normalized.
    pub async fn user_calendar(&self, user_id: &str) -> ServiceResult<Vec<CalendarDay>> {
        Ok(self.repo.list_days(user_id, None, None).await?)
    }

    pub async fn month(&self, user_id: &str, year: i32, month: u32) -> ServiceResult<Vec<CalendarDay>> {
        if !(1..=12).contains(&month) {
            return Err(ServiceError::Validation(format!(
                "Invalid month: {month} (expected 1-12)"
            )));
        }
        Ok(self.repo.list_days(user_id, Some(year), Some(month)).await?)
    }

    /// Hands the user's stored schedule and profile to the optimization strategy.
    /// The returned schedule is not written back.
    pub async fn optimize(
        &self,
        optimizer: &dyn ScheduleOptimizationService,
        user_id: &str,
        psychometric_profile: serde_json::Value,
        year: Option<i32>,
        month: Option<u32>,
    ) -> ServiceResult<OptimizedSchedule> {
        if let Some(m) = month {
            if !(1..=12).contains(&m) {
                return Err(ServiceError::Validation(format!(
                    "Invalid month: {m} (expected 1-12)"
                )));
            }
        }
        let current_schedule = self
            .repo
            .list_days(user_id, year, month)
            .await?
            .into_iter()
            .map(|day| ScheduledDay {
                date: day.key.date_label(),
                slots: slots::visible(day.slots),
            })
            .collect();

        let request = OptimizationRequest {
            user_id: user_id.to_string(),
            psychometric_profile,
            current_schedule,
        };
        let mut schedule = optimizer.optimize(&request).await?;
        schedule.user_id = user_id.to_string();
        if schedule.optimization_date.trim().is_empty() {
            schedule.optimization_date = Utc::now().date_naive().to_string();
        }
        info!(%user_id, days = schedule.daily_schedules.len(), "Schedule optimized");
        Ok(schedule)
    }
}

fn validate_date(key: &DayKey) -> ServiceResult<()> {
    key.as_date().map(|_| ()).ok_or_else(|| {
        ServiceError::Validation(format!(
            "Invalid date: {}-{}-{}",
            key.year, key.month, key.date
        ))
    })
}

fn validate_slots(incoming: &[Slot]) -> ServiceResult<()> {
    if incoming.is_empty() {
        return Err(ServiceError::Validation(
            "Slots list cannot be empty".to_string(),
        ));
    }
    if incoming.iter().any(Slot::is_blank) {
        return Err(ServiceError::Validation(
            "Time slot cannot be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OptimizedDay, OptimizedSlot, TaskPriority, TaskStatus};
    use crate::ports::{PortError, PortResult};
    use crate::testing::InMemoryCalendarStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn task(id: &str, priority: TaskPriority, status: TaskStatus) -> Task {
        Task {
            task_id: id.into(),
            title: format!("Task {id}"),
            description: None,
            priority,
            status,
        }
    }

    fn t(id: &str) -> Task {
        task(id, TaskPriority::Medium, TaskStatus::Pending)
    }

    fn service() -> (Arc<InMemoryCalendarStore>, CalendarService) {
        let store = Arc::new(InMemoryCalendarStore::default());
        (store.clone(), CalendarService::new(store))
    }

    fn day(d: u32) -> DayKey {
        DayKey::new("user_123", 2025, 8, d)
    }

    #[tokio::test]
    async fn reading_a_missing_day_is_empty() {
        let (_, calendar) = service();
        assert!(calendar.read(&day(15)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_keeps_existing_task_and_adds_new_slot() {
        let (store, calendar) = service();
        calendar
            .append(&day(15), vec![Slot::with_task("09:00-10:00", t("T1"))])
            .await
            .unwrap();
        let result = calendar
            .append(
                &day(15),
                vec![
                    Slot::with_task("09:00-10:00", t("T2")),
                    Slot::empty("11:00-12:00"),
                ],
            )
            .await
            .unwrap();

        let expected = vec![
            Slot::with_task("09:00-10:00", t("T1")),
            Slot::empty("11:00-12:00"),
        ];
        assert_eq!(result, expected);
        assert_eq!(calendar.read(&day(15)).await.unwrap(), expected);
        assert_eq!(store.day_count().await, 1);
    }

    #[tokio::test]
    async fn append_of_duplicate_only_does_not_grow_the_day() {
        let (_, calendar) = service();
        calendar
            .append(&day(1), vec![Slot::with_task("09:00-10:00", t("T1"))])
            .await
            .unwrap();
        calendar
            .append(&day(1), vec![Slot::empty("09:00-10:00")])
            .await
            .unwrap();
        let slots = calendar.read(&day(1)).await.unwrap();
        assert_eq!(slots, vec![Slot::with_task("09:00-10:00", t("T1"))]);
    }

    #[tokio::test]
    async fn created_at_survives_later_writes() {
        let (store, calendar) = service();
        calendar
            .append(&day(2), vec![Slot::empty("a")])
            .await
            .unwrap();
        let first = store.raw_day(&day(2)).await.unwrap();
        calendar
            .replace(&day(2), vec![Slot::empty("b")])
            .await
            .unwrap();
        let second = store.raw_day(&day(2)).await.unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn replace_overwrites_regardless_of_prior_content() {
        let (_, calendar) = service();
        calendar
            .append(
                &day(3),
                vec![Slot::with_task("a", t("1")), Slot::empty("b")],
            )
            .await
            .unwrap();
        let replacement = vec![Slot::empty("c"), Slot::with_task("d", t("2"))];
        calendar
            .replace(&day(3), replacement.clone())
            .await
            .unwrap();
        assert_eq!(calendar.read(&day(3)).await.unwrap(), replacement);
    }

    #[tokio::test]
    async fn writes_validate_date_and_slot_list() {
        let (store, calendar) = service();
        let bad_date = DayKey::new("u", 2025, 2, 30);
        assert!(matches!(
            calendar.append(&bad_date, vec![Slot::empty("a")]).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            calendar.replace(&day(4), vec![]).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            calendar.append(&day(4), vec![Slot::empty("  ")]).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            calendar
                .replace(&day(4), vec![Slot::empty("a"), Slot::empty("a")])
                .await,
            Err(ServiceError::Validation(_))
        ));
        assert_eq!(store.day_count().await, 0);
    }

    #[tokio::test]
    async fn legacy_entries_are_normalized_and_blank_ones_hidden() {
        let (store, calendar) = service();
        store
            .seed_raw(
                &day(5),
                serde_json::json!([
                    "06:00-07:00",
                    "",
                    {"time_slot": "07:00-08:00", "task": {"task_id": "x", "title": "Organic"}}
                ]),
            )
            .await;

        let slots = calendar.read(&day(5)).await.unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0], Slot::empty("06:00-07:00"));
        assert_eq!(slots[1].task.as_ref().unwrap().priority, TaskPriority::Medium);

        calendar
            .assign_task(&day(5), "06:00-07:00", t("new"))
            .await
            .unwrap();
        let slots = calendar.read(&day(5)).await.unwrap();
        assert_eq!(slots[0].task.as_ref().unwrap().task_id, "new");
    }

    #[tokio::test]
    async fn assign_task_overwrites_previous_task() {
        let (_, calendar) = service();
        calendar
            .append(&day(6), vec![Slot::with_task("09:00-10:00", t("old"))])
            .await
            .unwrap();
        let assigned = calendar
            .assign_task(&day(6), "09:00-10:00", t("new"))
            .await
            .unwrap();
        assert_eq!(assigned.task_id, "new");
        let slots = calendar.read(&day(6)).await.unwrap();
        assert_eq!(slots, vec![Slot::with_task("09:00-10:00", t("new"))]);
    }

    #[tokio::test]
    async fn assign_task_on_missing_slot_leaves_day_untouched() {
        let (store, calendar) = service();
        calendar
            .append(&day(7), vec![Slot::empty("09:00-10:00")])
            .await
            .unwrap();
        let before = store.raw_day(&day(7)).await.unwrap();

        assert!(matches!(
            calendar.assign_task(&day(7), "10:00-11:00", t("x")).await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(store.raw_day(&day(7)).await.unwrap(), before);

        assert!(matches!(
            calendar.assign_task(&day(8), "09:00-10:00", t("x")).await,
            Err(ServiceError::NotFound(_))
        ));
        assert_eq!(store.day_count().await, 1);
    }

    #[tokio::test]
    async fn delete_removes_the_day() {
        let (_, calendar) = service();
        assert!(matches!(
            calendar.delete(&day(9)).await,
            Err(ServiceError::NotFound(_))
        ));
        calendar
            .append(&day(9), vec![Slot::empty("a")])
            .await
            .unwrap();
        calendar.delete(&day(9)).await.unwrap();
        assert!(calendar.read(&day(9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_flattens_and_filters_tasks() {
        let (_, calendar) = service();
        calendar
            .append(
                &DayKey::new("u", 2025, 8, 15),
                vec![
                    Slot::with_task("09:00-10:00", task("a", TaskPriority::High, TaskStatus::Pending)),
                    Slot::empty("10:00-11:00"),
                    Slot::with_task("11:00-12:00", task("b", TaskPriority::Low, TaskStatus::Completed)),
                ],
            )
            .await
            .unwrap();
        calendar
            .append(
                &DayKey::new("u", 2025, 9, 1),
                vec![Slot::with_task("07:00-08:00", task("c", TaskPriority::High, TaskStatus::Completed))],
            )
            .await
            .unwrap();
        calendar
            .append(
                &DayKey::new("someone-else", 2025, 8, 15),
                vec![Slot::with_task("07:00-08:00", t("z"))],
            )
            .await
            .unwrap();

        let all = calendar.search("u", &TaskFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].date, "2025-08-15");
        assert_eq!(all[0].time_slot, "09:00-10:00");

        let high = calendar
            .search(
                "u",
                &TaskFilter {
                    priority: Some(TaskPriority::High),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let ids: Vec<_> = high.iter().map(|h| h.task.task_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        let completed_in_august = calendar
            .search(
                "u",
                &TaskFilter {
                    status: Some(TaskStatus::Completed),
                    year: Some(2025),
                    month: Some(8),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(completed_in_august.len(), 1);
        assert_eq!(completed_in_august[0].task.task_id, "b");
    }

    #[tokio::test]
    async fn month_view_is_scoped_and_validated() {
        let (_, calendar) = service();
        calendar
            .append(&DayKey::new("u", 2025, 8, 20), vec![Slot::empty("a")])
            .await
            .unwrap();
        calendar
            .append(&DayKey::new("u", 2025, 8, 3), vec![Slot::empty("b")])
            .await
            .unwrap();
        calendar
            .append(&DayKey::new("u", 2025, 9, 3), vec![Slot::empty("c")])
            .await
            .unwrap();

        let august = calendar.month("u", 2025, 8).await.unwrap();
        let dates: Vec<_> = august.iter().map(|d| d.key.date).collect();
        assert_eq!(dates, vec![3, 20]);
        assert_eq!(calendar.user_calendar("u").await.unwrap().len(), 3);
        assert!(matches!(
            calendar.month("u", 2025, 13).await,
            Err(ServiceError::Validation(_))
        ));
    }

    struct EchoOptimizer {
        seen: Mutex<Option<OptimizationRequest>>,
    }

    #[async_trait]
    impl ScheduleOptimizationService for EchoOptimizer {
        async fn optimize(&self, request: &OptimizationRequest) -> PortResult<OptimizedSchedule> {
            let first = request
                .current_schedule
                .first()
                .ok_or_else(|| PortError::Unexpected("empty schedule".into()))?;
            *self.seen.lock().unwrap() = Some(request.clone());
            Ok(OptimizedSchedule {
                user_id: "ignored".into(),
                optimization_date: String::new(),
                daily_schedules: vec![OptimizedDay {
                    date: first.date.clone(),
                    slots: first
                        .slots
                        .iter()
                        .map(|s| OptimizedSlot {
                            time_slot: s.time_slot.clone(),
                            task: s.task.clone(),
                            reasoning: "kept".into(),
                        })
                        .collect(),
                }],
                optimization_summary: "unchanged".into(),
                recommendations: vec![],
                psychometric_considerations: vec![],
            })
        }
    }

    #[tokio::test]
    async fn optimize_passes_stored_schedule_and_profile() {
        let (_, calendar) = service();
        calendar
            .append(&day(15), vec![Slot::with_task("09:00-10:00", t("T1"))])
            .await
            .unwrap();
        let optimizer = EchoOptimizer {
            seen: Mutex::new(None),
        };
        let profile = serde_json::json!({"chronotype": "morning"});

        let schedule = calendar
            .optimize(&optimizer, "user_123", profile.clone(), Some(2025), Some(8))
            .await
            .unwrap();

        assert_eq!(schedule.user_id, "user_123");
        assert!(!schedule.optimization_date.is_empty());
        assert_eq!(schedule.daily_schedules[0].date, "2025-08-15");
        let seen = optimizer.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.psychometric_profile, profile);
        assert_eq!(seen.current_schedule.len(), 1);
    }
}
