//! services/api/src/web/calendar.rs
//!
//! Calendar endpoints: per-day slot CRUD, task assignment, task search and the
//! user/month views. All routes here sit behind `require_auth`.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use vibeprep_core::domain::{
    CalendarDay, DayKey, Slot, Task, TaskFilter, TaskHit, TaskPriority, TaskStatus,
};

use crate::error::{ApiResult, ErrorResponse};
use crate::web::extract::{ApiJson, ApiPath, ApiQuery};
use crate::web::state::AppState;

//=========================================================================================
// API Payload Structs
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TaskDto {
    #[schema(example = "task_001")]
    pub task_id: String,
    #[schema(example = "Physics revision")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// One of `low`, `medium`, `high`, `urgent`. Defaults to `medium`.
    #[serde(default)]
    #[schema(value_type = String, example = "high")]
    pub priority: TaskPriority,
    /// One of `pending`, `in_progress`, `completed`, `cancelled`. Defaults to `pending`.
    #[serde(default)]
    #[schema(value_type = String, example = "pending")]
    pub status: TaskStatus,
}

impl From<TaskDto> for Task {
    fn from(dto: TaskDto) -> Self {
        Self {
            task_id: dto.task_id,
            title: dto.title,
            description: dto.description,
            priority: dto.priority,
            status: dto.status,
        }
    }
}

impl From<Task> for TaskDto {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.task_id,
            title: task.title,
            description: task.description,
            priority: task.priority,
            status: task.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SlotDto {
    #[schema(example = "09:00-10:00")]
    pub time_slot: String,
    #[serde(default)]
    pub task: Option<TaskDto>,
}

impl From<SlotDto> for Slot {
    fn from(dto: SlotDto) -> Self {
        Self {
            time_slot: dto.time_slot,
            task: dto.task.map(Task::from),
        }
    }
}

impl From<Slot> for SlotDto {
    fn from(slot: Slot) -> Self {
        Self {
            time_slot: slot.time_slot,
            task: slot.task.map(TaskDto::from),
        }
    }
}

fn to_dtos(slots: Vec<Slot>) -> Vec<SlotDto> {
    slots.into_iter().map(SlotDto::from).collect()
}

#[derive(Deserialize, ToSchema)]
pub struct SlotUpdate {
    pub slots: Vec<SlotDto>,
}

#[derive(Deserialize, ToSchema)]
pub struct TaskUpdate {
    pub task: TaskDto,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SlotResponse {
    pub user_id: String,
    pub year: i32,
    pub month: u32,
    pub date: u32,
    pub slots: Vec<SlotDto>,
    pub total_slots: usize,
}

/// Returned by both create (POST) and replace (PUT).
#[derive(Serialize, Deserialize, ToSchema)]
pub struct SlotWriteResponse {
    pub message: String,
    pub user_id: String,
    pub year: i32,
    pub month: u32,
    pub date: u32,
    pub slots: Vec<SlotDto>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TaskAssignResponse {
    pub message: String,
    pub user_id: String,
    pub year: i32,
    pub month: u32,
    pub date: u32,
    pub time_slot: String,
    pub task: TaskDto,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct SlotDeleteResponse {
    pub message: String,
    pub user_id: String,
    pub year: i32,
    pub month: u32,
    pub date: u32,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TaskHitDto {
    #[schema(example = "2025-08-15")]
    pub date: String,
    pub time_slot: String,
    pub task: TaskDto,
}

impl From<TaskHit> for TaskHitDto {
    fn from(hit: TaskHit) -> Self {
        Self {
            date: hit.date,
            time_slot: hit.time_slot,
            task: hit.task.into(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TaskSearchResponse {
    pub user_id: String,
    pub tasks: Vec<TaskHitDto>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CalendarDayDto {
    pub year: i32,
    pub month: u32,
    pub date: u32,
    pub slots: Vec<SlotDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CalendarDay> for CalendarDayDto {
    fn from(day: CalendarDay) -> Self {
        Self {
            year: day.key.year,
            month: day.key.month,
            date: day.key.date,
            slots: to_dtos(day.slots),
            created_at: day.created_at,
            updated_at: day.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct UserCalendarResponse {
    pub user_id: String,
    pub calendar: Vec<CalendarDayDto>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct MonthCalendarResponse {
    pub user_id: String,
    pub year: i32,
    pub month: u32,
    pub dates: Vec<CalendarDayDto>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskSearchQuery {
    #[param(value_type = Option<String>)]
    pub status: Option<TaskStatus>,
    #[param(value_type = Option<String>)]
    pub priority: Option<TaskPriority>,
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl From<TaskSearchQuery> for TaskFilter {
    fn from(q: TaskSearchQuery) -> Self {
        Self {
            status: q.status,
            priority: q.priority,
            year: q.year,
            month: q.month,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Get the slots of one day. A day never written reads as empty.
#[utoipa::path(
    get,
    path = "/calendar/slots/{user_id}/{year}/{month}/{date}",
    tag = "Calendar",
    params(
        ("user_id" = String, Path),
        ("year" = i32, Path),
        ("month" = u32, Path),
        ("date" = u32, Path)
    ),
    responses(
        (status = 200, description = "Slots of the day", body = SlotResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_slots_handler(
    State(state): State<Arc<AppState>>,
    ApiPath((user_id, year, month, date)): ApiPath<(String, i32, u32, u32)>,
) -> ApiResult<Json<SlotResponse>> {
    let key = DayKey::new(user_id, year, month, date);
    let slots = state.calendar.read(&key).await?;
    Ok(Json(SlotResponse {
        total_slots: slots.len(),
        slots: to_dtos(slots),
        user_id: key.user_id,
        year,
        month,
        date,
    }))
}

/// Add slots to a day. Slots whose `time_slot` already exists are left untouched.
#[utoipa::path(
    post,
    path = "/calendar/slots/{user_id}/{year}/{month}/{date}",
    tag = "Calendar",
    params(
        ("user_id" = String, Path),
        ("year" = i32, Path),
        ("month" = u32, Path),
        ("date" = u32, Path)
    ),
    request_body = SlotUpdate,
    responses(
        (status = 200, description = "Resulting slots of the day", body = SlotWriteResponse),
        (status = 400, description = "Invalid date or slot data", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_slots_handler(
    State(state): State<Arc<AppState>>,
    ApiPath((user_id, year, month, date)): ApiPath<(String, i32, u32, u32)>,
    ApiJson(body): ApiJson<SlotUpdate>,
) -> ApiResult<Json<SlotWriteResponse>> {
    let key = DayKey::new(user_id, year, month, date);
    let incoming = body.slots.into_iter().map(Slot::from).collect();
    let slots = state.calendar.append(&key, incoming).await?;
    Ok(Json(SlotWriteResponse {
        message: "Slots created successfully".to_string(),
        user_id: key.user_id,
        year,
        month,
        date,
        slots: to_dtos(slots),
    }))
}

/// Replace the whole slot list of a day.
#[utoipa::path(
    put,
    path = "/calendar/slots/{user_id}/{year}/{month}/{date}",
    tag = "Calendar",
    params(
        ("user_id" = String, Path),
        ("year" = i32, Path),
        ("month" = u32, Path),
        ("date" = u32, Path)
    ),
    request_body = SlotUpdate,
    responses(
        (status = 200, description = "New slots of the day", body = SlotWriteResponse),
        (status = 400, description = "Invalid date, empty or duplicate slots", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_slots_handler(
    State(state): State<Arc<AppState>>,
    ApiPath((user_id, year, month, date)): ApiPath<(String, i32, u32, u32)>,
    ApiJson(body): ApiJson<SlotUpdate>,
) -> ApiResult<Json<SlotWriteResponse>> {
    let key = DayKey::new(user_id, year, month, date);
    let incoming = body.slots.into_iter().map(Slot::from).collect();
    let slots = state.calendar.replace(&key, incoming).await?;
    Ok(Json(SlotWriteResponse {
        message: "Slots updated successfully".to_string(),
        user_id: key.user_id,
        year,
        month,
        date,
        slots: to_dtos(slots),
    }))
}

/// Delete a whole day.
#[utoipa::path(
    delete,
    path = "/calendar/slots/{user_id}/{year}/{month}/{date}",
    tag = "Calendar",
    params(
        ("user_id" = String, Path),
        ("year" = i32, Path),
        ("month" = u32, Path),
        ("date" = u32, Path)
    ),
    responses(
        (status = 200, description = "Day deleted", body = SlotDeleteResponse),
        (status = 400, description = "Invalid date", body = ErrorResponse),
        (status = 404, description = "No slots stored for the date", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_slots_handler(
    State(state): State<Arc<AppState>>,
    ApiPath((user_id, year, month, date)): ApiPath<(String, i32, u32, u32)>,
) -> ApiResult<Json<SlotDeleteResponse>> {
    let key = DayKey::new(user_id, year, month, date);
    state.calendar.delete(&key).await?;
    Ok(Json(SlotDeleteResponse {
        message: "Slots deleted successfully".to_string(),
        user_id: key.user_id,
        year,
        month,
        date,
    }))
}

/// Put a task into an existing slot, replacing any task it held.
#[utoipa::path(
    post,
    path = "/calendar/slots/{user_id}/{year}/{month}/{date}/{time_slot}/task",
    tag = "Calendar",
    params(
        ("user_id" = String, Path),
        ("year" = i32, Path),
        ("month" = u32, Path),
        ("date" = u32, Path),
        ("time_slot" = String, Path, example = "09:00-10:00")
    ),
    request_body = TaskUpdate,
    responses(
        (status = 200, description = "Task assigned", body = TaskAssignResponse),
        (status = 400, description = "Invalid date", body = ErrorResponse),
        (status = 404, description = "Day or slot not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn assign_task_handler(
    State(state): State<Arc<AppState>>,
    ApiPath((user_id, year, month, date, time_slot)): ApiPath<(String, i32, u32, u32, String)>,
    ApiJson(body): ApiJson<TaskUpdate>,
) -> ApiResult<Json<TaskAssignResponse>> {
    let key = DayKey::new(user_id, year, month, date);
    let task = state
        .calendar
        .assign_task(&key, &time_slot, body.task.into())
        .await?;
    Ok(Json(TaskAssignResponse {
        message: "Task assigned successfully".to_string(),
        user_id: key.user_id,
        year,
        month,
        date,
        time_slot,
        task: task.into(),
    }))
}

/// Search a user's tasks, optionally by status, priority, year and month.
#[utoipa::path(
    get,
    path = "/calendar/tasks/{user_id}",
    tag = "Calendar",
    params(("user_id" = String, Path), TaskSearchQuery),
    responses(
        (status = 200, description = "Matching tasks in date order", body = TaskSearchResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn search_tasks_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<TaskSearchQuery>,
) -> ApiResult<Json<TaskSearchResponse>> {
    let hits = state.calendar.search(&user_id, &query.into()).await?;
    Ok(Json(TaskSearchResponse {
        user_id,
        tasks: hits.into_iter().map(TaskHitDto::from).collect(),
    }))
}

/// Every stored day of a user.
#[utoipa::path(
    get,
    path = "/calendar/user/{user_id}",
    tag = "Calendar",
    params(("user_id" = String, Path)),
    responses(
        (status = 200, description = "All days of the user", body = UserCalendarResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn user_calendar_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<String>,
) -> ApiResult<Json<UserCalendarResponse>> {
    let days = state.calendar.user_calendar(&user_id).await?;
    Ok(Json(UserCalendarResponse {
        user_id,
        calendar: days.into_iter().map(CalendarDayDto::from).collect(),
    }))
}

/// Stored days of one month.
#[utoipa::path(
    get,
    path = "/calendar/month/{user_id}/{year}/{month}",
    tag = "Calendar",
    params(
        ("user_id" = String, Path),
        ("year" = i32, Path),
        ("month" = u32, Path)
    ),
    responses(
        (status = 200, description = "Days of the month", body = MonthCalendarResponse),
        (status = 400, description = "Month outside 1-12", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn month_calendar_handler(
    State(state): State<Arc<AppState>>,
    ApiPath((user_id, year, month)): ApiPath<(String, i32, u32)>,
) -> ApiResult<Json<MonthCalendarResponse>> {
    let days = state.calendar.month(&user_id, year, month).await?;
    Ok(Json(MonthCalendarResponse {
        user_id,
        year,
        month,
        dates: days.into_iter().map(CalendarDayDto::from).collect(),
    }))
}
