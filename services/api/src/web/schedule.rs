//! services/api/src/web/schedule.rs
//!
//! The schedule optimization endpoint. The stored calendar and the caller's
//! psychometric profile are handed to the configured optimizer; nothing is persisted.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use vibeprep_core::domain::{OptimizedDay, OptimizedSchedule, OptimizedSlot};

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::calendar::TaskDto;
use crate::web::extract::{ApiJson, ApiPath};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct OptimizeRequest {
    /// Free-form profile: learning style, attention span, weak topics, peak hours...
    #[schema(value_type = Object)]
    pub psychometric_profile: serde_json::Value,
    /// Narrow the current schedule to one year.
    pub year: Option<i32>,
    /// Narrow the current schedule to one month (1-12).
    pub month: Option<u32>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OptimizedSlotDto {
    pub time_slot: String,
    pub task: Option<TaskDto>,
    pub reasoning: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OptimizedDayDto {
    pub date: String,
    pub slots: Vec<OptimizedSlotDto>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct OptimizedScheduleResponse {
    pub user_id: String,
    pub optimization_date: String,
    pub daily_schedules: Vec<OptimizedDayDto>,
    pub optimization_summary: String,
    pub recommendations: Vec<String>,
    pub psychometric_considerations: Vec<String>,
}

impl From<OptimizedSlot> for OptimizedSlotDto {
    fn from(slot: OptimizedSlot) -> Self {
        Self {
            time_slot: slot.time_slot,
            task: slot.task.map(TaskDto::from),
            reasoning: slot.reasoning,
        }
    }
}

impl From<OptimizedDay> for OptimizedDayDto {
    fn from(day: OptimizedDay) -> Self {
        Self {
            date: day.date,
            slots: day.slots.into_iter().map(OptimizedSlotDto::from).collect(),
        }
    }
}

impl From<OptimizedSchedule> for OptimizedScheduleResponse {
    fn from(s: OptimizedSchedule) -> Self {
        Self {
            user_id: s.user_id,
            optimization_date: s.optimization_date,
            daily_schedules: s.daily_schedules.into_iter().map(Into::into).collect(),
            optimization_summary: s.optimization_summary,
            recommendations: s.recommendations,
            psychometric_considerations: s.psychometric_considerations,
        }
    }
}

/// Ask the optimizer to rewrite a user's schedule.
#[utoipa::path(
    post,
    path = "/schedule/optimize/{user_id}",
    tag = "Schedule",
    params(("user_id" = String, Path)),
    request_body = OptimizeRequest,
    responses(
        (status = 200, description = "Optimized schedule", body = OptimizedScheduleResponse),
        (status = 400, description = "Month outside 1-12", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 503, description = "No optimizer configured", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn optimize_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<String>,
    ApiJson(req): ApiJson<OptimizeRequest>,
) -> ApiResult<Json<OptimizedScheduleResponse>> {
    let optimizer = state.optimizer.as_deref().ok_or_else(|| {
        ApiError::Unavailable("Schedule optimization is not configured".to_string())
    })?;

    let schedule = state
        .calendar
        .optimize(
            optimizer,
            &user_id,
            req.psychometric_profile,
            req.year,
            req.month,
        )
        .await?;
    Ok(Json(schedule.into()))
}
