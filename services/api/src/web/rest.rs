//! services/api/src/web/rest.rs
//!
//! Liveness endpoints and the master definition for the OpenAPI specification.

use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi, ToSchema,
};

use crate::error::ErrorResponse;
use crate::web::{auth, calendar, schedule};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vibeprep Backend API",
        description = "Email/OTP authentication and study calendar management."
    ),
    paths(
        root_handler,
        health_handler,
        auth::signup_handler,
        auth::verify_otp_handler,
        auth::resend_otp_handler,
        auth::login_handler,
        auth::me_handler,
        calendar::get_slots_handler,
        calendar::create_slots_handler,
        calendar::update_slots_handler,
        calendar::delete_slots_handler,
        calendar::assign_task_handler,
        calendar::search_tasks_handler,
        calendar::user_calendar_handler,
        calendar::month_calendar_handler,
        schedule::optimize_handler,
    ),
    components(
        schemas(
            StatusResponse,
            ErrorResponse,
            auth::SignupRequest,
            auth::OtpVerificationRequest,
            auth::OtpResendRequest,
            auth::LoginRequest,
            auth::MessageResponse,
            auth::UserResponse,
            auth::LoginResponse,
            calendar::TaskDto,
            calendar::SlotDto,
            calendar::SlotUpdate,
            calendar::TaskUpdate,
            calendar::SlotResponse,
            calendar::SlotWriteResponse,
            calendar::TaskAssignResponse,
            calendar::SlotDeleteResponse,
            calendar::TaskHitDto,
            calendar::TaskSearchResponse,
            calendar::CalendarDayDto,
            calendar::UserCalendarResponse,
            calendar::MonthCalendarResponse,
            schedule::OptimizeRequest,
            schedule::OptimizedSlotDto,
            schedule::OptimizedDayDto,
            schedule::OptimizedScheduleResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Auth", description = "Signup, OTP verification and login."),
        (name = "Calendar", description = "Per-day time slots and their tasks."),
        (name = "Schedule", description = "LLM-backed schedule optimization.")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by the protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

//=========================================================================================
// Liveness
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner", body = StatusResponse))
)]
pub async fn root_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        message: "Vibeprep Backend API is running!".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = StatusResponse))
)]
pub async fn health_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "healthy".to_string(),
        message: "API is working properly".to_string(),
    })
}
