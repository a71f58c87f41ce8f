//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: signup, OTP verification, OTP resend, login, and
//! the current-user profile.

use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use vibeprep_core::domain::{SignupForm, User};

use crate::error::{ApiResult, ErrorResponse};
use crate::web::extract::ApiJson;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub password: String,
    pub class_name: String,
    pub target_exam: String,
}

impl From<SignupRequest> for SignupForm {
    fn from(req: SignupRequest) -> Self {
        Self {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            phone_number: req.phone_number,
            password: req.password,
            class_name: req.class_name,
            target_exam: req.target_exam,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct OtpVerificationRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Deserialize, ToSchema)]
pub struct OtpResendRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// The public view of an account. Never carries the password hash.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub class_name: String,
    pub target_exam: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            phone_number: user.phone_number,
            class_name: user.class_name,
            target_exam: user.target_exam,
            is_verified: user.is_verified,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    /// Always `bearer`.
    pub token_type: String,
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Register a pending account and email its verification code
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "Auth",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Verification code sent", body = MessageResponse),
        (status = 400, description = "Malformed email or empty password", body = ErrorResponse),
        (status = 409, description = "An account with this email already exists", body = ErrorResponse),
        (status = 502, description = "The verification email could not be sent", body = ErrorResponse)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.auth.signup(req.into()).await?;
    Ok(Json(MessageResponse {
        message: "OTP sent to your email. Please verify to complete registration.".to_string(),
    }))
}

/// POST /auth/verify-otp - Confirm the emailed code and activate the account
#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    tag = "Auth",
    request_body = OtpVerificationRequest,
    responses(
        (status = 200, description = "Account activated", body = UserResponse),
        (status = 400, description = "Invalid or expired code", body = ErrorResponse),
        (status = 409, description = "The account is already verified", body = ErrorResponse)
    )
)]
pub async fn verify_otp_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<OtpVerificationRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = state.auth.verify(&req.email, &req.otp).await?;
    Ok(Json(user.into()))
}

/// POST /auth/resend-otp - Rotate the pending code and email it again
#[utoipa::path(
    post,
    path = "/auth/resend-otp",
    tag = "Auth",
    request_body = OtpResendRequest,
    responses(
        (status = 200, description = "New code sent", body = MessageResponse),
        (status = 404, description = "No pending verification for this email", body = ErrorResponse),
        (status = 502, description = "The verification email could not be sent", body = ErrorResponse)
    )
)]
pub async fn resend_otp_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<OtpResendRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state.auth.resend(&req.email).await?;
    Ok(Json(MessageResponse {
        message: "New OTP sent to your email".to_string(),
    }))
}

/// POST /auth/login - Exchange credentials for a bearer token
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Email not verified yet", body = ErrorResponse)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let grant = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse {
        access_token: grant.access_token,
        token_type: "bearer".to_string(),
        user_id: grant.user.id,
        email: grant.user.email,
        first_name: grant.user.first_name,
        last_name: grant.user.last_name,
    }))
}

/// GET /auth/me - The account behind the bearer token
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(user.into())
}
