//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use vibeprep_core::ServiceError;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Middleware that validates the `Authorization: Bearer <jwt>` header.
///
/// If valid, inserts the resolved `User` into request extensions for handlers to use.
/// If invalid or missing, returns 401 with a `WWW-Authenticate: Bearer` challenge.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the bearer token
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ServiceError::Unauthorized)?;

    // 2. Resolve the account the token was issued for
    let user = state.auth.authenticate(token).await?;

    // 3. Insert the user into request extensions
    req.extensions_mut().insert(user);

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
