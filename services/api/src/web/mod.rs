pub mod auth;
pub mod calendar;
pub mod extract;
pub mod middleware;
pub mod rest;
pub mod schedule;
pub mod state;

pub use middleware::require_auth;

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use rest::ApiDoc;
use state::AppState;

/// Builds the complete application: public and protected routes, CORS, request
/// tracing and the Swagger UI.
pub fn router(app_state: Arc<AppState>) -> Result<Router, ApiError> {
    let cors = cors_layer(&app_state.config.cors_allowed_origin)?;

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(rest::root_handler))
        .route("/health", get(rest::health_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/verify-otp", post(auth::verify_otp_handler))
        .route("/auth/resend-otp", post(auth::resend_otp_handler))
        .route("/auth/login", post(auth::login_handler));

    // Protected routes (bearer token required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route(
            "/calendar/slots/{user_id}/{year}/{month}/{date}",
            get(calendar::get_slots_handler)
                .post(calendar::create_slots_handler)
                .put(calendar::update_slots_handler)
                .delete(calendar::delete_slots_handler),
        )
        .route(
            "/calendar/slots/{user_id}/{year}/{month}/{date}/{time_slot}/task",
            post(calendar::assign_task_handler),
        )
        .route("/calendar/tasks/{user_id}", get(calendar::search_tasks_handler))
        .route("/calendar/user/{user_id}", get(calendar::user_calendar_handler))
        .route(
            "/calendar/month/{user_id}/{year}/{month}",
            get(calendar::month_calendar_handler),
        )
        .route("/schedule/optimize/{user_id}", post(schedule::optimize_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}

/// `*` allows any origin; otherwise a comma-separated list of exact origins.
fn cors_layer(allowed: &str) -> Result<CorsLayer, ApiError> {
    let origin = if allowed.trim() == "*" {
        AllowOrigin::from(Any)
    } else {
        let origins = allowed
            .split(',')
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(|o| {
                o.parse::<HeaderValue>().map_err(|e| {
                    ApiError::Internal(format!("Invalid CORS origin '{o}': {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_accepts_wildcard_and_lists() {
        assert!(cors_layer("*").is_ok());
        assert!(cors_layer("http://localhost:3000, https://app.example.com").is_ok());
        assert!(cors_layer("bad\norigin").is_err());
    }
}
