//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        Argon2Hasher, DbAdapter, JwtTokenService, LogMailer, OpenAiScheduleAdapter, SmtpMailer,
    },
    config::Config,
    error::ApiError,
    web::{self, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use chrono::Duration;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vibeprep_core::{
    otp::RandomOtpGenerator, AuthService, CalendarService, NotificationService,
    ScheduleOptimizationService,
};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let notifier: Arc<dyn NotificationService> = match &config.mail {
        Some(mail) => {
            info!("Sending mail through {}:{}", mail.server, mail.port);
            Arc::new(SmtpMailer::new(mail).map_err(|e| ApiError::Internal(e.to_string()))?)
        }
        None => {
            warn!("MAIL_SERVER is not set; verification codes will only be logged.");
            Arc::new(LogMailer)
        }
    };

    let tokens = Arc::new(JwtTokenService::new(
        &config.jwt_secret,
        Duration::minutes(config.access_token_expire_minutes),
    ));

    let optimizer: Option<Arc<dyn ScheduleOptimizationService>> =
        match config.openai_api_key.as_ref() {
            Some(key) => {
                let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(key));
                Some(Arc::new(OpenAiScheduleAdapter::new(
                    openai_client,
                    config.optimizer_model.clone(),
                )))
            }
            None => {
                warn!("OPENAI_API_KEY is not set; schedule optimization is disabled.");
                None
            }
        };

    // --- 4. Build the Core Services & Shared AppState ---
    let auth = AuthService::new(
        db_adapter.clone(),
        notifier,
        Arc::new(Argon2Hasher),
        tokens,
        Arc::new(RandomOtpGenerator),
    )
    .with_otp_ttl(Duration::minutes(config.otp_expire_minutes));
    let calendar = CalendarService::new(db_adapter);

    let app_state = Arc::new(AppState {
        auth: Arc::new(auth),
        calendar: Arc::new(calendar),
        optimizer,
        config: config.clone(),
    });

    // --- 5. Create the Web Router ---
    let app = web::router(app_state)?;

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
