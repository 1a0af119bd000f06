//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, FcmConfig, FcmGateway, ResendMailer},
    config::Config,
    error::ApiError,
    web::{build_router, AppState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Delivery Adapters ---
    let fcm_config = FcmConfig::from_config(&config);
    if config.fcm_private_key.is_none() && config.fcm_server_key.is_none() {
        warn!("No push credentials configured; notifications will be saved without delivery");
    }
    let gateway = Arc::new(FcmGateway::new(fcm_config)?);

    if config.resend_api_key.is_none() {
        warn!("RESEND_API_KEY is not set; approval emails will fail");
    }
    let mailer = Arc::new(ResendMailer::new(
        config.resend_api_key.clone(),
        config.email_from.clone(),
        config.push_timeout,
    )?);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        db_adapter,
        gateway,
        mailer,
        config.notification_title.clone(),
        config.push_timeout,
    ));

    // --- 5. Create the Web Router ---
    let app = build_router(app_state);

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
