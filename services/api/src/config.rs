//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;

use secrecy::SecretString;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub push_timeout: Duration,
    pub notification_title: String,
    pub fcm_project_id: Option<String>,
    pub fcm_service_account_email: Option<String>,
    pub fcm_private_key: Option<SecretString>,
    pub fcm_server_key: Option<SecretString>,
    pub resend_api_key: Option<SecretString>,
    pub email_from: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Load Server and Database Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let db_max_connections = parse_number(&var, "DB_MAX_CONNECTIONS", 5)?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Push Gateway ---
        let push_timeout = Duration::from_secs(parse_number(&var, "PUSH_TIMEOUT_SECS", 10)?);
        let notification_title =
            var("FCM_NOTIFICATION_TITLE").unwrap_or_else(|| "Kikao Homes".to_string());
        let fcm_project_id = var("FCM_PROJECT_ID");
        let fcm_service_account_email = var("FCM_SERVICE_ACCOUNT_EMAIL");
        // Keys pasted into a single env line usually carry literal `\n` sequences.
        let fcm_private_key = var("FCM_PRIVATE_KEY")
            .map(|pem| SecretString::new(pem.replace("\\n", "\n")));
        let fcm_server_key = var("FCM_SERVER_KEY").map(SecretString::new);

        // --- Email ---
        let resend_api_key = var("RESEND_API_KEY").map(SecretString::new);
        let email_from =
            var("EMAIL_FROM").unwrap_or_else(|| "Kikao Homes <onboarding@resend.dev>".to_string());

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            push_timeout,
            notification_title,
            fcm_project_id,
            fcm_service_account_email,
            fcm_private_key,
            fcm_server_key,
            resend_api_key,
            email_from,
        })
    }
}

fn parse_number<T, F>(var: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
