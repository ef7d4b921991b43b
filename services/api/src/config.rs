//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono_tz::Tz;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use syllabus_core::DEFAULT_TIMEZONE;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where uploaded PDFs live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageSettings {
    /// A Google Cloud Storage bucket (the Firebase Storage bucket). A missing bucket
    /// surfaces when the gateway is built, not at config load.
    Gcs {
        bucket: Option<String>,
        service_account_path: Option<PathBuf>,
        service_account_key: Option<String>,
        public_base_url: String,
    },
    /// Process-local storage; contents vanish on restart.
    Memory { public_base_url: String },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub storage: StorageSettings,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub gemini_timeout: Duration,
    pub calendar_base_url: String,
    pub calendar_timezone: Tz,
    pub cors_allowed_origin: String,
    pub max_upload_bytes: usize,
    pub test_pdf_path: Option<PathBuf>,
}

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or =
            |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
        let required =
            |name: &str| lookup(name).ok_or_else(|| ConfigError::MissingVar(name.to_string()));

        // --- Server Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:5000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage Settings ---
        let storage = match var_or("STORAGE_BACKEND", "gcs").to_lowercase().as_str() {
            "gcs" | "firebase" => {
                let bucket = lookup("FIREBASE_STORAGE_BUCKET");
                let public_base_url = lookup("STORAGE_PUBLIC_BASE_URL").unwrap_or_else(|| {
                    let bucket = bucket.as_deref().unwrap_or_default();
                    format!("https://storage.googleapis.com/{}", bucket)
                });
                StorageSettings::Gcs {
                    service_account_path: lookup("GOOGLE_SERVICE_ACCOUNT_PATH").map(PathBuf::from),
                    service_account_key: lookup("GOOGLE_SERVICE_ACCOUNT_KEY"),
                    public_base_url,
                    bucket,
                }
            }
            "memory" => StorageSettings::Memory {
                public_base_url: var_or("STORAGE_PUBLIC_BASE_URL", "http://localhost:5000/files"),
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "STORAGE_BACKEND".to_string(),
                    format!("'{}' is not one of gcs, memory", other),
                ))
            }
        };

        // --- Model Settings ---
        let gemini_api_key = required("GEMINI_API_KEY")?;
        let gemini_model = var_or("GEMINI_MODEL", "gemini-2.5-flash");
        let gemini_base_url = var_or("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL);
        let gemini_timeout = parse_number::<u64>(&lookup, "GEMINI_TIMEOUT_SECS", 120)
            .map(Duration::from_secs)?;

        // --- Calendar Settings ---
        let calendar_base_url = var_or("CALENDAR_BASE_URL", DEFAULT_CALENDAR_BASE_URL);
        let calendar_timezone = match lookup("CALENDAR_TIMEZONE") {
            Some(name) => name.parse::<Tz>().map_err(|e| {
                ConfigError::InvalidValue("CALENDAR_TIMEZONE".to_string(), e.to_string())
            })?,
            None => DEFAULT_TIMEZONE,
        };

        // --- Web Settings ---
        let cors_allowed_origin = var_or("CORS_ALLOWED_ORIGIN", "http://localhost:5173");
        let max_upload_bytes =
            parse_number::<usize>(&lookup, "MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?;
        let test_pdf_path = lookup("TEST_PDF_PATH").map(PathBuf::from);

        Ok(Self {
            bind_address,
            log_level,
            storage,
            gemini_api_key,
            gemini_model,
            gemini_base_url,
            gemini_timeout,
            calendar_base_url,
            calendar_timezone,
            cors_allowed_origin,
            max_upload_bytes,
            test_pdf_path,
        })
    }
}

fn parse_number<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}
