//! Configuration module for the donated objects backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::errors::AppError;

/// Runtime environment, controls how much failure detail reaches clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            _ => Environment::Production,
        }
    }

    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Runtime environment
    pub environment: Environment,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        // A blank PORT counts as unset
        let port: u16 = match env::var("PORT") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid PORT value: {raw}")))?,
            _ => 3000,
        };

        let host: IpAddr = env::var("DOAR_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string())
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid DOAR_HOST value: {e}")))?;

        let db_path = env::var("DOAR_DB_PATH")
            .unwrap_or_else(|_| "./data/objetos.sqlite".to_string())
            .into();

        let environment = env::var("DOAR_ENV")
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Production);

        let log_level = env::var("DOAR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("DOAR_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            db_path,
            bind_addr: SocketAddr::new(host, port),
            environment,
            log_level,
            log_format,
        })
    }
}
