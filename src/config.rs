use std::env;

use actix_web::http::header::HeaderValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Server settings read from the environment (and `.env`, loaded by the binaries).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_name: String,
    pub host: String,
    pub port: u16,
    pub cors_origin: HeaderValue,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw,
            })?,
            None => 5000,
        };

        let origin = lookup("CORS_ORIGIN").unwrap_or_else(|| "*".to_string());
        let cors_origin = HeaderValue::from_str(&origin).map_err(|_| ConfigError::Invalid {
            name: "CORS_ORIGIN",
            value: origin.clone(),
        })?;

        Ok(AppConfig {
            database_url,
            database_name: lookup("DATABASE_NAME").unwrap_or_else(|| "tech_store".to_string()),
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            cors_origin,
        })
    }
}
