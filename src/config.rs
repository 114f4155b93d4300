//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `PAYMENT_SECRET_KEY` - Secret API key for the hosted checkout processor
//!
//! ## Optional
//! - `HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8080)
//! - `PUBLIC_BASE_URL` - URL the payment processor redirects back to (default: http://localhost:8080)
//! - `SESSION_TTL_DAYS` - Visitor session lifetime since last change (default: 14)
//! - `PAYMENT_API_BASE` - Processor API base URL (default: https://api.stripe.com)
//! - `PAYMENT_CURRENCY` - ISO 4217 currency for every charge (default: gbp)
//! - `PAYMENT_TIMEOUT_SECS` - Per-request processor timeout (default: 10)

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: SecretString,
    pub host: String,
    pub port: u16,
    /// Public base URL without trailing slash.
    pub public_base_url: String,
    pub session_ttl: chrono::Duration,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub api_base: String,
    pub secret_key: SecretString,
    pub currency: String,
    pub timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };
        let optional = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let public_base_url = optional("PUBLIC_BASE_URL", "http://localhost:8080")
            .trim_end_matches('/')
            .to_string();
        if !public_base_url.starts_with("http://") && !public_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidEnvVar(
                "PUBLIC_BASE_URL".to_string(),
                "must start with http:// or https://".to_string(),
            ));
        }

        let session_ttl_days: i64 = parse("SESSION_TTL_DAYS", &optional("SESSION_TTL_DAYS", "14"))?;
        if session_ttl_days < 1 {
            return Err(ConfigError::InvalidEnvVar(
                "SESSION_TTL_DAYS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let currency = optional("PAYMENT_CURRENCY", "gbp").to_ascii_lowercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidEnvVar(
                "PAYMENT_CURRENCY".to_string(),
                "must be a three-letter ISO 4217 code".to_string(),
            ));
        }

        Ok(Config {
            database_url: SecretString::from(required("DATABASE_URL")?),
            host: optional("HOST", "0.0.0.0"),
            port: parse("PORT", &optional("PORT", "8080"))?,
            public_base_url,
            session_ttl: chrono::Duration::days(session_ttl_days),
            payment: PaymentConfig {
                api_base: optional("PAYMENT_API_BASE", "https://api.stripe.com"),
                secret_key: SecretString::from(required("PAYMENT_SECRET_KEY")?),
                currency,
                timeout: Duration::from_secs(parse(
                    "PAYMENT_TIMEOUT_SECS",
                    &optional("PAYMENT_TIMEOUT_SECS", "10"),
                )?),
            },
        })
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn is_secure(&self) -> bool {
        self.public_base_url.starts_with("https://")
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}
