// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development. Everything is read once
//! at startup and shared through `AppState`.

use std::env;
use std::time::Duration;

/// Runtime mode. Controls error verbosity and which mailer is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Which document store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Firestore,
    Memory,
}

/// S3-compatible object storage settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_key: String,
    /// Custom endpoint (MinIO and friends). `None` means AWS.
    pub endpoint_url: Option<String>,
    /// Lifetime of presigned GET URLs.
    pub signed_url_ttl: Duration,
}

/// Outbound email settings.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub from: String,
    pub api_url: String,
    /// When absent, emails are logged instead of sent (development only).
    pub api_key: Option<String>,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    /// Server port
    pub port: u16,

    pub database_backend: DatabaseBackend,
    /// GCP project holding the Firestore database
    pub gcp_project_id: String,

    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Lifetime of issued session tokens
    pub jwt_expires_in: Duration,
    /// Lifetime of the `jwt` cookie in days
    pub jwt_cookie_expires_days: i64,

    pub storage: StorageConfig,
    pub email: EmailConfig,

    /// Requests allowed per client per window on `/api`
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    /// Behind a reverse proxy: key clients on the hop it appends to
    /// `X-Forwarded-For` instead of the peer address
    pub trust_proxy: bool,

    /// Directory served as static files
    pub public_dir: String,
    /// Allowed CORS origins; empty allows any origin, without credentials
    pub cors_origins: Vec<String>,
    /// Refuse logins until the email address has been verified
    pub require_email_verification: bool,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            port: 8080,
            database_backend: DatabaseBackend::Memory,
            gcp_project_id: "test-project".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            jwt_expires_in: Duration::from_secs(90 * 24 * 60 * 60),
            jwt_cookie_expires_days: 90,
            storage: StorageConfig {
                bucket: "test-bucket".to_string(),
                region: "us-east-1".to_string(),
                access_key_id: "test".to_string(),
                secret_key: "test".to_string(),
                endpoint_url: None,
                signed_url_ttl: Duration::from_secs(24 * 60 * 60),
            },
            email: EmailConfig {
                from: "Natours <hello@natours.test>".to_string(),
                api_url: "http://localhost:9/v3/mail/send".to_string(),
                api_key: None,
            },
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(60 * 60),
            trust_proxy: false,
            public_dir: "public".to_string(),
            cors_origins: Vec::new(),
            require_email_verification: false,
        }
    }
}

impl Config {
    /// Default config for tests.
    pub fn test_default() -> Self {
        Self::default()
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            Ok("development") | Err(_) => Environment::Development,
            Ok(_) => return Err(ConfigError::Invalid("APP_ENV")),
        };

        let database_backend = match env::var("DATABASE_BACKEND").as_deref() {
            Ok("memory") => DatabaseBackend::Memory,
            Ok("firestore") | Err(_) => DatabaseBackend::Firestore,
            Ok(_) => return Err(ConfigError::Invalid("DATABASE_BACKEND")),
        };

        let gcp_project_id = match database_backend {
            DatabaseBackend::Firestore => {
                env::var("GCP_PROJECT_ID").map_err(|_| ConfigError::Missing("GCP_PROJECT_ID"))?
            }
            DatabaseBackend::Memory => {
                env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string())
            }
        };

        let jwt_expires_in = match env::var("JWT_EXPIRES_IN") {
            Ok(raw) => parse_duration(&raw).ok_or(ConfigError::Invalid("JWT_EXPIRES_IN"))?,
            Err(_) => Duration::from_secs(90 * 24 * 60 * 60),
        };

        let storage = StorageConfig {
            bucket: env::var("AWS_BUCKET_NAME")
                .map_err(|_| ConfigError::Missing("AWS_BUCKET_NAME"))?,
            region: env::var("AWS_BUCKET_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id: env::var("AWS_ACCESS_KEY_ID")
                .map_err(|_| ConfigError::Missing("AWS_ACCESS_KEY_ID"))?,
            secret_key: env::var("AWS_SECRET_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("AWS_SECRET_KEY"))?,
            endpoint_url: env::var("AWS_ENDPOINT_URL").ok(),
            signed_url_ttl: Duration::from_secs(24 * 60 * 60),
        };

        let email = EmailConfig {
            from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "Natours <hello@natours.io>".to_string()),
            api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.sendgrid.com/v3/mail/send".to_string()),
            api_key: env::var("EMAIL_API_KEY").ok().map(|v| v.trim().to_string()),
        };
        if environment == Environment::Production && email.api_key.is_none() {
            return Err(ConfigError::Missing("EMAIL_API_KEY"));
        }

        Ok(Self {
            environment,
            port: parse_or("PORT", 8080),
            database_backend,
            gcp_project_id,
            jwt_signing_key: env::var("JWT_SECRET")
                .map_err(|_| ConfigError::Missing("JWT_SECRET"))?
                .into_bytes(),
            jwt_expires_in,
            jwt_cookie_expires_days: parse_or("JWT_COOKIE_EXPIRES_IN", 90),
            storage,
            email,
            rate_limit_max: parse_or("RATE_LIMIT_MAX", 100),
            rate_limit_window: Duration::from_secs(parse_or("RATE_LIMIT_WINDOW_SECS", 3600)),
            trust_proxy: env::var("TRUST_PROXY")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            public_dir: env::var("PUBLIC_DIR").unwrap_or_else(|_| "public".to_string()),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            require_email_verification: env::var("REQUIRE_EMAIL_VERIFICATION")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parse durations written as `90d`, `12h`, `30m`, `45s` or bare seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let value: u64 = digits.parse().ok()?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return None,
    };
    value.checked_mul(multiplier).map(Duration::from_secs)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
