//! Application configuration

use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    /// Prepended to every route, e.g. "/assist"
    pub path_prefix: String,
    pub max_message_size_mb: usize,

    // Authentication
    pub jwt_secret: Option<String>,
    pub jwt_expiry_hours: i64,

    // Peer addressing
    /// Exact project key length; `None` accepts any length
    pub project_key_length: Option<usize>,

    // Housekeeping
    pub room_audit_interval_secs: u64,

    // Logging
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:9001".to_string()),
            path_prefix: normalize_prefix(&env::var("PATH_PREFIX").unwrap_or_default()),
            max_message_size_mb: env::var("MAX_MESSAGE_SIZE_MB")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            // Authentication
            jwt_secret: match env::var("ASSIST_JWT_SECRET") {
                Ok(secret) if !secret.is_empty() => {
                    if secret.len() < 32 {
                        return Err(ConfigError::WeakSecret(
                            "ASSIST_JWT_SECRET must be at least 32 characters",
                        ));
                    }
                    Some(secret)
                }
                _ => None,
            },
            jwt_expiry_hours: env::var("ASSIST_JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),

            // Peer addressing
            project_key_length: env::var("PROJECT_KEY_LENGTH")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|len| *len > 0),

            // Housekeeping
            room_audit_interval_secs: {
                let secs = env::var("ROOM_AUDIT_INTERVAL_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30);
                if secs == 0 {
                    return Err(ConfigError::Invalid(
                        "ROOM_AUDIT_INTERVAL_SECS must be at least 1",
                    ));
                }
                secs
            },

            // Logging
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        })
    }

    pub fn max_message_size_bytes(&self) -> usize {
        self.max_message_size_mb * 1024 * 1024
    }

    pub fn room_audit_interval(&self) -> Duration {
        Duration::from_secs(self.room_audit_interval_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9001".to_string(),
            path_prefix: String::new(),
            max_message_size_mb: 5,
            jwt_secret: None,
            jwt_expiry_hours: 24,
            project_key_length: None,
            room_audit_interval_secs: 30,
            log_format: LogFormat::Text,
        }
    }
}

/// "assist/" and "/assist" both become "/assist"; "" and "/" mean no prefix
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
}
