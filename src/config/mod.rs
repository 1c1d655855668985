use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable that replaces `auth.api_token` when set
pub const API_TOKEN_ENV: &str = "REMINDERS_API_TOKEN";
/// Environment variable holding one extra allowed CORS origin
pub const CORS_ORIGIN_ENV: &str = "REMINDERS_CORS_ORIGIN";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared bearer secret. Empty disables static-token access; sessions still work.
    #[serde(default)]
    pub api_token: String,
    /// Lifetime of a session created by a verified login code
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    /// Lifetime of a magic login code
    #[serde(default = "default_code_ttl_minutes")]
    pub code_ttl_minutes: i64,
    /// Failed verifications allowed before a code is burned
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: i64,
    /// Return issued login codes in the response body (local development only)
    #[serde(default)]
    pub expose_login_codes: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            session_ttl_hours: default_session_ttl_hours(),
            code_ttl_minutes: default_code_ttl_minutes(),
            max_code_attempts: default_max_code_attempts(),
            expose_login_codes: false,
        }
    }
}

fn default_session_ttl_hours() -> i64 {
    24 * 30
}

fn default_code_ttl_minutes() -> i64 {
    10
}

fn default_max_code_attempts() -> i64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    [
        "http://localhost:3077",
        "http://localhost:8080",
        "http://127.0.0.1:3077",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Apply `REMINDERS_API_TOKEN` and `REMINDERS_CORS_ORIGIN`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var(API_TOKEN_ENV) {
            if !token.is_empty() {
                self.auth.api_token = token;
            }
        }

        if let Ok(origin) = std::env::var(CORS_ORIGIN_ENV) {
            if !origin.is_empty() && !self.cors.allowed_origins.contains(&origin) {
                self.cors.allowed_origins.push(origin);
            }
        }
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            cors: CorsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
