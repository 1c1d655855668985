//! Effective client configuration.
//!
//! A published defaults document is merged with the override persisted under
//! `reminders_config`. Every leaf present in the override wins; everything
//! else keeps the default. Loading never fails: unreachable or malformed
//! documents are logged and replaced by the built-in defaults.

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::error::{ConfigError, StorageError};
use super::storage::{KeyValueStore, LocalStorage, CONFIG_KEY};

pub const DEFAULT_LOCAL_ENDPOINT: &str = "http://localhost:8000/api";
pub const DEFAULT_CLOUD_ENDPOINT: &str = "https://reminders.example.com/api";
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api: ApiSettings,
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    pub local_endpoint: String,
    pub cloud_endpoint: String,
    pub use_cloud: bool,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    pub enabled: bool,
    pub interval_minutes: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiSettings {
                local_endpoint: DEFAULT_LOCAL_ENDPOINT.to_string(),
                cloud_endpoint: DEFAULT_CLOUD_ENDPOINT.to_string(),
                use_cloud: false,
                token: String::new(),
            },
            sync: SyncSettings {
                enabled: true,
                interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            },
        }
    }
}

/// A partial configuration document. Absent leaves keep the base value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiOverride>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_cloud: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u32>,
}

impl From<&ClientConfig> for ConfigOverride {
    fn from(config: &ClientConfig) -> Self {
        Self {
            api: Some(ApiOverride {
                local_endpoint: Some(config.api.local_endpoint.clone()),
                cloud_endpoint: Some(config.api.cloud_endpoint.clone()),
                use_cloud: Some(config.api.use_cloud),
                token: Some(config.api.token.clone()),
            }),
            sync: Some(SyncOverride {
                enabled: Some(config.sync.enabled),
                interval_minutes: Some(config.sync.interval_minutes),
            }),
        }
    }
}

impl ClientConfig {
    /// Right-biased, per-leaf merge
    pub fn merge(self, overlay: ConfigOverride) -> ClientConfig {
        let ClientConfig { mut api, mut sync } = self;

        if let Some(o) = overlay.api {
            if let Some(v) = o.local_endpoint {
                api.local_endpoint = v;
            }
            if let Some(v) = o.cloud_endpoint {
                api.cloud_endpoint = v;
            }
            if let Some(v) = o.use_cloud {
                api.use_cloud = v;
            }
            if let Some(v) = o.token {
                api.token = v;
            }
        }

        if let Some(o) = overlay.sync {
            if let Some(v) = o.enabled {
                sync.enabled = v;
            }
            if let Some(v) = o.interval_minutes {
                sync.interval_minutes = v;
            }
        }

        ClientConfig { api, sync }
    }

    /// The endpoint requests go to, without a trailing slash
    pub fn endpoint(&self) -> &str {
        let endpoint = if self.api.use_cloud {
            &self.api.cloud_endpoint
        } else {
            &self.api.local_endpoint
        };
        endpoint.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint("api.local_endpoint", &self.api.local_endpoint)?;
        validate_endpoint("api.cloud_endpoint", &self.api.cloud_endpoint)?;
        if self.sync.interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "sync.interval_minutes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_endpoint(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::Invalid(format!("{} is not a valid URL: {}", field, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "{} must use http or https, not {}",
            field, other
        ))),
    }
}

/// Where the published defaults document comes from
#[async_trait]
pub trait DefaultsSource: Send + Sync {
    async fn fetch(&self) -> Result<ConfigOverride, ConfigError>;
}

/// `GET {base}/config.json`
pub struct HttpDefaults {
    client: reqwest::Client,
    url: String,
}

impl HttpDefaults {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::Fetch(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}/config.json", base_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl DefaultsSource for HttpDefaults {
    async fn fetch(&self) -> Result<ConfigOverride, ConfigError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| ConfigError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConfigError::Status(response.status().as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ConfigError::Fetch(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// A defaults document on disk
pub struct FileDefaults {
    path: PathBuf,
}

impl FileDefaults {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DefaultsSource for FileDefaults {
    async fn fetch(&self) -> Result<ConfigOverride, ConfigError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// No published document; the built-in defaults are used as is
pub struct BuiltinDefaults;

#[async_trait]
impl DefaultsSource for BuiltinDefaults {
    async fn fetch(&self) -> Result<ConfigOverride, ConfigError> {
        Ok(ConfigOverride::default())
    }
}

/// The persisted override, or an empty one when missing or unreadable
pub fn stored_override<S: KeyValueStore>(storage: &LocalStorage<S>) -> ConfigOverride {
    match storage.get_item::<ConfigOverride>(CONFIG_KEY) {
        Ok(Some(overlay)) => overlay,
        Ok(None) => ConfigOverride::default(),
        Err(e) => {
            error!(error = %e, "Ignoring malformed configuration override");
            ConfigOverride::default()
        }
    }
}

/// Resolve the effective configuration
pub async fn load_config<S: KeyValueStore>(
    source: &dyn DefaultsSource,
    storage: &LocalStorage<S>,
) -> ClientConfig {
    let builtin = ClientConfig::default();

    let defaults = match source.fetch().await {
        Ok(document) => {
            let merged = builtin.clone().merge(document);
            match merged.validate() {
                Ok(()) => merged,
                Err(e) => {
                    warn!(error = %e, "Published defaults are invalid, using built-in defaults");
                    builtin
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "Could not load published defaults, using built-in defaults");
            builtin
        }
    };

    let merged = defaults.clone().merge(stored_override(storage));
    if let Err(e) = merged.validate() {
        warn!(error = %e, "Configuration override is invalid, ignoring it");
        return defaults;
    }

    debug!(endpoint = %merged.endpoint(), use_cloud = merged.api.use_cloud, "Configuration loaded");
    merged
}

/// Persist `config` as the override document
pub fn save_config<S: KeyValueStore>(
    storage: &LocalStorage<S>,
    config: &ClientConfig,
) -> Result<(), StorageError> {
    storage.set_item(CONFIG_KEY, config)
}

/// Forget the override so the defaults apply again
pub fn clear_config<S: KeyValueStore>(storage: &LocalStorage<S>) -> Result<(), StorageError> {
    storage.remove_item(CONFIG_KEY)
}
