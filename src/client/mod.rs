//! Local-first client library: configuration, persistence and the API Client.

pub mod api;
pub mod config;
pub mod error;
pub mod notify;
pub mod queue;
pub mod storage;
pub mod transport;

pub use api::ApiClient;
pub use config::{load_config, save_config, ClientConfig, ConfigOverride, DefaultsSource};
pub use error::{format_error, ClientError, ConfigError, StorageError};
pub use notify::Notifier;
pub use queue::SyncQueue;
pub use storage::{FileStore, KeyValueStore, LocalStorage, MemoryStore};
pub use transport::{HttpTransport, RetryPolicy, Transport};
