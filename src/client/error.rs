use thiserror::Error;

/// Failure of a local persistence operation
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("stored value for '{key}' is not valid: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("value for '{key}' could not be serialized: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure to obtain or validate a configuration document
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to fetch defaults: {0}")]
    Fetch(String),

    #[error("defaults request returned HTTP {0}")]
    Status(u16),

    #[error("defaults document is malformed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read defaults: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Failure of an API Client request
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced an HTTP response
    #[error("network error: {0}")]
    Transport(String),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body was not what the operation expected
    #[error("invalid response: {0}")]
    Decode(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Whether repeating the same request could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Turn a client failure into the message shown to the user
pub fn format_error(err: &ClientError) -> String {
    match err {
        ClientError::Transport(_) => {
            "Cannot reach the reminders server. Check your connection and try again.".to_string()
        }
        ClientError::Status { status: 401, .. } => {
            "Authentication failed. Check your API token.".to_string()
        }
        ClientError::Status { status: 404, .. } => "Reminder not found.".to_string(),
        ClientError::Status { status: 429, .. } => {
            "Too many requests. Please wait a moment and try again.".to_string()
        }
        ClientError::Status { status, .. } if *status >= 500 => {
            "The server ran into a problem. Please try again later.".to_string()
        }
        ClientError::Status { message, .. } if !message.is_empty() => message.clone(),
        ClientError::Status { status, .. } => format!("Request failed (HTTP {})", status),
        ClientError::Decode(_) => "The server sent an unexpected response.".to_string(),
        ClientError::Storage(e) => format!("Could not save data on this device: {}", e),
    }
}
