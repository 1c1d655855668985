//! Sync change records shared by the client queue and the replay endpoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A single local mutation waiting to be replayed against the cloud store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncChange {
    pub id: String,
    pub action: SyncAction,
    /// Resulting reminder payload; `None` for deletes
    pub data: Option<serde_json::Value>,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub client_id: String,
    #[serde(default)]
    pub last_sync: Option<String>,
    #[serde(default)]
    pub changes: Vec<SyncChange>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    ServerWins,
    ClientWins,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictInfo {
    pub id: String,
    pub client_updated_at: String,
    pub server_updated_at: String,
    pub resolution: ConflictResolution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub server_changes: Vec<SyncChange>,
    pub conflicts: Vec<ConflictInfo>,
    pub last_sync: String,
    pub applied_count: usize,
}
