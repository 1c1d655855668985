//! Reminder models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// How important a reminder is
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Priority {
    Someday,
    #[default]
    Chill,
    Important,
    Urgent,
    Waiting,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Someday => write!(f, "someday"),
            Self::Chill => write!(f, "chill"),
            Self::Important => write!(f, "important"),
            Self::Urgent => write!(f, "urgent"),
            Self::Waiting => write!(f, "waiting"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "someday" => Ok(Self::Someday),
            "chill" => Ok(Self::Chill),
            "important" => Ok(Self::Important),
            "urgent" => Ok(Self::Urgent),
            "waiting" => Ok(Self::Waiting),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Lifecycle state of a reminder. Any state may follow any other.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Completed,
    Snoozed,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Snoozed => write!(f, "snoozed"),
        }
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "snoozed" => Ok(Self::Snoozed),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// Where a reminder was captured
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Manual,
    Voice,
    Api,
}

fn default_location_radius() -> i64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Reminder {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub notes: Option<String>,
    // Timing
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub due_time: Option<String>,
    #[serde(default)]
    pub time_required: bool,
    // Location
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub location_address: Option<String>,
    #[serde(default)]
    pub location_lat: Option<f64>,
    #[serde(default)]
    pub location_lng: Option<f64>,
    /// Trigger radius in metres
    #[serde(default = "default_location_radius")]
    pub location_radius: i64,
    // Organization
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub category: Option<String>,
    // Status tracking
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub snoozed_until: Option<String>,
    #[serde(default)]
    pub recurrence_id: Option<String>,
    #[serde(default)]
    pub source: Source,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub synced_at: Option<String>,
}

impl Reminder {
    /// Build a pending reminder with default organization fields
    pub fn new(id: impl Into<String>, text: impl Into<String>, timestamp: &str) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            notes: None,
            due_date: None,
            due_time: None,
            time_required: false,
            location_name: None,
            location_address: None,
            location_lat: None,
            location_lng: None,
            location_radius: default_location_radius(),
            priority: Priority::default(),
            category: None,
            status: Status::default(),
            completed_at: None,
            snoozed_until: None,
            recurrence_id: None,
            source: Source::default(),
            created_at: timestamp.to_string(),
            updated_at: timestamp.to_string(),
            synced_at: None,
        }
    }

    /// Coordinates, when both halves are present
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.location_lat, self.location_lng) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

/// A reminder annotated with its distance from a query point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyReminder {
    #[serde(flatten)]
    pub reminder: Reminder,
    /// Distance in metres
    pub distance: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateReminderRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_time: Option<String>,
    #[serde(default)]
    pub time_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_radius: Option<i64>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snoozed_until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_id: Option<String>,
    /// Creates a pattern and the reminder's later occurrences with it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_pattern: Option<super::CreateRecurrenceRequest>,
    #[serde(default)]
    pub source: Source,
}

impl CreateReminderRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Partial update. `None` keeps the stored value; for optional text fields an
/// empty string clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateReminderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_radius: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snoozed_until: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_id: Option<String>,
}

/// Query parameters accepted by `GET /api/reminders`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReminderFilters {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub returned: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderListResponse {
    pub data: Vec<Reminder>,
    pub pagination: Pagination,
}

/// Query parameters accepted by `GET /api/reminders/near-location`
#[derive(Debug, Clone, Deserialize)]
pub struct NearLocationQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyListResponse {
    pub data: Vec<NearbyReminder>,
}
