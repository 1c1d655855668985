//! Input validation for API requests.
//!
//! Validators return `Err(message)` describing the first problem found. Use
//! `ValidationErrorBuilder` from the `error` module to collect them per field.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// `HH:MM` or `HH:MM:SS`, 24-hour clock
    static ref DUE_TIME_REGEX: Regex = Regex::new(
        r"^([01]\d|2[0-3]):[0-5]\d(:[0-5]\d)?$"
    ).unwrap();

    /// Loose shape check only
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
    ).unwrap();

    /// Six digit magic login code
    static ref LOGIN_CODE_REGEX: Regex = Regex::new(r"^\d{6}$").unwrap();
}

pub const MAX_TEXT_LEN: usize = 1000;
pub const MAX_NOTES_LEN: usize = 5000;
pub const MAX_LOCATION_NAME_LEN: usize = 500;
pub const MAX_LOCATION_ADDRESS_LEN: usize = 1000;
pub const MAX_CATEGORY_LEN: usize = 100;
pub const MAX_ID_LEN: usize = 128;
pub const MIN_LOCATION_RADIUS: i64 = 10;
pub const MAX_LOCATION_RADIUS: i64 = 10_000;
pub const MAX_SEARCH_RADIUS: f64 = 100_000.0;
pub const MAX_RECURRENCE_INTERVAL: i64 = 365;

/// Validate reminder text
pub fn validate_text(text: &str) -> Result<(), String> {
    if text.trim().is_empty() {
        return Err("Text is required".to_string());
    }
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(format!("Text is too long (max {} characters)", MAX_TEXT_LEN));
    }
    Ok(())
}

/// Validate an optional free-text field against a maximum length
pub fn validate_max_len(value: &Option<String>, label: &str, max: usize) -> Result<(), String> {
    match value {
        Some(v) if v.chars().count() > max => {
            Err(format!("{} is too long (max {} characters)", label, max))
        }
        _ => Ok(()),
    }
}

/// Validate a `YYYY-MM-DD` due date. Empty string is allowed (means "clear").
pub fn validate_due_date(value: &Option<String>) -> Result<(), String> {
    match value.as_deref() {
        None | Some("") => Ok(()),
        Some(date) => chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|_| ())
            .map_err(|_| "Due date must be in YYYY-MM-DD format".to_string()),
    }
}

/// Validate a due time. The client sends `HH:MM:SS`; `HH:MM` is tolerated.
pub fn validate_due_time(value: &Option<String>) -> Result<(), String> {
    match value.as_deref() {
        None | Some("") => Ok(()),
        Some(time) if DUE_TIME_REGEX.is_match(time) => Ok(()),
        Some(_) => Err("Due time must be in HH:MM:SS format".to_string()),
    }
}

/// Validate an RFC 3339 timestamp field. Empty string is allowed (means "clear").
pub fn validate_timestamp(value: &Option<String>, label: &str) -> Result<(), String> {
    match value.as_deref() {
        None | Some("") => Ok(()),
        Some(ts) => chrono::DateTime::parse_from_rfc3339(ts)
            .map(|_| ())
            .map_err(|_| format!("{} must be an ISO 8601 timestamp", label)),
    }
}

pub fn validate_latitude(value: Option<f64>) -> Result<(), String> {
    match value {
        Some(lat) if !(-90.0..=90.0).contains(&lat) => {
            Err("Latitude must be between -90 and 90".to_string())
        }
        _ => Ok(()),
    }
}

pub fn validate_longitude(value: Option<f64>) -> Result<(), String> {
    match value {
        Some(lng) if !(-180.0..=180.0).contains(&lng) => {
            Err("Longitude must be between -180 and 180".to_string())
        }
        _ => Ok(()),
    }
}

/// Validate a stored trigger radius in metres
pub fn validate_location_radius(value: Option<i64>) -> Result<(), String> {
    match value {
        Some(r) if !(MIN_LOCATION_RADIUS..=MAX_LOCATION_RADIUS).contains(&r) => Err(format!(
            "Location radius must be between {} and {} metres",
            MIN_LOCATION_RADIUS, MAX_LOCATION_RADIUS
        )),
        _ => Ok(()),
    }
}

/// Validate a proximity search radius in metres
pub fn validate_search_radius(radius: f64) -> Result<(), String> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err("Radius must be a positive number of metres".to_string());
    }
    if radius > MAX_SEARCH_RADIUS {
        return Err(format!("Radius must be at most {} metres", MAX_SEARCH_RADIUS));
    }
    Ok(())
}

/// Validate an opaque reminder identifier
pub fn validate_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("ID is required".to_string());
    }
    if id.len() > MAX_ID_LEN {
        return Err(format!("ID is too long (max {} characters)", MAX_ID_LEN));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 || !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

pub fn validate_login_code(code: &str) -> Result<(), String> {
    if LOGIN_CODE_REGEX.is_match(code) {
        Ok(())
    } else {
        Err("Login code must be 6 digits".to_string())
    }
}

/// Validate an optional integer against an inclusive range
pub fn validate_range(value: Option<i64>, label: &str, min: i64, max: i64) -> Result<(), String> {
    match value {
        Some(v) if !(min..=max).contains(&v) => {
            Err(format!("{} must be between {} and {}", label, min, max))
        }
        _ => Ok(()),
    }
}

pub fn validate_at_least(value: Option<i64>, label: &str, min: i64) -> Result<(), String> {
    match value {
        Some(v) if v < min => Err(format!("{} must be at least {}", label, min)),
        _ => Ok(()),
    }
}

/// Validate a `YYYY-MM-DD` date other than the due date
pub fn validate_date(value: &Option<String>, label: &str) -> Result<(), String> {
    match value.as_deref() {
        None | Some("") => Ok(()),
        Some(date) => chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map(|_| ())
            .map_err(|_| format!("{} must be in YYYY-MM-DD format", label)),
    }
}

/// Validate comma-separated weekdays, 0 = Monday through 6 = Sunday
pub fn validate_days_of_week(value: &Option<String>) -> Result<(), String> {
    match value.as_deref() {
        None | Some("") => Ok(()),
        Some(days) => crate::db::parse_days_of_week(days).map(|_| ()),
    }
}

/// Validate list pagination parameters
pub fn validate_pagination(limit: i64, offset: i64) -> Result<(), String> {
    if !(1..=1000).contains(&limit) {
        return Err("Limit must be between 1 and 1000".to_string());
    }
    if offset < 0 {
        return Err("Offset must not be negative".to_string());
    }
    Ok(())
}
