use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::db::{
    CreateReminderRequest, DbPool, NearLocationQuery, NearbyListResponse, NearbyReminder,
    Pagination, Reminder, ReminderFilters, ReminderListResponse, Status, UpdateReminderRequest,
};
use crate::utils::{haversine_distance, now_rfc3339};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::{ApiJson, ApiQuery};
use super::recurrence::{check_pattern, create_recurring_reminder};
use super::validation::{
    validate_due_date, validate_due_time, validate_id, validate_latitude,
    validate_location_radius, validate_longitude, validate_max_len, validate_pagination,
    validate_search_radius, validate_text, validate_timestamp, MAX_CATEGORY_LEN,
    MAX_LOCATION_ADDRESS_LEN, MAX_LOCATION_NAME_LEN, MAX_NOTES_LEN,
};

const DEFAULT_LIMIT: i64 = 100;
const DEFAULT_NEAR_RADIUS: f64 = 1000.0;

pub(crate) fn validate_create_request(req: &CreateReminderRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    errors.check("text", validate_text(&req.text));
    errors.check("notes", validate_max_len(&req.notes, "Notes", MAX_NOTES_LEN));
    errors.check("due_date", validate_due_date(&req.due_date));
    errors.check("due_time", validate_due_time(&req.due_time));
    errors.check(
        "location_name",
        validate_max_len(&req.location_name, "Location name", MAX_LOCATION_NAME_LEN),
    );
    errors.check(
        "location_address",
        validate_max_len(&req.location_address, "Location address", MAX_LOCATION_ADDRESS_LEN),
    );
    errors.check("location_lat", validate_latitude(req.location_lat));
    errors.check("location_lng", validate_longitude(req.location_lng));
    errors.check("location_radius", validate_location_radius(req.location_radius));
    errors.check("category", validate_max_len(&req.category, "Category", MAX_CATEGORY_LEN));
    errors.check("snoozed_until", validate_timestamp(&req.snoozed_until, "Snoozed until"));
    if let Some(ref pattern) = req.recurrence_pattern {
        check_pattern(&mut errors, "recurrence_pattern.", pattern);
    }

    errors.finish()
}

pub(crate) fn validate_update_request(req: &UpdateReminderRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(ref text) = req.text {
        errors.check("text", validate_text(text));
    }
    errors.check("notes", validate_max_len(&req.notes, "Notes", MAX_NOTES_LEN));
    errors.check("due_date", validate_due_date(&req.due_date));
    errors.check("due_time", validate_due_time(&req.due_time));
    errors.check(
        "location_name",
        validate_max_len(&req.location_name, "Location name", MAX_LOCATION_NAME_LEN),
    );
    errors.check(
        "location_address",
        validate_max_len(&req.location_address, "Location address", MAX_LOCATION_ADDRESS_LEN),
    );
    errors.check("location_lat", validate_latitude(req.location_lat));
    errors.check("location_lng", validate_longitude(req.location_lng));
    errors.check("location_radius", validate_location_radius(req.location_radius));
    errors.check("category", validate_max_len(&req.category, "Category", MAX_CATEGORY_LEN));
    errors.check("completed_at", validate_timestamp(&req.completed_at, "Completed at"));
    errors.check("snoozed_until", validate_timestamp(&req.snoozed_until, "Snoozed until"));

    errors.finish()
}

/// Helper to merge optional string fields
/// - None means "don't change"
/// - Some("") means "clear"
/// - Some(value) means "set"
fn merge_optional_string(new_val: &Option<String>, existing: &Option<String>) -> Option<String> {
    match new_val {
        Some(s) if s.is_empty() => None,
        Some(s) => Some(s.clone()),
        None => existing.clone(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Build a fresh row from a create payload
pub(crate) fn reminder_from_create(id: String, req: CreateReminderRequest, now: &str) -> Reminder {
    let mut reminder = Reminder::new(id, req.text, now);
    reminder.notes = non_empty(req.notes);
    reminder.due_date = non_empty(req.due_date);
    reminder.due_time = non_empty(req.due_time);
    reminder.time_required = req.time_required;
    reminder.location_name = non_empty(req.location_name);
    reminder.location_address = non_empty(req.location_address);
    reminder.location_lat = req.location_lat;
    reminder.location_lng = req.location_lng;
    if let Some(radius) = req.location_radius {
        reminder.location_radius = radius;
    }
    reminder.priority = req.priority;
    reminder.category = non_empty(req.category);
    reminder.status = req.status;
    reminder.snoozed_until = non_empty(req.snoozed_until);
    reminder.recurrence_id = non_empty(req.recurrence_id);
    reminder.source = req.source;
    if reminder.status == Status::Completed {
        reminder.completed_at = Some(now.to_string());
    }
    reminder
}

/// Merge a partial update onto a stored row.
///
/// Moving to `completed` without an explicit `completed_at` stamps `now`.
pub(crate) fn apply_update(existing: &Reminder, req: &UpdateReminderRequest, now: &str) -> Reminder {
    let mut updated = existing.clone();

    if let Some(ref text) = req.text {
        updated.text = text.clone();
    }
    updated.notes = merge_optional_string(&req.notes, &existing.notes);
    updated.due_date = merge_optional_string(&req.due_date, &existing.due_date);
    updated.due_time = merge_optional_string(&req.due_time, &existing.due_time);
    updated.time_required = req.time_required.unwrap_or(existing.time_required);
    updated.location_name = merge_optional_string(&req.location_name, &existing.location_name);
    updated.location_address =
        merge_optional_string(&req.location_address, &existing.location_address);
    if req.location_lat.is_some() {
        updated.location_lat = req.location_lat;
    }
    if req.location_lng.is_some() {
        updated.location_lng = req.location_lng;
    }
    updated.location_radius = req.location_radius.unwrap_or(existing.location_radius);
    updated.priority = req.priority.unwrap_or(existing.priority);
    updated.category = merge_optional_string(&req.category, &existing.category);
    updated.status = req.status.unwrap_or(existing.status);
    updated.completed_at = merge_optional_string(&req.completed_at, &existing.completed_at);
    updated.snoozed_until = merge_optional_string(&req.snoozed_until, &existing.snoozed_until);
    updated.recurrence_id = merge_optional_string(&req.recurrence_id, &existing.recurrence_id);

    let completing = req.status == Some(Status::Completed);
    let explicit_completed_at = req.completed_at.as_deref().is_some_and(|s| !s.is_empty());
    if completing && !explicit_completed_at {
        updated.completed_at = Some(now.to_string());
    }

    updated.updated_at = now.to_string();
    updated
}

pub(crate) async fn fetch_reminder(db: &DbPool, id: &str) -> Result<Option<Reminder>, sqlx::Error> {
    sqlx::query_as::<_, Reminder>("SELECT * FROM reminders WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub(crate) async fn insert_reminder(db: &DbPool, r: &Reminder) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO reminders (
            id, text, notes, due_date, due_time, time_required,
            location_name, location_address, location_lat, location_lng, location_radius,
            priority, category, status, completed_at, snoozed_until, recurrence_id, source,
            created_at, updated_at, synced_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&r.id)
    .bind(&r.text)
    .bind(&r.notes)
    .bind(&r.due_date)
    .bind(&r.due_time)
    .bind(r.time_required)
    .bind(&r.location_name)
    .bind(&r.location_address)
    .bind(r.location_lat)
    .bind(r.location_lng)
    .bind(r.location_radius)
    .bind(r.priority)
    .bind(&r.category)
    .bind(r.status)
    .bind(&r.completed_at)
    .bind(&r.snoozed_until)
    .bind(&r.recurrence_id)
    .bind(r.source)
    .bind(&r.created_at)
    .bind(&r.updated_at)
    .bind(&r.synced_at)
    .execute(db)
    .await?;
    Ok(())
}

/// Overwrite every mutable column of an existing row
pub(crate) async fn store_reminder(db: &DbPool, r: &Reminder) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE reminders SET
            text = ?, notes = ?, due_date = ?, due_time = ?, time_required = ?,
            location_name = ?, location_address = ?, location_lat = ?, location_lng = ?,
            location_radius = ?, priority = ?, category = ?, status = ?, completed_at = ?,
            snoozed_until = ?, recurrence_id = ?, source = ?, updated_at = ?, synced_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&r.text)
    .bind(&r.notes)
    .bind(&r.due_date)
    .bind(&r.due_time)
    .bind(r.time_required)
    .bind(&r.location_name)
    .bind(&r.location_address)
    .bind(r.location_lat)
    .bind(r.location_lng)
    .bind(r.location_radius)
    .bind(r.priority)
    .bind(&r.category)
    .bind(r.status)
    .bind(&r.completed_at)
    .bind(&r.snoozed_until)
    .bind(&r.recurrence_id)
    .bind(r.source)
    .bind(&r.updated_at)
    .bind(&r.synced_at)
    .bind(&r.id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn delete_by_id(db: &DbPool, id: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM reminders WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

/// List reminders, newest first
///
/// GET /api/reminders
pub async fn list_reminders(
    State(state): State<Arc<AppState>>,
    ApiQuery(filters): ApiQuery<ReminderFilters>,
) -> Result<Json<ReminderListResponse>, ApiError> {
    let limit = filters.limit.unwrap_or(DEFAULT_LIMIT);
    let offset = filters.offset.unwrap_or(0);
    validate_pagination(limit, offset).map_err(ApiError::bad_request)?;

    let status = filters.status.map(|s| s.to_string());
    let priority = filters.priority.map(|p| p.to_string());
    let category = filters.category.filter(|c| !c.is_empty());

    // Each filter is bound twice so an absent value matches every row
    let reminders = sqlx::query_as::<_, Reminder>(
        r#"
        SELECT * FROM reminders
        WHERE (? IS NULL OR status = ?)
          AND (? IS NULL OR priority = ?)
          AND (? IS NULL OR category = ?)
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(&status)
    .bind(&status)
    .bind(&priority)
    .bind(&priority)
    .bind(&category)
    .bind(&category)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;

    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM reminders
        WHERE (? IS NULL OR status = ?)
          AND (? IS NULL OR priority = ?)
          AND (? IS NULL OR category = ?)
        "#,
    )
    .bind(&status)
    .bind(&status)
    .bind(&priority)
    .bind(&priority)
    .bind(&category)
    .bind(&category)
    .fetch_one(&state.db)
    .await?;

    let returned = reminders.len();
    Ok(Json(ReminderListResponse {
        data: reminders,
        pagination: Pagination {
            total,
            limit,
            offset,
            returned,
        },
    }))
}

pub async fn get_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Reminder>, ApiError> {
    validate_id(&id).map_err(|e| ApiError::validation_field("id", e))?;

    let reminder = fetch_reminder(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Reminder not found"))?;

    Ok(Json(reminder))
}

pub async fn create_reminder(
    State(state): State<Arc<AppState>>,
    ApiJson(mut req): ApiJson<CreateReminderRequest>,
) -> Result<(StatusCode, Json<Reminder>), ApiError> {
    validate_create_request(&req)?;

    let pattern = req.recurrence_pattern.take();
    let now = now_rfc3339();
    let reminder = reminder_from_create(uuid::Uuid::new_v4().to_string(), req, &now);

    let reminder = match pattern {
        Some(pattern) => create_recurring_reminder(&state.db, reminder, pattern).await?,
        None => {
            insert_reminder(&state.db, &reminder).await?;
            info!(reminder_id = %reminder.id, priority = %reminder.priority, "Reminder created");
            reminder
        }
    };

    Ok((StatusCode::CREATED, Json(reminder)))
}

pub async fn update_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateReminderRequest>,
) -> Result<Json<Reminder>, ApiError> {
    validate_id(&id).map_err(|e| ApiError::validation_field("id", e))?;
    validate_update_request(&req)?;

    let existing = fetch_reminder(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Reminder not found"))?;

    let updated = apply_update(&existing, &req, &now_rfc3339());
    if store_reminder(&state.db, &updated).await? == 0 {
        // Deleted between the read and the write
        return Err(ApiError::not_found("Reminder not found"));
    }

    info!(reminder_id = %id, status = %updated.status, "Reminder updated");

    Ok(Json(updated))
}

pub async fn delete_reminder(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_id(&id).map_err(|e| ApiError::validation_field("id", e))?;

    if delete_by_id(&state.db, &id).await? == 0 {
        return Err(ApiError::not_found("Reminder not found"));
    }

    info!(reminder_id = %id, "Reminder deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Reminders whose coordinates lie within `radius` metres, closest first
///
/// GET /api/reminders/near-location
pub async fn near_location(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<NearLocationQuery>,
) -> Result<Json<NearbyListResponse>, ApiError> {
    let radius = query.radius.unwrap_or(DEFAULT_NEAR_RADIUS);

    let mut errors = ValidationErrorBuilder::new();
    errors.check("lat", validate_latitude(Some(query.lat)));
    errors.check("lng", validate_longitude(Some(query.lng)));
    errors.check("radius", validate_search_radius(radius));
    errors.finish()?;

    let candidates = sqlx::query_as::<_, Reminder>(
        "SELECT * FROM reminders WHERE location_lat IS NOT NULL AND location_lng IS NOT NULL",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(NearbyListResponse {
        data: nearby(candidates, query.lat, query.lng, radius),
    }))
}

fn nearby(candidates: Vec<Reminder>, lat: f64, lng: f64, radius: f64) -> Vec<NearbyReminder> {
    let mut found: Vec<NearbyReminder> = candidates
        .into_iter()
        .filter_map(|reminder| {
            let (r_lat, r_lng) = reminder.coordinates()?;
            let distance = haversine_distance(lat, lng, r_lat, r_lng);
            (distance <= radius).then_some(NearbyReminder { reminder, distance })
        })
        .collect();

    found.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    found
}
