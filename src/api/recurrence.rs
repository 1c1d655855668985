//! Recurrence pattern CRUD and instance generation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{Days, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

use crate::db::{
    CreateRecurrenceRequest, CreateReminderRequest, DbPool, GeneratedInstances, RecurrencePattern,
    Reminder, Status, UpdateRecurrenceRequest, HORIZON_DAYS,
};
use crate::utils::now_rfc3339;
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use super::reminders::{insert_reminder, reminder_from_create, validate_create_request};
use super::validation::{
    validate_at_least, validate_date, validate_days_of_week, validate_id, validate_range,
    MAX_RECURRENCE_INTERVAL,
};

/// Check a pattern payload, reporting fields as `<prefix><field>`
pub(crate) fn check_pattern(
    errors: &mut ValidationErrorBuilder,
    prefix: &str,
    req: &CreateRecurrenceRequest,
) {
    let field = |name: &str| format!("{}{}", prefix, name);

    errors.check(
        &field("interval"),
        validate_range(Some(req.interval), "Interval", 1, MAX_RECURRENCE_INTERVAL),
    );
    errors.check(&field("days_of_week"), validate_days_of_week(&req.days_of_week));
    errors.check(
        &field("day_of_month"),
        validate_range(req.day_of_month, "Day of month", 1, 31),
    );
    errors.check(
        &field("month_of_year"),
        validate_range(req.month_of_year, "Month of year", 1, 12),
    );
    errors.check(&field("end_date"), validate_date(&req.end_date, "End date"));
    errors.check(&field("end_count"), validate_at_least(req.end_count, "End count", 1));
}

fn validate_update(req: &UpdateRecurrenceRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    errors.check(
        "interval",
        validate_range(req.interval, "Interval", 1, MAX_RECURRENCE_INTERVAL),
    );
    errors.check("days_of_week", validate_days_of_week(&req.days_of_week));
    errors.check("day_of_month", validate_range(req.day_of_month, "Day of month", 1, 31));
    errors.check(
        "month_of_year",
        validate_range(req.month_of_year, "Month of year", 1, 12),
    );
    errors.check("end_date", validate_date(&req.end_date, "End date"));
    errors.check("end_count", validate_at_least(req.end_count, "End count", 1));

    errors.finish()
}

pub(crate) fn pattern_from_create(id: String, req: CreateRecurrenceRequest, now: &str) -> RecurrencePattern {
    RecurrencePattern {
        id,
        frequency: req.frequency,
        interval: req.interval,
        days_of_week: req.days_of_week.filter(|s| !s.is_empty()),
        day_of_month: req.day_of_month,
        month_of_year: req.month_of_year,
        end_date: req.end_date.filter(|s| !s.is_empty()),
        end_count: req.end_count,
        created_at: now.to_string(),
        updated_at: now.to_string(),
    }
}

fn apply_update(existing: &RecurrencePattern, req: &UpdateRecurrenceRequest, now: &str) -> RecurrencePattern {
    let clearable = |new: &Option<String>, old: &Option<String>| match new {
        Some(s) if s.is_empty() => None,
        Some(s) => Some(s.clone()),
        None => old.clone(),
    };

    RecurrencePattern {
        id: existing.id.clone(),
        frequency: req.frequency.unwrap_or(existing.frequency),
        interval: req.interval.unwrap_or(existing.interval),
        days_of_week: clearable(&req.days_of_week, &existing.days_of_week),
        day_of_month: req.day_of_month.or(existing.day_of_month),
        month_of_year: req.month_of_year.or(existing.month_of_year),
        end_date: clearable(&req.end_date, &existing.end_date),
        end_count: req.end_count.or(existing.end_count),
        created_at: existing.created_at.clone(),
        updated_at: now.to_string(),
    }
}

pub(crate) async fn fetch_pattern(
    db: &DbPool,
    id: &str,
) -> Result<Option<RecurrencePattern>, sqlx::Error> {
    sqlx::query_as::<_, RecurrencePattern>("SELECT * FROM recurrence_patterns WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub(crate) async fn insert_pattern(db: &DbPool, p: &RecurrencePattern) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO recurrence_patterns (
            id, frequency, interval, days_of_week, day_of_month, month_of_year,
            end_date, end_count, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&p.id)
    .bind(p.frequency)
    .bind(p.interval)
    .bind(&p.days_of_week)
    .bind(p.day_of_month)
    .bind(p.month_of_year)
    .bind(&p.end_date)
    .bind(p.end_count)
    .bind(&p.created_at)
    .bind(&p.updated_at)
    .execute(db)
    .await?;
    Ok(())
}

async fn store_pattern(db: &DbPool, p: &RecurrencePattern) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE recurrence_patterns SET
            frequency = ?, interval = ?, days_of_week = ?, day_of_month = ?,
            month_of_year = ?, end_date = ?, end_count = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(p.frequency)
    .bind(p.interval)
    .bind(&p.days_of_week)
    .bind(p.day_of_month)
    .bind(p.month_of_year)
    .bind(&p.end_date)
    .bind(p.end_count)
    .bind(&p.updated_at)
    .bind(&p.id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

/// Insert one pending reminder per occurrence of `pattern`, copied from
/// `template`. Occurrences run from the template's due date (today when it
/// has none) to [`HORIZON_DAYS`] past `today`; `skip` leaves out a date
/// already covered by an existing reminder.
pub(crate) async fn generate_instances(
    db: &DbPool,
    pattern: &RecurrencePattern,
    template: &Reminder,
    skip: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<Vec<Reminder>, sqlx::Error> {
    let start = template
        .due_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .unwrap_or(today);
    let horizon_end = today
        .checked_add_days(Days::new(HORIZON_DAYS))
        .unwrap_or(NaiveDate::MAX);

    let now = now_rfc3339();
    let mut generated = Vec::new();

    for date in pattern.occurrences(start, horizon_end) {
        if Some(date) == skip {
            continue;
        }

        let mut instance = template.clone();
        instance.id = uuid::Uuid::new_v4().to_string();
        instance.due_date = Some(date.format("%Y-%m-%d").to_string());
        instance.recurrence_id = Some(pattern.id.clone());
        instance.status = Status::Pending;
        instance.completed_at = None;
        instance.created_at = now.clone();
        instance.updated_at = now.clone();
        instance.synced_at = None;

        insert_reminder(db, &instance).await?;
        generated.push(instance);
    }

    Ok(generated)
}

/// Create a reminder that carries an embedded pattern: the pattern is stored,
/// the reminder links to it, and its later occurrences are generated.
pub(crate) async fn create_recurring_reminder(
    db: &DbPool,
    mut reminder: Reminder,
    pattern_req: CreateRecurrenceRequest,
) -> Result<Reminder, ApiError> {
    let now = now_rfc3339();
    let pattern = pattern_from_create(uuid::Uuid::new_v4().to_string(), pattern_req, &now);
    insert_pattern(db, &pattern).await?;

    reminder.recurrence_id = Some(pattern.id.clone());
    insert_reminder(db, &reminder).await?;

    let today = Utc::now().date_naive();
    let base_date = reminder
        .due_date
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        .unwrap_or(today);
    let instances = generate_instances(db, &pattern, &reminder, Some(base_date), today).await?;

    info!(
        reminder_id = %reminder.id,
        pattern_id = %pattern.id,
        frequency = %pattern.frequency,
        instances = instances.len(),
        "Recurring reminder created"
    );

    Ok(reminder)
}

/// POST /api/recurrence
pub async fn create_pattern(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CreateRecurrenceRequest>,
) -> Result<(StatusCode, Json<RecurrencePattern>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    check_pattern(&mut errors, "", &req);
    errors.finish()?;

    let pattern = pattern_from_create(uuid::Uuid::new_v4().to_string(), req, &now_rfc3339());
    insert_pattern(&state.db, &pattern).await?;

    info!(pattern_id = %pattern.id, frequency = %pattern.frequency, "Recurrence pattern created");

    Ok((StatusCode::CREATED, Json(pattern)))
}

/// GET /api/recurrence/:id
pub async fn get_pattern(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RecurrencePattern>, ApiError> {
    validate_id(&id).map_err(|e| ApiError::validation_field("id", e))?;

    let pattern = fetch_pattern(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recurrence pattern not found"))?;

    Ok(Json(pattern))
}

/// PATCH /api/recurrence/:id
///
/// Existing instances are left as they are.
pub async fn update_pattern(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateRecurrenceRequest>,
) -> Result<Json<RecurrencePattern>, ApiError> {
    validate_id(&id).map_err(|e| ApiError::validation_field("id", e))?;
    validate_update(&req)?;

    let existing = fetch_pattern(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recurrence pattern not found"))?;

    let updated = apply_update(&existing, &req, &now_rfc3339());
    if store_pattern(&state.db, &updated).await? == 0 {
        return Err(ApiError::not_found("Recurrence pattern not found"));
    }

    info!(pattern_id = %id, "Recurrence pattern updated");

    Ok(Json(updated))
}

/// DELETE /api/recurrence/:id
///
/// Reminders linked to the pattern are kept and unlinked.
pub async fn delete_pattern(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    validate_id(&id).map_err(|e| ApiError::validation_field("id", e))?;

    let unlinked = sqlx::query(
        "UPDATE reminders SET recurrence_id = NULL, updated_at = ? WHERE recurrence_id = ?",
    )
    .bind(now_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?
    .rows_affected();

    let deleted = sqlx::query("DELETE FROM recurrence_patterns WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(ApiError::not_found("Recurrence pattern not found"));
    }

    info!(pattern_id = %id, unlinked, "Recurrence pattern deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Generate instances of a stored pattern from a reminder template
///
/// POST /api/recurrence/:id/instances
pub async fn create_instances(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<CreateReminderRequest>,
) -> Result<(StatusCode, Json<GeneratedInstances>), ApiError> {
    validate_id(&id).map_err(|e| ApiError::validation_field("id", e))?;
    validate_create_request(&req)?;
    if req.recurrence_pattern.is_some() {
        return Err(ApiError::validation_field(
            "recurrence_pattern",
            "A template cannot carry its own pattern",
        ));
    }

    let pattern = fetch_pattern(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recurrence pattern not found"))?;

    let now = now_rfc3339();
    let template = reminder_from_create(String::new(), req, &now);
    let today = Utc::now().date_naive();
    let data = generate_instances(&state.db, &pattern, &template, None, today).await?;

    info!(pattern_id = %id, count = data.len(), "Recurrence instances generated");

    Ok((
        StatusCode::CREATED,
        Json(GeneratedInstances {
            pattern_id: pattern.id,
            count: data.len(),
            data,
        }),
    ))
}
