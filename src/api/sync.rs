//! Queue-and-replay sync.
//!
//! Clients push the changes they queued while working locally. Each change is
//! replayed in order with last-write-wins on `updated_at`; a row that was also
//! modified on the server since the client's `last_sync` is reported as a
//! conflict together with the side that won. Ties go to the client.

use axum::{extract::State, Json};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::{
    ConflictInfo, ConflictResolution, CreateReminderRequest, Reminder, SyncAction, SyncChange,
    SyncRequest, SyncResponse, UpdateReminderRequest,
};
use crate::utils::now_rfc3339;
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use super::reminders::{
    apply_update, delete_by_id, fetch_reminder, insert_reminder, reminder_from_create,
    store_reminder, validate_create_request, validate_update_request,
};
use super::validation::validate_id;

/// A change that passed validation, with its payload decoded
enum Replay {
    Upsert {
        create: CreateReminderRequest,
        update: UpdateReminderRequest,
    },
    Delete,
}

struct PreparedChange {
    id: String,
    updated_at: String,
    raw_updated_at: String,
    replay: Replay,
}

/// Parse any RFC 3339 timestamp and re-emit it in the stored UTC form so
/// string comparison matches chronological order
fn normalize_timestamp(value: &str) -> Option<String> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn prepare(index: usize, change: SyncChange) -> Result<PreparedChange, ApiError> {
    let field = |name: &str| format!("changes[{}].{}", index, name);

    validate_id(&change.id).map_err(|e| ApiError::validation_field(&field("id"), e))?;
    let updated_at = normalize_timestamp(&change.updated_at).ok_or_else(|| {
        ApiError::validation_field(&field("updated_at"), "Must be an ISO 8601 timestamp")
    })?;

    let replay = match change.action {
        SyncAction::Delete => Replay::Delete,
        SyncAction::Create | SyncAction::Update => {
            let data = change.data.ok_or_else(|| {
                ApiError::validation_field(&field("data"), "Data is required for this action")
            })?;

            let update: UpdateReminderRequest = serde_json::from_value(data.clone())
                .map_err(|e| ApiError::validation_field(&field("data"), e.to_string()))?;
            validate_update_request(&update)?;

            // Text may be absent on updates; creates only fall back to it when
            // the row turns out to be missing
            let mut create_data = data;
            if create_data.get("text").is_none() {
                if let Some(obj) = create_data.as_object_mut() {
                    obj.insert("text".to_string(), serde_json::Value::String(String::new()));
                }
            }
            let create: CreateReminderRequest = serde_json::from_value(create_data)
                .map_err(|e| ApiError::validation_field(&field("data"), e.to_string()))?;

            if change.action == SyncAction::Create {
                validate_create_request(&create)?;
            }

            Replay::Upsert { create, update }
        }
    };

    Ok(PreparedChange {
        id: change.id,
        updated_at,
        raw_updated_at: change.updated_at,
        replay,
    })
}

fn to_server_change(reminder: Reminder, last_sync: Option<&str>) -> SyncChange {
    let created_since = last_sync.map_or(true, |ls| reminder.created_at.as_str() > ls);
    let action = if created_since {
        SyncAction::Create
    } else {
        SyncAction::Update
    };

    SyncChange {
        id: reminder.id.clone(),
        action,
        updated_at: reminder.updated_at.clone(),
        data: serde_json::to_value(&reminder).ok(),
    }
}

/// Replay queued client changes and return what changed on the server
///
/// POST /api/sync
pub async fn sync(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SyncRequest>,
) -> Result<Json<SyncResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if req.client_id.trim().is_empty() {
        errors.add("client_id", "Client ID is required");
    }
    let last_sync = match req.last_sync.as_deref() {
        None | Some("") => None,
        Some(ts) => {
            let normalized = normalize_timestamp(ts);
            if normalized.is_none() {
                errors.add("last_sync", "Must be an ISO 8601 timestamp");
            }
            normalized
        }
    };
    errors.finish()?;

    // Validate the whole batch before touching the store
    let prepared = req
        .changes
        .into_iter()
        .enumerate()
        .map(|(i, change)| prepare(i, change))
        .collect::<Result<Vec<_>, _>>()?;

    let now = now_rfc3339();
    let mut conflicts = Vec::new();
    let mut pushed: HashSet<String> = HashSet::new();
    let mut applied_count = 0;

    for change in prepared {
        let existing = fetch_reminder(&state.db, &change.id).await?;

        if let Some(ref server) = existing {
            let changed_on_server = !pushed.contains(&change.id)
                && last_sync
                    .as_deref()
                    .map_or(true, |ls| server.updated_at.as_str() > ls);

            if changed_on_server {
                let server_wins = server.updated_at > change.updated_at;
                conflicts.push(ConflictInfo {
                    id: change.id.clone(),
                    client_updated_at: change.raw_updated_at.clone(),
                    server_updated_at: server.updated_at.clone(),
                    resolution: if server_wins {
                        ConflictResolution::ServerWins
                    } else {
                        ConflictResolution::ClientWins
                    },
                });
                if server_wins {
                    debug!(reminder_id = %change.id, "Sync change superseded by server");
                    pushed.insert(change.id);
                    continue;
                }
            }
        }

        match (change.replay, existing) {
            (Replay::Delete, _) => {
                delete_by_id(&state.db, &change.id).await?;
            }
            (Replay::Upsert { update, .. }, Some(server)) => {
                let mut updated = apply_update(&server, &update, &change.updated_at);
                updated.synced_at = Some(now.clone());
                store_reminder(&state.db, &updated).await?;
            }
            (Replay::Upsert { create, .. }, None) => {
                let mut reminder = reminder_from_create(change.id.clone(), create, &change.updated_at);
                if reminder.text.trim().is_empty() {
                    return Err(ApiError::validation_field(
                        "text",
                        format!("Reminder {} does not exist and the change has no text", change.id),
                    ));
                }
                reminder.synced_at = Some(now.clone());
                insert_reminder(&state.db, &reminder).await?;
            }
        }

        applied_count += 1;
        pushed.insert(change.id);
    }

    let changed = sqlx::query_as::<_, Reminder>(
        "SELECT * FROM reminders WHERE (? IS NULL OR updated_at > ?) ORDER BY updated_at ASC",
    )
    .bind(&last_sync)
    .bind(&last_sync)
    .fetch_all(&state.db)
    .await?;

    let server_changes: Vec<SyncChange> = changed
        .into_iter()
        .filter(|r| !pushed.contains(&r.id))
        .map(|r| to_server_change(r, last_sync.as_deref()))
        .collect();

    info!(
        client_id = %req.client_id,
        applied = applied_count,
        conflicts = conflicts.len(),
        server_changes = server_changes.len(),
        "Sync completed"
    );

    Ok(Json(SyncResponse {
        server_changes,
        conflicts,
        last_sync: now,
        applied_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_timestamp() {
        assert_eq!(
            normalize_timestamp("2025-11-03T10:00:00+00:00").as_deref(),
            Some("2025-11-03T10:00:00.000Z")
        );
        assert_eq!(
            normalize_timestamp("2025-11-03T12:00:00.5+02:00").as_deref(),
            Some("2025-11-03T10:00:00.500Z")
        );
        assert!(normalize_timestamp("last tuesday").is_none());
    }

    #[test]
    fn test_prepare_requires_data_for_updates() {
        let change = SyncChange {
            id: "r1".to_string(),
            action: SyncAction::Update,
            data: None,
            updated_at: "2025-11-03T10:00:00Z".to_string(),
        };
        let err = prepare(0, change).err().unwrap();
        assert!(err.message().contains("Data is required"));
    }

    #[test]
    fn test_prepare_accepts_partial_update_payload() {
        let change = SyncChange {
            id: "r1".to_string(),
            action: SyncAction::Update,
            data: Some(json!({"priority": "urgent"})),
            updated_at: "2025-11-03T10:00:00Z".to_string(),
        };
        let prepared = prepare(0, change).unwrap();
        assert_eq!(prepared.updated_at, "2025-11-03T10:00:00.000Z");
        match prepared.replay {
            Replay::Upsert { update, .. } => assert!(update.text.is_none()),
            Replay::Delete => panic!("expected upsert"),
        }
    }

    #[test]
    fn test_prepare_rejects_create_without_text() {
        let change = SyncChange {
            id: "r1".to_string(),
            action: SyncAction::Create,
            data: Some(json!({"priority": "urgent"})),
            updated_at: "2025-11-03T10:00:00Z".to_string(),
        };
        assert!(prepare(0, change).is_err());
    }

    #[test]
    fn test_server_change_action_depends_on_creation_time() {
        let reminder = Reminder::new("r1", "x", "2025-11-01T00:00:00.000Z");
        let change = to_server_change(reminder.clone(), Some("2025-10-01T00:00:00.000Z"));
        assert_eq!(change.action, SyncAction::Create);

        let change = to_server_change(reminder, Some("2025-11-02T00:00:00.000Z"));
        assert_eq!(change.action, SyncAction::Update);
        assert_eq!(change.data.unwrap()["id"], "r1");
    }
}
