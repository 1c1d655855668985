//! Reminders API Client.
//!
//! [`ApiClient`] is an explicit session object: construct one per application
//! instance and share it. Successful mutations are queued for sync and
//! announced through the [`Notifier`]; failures are formatted, announced and
//! returned.

use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::config::{load_config, stored_override, ClientConfig, ConfigOverride, DefaultsSource};
use super::error::{format_error, ClientError};
use super::notify::Notifier;
use super::queue::SyncQueue;
use super::storage::{KeyValueStore, LocalStorage};
use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::api::system::HealthResponse;
use crate::db::{
    CreateReminderRequest, NearbyReminder, RecurrencePattern, Reminder, Status, SyncAction,
    SyncChange, SyncRequest, SyncResponse, UpdateReminderRequest,
};
use crate::utils::now_rfc3339;

lazy_static! {
    static ref SHORT_TIME_REGEX: Regex = Regex::new(r"^\d{2}:\d{2}$").unwrap();
}

/// `HH:MM` becomes `HH:MM:SS`; anything else passes through
pub fn normalize_due_time(value: Option<String>) -> Option<String> {
    value.map(|t| {
        if SHORT_TIME_REGEX.is_match(&t) {
            format!("{}:00", t)
        } else {
            t
        }
    })
}

/// Best human-readable message in an error response body
fn error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "detail", "error"] {
            if let Some(Value::String(s)) = map.get(key) {
                return s.clone();
            }
        }
    }
    body.trim().chars().take(200).collect()
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Pull the `data` array out of a list response; absent means empty
fn unwrap_data<T: DeserializeOwned>(value: Value) -> Result<Vec<T>, ClientError> {
    match value {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) => decode(data),
            None => Ok(Vec::new()),
        },
        _ => Ok(Vec::new()),
    }
}

pub struct ApiClient<S> {
    storage: Arc<LocalStorage<S>>,
    defaults: Arc<dyn DefaultsSource>,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    queue: Arc<dyn SyncQueue>,
    config: RwLock<Option<ClientConfig>>,
}

impl<S: KeyValueStore> ApiClient<S> {
    pub fn new(
        storage: Arc<LocalStorage<S>>,
        defaults: Arc<dyn DefaultsSource>,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        queue: Arc<dyn SyncQueue>,
    ) -> Self {
        Self {
            storage,
            defaults,
            transport,
            notifier,
            queue,
            config: RwLock::new(None),
        }
    }

    /// Resolve and cache the configuration. Safe to call repeatedly.
    pub async fn init(&self) -> ClientConfig {
        self.init_with(ConfigOverride::default()).await
    }

    /// Like [`init`](Self::init), with `overlay` applied on top for this
    /// session only. Nothing is persisted.
    pub async fn init_with(&self, overlay: ConfigOverride) -> ClientConfig {
        let config = load_config(self.defaults.as_ref(), &self.storage)
            .await
            .merge(overlay);
        *self.config.write() = Some(config.clone());
        config
    }

    /// Cached configuration, or built-in defaults plus the stored override
    /// when `init` has not run yet
    pub fn config(&self) -> ClientConfig {
        if let Some(config) = self.config.read().as_ref() {
            return config.clone();
        }
        ClientConfig::default().merge(stored_override(&self.storage))
    }

    pub fn endpoint(&self) -> String {
        self.config().endpoint().to_string()
    }

    pub fn storage(&self) -> &Arc<LocalStorage<S>> {
        &self.storage
    }

    pub fn queue(&self) -> &Arc<dyn SyncQueue> {
        &self.queue
    }

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<String, ClientError> {
        let endpoint = self.endpoint();
        let mut url = Url::parse(&endpoint)
            .map_err(|e| ClientError::Transport(format!("invalid endpoint {}: {}", endpoint, e)))?;

        url.path_segments_mut()
            .map_err(|_| ClientError::Transport(format!("invalid endpoint {}", endpoint)))?
            .pop_if_empty()
            .extend(segments);

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url.into())
    }

    fn request(&self, method: Method, url: String) -> HttpRequest {
        let token = self.config().api.token;
        HttpRequest::new(method, url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", token))
    }

    /// Send a request; non-success statuses become [`ClientError::Status`]
    async fn execute(&self, request: HttpRequest) -> Result<Value, ClientError> {
        debug!(method = %request.method, url = %request.url, "API request");

        let HttpResponse { status, body } = self.transport.send(request).await?;
        if !(200..300).contains(&status) {
            return Err(ClientError::Status {
                status,
                message: error_message(&body),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    fn fail<T>(&self, err: ClientError) -> Result<T, ClientError> {
        self.notifier.error(&format_error(&err));
        Err(err)
    }

    fn record(&self, id: &str, action: SyncAction, data: Option<Value>, updated_at: String) {
        let change = SyncChange {
            id: id.to_string(),
            action,
            data,
            updated_at,
        };
        if let Err(e) = self.queue.enqueue(change) {
            warn!(reminder_id = %id, action = %action, error = %e, "Failed to queue change for sync");
        }
    }

    fn record_reminder(&self, reminder: &Reminder, action: SyncAction) {
        self.record(
            &reminder.id,
            action,
            serde_json::to_value(reminder).ok(),
            reminder.updated_at.clone(),
        );
    }

    /// List reminders. `filters` are emitted in the order given.
    pub async fn get_reminders(&self, filters: &[(&str, &str)]) -> Result<Vec<Reminder>, ClientError> {
        let result: Result<Vec<Reminder>, ClientError> = async {
            let url = self.url(&["reminders"], filters)?;
            let body = self.execute(self.request(Method::GET, url)).await?;
            unwrap_data(body)
        }
        .await;

        result.or_else(|e| self.fail(e))
    }

    /// One reminder, or `None` when the server has no such id
    pub async fn get_reminder(&self, id: &str) -> Result<Option<Reminder>, ClientError> {
        let result: Result<Reminder, ClientError> = async {
            let url = self.url(&["reminders", id], &[])?;
            let body = self.execute(self.request(Method::GET, url)).await?;
            decode(body)
        }
        .await;

        match result {
            Ok(reminder) => Ok(Some(reminder)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => self.fail(e),
        }
    }

    pub async fn create_reminder(
        &self,
        mut payload: CreateReminderRequest,
    ) -> Result<Reminder, ClientError> {
        payload.due_time = normalize_due_time(payload.due_time);

        let result: Result<Reminder, ClientError> = async {
            let url = self.url(&["reminders"], &[])?;
            let body = serde_json::to_value(&payload).map_err(|e| ClientError::Decode(e.to_string()))?;
            let response = self.execute(self.request(Method::POST, url).json(body)).await?;
            decode::<Reminder>(response)
        }
        .await;

        match result {
            Ok(reminder) => {
                self.record_reminder(&reminder, SyncAction::Create);
                self.notifier.success("Reminder created");
                Ok(reminder)
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn update_reminder(
        &self,
        id: &str,
        mut payload: UpdateReminderRequest,
    ) -> Result<Reminder, ClientError> {
        payload.due_time = normalize_due_time(payload.due_time);

        match self.patch(id, &payload).await {
            Ok(reminder) => {
                self.record_reminder(&reminder, SyncAction::Update);
                self.notifier.success("Reminder updated");
                Ok(reminder)
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn complete_reminder(&self, id: &str) -> Result<Reminder, ClientError> {
        let payload = UpdateReminderRequest {
            status: Some(Status::Completed),
            completed_at: Some(now_rfc3339()),
            ..Default::default()
        };

        match self.patch(id, &payload).await {
            Ok(reminder) => {
                self.record_reminder(&reminder, SyncAction::Update);
                self.notifier.success("Reminder completed");
                Ok(reminder)
            }
            Err(e) => self.fail(e),
        }
    }

    async fn patch(&self, id: &str, payload: &UpdateReminderRequest) -> Result<Reminder, ClientError> {
        let url = self.url(&["reminders", id], &[])?;
        let body = serde_json::to_value(payload).map_err(|e| ClientError::Decode(e.to_string()))?;
        let response = self.execute(self.request(Method::PATCH, url).json(body)).await?;
        decode(response)
    }

    pub async fn delete_reminder(&self, id: &str) -> Result<(), ClientError> {
        let result: Result<Value, ClientError> = async {
            let url = self.url(&["reminders", id], &[])?;
            self.execute(self.request(Method::DELETE, url)).await
        }
        .await;

        match result {
            Ok(_) => {
                self.record(id, SyncAction::Delete, None, now_rfc3339());
                self.notifier.success("Reminder deleted");
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// Reminders within `radius` metres of a point, closest first
    pub async fn get_nearby_reminders(
        &self,
        lat: f64,
        lng: f64,
        radius: f64,
    ) -> Result<Vec<NearbyReminder>, ClientError> {
        let (lat, lng, radius) = (lat.to_string(), lng.to_string(), radius.to_string());
        let result: Result<Vec<NearbyReminder>, ClientError> = async {
            let query = [("lat", lat.as_str()), ("lng", lng.as_str()), ("radius", radius.as_str())];
            let url = self.url(&["reminders", "near-location"], &query)?;
            let body = self.execute(self.request(Method::GET, url)).await?;
            unwrap_data(body)
        }
        .await;

        result.or_else(|e| self.fail(e))
    }

    /// The pattern a recurring reminder links to, or `None` when it is gone
    pub async fn get_recurrence_pattern(
        &self,
        id: &str,
    ) -> Result<Option<RecurrencePattern>, ClientError> {
        let result: Result<RecurrencePattern, ClientError> = async {
            let url = self.url(&["recurrence", id], &[])?;
            let body = self.execute(self.request(Method::GET, url)).await?;
            decode(body)
        }
        .await;

        match result {
            Ok(pattern) => Ok(Some(pattern)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => self.fail(e),
        }
    }

    pub async fn health_check(&self) -> Result<HealthResponse, ClientError> {
        let result: Result<HealthResponse, ClientError> = async {
            let url = self.url(&["health"], &[])?;
            let body = self.execute(self.request(Method::GET, url)).await?;
            decode(body)
        }
        .await;

        result.or_else(|e| self.fail(e))
    }

    /// Replay `changes` on the server
    pub async fn push_changes(
        &self,
        client_id: &str,
        changes: Vec<SyncChange>,
        last_sync: Option<String>,
    ) -> Result<SyncResponse, ClientError> {
        let request = SyncRequest {
            client_id: client_id.to_string(),
            last_sync,
            changes,
        };

        let result: Result<SyncResponse, ClientError> = async {
            let url = self.url(&["sync"], &[])?;
            let body = serde_json::to_value(&request).map_err(|e| ClientError::Decode(e.to_string()))?;
            let response = self.execute(self.request(Method::POST, url).json(body)).await?;
            decode::<SyncResponse>(response)
        }
        .await;

        match result {
            Ok(response) => {
                self.notifier.success(&format!(
                    "Synced {} change(s), {} conflict(s)",
                    response.applied_count,
                    response.conflicts.len()
                ));
                Ok(response)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Push everything in the sync queue and empty it on success
    pub async fn sync_pending(
        &self,
        client_id: &str,
        last_sync: Option<String>,
    ) -> Result<SyncResponse, ClientError> {
        let pending = match self.queue.pending() {
            Ok(pending) => pending,
            Err(e) => return self.fail(e.into()),
        };

        let response = self.push_changes(client_id, pending, last_sync).await?;
        if let Err(e) = self.queue.clear() {
            warn!(error = %e, "Failed to clear the sync queue after pushing");
        }
        Ok(response)
    }
}
