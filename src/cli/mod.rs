//! Command-line front end.
//!
//! Without a subcommand (or with `serve`) the binary runs the HTTP service.
//! Every other subcommand drives the client library against a running
//! server:
//! - `status` - Show server health and version
//! - `reminders list|show|add|complete|delete|nearby` - Manage reminders
//! - `config show|use-cloud|use-local|set-token|reset|check` - Client configuration
//! - `sync push` - Replay the locally queued changes

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::client::config::{
    clear_config, ApiOverride, BuiltinDefaults, DefaultsSource, HttpDefaults,
};
use crate::client::notify::ConsoleNotifier;
use crate::client::queue::StoredSyncQueue;
use crate::client::{
    save_config, ApiClient, ClientConfig, ConfigOverride, FileStore, HttpTransport, LocalStorage,
    RetryPolicy, SyncQueue,
};
use crate::db::{
    CreateRecurrenceRequest, CreateReminderRequest, Frequency, Priority, RecurrencePattern,
    Reminder, Status,
};

/// Settings key holding the `last_sync` stamp returned by the server
const LAST_SYNC_SETTING: &str = "last_sync";

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "reminders")]
#[command(author, version, about = "Personal reminders service and client", long_about = None)]
pub struct Cli {
    /// Path to the server configuration file
    #[arg(short, long, default_value = "reminders.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// API endpoint for this invocation (overrides the stored configuration)
    #[arg(long, env = "REMINDERS_API_URL")]
    pub api_url: Option<String>,

    /// Bearer token for this invocation (overrides the stored configuration)
    #[arg(long, env = "REMINDERS_TOKEN")]
    pub token: Option<String>,

    /// Directory holding the client's local state
    #[arg(long, default_value = "./.reminders")]
    pub store_dir: PathBuf,

    /// Base URL publishing `config.json` defaults
    #[arg(long, env = "REMINDERS_DEFAULTS_URL")]
    pub defaults_url: Option<String>,

    /// Identifies this device when syncing
    #[arg(long, default_value = "cli")]
    pub client_id: String,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Whether this invocation runs the HTTP service
    pub fn is_serve(&self) -> bool {
        matches!(self.command, None | Some(Commands::Serve))
    }
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP service
    Serve,

    /// Show server status (health, version, database)
    Status,

    /// Reminder management commands
    #[command(subcommand)]
    Reminders(ReminderCommands),

    /// Client configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Sync commands
    #[command(subcommand)]
    Sync(SyncCommands),
}

/// Reminders subcommands
#[derive(Subcommand, Debug)]
pub enum ReminderCommands {
    /// List reminders
    List {
        #[arg(long)]
        status: Option<Status>,
        #[arg(long)]
        priority: Option<Priority>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        /// Show the locally cached list instead of asking the server
        #[arg(long)]
        offline: bool,
    },
    /// Show one reminder
    Show { id: String },
    /// Create a reminder
    Add {
        text: String,
        /// YYYY-MM-DD
        #[arg(long)]
        due_date: Option<String>,
        /// HH:MM or HH:MM:SS
        #[arg(long)]
        due_time: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        location_name: Option<String>,
        #[arg(long, requires = "lng", allow_hyphen_values = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lng: Option<f64>,
        /// Geofence radius in metres
        #[arg(long)]
        radius: Option<i64>,
        /// Repeat daily, weekly, monthly or yearly
        #[arg(long)]
        repeat: Option<Frequency>,
        /// Repeat every N periods
        #[arg(long, requires = "repeat", default_value = "1")]
        every: i64,
        /// Weekdays for weekly repeats, 0 = Monday (e.g. 0,2,4)
        #[arg(long, requires = "repeat")]
        on_days: Option<String>,
        /// Stop after this many occurrences
        #[arg(long, requires = "repeat")]
        times: Option<i64>,
        /// Last date an occurrence may fall on (YYYY-MM-DD)
        #[arg(long, requires = "repeat")]
        until: Option<String>,
    },
    /// Mark a reminder completed
    Complete { id: String },
    /// Delete a reminder
    Delete { id: String },
    /// Reminders close to a point, nearest first
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Search radius in metres
        #[arg(long, default_value = "1000")]
        radius: f64,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective client configuration
    Show,
    /// Send requests to the cloud endpoint
    UseCloud,
    /// Send requests to the local endpoint
    UseLocal,
    /// Store the bearer token
    SetToken { token: String },
    /// Forget the stored override (and with --all, every cached item)
    Reset {
        #[arg(long)]
        all: bool,
    },
    /// Validate the server configuration file
    Check,
}

/// Sync subcommands
#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Push queued local changes and report what the server has newer
    Push,
    /// Show queued local changes
    Pending,
}

type CliClient = ApiClient<FileStore>;

/// Build the API client over the on-disk store and apply per-invocation flags
async fn create_client(cli: &Cli) -> Result<CliClient> {
    let store = FileStore::new(&cli.store_dir)
        .with_context(|| format!("Failed to open local store at {}", cli.store_dir.display()))?;
    let storage = Arc::new(LocalStorage::new(store));

    let defaults: Arc<dyn DefaultsSource> = match &cli.defaults_url {
        Some(url) => Arc::new(HttpDefaults::new(url)?),
        None => Arc::new(BuiltinDefaults),
    };
    let transport = Arc::new(HttpTransport::new(RetryPolicy::default())?);
    let queue = Arc::new(StoredSyncQueue::new(storage.clone()));

    let client = ApiClient::new(
        storage,
        defaults,
        transport,
        Arc::new(ConsoleNotifier),
        queue,
    );
    client.init_with(invocation_override(cli)).await;
    Ok(client)
}

/// `--api-url` replaces whichever endpoint is active; `--token` the token
fn invocation_override(cli: &Cli) -> ConfigOverride {
    if cli.api_url.is_none() && cli.token.is_none() {
        return ConfigOverride::default();
    }

    ConfigOverride {
        api: Some(ApiOverride {
            local_endpoint: cli.api_url.clone(),
            use_cloud: cli.api_url.as_ref().map(|_| false),
            token: cli.token.clone(),
            ..Default::default()
        }),
        sync: None,
    }
}

/// Run a client subcommand
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Status) => cmd_status(cli).await,
        Some(Commands::Reminders(cmd)) => cmd_reminders(cli, cmd).await,
        Some(Commands::Config(cmd)) => cmd_config(cli, cmd).await,
        Some(Commands::Sync(SyncCommands::Push)) => cmd_sync_push(cli).await,
        Some(Commands::Sync(SyncCommands::Pending)) => cmd_sync_pending(cli).await,
        None | Some(Commands::Serve) => {
            // Handled in main.rs
            Ok(())
        }
    }
}

/// Display server status
async fn cmd_status(cli: &Cli) -> Result<()> {
    let client = create_client(cli).await?;
    println!("Connecting to {}...", client.endpoint());

    let health = client
        .health_check()
        .await
        .context("Failed to connect to server. Is the reminders service running?")?;

    let healthy = health.status == "ok";
    println!();
    println!("=== Reminders Server Status ===");
    println!();
    println!("Version:    v{}", health.version);
    println!(
        "Status:     {} {}",
        if healthy { "[OK]" } else { "[!!]" },
        if healthy { "Healthy" } else { "Unhealthy" }
    );
    println!("Checked:    {}", health.timestamp);
    println!();
    println!("Components:");
    print_component("Database", health.database == "connected");

    let pending = client.queue().pending().map(|p| p.len()).unwrap_or(0);
    if pending > 0 {
        println!();
        println!("{} local change(s) waiting to sync.", pending);
    }

    println!();
    Ok(())
}

fn print_component(name: &str, healthy: bool) {
    let icon = if healthy { "[OK]" } else { "[!!]" };
    let status = if healthy { "OK" } else { "FAILED" };
    println!("  {} {:18} {}", icon, name, status);
}

async fn cmd_reminders(cli: &Cli, cmd: &ReminderCommands) -> Result<()> {
    let client = create_client(cli).await?;

    match cmd {
        ReminderCommands::List {
            status,
            priority,
            category,
            limit,
            offline,
        } => {
            if *offline {
                print_reminders(&client.storage().get_mock_data());
                return Ok(());
            }

            let status = status.map(|s| s.to_string());
            let priority = priority.map(|p| p.to_string());
            let limit = limit.map(|l| l.to_string());
            let filters = list_filters(&status, &priority, category, &limit);

            let reminders = client.get_reminders(&filters).await?;
            // The cache only mirrors unfiltered listings
            if filters.is_empty() {
                if let Err(e) = client.storage().save_mock_data(&reminders) {
                    tracing::warn!(error = %e, "Could not cache reminders locally");
                }
            }
            print_reminders(&reminders);
        }
        ReminderCommands::Show { id } => {
            let Some(reminder) = client.get_reminder(id).await? else {
                anyhow::bail!("Reminder not found: {}", id);
            };
            print_reminder_details(&reminder);

            if let Some(pattern_id) = &reminder.recurrence_id {
                match client.get_recurrence_pattern(pattern_id).await? {
                    Some(pattern) => println!("Repeats:     {}\n", describe_pattern(&pattern)),
                    None => println!("Repeats:     (pattern {} no longer exists)\n", pattern_id),
                }
            }
        }
        ReminderCommands::Add {
            text,
            due_date,
            due_time,
            priority,
            category,
            notes,
            location_name,
            lat,
            lng,
            radius,
            repeat,
            every,
            on_days,
            times,
            until,
        } => {
            let recurrence_pattern = repeat.map(|frequency| CreateRecurrenceRequest {
                interval: *every,
                days_of_week: on_days.clone(),
                end_count: *times,
                end_date: until.clone(),
                ..CreateRecurrenceRequest::new(frequency)
            });
            let payload = CreateReminderRequest {
                due_date: due_date.clone(),
                due_time: due_time.clone(),
                time_required: due_time.is_some(),
                priority: priority.unwrap_or_default(),
                category: category.clone(),
                notes: notes.clone(),
                location_name: location_name.clone(),
                location_lat: *lat,
                location_lng: *lng,
                location_radius: *radius,
                recurrence_pattern,
                ..CreateReminderRequest::new(text.clone())
            };
            let reminder = client.create_reminder(payload).await?;
            println!("Created {}", reminder.id);
        }
        ReminderCommands::Complete { id } => {
            let reminder = client.complete_reminder(id).await?;
            println!(
                "{} completed at {}",
                reminder.id,
                reminder.completed_at.as_deref().unwrap_or("-")
            );
        }
        ReminderCommands::Delete { id } => {
            client.delete_reminder(id).await?;
        }
        ReminderCommands::Nearby { lat, lng, radius } => {
            let nearby = client.get_nearby_reminders(*lat, *lng, *radius).await?;
            if nearby.is_empty() {
                println!("No reminders within {}m.", radius);
                return Ok(());
            }

            println!();
            println!("{:<36}  {:<40}  {:<20}  {:>10}", "ID", "TEXT", "PLACE", "DISTANCE");
            println!("{}", "-".repeat(112));
            for item in nearby {
                println!(
                    "{:<36}  {:<40}  {:<20}  {:>9.0}m",
                    item.reminder.id,
                    truncate(&item.reminder.text, 40),
                    truncate(item.reminder.location_name.as_deref().unwrap_or("-"), 20),
                    item.distance
                );
            }
            println!();
        }
    }

    Ok(())
}

/// Query pairs for a listing, in a fixed order, skipping unset filters
fn list_filters<'a>(
    status: &'a Option<String>,
    priority: &'a Option<String>,
    category: &'a Option<String>,
    limit: &'a Option<String>,
) -> Vec<(&'static str, &'a str)> {
    [
        ("status", status),
        ("priority", priority),
        ("category", category),
        ("limit", limit),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
    .collect()
}

fn print_reminders(reminders: &[Reminder]) {
    if reminders.is_empty() {
        println!("No reminders found.");
        return;
    }

    println!();
    println!(
        "{:<36}  {:<40}  {:<10}  {:<10}  {:<16}",
        "ID", "TEXT", "PRIORITY", "STATUS", "DUE"
    );
    println!("{}", "-".repeat(120));

    for reminder in reminders {
        println!(
            "{:<36}  {:<40}  {:<10}  {:<10}  {:<16}",
            reminder.id,
            truncate(&reminder.text, 40),
            reminder.priority,
            reminder.status,
            format_due(reminder)
        );
    }

    println!();
}

fn print_reminder_details(reminder: &Reminder) {
    println!();
    println!("=== Reminder: {} ===", truncate(&reminder.text, 60));
    println!();
    println!("ID:          {}", reminder.id);
    println!("Priority:    {}", reminder.priority);
    println!("Status:      {}", reminder.status);
    println!("Due:         {}", format_due(reminder));
    if let Some(category) = &reminder.category {
        println!("Category:    {}", category);
    }
    if let Some(notes) = &reminder.notes {
        println!("Notes:       {}", notes);
    }
    if let Some(name) = &reminder.location_name {
        println!("Location:    {}", name);
    }
    if let Some((lat, lng)) = reminder.coordinates() {
        println!(
            "Coordinates: {:.5}, {:.5} (radius {}m)",
            lat, lng, reminder.location_radius
        );
    }
    if let Some(completed_at) = &reminder.completed_at {
        println!("Completed:   {}", completed_at);
    }
    println!("Created:     {}", reminder.created_at);
    println!("Updated:     {}", reminder.updated_at);
    println!();
}

fn describe_pattern(pattern: &RecurrencePattern) -> String {
    let mut out = if pattern.interval > 1 {
        format!("every {} x {}", pattern.interval, pattern.frequency)
    } else {
        pattern.frequency.to_string()
    };
    if let Some(days) = &pattern.days_of_week {
        out.push_str(&format!(", on days {}", days));
    }
    if let Some(count) = pattern.end_count {
        out.push_str(&format!(", {} times", count));
    }
    if let Some(end) = &pattern.end_date {
        out.push_str(&format!(", until {}", end));
    }
    out
}

fn format_due(reminder: &Reminder) -> String {
    match (&reminder.due_date, &reminder.due_time) {
        (Some(date), Some(time)) => {
            let short: String = time.chars().take(5).collect();
            format!("{} {}", date, short)
        }
        (Some(date), None) => date.clone(),
        (None, Some(time)) => time.clone(),
        (None, None) => "-".to_string(),
    }
}

async fn cmd_config(cli: &Cli, cmd: &ConfigCommands) -> Result<()> {
    if let ConfigCommands::Check = cmd {
        return cmd_config_check(cli);
    }

    let client = create_client(cli).await?;
    let storage = client.storage();

    match cmd {
        ConfigCommands::Show => print_client_config(&client.config()),
        ConfigCommands::UseCloud | ConfigCommands::UseLocal | ConfigCommands::SetToken { .. } => {
            // Persist on top of what is stored, not the per-invocation flags
            let mut config = client.init().await;
            match cmd {
                ConfigCommands::UseCloud => config.api.use_cloud = true,
                ConfigCommands::UseLocal => config.api.use_cloud = false,
                ConfigCommands::SetToken { token } => config.api.token = token.clone(),
                _ => {}
            }
            config.validate()?;
            save_config(storage, &config).context("Failed to save configuration")?;
            println!("[OK] Configuration saved. Endpoint: {}", config.endpoint());
        }
        ConfigCommands::Reset { all } => {
            if *all {
                storage.clear_all().context("Failed to clear local data")?;
                client.queue().clear()?;
                println!("[OK] Local data cleared.");
            } else {
                clear_config(storage).context("Failed to reset configuration")?;
                println!("[OK] Configuration reset to defaults.");
            }
        }
        ConfigCommands::Check => {}
    }

    Ok(())
}

fn print_client_config(config: &ClientConfig) {
    println!();
    println!("=== Client Configuration ===");
    println!();
    println!("API:");
    println!("  Local:        {}", config.api.local_endpoint);
    println!("  Cloud:        {}", config.api.cloud_endpoint);
    println!(
        "  Using:        {}",
        if config.api.use_cloud { "cloud" } else { "local" }
    );
    println!("  Token:        {}", mask_token(&config.api.token));
    println!();
    println!("Sync:");
    println!(
        "  Enabled:      {}",
        if config.sync.enabled { "Yes" } else { "No" }
    );
    println!("  Interval:     {} min", config.sync.interval_minutes);
    println!();
}

fn mask_token(token: &str) -> String {
    match token.chars().count() {
        0 => "(not set)".to_string(),
        n if n <= 8 => "*".repeat(n),
        _ => {
            let skip = token.chars().count() - 4;
            let tail: String = token.chars().skip(skip).collect();
            format!("****{}", tail)
        }
    }
}

/// Validate the server configuration file
fn cmd_config_check(cli: &Cli) -> Result<()> {
    use crate::config::Config;

    let config_path = &cli.config;
    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("A default configuration will be used when starting the server.");
        println!("To customize it, copy reminders.example.toml to reminders.toml");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("=== Configuration Summary ===");
            println!();
            println!("Server:");
            println!("  Host:         {}", config.server.host);
            println!("  Port:         {}", config.server.port);
            println!("  Data Dir:     {}", config.server.data_dir.display());
            println!();
            println!("Auth:");
            println!(
                "  API Token:    {}",
                if config.auth.api_token.is_empty() {
                    "Not set (sessions only)"
                } else {
                    "Set"
                }
            );
            println!("  Session TTL:  {}h", config.auth.session_ttl_hours);
            println!("  Code TTL:     {}m", config.auth.code_ttl_minutes);
            println!();
            println!("CORS origins:");
            for origin in &config.cors.allowed_origins {
                println!("  {}", origin);
            }
            println!();
            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            anyhow::bail!("Configuration validation failed")
        }
    }
}

async fn cmd_sync_push(cli: &Cli) -> Result<()> {
    let client = create_client(cli).await?;
    let storage = client.storage();

    let mut settings = storage.get_settings();
    let last_sync = settings
        .get(LAST_SYNC_SETTING)
        .and_then(Value::as_str)
        .map(str::to_string);

    let response = client.sync_pending(&cli.client_id, last_sync).await?;

    for conflict in &response.conflicts {
        println!(
            "  conflict {}: client {} / server {} -> {:?}",
            conflict.id, conflict.client_updated_at, conflict.server_updated_at, conflict.resolution
        );
    }
    if !response.server_changes.is_empty() {
        println!(
            "{} reminder(s) changed on the server since the last sync.",
            response.server_changes.len()
        );
    }

    settings.insert(
        LAST_SYNC_SETTING.to_string(),
        Value::String(response.last_sync.clone()),
    );
    storage
        .save_settings(&settings)
        .context("Failed to remember the sync time")?;

    Ok(())
}

async fn cmd_sync_pending(cli: &Cli) -> Result<()> {
    let client = create_client(cli).await?;
    let pending = client.queue().pending()?;

    if pending.is_empty() {
        println!("Nothing to sync.");
        return Ok(());
    }

    println!();
    println!("{:<8}  {:<36}  {:<24}", "ACTION", "ID", "UPDATED");
    println!("{}", "-".repeat(72));
    for change in pending {
        println!(
            "{:<8}  {:<36}  {:<24}",
            change.action, change.id, change.updated_at
        );
    }
    println!();
    Ok(())
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_no_subcommand_serves() {
        assert!(parse(&["reminders"]).is_serve());
        assert!(parse(&["reminders", "serve"]).is_serve());
        assert!(!parse(&["reminders", "status"]).is_serve());
    }

    #[test]
    fn test_parses_list_filters() {
        let cli = parse(&[
            "reminders",
            "reminders",
            "list",
            "--status",
            "pending",
            "--priority",
            "urgent",
        ]);
        match cli.command {
            Some(Commands::Reminders(ReminderCommands::List {
                status, priority, ..
            })) => {
                assert_eq!(status, Some(Status::Pending));
                assert_eq!(priority, Some(Priority::Urgent));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_priority() {
        assert!(Cli::try_parse_from(["reminders", "reminders", "add", "x", "-p", "meh"]).is_err());
    }

    #[test]
    fn test_lat_requires_lng() {
        assert!(Cli::try_parse_from(["reminders", "reminders", "add", "x", "--lat", "1.0"]).is_err());
    }

    #[test]
    fn test_parses_repeat_options() {
        let cli = parse(&[
            "reminders", "reminders", "add", "Gym", "--repeat", "weekly", "--every", "2",
            "--on-days", "0,3", "--times", "8",
        ]);
        match cli.command {
            Some(Commands::Reminders(ReminderCommands::Add {
                repeat,
                every,
                on_days,
                times,
                until,
                ..
            })) => {
                assert_eq!(repeat, Some(Frequency::Weekly));
                assert_eq!(every, 2);
                assert_eq!(on_days.as_deref(), Some("0,3"));
                assert_eq!(times, Some(8));
                assert!(until.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["reminders", "reminders", "add", "x", "--times", "3"]).is_err());
        assert!(Cli::try_parse_from(["reminders", "reminders", "add", "x", "--repeat", "hourly"]).is_err());
    }

    #[test]
    fn test_describe_pattern() {
        let pattern = RecurrencePattern {
            id: "p1".into(),
            frequency: Frequency::Weekly,
            interval: 2,
            days_of_week: Some("0,3".into()),
            day_of_month: None,
            month_of_year: None,
            end_date: Some("2026-01-31".into()),
            end_count: None,
            created_at: "t".into(),
            updated_at: "t".into(),
        };
        assert_eq!(
            describe_pattern(&pattern),
            "every 2 x weekly, on days 0,3, until 2026-01-31"
        );
    }

    #[test]
    fn test_list_filters_skip_unset() {
        let status = Some("pending".to_string());
        let limit = Some("5".to_string());
        let unset = None;
        let filters = list_filters(&status, &unset, &unset, &limit);
        assert_eq!(filters, vec![("status", "pending"), ("limit", "5")]);
    }

    #[test]
    fn test_invocation_override() {
        let cli = parse(&["reminders", "--api-url", "http://10.0.0.2:8000/api", "status"]);
        let merged = ClientConfig::default().merge(invocation_override(&cli));
        assert_eq!(merged.endpoint(), "http://10.0.0.2:8000/api");

        let cli = parse(&["reminders", "status"]);
        assert_eq!(invocation_override(&cli), ConfigOverride::default());
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token(""), "(not set)");
        assert_eq!(mask_token("abc"), "***");
        assert_eq!(mask_token("supersecret1234"), "****1234");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a long reminder text", 10), "a long ...");
    }

    #[test]
    fn test_format_due() {
        let mut reminder = Reminder::new("r1", "x", "2025-11-03T10:00:00.000Z");
        assert_eq!(format_due(&reminder), "-");
        reminder.due_date = Some("2025-11-04".into());
        reminder.due_time = Some("09:30:00".into());
        assert_eq!(format_due(&reminder), "2025-11-04 09:30");
    }
}
