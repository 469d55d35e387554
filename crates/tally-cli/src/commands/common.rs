use std::env;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tally_core::context::Coordinator;
use tally_core::models::MutationKind;
use tally_core::queue::DrainReport;
use tally_core::{Collection, LoadResult, QueueItem, TallyContext};

use crate::auth::FileSessionStore;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub db_path: Option<PathBuf>,
    pub profile: Option<String>,
    pub offline: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueListItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MutationKind,
    pub collection: Collection,
    #[serde(rename = "id2")]
    pub target_id: String,
    pub queued_at: i64,
    pub queued_at_iso: String,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("TALLY_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("tally").join("tally.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

/// Resolve the active profile's settings and open the application context.
pub async fn open_context(
    options: &GlobalOptions,
) -> Result<(String, TallyContext<FileSessionStore>), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(options.profile.as_deref());
    let client_config = config
        .resolve_client_config(&profile_name)
        .map_err(CliError::Config)?;
    let sessions = FileSessionStore::for_profile(&profile_name).map_err(CliError::Config)?;
    tracing::debug!(
        "Using profile '{profile_name}' (session file {})",
        sessions.path().display()
    );
    let db_path = resolve_db_path(options.db_path.clone())?;

    let context = open_context_at(client_config, &db_path, sessions, options.offline).await?;
    Ok((profile_name, context))
}

pub async fn open_context_at(
    config: tally_core::config::ClientConfig,
    db_path: &Path,
    sessions: FileSessionStore,
    offline: bool,
) -> Result<TallyContext<FileSessionStore>, CliError> {
    let context = TallyContext::open(config, db_path, sessions).await?;
    context.connectivity().set_online(!offline);
    tracing::debug!("Opened local store at {}", db_path.display());
    Ok(context)
}

/// Signed-in user id and a coordinator acting for them.
pub async fn signed_in(
    context: &TallyContext<FileSessionStore>,
) -> Result<(String, Coordinator), CliError> {
    match context.signed_in().await {
        Ok((session, coordinator)) => Ok((session.user.uid, coordinator)),
        Err(tally_core::Error::NotSignedIn) => Err(CliError::NotSignedIn),
        Err(error) => Err(error.into()),
    }
}

/// Parse `--data` into a JSON object.
pub fn parse_data(raw: Option<&str>) -> Result<Option<Map<String, Value>>, CliError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(other) => Err(CliError::InvalidData(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
        Err(error) => Err(CliError::InvalidData(error.to_string())),
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

pub fn queue_item_to_list_item(item: &QueueItem) -> QueueListItem {
    QueueListItem {
        id: item.id.clone(),
        kind: item.mutation.kind,
        collection: item.mutation.collection,
        target_id: item.mutation.target_id.clone(),
        queued_at: item.queued_at,
        queued_at_iso: format_timestamp(item.queued_at),
    }
}

pub fn format_queue_lines(items: &[QueueItem], now_ms: i64) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            format!(
                "{}  {:<6}  {}/{}  ({})",
                format_timestamp(item.queued_at),
                item.mutation.kind,
                item.mutation.collection,
                item.mutation.target_id,
                format_relative_time(item.queued_at, now_ms)
            )
        })
        .collect()
}

pub fn format_load_summary(result: &LoadResult) -> Vec<String> {
    let mut lines = vec![format!(
        "Loaded {} records from {}",
        result.data.len(),
        result.source
    )];
    if let Some(reason) = &result.fallback {
        lines.push(format!("  fallback: {reason}"));
    }
    for collection in Collection::ALL {
        lines.push(format!(
            "  {:<15} {}",
            collection.as_str(),
            result.data.records(collection).len()
        ));
    }
    lines
}

pub fn format_drain_report(report: &DrainReport) -> String {
    if report.skipped_offline {
        return format!("Offline: {} writes still queued", report.remaining);
    }
    match &report.halted {
        Some(halt) => format!(
            "Replayed {} writes; stopped at {} ({}, {}); {} still queued",
            report.replayed,
            halt.item_id,
            halt.error,
            if halt.permanent { "rejected" } else { "will retry" },
            report.remaining
        ),
        None if report.replayed == 0 => "Nothing to sync".to_string(),
        None => format!("Replayed {} writes", report.replayed),
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format!("{}w ago", diff / week)
    }
}

/// Show only the last four characters of a secret.
pub fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = value.chars().skip(count - 4).collect();
    format!("{}{tail}", "*".repeat(count - 4))
}
