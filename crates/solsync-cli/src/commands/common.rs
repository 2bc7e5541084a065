use std::env;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use serde::Serialize;
use solsync_core::config::{SolsyncConfig, CONFIG_FILE_NAME};
use solsync_core::queue::StorageQueue;
use solsync_core::remote::GitHubClient;
use solsync_core::store::LibSqlStore;
use solsync_core::submissions::SubmissionRepository;
use solsync_core::{Submission, SubmissionId, SubmissionStatus};

use crate::auth::DeviceAuthService;
use crate::error::CliError;

const APP_DIR: &str = "solsync";

#[derive(Debug, Serialize)]
pub struct SubmissionListItem {
    pub id: String,
    pub problem: String,
    pub title: String,
    pub language: String,
    pub status: SubmissionStatus,
    pub added_at: i64,
    pub relative_time: String,
    pub sync_attempts: u32,
    pub remote_path: Option<String>,
    pub last_error: Option<String>,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("SOLSYNC_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join("solsync.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_config_path {
        return Ok(path);
    }
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve config directory".to_string()))
}

/// File config with `SOLSYNC_*` environment overrides applied.
pub fn load_config(path: &Path) -> Result<SolsyncConfig, CliError> {
    let mut config = SolsyncConfig::load_from_path(path)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

pub async fn open_repository(
    db_path: &Path,
    config: &SolsyncConfig,
) -> Result<SubmissionRepository, CliError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = LibSqlStore::open(db_path).await?;
    Ok(SubmissionRepository::new(StorageQueue::spawn(
        store,
        config.queue_options(),
    )))
}

/// GitHub client for the configured target, authorized with the stored token.
pub fn github_client(config: &SolsyncConfig) -> Result<GitHubClient, CliError> {
    let target = config.repo_target()?;
    let token = auth_service(config)?
        .stored_token()
        .map_err(|error| CliError::Auth(error.to_string()))?
        .ok_or(CliError::NotSignedIn)?;

    Ok(
        GitHubClient::new(&config.github.api_base_url, token.access_token, target)?
            .with_timeout(config.request_timeout()),
    )
}

pub fn auth_service(config: &SolsyncConfig) -> Result<DeviceAuthService, CliError> {
    DeviceAuthService::new(config.device_flow()?).map_err(|error| CliError::Auth(error.to_string()))
}

/// Find a submission by full id or unique id prefix.
pub fn resolve_submission<'a>(
    submissions: &'a [Submission],
    query: &str,
) -> Result<&'a Submission, CliError> {
    let query = normalize_submission_identifier(query)?;
    if let Ok(id) = query.parse::<SubmissionId>() {
        if let Some(found) = submissions.iter().find(|submission| submission.id == id) {
            return Ok(found);
        }
    }

    let matches: Vec<&Submission> = submissions
        .iter()
        .filter(|submission| submission.id.to_string().starts_with(&query))
        .collect();
    match matches.as_slice() {
        [] => Err(CliError::SubmissionNotFound(query)),
        [single] => Ok(single),
        many => Err(CliError::AmbiguousSubmissionId(format!(
            "Submission ID prefix '{query}' is ambiguous ({} matches). Use a longer prefix.",
            many.len()
        ))),
    }
}

pub fn normalize_submission_identifier(id: &str) -> Result<String, CliError> {
    let normalized = id.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return Err(CliError::EmptySubmissionId);
    }
    Ok(normalized)
}

pub fn submission_to_list_item(submission: &Submission, now_ms: i64) -> SubmissionListItem {
    SubmissionListItem {
        id: submission.id.to_string(),
        problem: submission.problem.to_string(),
        title: submission.metadata.title.clone(),
        language: submission.language.to_string(),
        status: submission.status(),
        added_at: submission.added_at,
        relative_time: format_relative_time(submission.added_at, now_ms),
        sync_attempts: submission.sync_attempts,
        remote_path: submission.remote_path.clone(),
        last_error: submission
            .last_error
            .as_ref()
            .map(|failure| format!("{}: {}", failure.kind, failure.message)),
    }
}

pub fn format_submission_lines(submissions: &[Submission], now_ms: i64) -> Vec<String> {
    submissions
        .iter()
        .map(|submission| {
            let id = submission.id.to_string();
            let short_id = id.get(..8).unwrap_or(&id);
            let mut line = format!(
                "{short_id}  {:<8} {} [{}] ({})",
                submission.status().to_string(),
                submission.problem,
                submission.language,
                format_relative_time(submission.added_at, now_ms)
            );
            if let Some(path) = &submission.remote_path {
                line.push_str(&format!(" -> {path}"));
            }
            if let (SubmissionStatus::Failed, Some(failure)) =
                (submission.status(), &submission.last_error)
            {
                line.push_str(&format!(" ! {}", failure.message));
            }
            line
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map_or_else(|| timestamp_ms.to_string(), |time| time.to_rfc3339())
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}
