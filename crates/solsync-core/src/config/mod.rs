//! User configuration for the capture and sync pipeline.
//!
//! Stored as pretty JSON. Durations are whole milliseconds so the file stays
//! hand-editable. Credentials never live here.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::{DeviceFlowConfig, DEFAULT_ACCESS_TOKEN_URL, DEFAULT_DEVICE_CODE_URL, DEFAULT_SCOPE};
use crate::capture::{CaptureEngine, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::error::{Error, Result};
use crate::language::{normalize_language, Language};
use crate::queue::{
    QueueOptions, QuotaPolicy, DEFAULT_CLEANUP_RATIO, DEFAULT_OPERATION_TIMEOUT,
    DEFAULT_QUOTA_BYTES, DEFAULT_SYNCED_RETENTION,
};
use crate::remote::{RepoTarget, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::sync::{
    RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT_CAP, DEFAULT_RATE_LIMIT_DELAY,
    DEFAULT_RETRY_BACKOFF, DEFAULT_RETRY_DELAY as DEFAULT_SYNC_RETRY_DELAY,
    DEFAULT_SYNC_PASS_BUDGET,
};
use crate::util::{is_http_url, normalize_text_option};

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_BRANCH: &str = "main";

/// Environment variables that override file values.
pub const ENV_GITHUB_OWNER: &str = "SOLSYNC_GITHUB_OWNER";
pub const ENV_GITHUB_REPO: &str = "SOLSYNC_GITHUB_REPO";
pub const ENV_GITHUB_BRANCH: &str = "SOLSYNC_GITHUB_BRANCH";
pub const ENV_GITHUB_CLIENT_ID: &str = "SOLSYNC_GITHUB_CLIENT_ID";
pub const ENV_API_BASE_URL: &str = "SOLSYNC_API_BASE_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SolsyncConfig {
    pub github: GitHubConfig,
    pub storage: StorageConfig,
    pub capture: CaptureConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitHubConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: String,
    pub api_base_url: String,
    /// OAuth app client id used by the device flow
    pub client_id: Option<String>,
    pub scope: String,
    pub device_code_url: String,
    pub access_token_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            branch: DEFAULT_BRANCH.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            client_id: None,
            scope: DEFAULT_SCOPE.to_string(),
            device_code_url: DEFAULT_DEVICE_CODE_URL.to_string(),
            access_token_url: DEFAULT_ACCESS_TOKEN_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub quota_bytes: usize,
    pub synced_retention: usize,
    pub cleanup_ratio: f64,
    pub operation_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            quota_bytes: DEFAULT_QUOTA_BYTES,
            synced_retention: DEFAULT_SYNCED_RETENTION,
            cleanup_ratio: DEFAULT_CLEANUP_RATIO,
            operation_timeout_ms: millis(DEFAULT_OPERATION_TIMEOUT),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureConfig {
    pub attempts: u32,
    pub retry_delay_ms: u64,
    pub default_language: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: millis(DEFAULT_RETRY_DELAY),
            default_language: Language::Python3.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub backoff: f64,
    pub request_timeout_ms: u64,
    pub rate_limit_delay_ms: u64,
    pub rate_limit_cap_ms: u64,
    /// Failed passes after which a submission is only retried manually
    pub sync_pass_budget: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: millis(DEFAULT_SYNC_RETRY_DELAY),
            backoff: DEFAULT_RETRY_BACKOFF,
            request_timeout_ms: millis(DEFAULT_REQUEST_TIMEOUT),
            rate_limit_delay_ms: millis(DEFAULT_RATE_LIMIT_DELAY),
            rate_limit_cap_ms: millis(DEFAULT_RATE_LIMIT_CAP),
            sync_pass_budget: DEFAULT_SYNC_PASS_BUDGET,
        }
    }
}

impl SolsyncConfig {
    /// Load from `path`, falling back to defaults when the file is missing.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw).map_err(|error| {
            Error::InvalidInput(format!(
                "failed to parse config at {}: {error}",
                path.display()
            ))
        })?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        normalized.validate()?;
        std::fs::write(path, serde_json::to_string_pretty(&normalized)?)?;
        Ok(())
    }

    /// Apply `SOLSYNC_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from `lookup`; blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| normalize_text_option(lookup(name));

        if let Some(owner) = value(ENV_GITHUB_OWNER) {
            self.github.owner = Some(owner);
        }
        if let Some(repo) = value(ENV_GITHUB_REPO) {
            self.github.repo = Some(repo);
        }
        if let Some(branch) = value(ENV_GITHUB_BRANCH) {
            self.github.branch = branch;
        }
        if let Some(client_id) = value(ENV_GITHUB_CLIENT_ID) {
            self.github.client_id = Some(client_id);
        }
        if let Some(api_base_url) = value(ENV_API_BASE_URL) {
            self.github.api_base_url = api_base_url;
        }
        self.normalize();
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        let github = &self.github;
        for (name, url) in [
            ("api_base_url", &github.api_base_url),
            ("device_code_url", &github.device_code_url),
            ("access_token_url", &github.access_token_url),
        ] {
            if !is_http_url(url) {
                return Err(Error::InvalidInput(format!(
                    "{name} must include http:// or https://"
                )));
            }
        }
        if github.branch.is_empty() {
            return Err(Error::InvalidInput("branch must not be empty".to_string()));
        }
        if self.storage.quota_bytes == 0 {
            return Err(Error::InvalidInput("quota_bytes must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.storage.cleanup_ratio) {
            return Err(Error::InvalidInput(
                "cleanup_ratio must be between 0 and 1".to_string(),
            ));
        }
        if !self.sync.backoff.is_finite() || self.sync.backoff < 1.0 {
            return Err(Error::InvalidInput("backoff must be at least 1.0".to_string()));
        }
        Ok(())
    }

    /// Repository to sync into, once owner and repo are both configured.
    pub fn repo_target(&self) -> Result<RepoTarget> {
        match (&self.github.owner, &self.github.repo) {
            (Some(owner), Some(repo)) => Ok(RepoTarget::new(owner, repo, &self.github.branch)),
            _ => Err(Error::InvalidInput(format!(
                "target repository is not configured; run `solsync config init` or set {ENV_GITHUB_OWNER} and {ENV_GITHUB_REPO}"
            ))),
        }
    }

    pub fn device_flow(&self) -> Result<DeviceFlowConfig> {
        let client_id = self.github.client_id.clone().ok_or_else(|| {
            Error::InvalidInput(format!(
                "OAuth client id is not configured; set it with `solsync config init --client-id` or {ENV_GITHUB_CLIENT_ID}"
            ))
        })?;
        Ok(DeviceFlowConfig {
            client_id,
            scope: self.github.scope.clone(),
            device_code_url: self.github.device_code_url.clone(),
            access_token_url: self.github.access_token_url.clone(),
        })
    }

    pub const fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            quota: QuotaPolicy {
                quota_bytes: self.storage.quota_bytes,
                synced_retention: self.storage.synced_retention,
                cleanup_ratio: self.storage.cleanup_ratio,
            },
            operation_timeout: Duration::from_millis(self.storage.operation_timeout_ms),
        }
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.sync.max_retries,
            retry_delay: Duration::from_millis(self.sync.retry_delay_ms),
            backoff: self.sync.backoff,
            rate_limit_delay: Duration::from_millis(self.sync.rate_limit_delay_ms),
            rate_limit_cap: Duration::from_millis(self.sync.rate_limit_cap_ms),
            sync_pass_budget: self.sync.sync_pass_budget,
        }
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.request_timeout_ms)
    }

    pub fn capture_engine(&self) -> CaptureEngine {
        CaptureEngine::new().with_retry_delay(Duration::from_millis(self.capture.retry_delay_ms))
    }

    pub fn default_language(&self) -> Language {
        normalize_language(&self.capture.default_language)
    }

    fn normalize(&mut self) {
        let github = &mut self.github;
        github.owner = normalize_text_option(github.owner.take());
        github.repo = normalize_text_option(github.repo.take());
        github.client_id = normalize_text_option(github.client_id.take());
        github.branch = normalize_text_option(Some(std::mem::take(&mut github.branch)))
            .unwrap_or_else(|| DEFAULT_BRANCH.to_string());
        github.api_base_url = github.api_base_url.trim().trim_end_matches('/').to_string();
        github.device_code_url = github.device_code_url.trim().to_string();
        github.access_token_url = github.access_token_url.trim().to_string();
        self.capture.attempts = self.capture.attempts.max(1);
        self.capture.default_language = normalize_language(&self.capture.default_language)
            .as_str()
            .to_string();
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_component_defaults() {
        let config = SolsyncConfig::default();
        assert_eq!(config.queue_options().quota, QuotaPolicy::default());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.request_timeout(), DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.default_language(), Language::Python3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SolsyncConfig::load_from_path(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config, SolsyncConfig::default());
    }

    #[test]
    fn save_and_load_normalizes_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);

        let mut config = SolsyncConfig::default();
        config.github.owner = Some("  octocat ".to_string());
        config.github.repo = Some("solutions".to_string());
        config.github.branch = "  ".to_string();
        config.github.api_base_url = "https://ghe.example.com/api/v3/".to_string();
        config.capture.default_language = "C++".to_string();

        config.save_to_path(&path).unwrap();
        let loaded = SolsyncConfig::load_from_path(&path).unwrap();

        assert_eq!(loaded.github.owner.as_deref(), Some("octocat"));
        assert_eq!(loaded.github.branch, DEFAULT_BRANCH);
        assert_eq!(loaded.github.api_base_url, "https://ghe.example.com/api/v3");
        assert_eq!(loaded.capture.default_language, "cpp");
        assert_eq!(
            loaded.repo_target().unwrap().to_string(),
            "octocat/solutions@main"
        );
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"sync": {"max_retries": 5}}"#).unwrap();

        let config = SolsyncConfig::load_from_path(&path).unwrap();
        assert_eq!(config.sync.max_retries, 5);
        assert_eq!(config.retry_policy().total_attempts(), 6);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn env_overrides_win_and_blank_is_ignored() {
        let mut config = SolsyncConfig::default();
        config.github.owner = Some("file-owner".to_string());
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_GITHUB_OWNER, "env-owner"),
            (ENV_GITHUB_REPO, "env-repo"),
            (ENV_GITHUB_BRANCH, "  "),
            (ENV_GITHUB_CLIENT_ID, "Iv1.abc"),
        ]);

        config.apply_overrides(|name| env.get(name).map(ToString::to_string));

        assert_eq!(config.github.owner.as_deref(), Some("env-owner"));
        assert_eq!(config.github.repo.as_deref(), Some("env-repo"));
        assert_eq!(config.github.branch, DEFAULT_BRANCH);
        assert_eq!(config.device_flow().unwrap().client_id, "Iv1.abc");
    }

    #[test]
    fn unconfigured_target_and_client_are_reported() {
        let config = SolsyncConfig::default();
        assert!(config
            .repo_target()
            .unwrap_err()
            .to_string()
            .contains(ENV_GITHUB_OWNER));
        assert!(config.device_flow().is_err());
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut config = SolsyncConfig::default();
        config.github.api_base_url = "api.github.com".to_string();
        assert!(config.validate().is_err());

        let mut config = SolsyncConfig::default();
        config.sync.backoff = 0.5;
        assert!(config.validate().is_err());

        let mut config = SolsyncConfig::default();
        config.storage.cleanup_ratio = 1.5;
        assert!(config.validate().is_err());
    }
}
