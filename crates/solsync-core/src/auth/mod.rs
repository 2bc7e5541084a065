//! GitHub device-authorization flow.
//!
//! The user enters a short code in the browser while the client polls the
//! token endpoint. The resulting bearer token is handed to a
//! [`TokenPersistence`] implementation and never logged.

use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::util::{is_http_url, normalize_text_option, unix_timestamp_now};

pub const DEFAULT_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
pub const DEFAULT_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const DEFAULT_SCOPE: &str = "repo";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_CODE_EXPIRY: Duration = Duration::from_secs(900);
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: String,
    pub scope: String,
    /// When the token was issued (Unix seconds)
    pub obtained_at: i64,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// Code pair returned when a device flow starts.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceCode {
    pub device_code: String,
    /// Short code the user types at `verification_uri`
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: Duration,
    pub interval: Duration,
}

impl fmt::Debug for DeviceCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DeviceCode")
            .field("device_code", &"[REDACTED]")
            .field("user_code", &self.user_code)
            .field("verification_uri", &self.verification_uri)
            .field("expires_in", &self.expires_in)
            .field("interval", &self.interval)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Authorization was denied by the user")]
    AccessDenied,
    #[error("Device code expired before authorization completed")]
    Expired,
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

pub trait TokenPersistence: Clone + Send + Sync + 'static {
    fn load_token(&self) -> AuthResult<Option<AccessToken>>;
    fn save_token(&self, token: &AccessToken) -> AuthResult<()>;
    fn clear_token(&self) -> AuthResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFlowConfig {
    pub client_id: String,
    pub scope: String,
    pub device_code_url: String,
    pub access_token_url: String,
}

impl DeviceFlowConfig {
    pub fn github(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            scope: DEFAULT_SCOPE.to_string(),
            device_code_url: DEFAULT_DEVICE_CODE_URL.to_string(),
            access_token_url: DEFAULT_ACCESS_TOKEN_URL.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct DeviceFlowClient<S: TokenPersistence> {
    config: DeviceFlowConfig,
    client: Client,
    store: S,
}

impl<S: TokenPersistence> DeviceFlowClient<S> {
    pub fn new(config: DeviceFlowConfig, store: S) -> AuthResult<Self> {
        let client_id = normalize_text_option(Some(config.client_id)).ok_or(
            AuthError::InvalidConfiguration("OAuth client id must not be empty"),
        )?;
        if !is_http_url(&config.device_code_url) || !is_http_url(&config.access_token_url) {
            return Err(AuthError::InvalidConfiguration(
                "Device flow endpoints must include http:// or https://",
            ));
        }

        Ok(Self {
            config: DeviceFlowConfig {
                client_id,
                ..config
            },
            client: Client::builder().build()?,
            store,
        })
    }

    pub fn stored_token(&self) -> AuthResult<Option<AccessToken>> {
        self.store.load_token()
    }

    pub fn sign_out(&self) -> AuthResult<()> {
        self.store.clear_token()
    }

    /// Start a device flow.
    pub async fn request_device_code(&self) -> AuthResult<DeviceCode> {
        let response = self
            .client
            .post(&self.config.device_code_url)
            .header("Accept", "application/json")
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("scope", self.config.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Api(parse_api_error(status.as_u16(), &body)));
        }

        let payload: DeviceCodeResponse = serde_json::from_str(&body)?;
        if let Some(error) = payload.error {
            return Err(AuthError::Api(describe(&error, payload.error_description)));
        }
        match (payload.device_code, payload.user_code, payload.verification_uri) {
            (Some(device_code), Some(user_code), Some(verification_uri)) => Ok(DeviceCode {
                device_code,
                user_code,
                verification_uri,
                expires_in: payload
                    .expires_in
                    .map_or(DEFAULT_CODE_EXPIRY, Duration::from_secs),
                interval: payload
                    .interval
                    .map_or(DEFAULT_POLL_INTERVAL, Duration::from_secs),
            }),
            _ => Err(AuthError::Api(
                "Device code response is missing fields".to_string(),
            )),
        }
    }

    /// Poll until the user authorizes `code`, then persist the token.
    pub async fn poll_for_token(&self, code: &DeviceCode) -> AuthResult<AccessToken> {
        let deadline = Instant::now() + code.expires_in;
        let mut interval = code.interval;

        loop {
            tokio::time::sleep(interval).await;
            if Instant::now() >= deadline {
                return Err(AuthError::Expired);
            }

            match self.exchange(code).await? {
                PollStatus::Ready(token) => {
                    self.store.save_token(&token)?;
                    tracing::info!(scope = %token.scope, "Device authorization completed");
                    return Ok(token);
                }
                PollStatus::Pending => {}
                PollStatus::SlowDown(hint) => {
                    interval = next_interval(interval, hint);
                    tracing::debug!(?interval, "Token endpoint asked to slow down");
                }
            }
        }
    }

    async fn exchange(&self, code: &DeviceCode) -> AuthResult<PollStatus> {
        let response = self
            .client
            .post(&self.config.access_token_url)
            .header("Accept", "application/json")
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("device_code", code.device_code.as_str()),
                ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::Api(parse_api_error(status.as_u16(), &body)));
        }

        let payload: TokenResponse = serde_json::from_str(&body)?;
        payload.into_status()
    }
}

#[derive(Debug)]
enum PollStatus {
    Ready(AccessToken),
    Pending,
    SlowDown(Option<Duration>),
}

/// Interval after a `slow_down` reply: the server's value when given,
/// otherwise the current one plus five seconds.
fn next_interval(current: Duration, hint: Option<Duration>) -> Duration {
    hint.filter(|hint| *hint > current)
        .unwrap_or(current + SLOW_DOWN_STEP)
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: Option<String>,
    user_code: Option<String>,
    verification_uri: Option<String>,
    expires_in: Option<u64>,
    interval: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
    interval: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_status(self) -> AuthResult<PollStatus> {
        if let Some(access_token) = normalize_text_option(self.access_token) {
            return Ok(PollStatus::Ready(AccessToken {
                access_token,
                token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
                scope: self.scope.unwrap_or_default(),
                obtained_at: unix_timestamp_now(),
            }));
        }

        match self.error.as_deref() {
            Some("authorization_pending") => Ok(PollStatus::Pending),
            Some("slow_down") => Ok(PollStatus::SlowDown(
                self.interval.map(Duration::from_secs),
            )),
            Some("expired_token") => Err(AuthError::Expired),
            Some("access_denied") => Err(AuthError::AccessDenied),
            Some(error) => Err(AuthError::Api(describe(error, self.error_description))),
            None => Err(AuthError::Api(
                "Token response did not include a token or an error".to_string(),
            )),
        }
    }
}

fn describe(error: &str, description: Option<String>) -> String {
    match normalize_text_option(description) {
        Some(description) => format!("{error}: {description}"),
        None => error.to_string(),
    }
}

fn parse_api_error(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("{} ({status})", crate::util::compact_text(trimmed))
    }
}
