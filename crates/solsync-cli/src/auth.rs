//! Device-flow token handling with secure keychain persistence.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use solsync_core::auth::{AuthResult, DeviceCode, DeviceFlowClient, DeviceFlowConfig, TokenPersistence};
pub use solsync_core::auth::{AccessToken, AuthError};

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "solsync-cli";

/// Keychain slot holding one serialized [`AccessToken`].
#[derive(Clone)]
pub struct TokenStore {
    username: String,
}

impl TokenStore {
    /// One slot per OAuth app, so switching client ids never reuses a token.
    pub fn new(client_id: &str) -> Self {
        Self {
            username: format!("github_token:{client_id}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }
}

impl TokenPersistence for TokenStore {
    #[cfg(not(test))]
    fn load_token(&self) -> AuthResult<Option<AccessToken>> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_token(&self) -> AuthResult<Option<AccessToken>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard
            .get(&self.username)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(AuthError::from)
    }

    #[cfg(not(test))]
    fn save_token(&self, token: &AccessToken) -> AuthResult<()> {
        let raw = serde_json::to_string(token)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::SecureStorage(error.to_string()))
    }

    #[cfg(test)]
    fn save_token(&self, token: &AccessToken) -> AuthResult<()> {
        let raw = serde_json::to_string(token)?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_token(&self) -> AuthResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::SecureStorage(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_token(&self) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::SecureStorage(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

#[derive(Clone)]
pub struct DeviceAuthService {
    inner: DeviceFlowClient<TokenStore>,
}

impl DeviceAuthService {
    pub fn new(config: DeviceFlowConfig) -> AuthResult<Self> {
        let store = TokenStore::new(&config.client_id);
        Ok(Self {
            inner: DeviceFlowClient::new(config, store)?,
        })
    }

    pub async fn start(&self) -> AuthResult<DeviceCode> {
        self.inner.request_device_code().await
    }

    pub async fn wait_for_token(&self, code: &DeviceCode) -> AuthResult<AccessToken> {
        self.inner.poll_for_token(code).await
    }

    pub fn stored_token(&self) -> AuthResult<Option<AccessToken>> {
        self.inner.stored_token()
    }

    pub fn sign_out(&self) -> AuthResult<()> {
        self.inner.sign_out()
    }
}
