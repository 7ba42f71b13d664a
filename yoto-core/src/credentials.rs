//! Credential persistence.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for token strings that prevents accidental logging
//! - [`TokenPair`] - An access token and refresh token that always travel together
//! - [`Credentials`] - The immutable client id + token pair value threaded through API calls
//! - [`CredentialStore`] - Disk-backed JSON storage for credentials
//!
//! # Storage Location
//!
//! Credentials are stored at `~/.config/yoto-cli/credentials.json` on Linux,
//! and the equivalent platform configuration directory elsewhere.
//!
//! # Example
//!
//! ```rust,ignore
//! use yoto_core::credentials::CredentialStore;
//!
//! let store = CredentialStore::open()?;
//! match store.load() {
//!     Some(credentials) if credentials.is_authenticated() => println!("logged in"),
//!     _ => println!("not logged in"),
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::model::TokenResponse;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// An access token and its refresh token.
///
/// The two are only ever replaced together. A pair without a refresh token
/// works until the access token is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: Secret,
    pub refresh_token: Option<Secret>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: Some(Secret::new(refresh_token)),
        }
    }

    pub fn access_only(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Secret::new(access_token),
            refresh_token: None,
        }
    }
}

impl From<&TokenResponse> for TokenPair {
    fn from(response: &TokenResponse) -> Self {
        Self::new(response.access_token.clone(), response.refresh_token.clone())
    }
}

/// Client id plus the current token pair.
///
/// Credentials are immutable: a token exchange or refresh produces a new
/// value via [`with_tokens`](Credentials::with_tokens).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CredentialsFile", into = "CredentialsFile")]
pub struct Credentials {
    client_id: String,
    tokens: Option<TokenPair>,
}

impl Credentials {
    /// Credentials for a client that has not logged in yet.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            tokens: None,
        }
    }

    /// Return a copy of these credentials carrying `tokens`.
    pub fn with_tokens(&self, tokens: TokenPair) -> Self {
        Self {
            client_id: self.client_id.clone(),
            tokens: Some(tokens),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn tokens(&self) -> Option<&TokenPair> {
        self.tokens.as_ref()
    }

    pub fn access_token(&self) -> Option<&Secret> {
        self.tokens.as_ref().map(|t| &t.access_token)
    }

    pub fn refresh_token(&self) -> Option<&Secret> {
        self.tokens.as_ref().and_then(|t| t.refresh_token.as_ref())
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_some()
    }
}

/// On-disk shape of the credential file.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsFile {
    client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

impl From<CredentialsFile> for Credentials {
    fn from(file: CredentialsFile) -> Self {
        // Without an access token there is nothing to send.
        let tokens = file.access_token.map(|access| TokenPair {
            access_token: Secret::new(access),
            refresh_token: file.refresh_token.map(Secret::new),
        });
        Self {
            client_id: file.client_id,
            tokens,
        }
    }
}

impl From<Credentials> for CredentialsFile {
    fn from(credentials: Credentials) -> Self {
        let (access_token, refresh_token) = match credentials.tokens {
            Some(pair) => (Some(pair.access_token.0), pair.refresh_token.map(|r| r.0)),
            None => (None, None),
        };
        Self {
            client_id: credentials.client_id,
            access_token,
            refresh_token,
        }
    }
}

/// Error type for credential store operations.
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    /// I/O error reading or writing the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration directory not available.
    #[error("configuration directory not available")]
    ConfigDirUnavailable,
}

/// Disk-backed credential file.
///
/// Reads never fail: a missing or unreadable file means "not logged in".
/// Writes replace the whole file; concurrent writers race and the last one
/// wins.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Get the default path of the credential file.
    pub fn default_path() -> Result<PathBuf, CredentialStoreError> {
        let dirs = directories::ProjectDirs::from("com", "yotoplay", "yoto-cli")
            .ok_or(CredentialStoreError::ConfigDirUnavailable)?;
        Ok(dirs.config_dir().join("credentials.json"))
    }

    /// Open the store at the default location.
    pub fn open() -> Result<Self, CredentialStoreError> {
        Ok(Self::at(Self::default_path()?))
    }

    /// Open the store at a specific path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load credentials, returning `None` when absent or unparseable.
    pub fn load(&self) -> Option<Credentials> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                debug!("No credentials at {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                debug!("Ignoring unreadable credentials at {:?}: {}", self.path, e);
                None
            }
        }
    }

    /// Persist credentials, creating the parent directory if needed.
    pub fn save(&self, credentials: &Credentials) -> Result<(), CredentialStoreError> {
        let contents = serde_json::to_string_pretty(credentials)?;
        self.write(&contents)
    }

    /// Replace the file with an empty object.
    pub fn clear(&self) -> Result<(), CredentialStoreError> {
        self.write("{}")
    }

    fn write(&self, contents: &str) -> Result<(), CredentialStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        debug!("Wrote credentials to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (CredentialStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = CredentialStore::at(temp_dir.path().join("nested").join("credentials.json"));
        (store, temp_dir)
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("super-secret");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(format!("{:?}", secret), "Secret([REDACTED])");
        assert_eq!(secret.expose(), "super-secret");
    }

    #[test]
    fn test_missing_file_is_not_logged_in() {
        let (store, _temp) = test_store();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let (store, _temp) = test_store();
        let credentials = Credentials::new("client").with_tokens(TokenPair::new("access", "refresh"));

        store.save(&credentials).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded, credentials);
        assert_eq!(loaded.access_token().unwrap().expose(), "access");
        assert_eq!(loaded.refresh_token().unwrap().expose(), "refresh");
    }

    #[test]
    fn test_file_uses_camel_case_keys() {
        let (store, _temp) = test_store();
        let credentials = Credentials::new("client").with_tokens(TokenPair::new("a", "r"));
        store.save(&credentials).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["clientId"], "client");
        assert_eq!(raw["accessToken"], "a");
        assert_eq!(raw["refreshToken"], "r");
    }

    #[test]
    fn test_clear_means_logged_out() {
        let (store, _temp) = test_store();
        let credentials = Credentials::new("client").with_tokens(TokenPair::new("a", "r"));
        store.save(&credentials).unwrap();

        store.clear().unwrap();

        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{}");
        assert!(store.load().is_none());
    }

    #[test]
    fn test_garbage_file_is_not_logged_in() {
        let (store, _temp) = test_store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_access_only_file_is_logged_in() {
        let credentials: Credentials =
            serde_json::from_str(r#"{"clientId":"client","accessToken":"only-access"}"#).unwrap();
        assert!(credentials.is_authenticated());
        assert_eq!(credentials.access_token().unwrap().expose(), "only-access");
        assert!(credentials.refresh_token().is_none());

        let raw = serde_json::to_value(&credentials).unwrap();
        assert_eq!(raw, serde_json::json!({"clientId": "client", "accessToken": "only-access"}));
    }

    #[test]
    fn test_refresh_only_file_is_logged_out() {
        let credentials: Credentials =
            serde_json::from_str(r#"{"clientId":"client","refreshToken":"only-refresh"}"#).unwrap();
        assert!(!credentials.is_authenticated());
        assert_eq!(credentials.client_id(), "client");
    }

    #[test]
    fn test_with_tokens_leaves_original_untouched() {
        let old = Credentials::new("client").with_tokens(TokenPair::new("a1", "r1"));
        let new = old.with_tokens(TokenPair::new("a2", "r2"));

        assert_eq!(old.access_token().unwrap().expose(), "a1");
        assert_eq!(new.access_token().unwrap().expose(), "a2");
        assert_eq!(new.refresh_token().unwrap().expose(), "r2");
    }
}
