//! Top-level error types for the Yoto client.

use thiserror::Error;

use crate::credentials::Credentials;

/// OAuth error codes that mean "keep polling" during the device flow.
pub const AUTHORIZATION_PENDING: &str = "authorization_pending";
pub const SLOW_DOWN: &str = "slow_down";

/// Error type for every operation in this crate.
#[derive(Debug, Error)]
pub enum YotoError {
    /// The authorization server returned an OAuth error payload.
    #[error("{}", oauth_message(code, description))]
    Auth {
        code: String,
        description: Option<String>,
    },

    /// The REST API returned a non-2xx response.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// A 2xx response body did not match the expected shape.
    #[error("unexpected response from {endpoint}: {source}")]
    Schema {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// No access token is held.
    #[error("Not authenticated. Please login first.")]
    NotAuthenticated,

    /// A 401 could not be recovered by a single token refresh.
    #[error("Authentication expired. Please login again.")]
    AuthenticationExpired,

    /// A refresh was requested without a refresh token.
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// Input rejected locally before any request was made.
    #[error("{message}")]
    Validation { message: String },

    /// A polling loop exceeded its bound.
    #[error("{message}")]
    Timeout { message: String },

    /// The transcode job reached a phase that is not in progress or complete.
    #[error("transcoding of {upload_id} failed with phase: {phase}")]
    TranscodeFailed { upload_id: String, phase: String },

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A request URL could not be built.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Reading a local file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The call rotated the token pair before failing.
    ///
    /// The refresh token in `credentials` replaces the one the call started
    /// with, which the server no longer accepts.
    #[error("{error}")]
    Refreshed {
        error: Box<YotoError>,
        credentials: Box<Credentials>,
    },
}

impl YotoError {
    pub(crate) fn auth(code: impl Into<String>, description: Option<String>) -> Self {
        Self::Auth {
            code: code.into(),
            description,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Attach credentials obtained by a refresh earlier in the failed call.
    ///
    /// An existing attachment is replaced; `credentials` must be the newest.
    pub fn with_refreshed(self, credentials: Credentials) -> Self {
        let (error, _) = self.into_parts();
        Self::Refreshed {
            error: Box::new(error),
            credentials: Box::new(credentials),
        }
    }

    /// Split off credentials a refresh produced before the failure.
    pub fn into_parts(self) -> (YotoError, Option<Credentials>) {
        match self {
            Self::Refreshed { error, credentials } => (*error, Some(*credentials)),
            other => (other, None),
        }
    }

    /// The underlying error, looking through [`YotoError::Refreshed`].
    pub fn kind(&self) -> &YotoError {
        match self {
            Self::Refreshed { error, .. } => &**error,
            other => other,
        }
    }

    /// Credentials a refresh produced before the failure.
    pub fn refreshed(&self) -> Option<&Credentials> {
        match self {
            Self::Refreshed { credentials, .. } => Some(&**credentials),
            _ => None,
        }
    }

    /// The OAuth error code, if this is an OAuth error.
    pub fn oauth_code(&self) -> Option<&str> {
        match self.kind() {
            Self::Auth { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Whether this is `authorization_pending` or `slow_down`.
    pub fn is_pending(&self) -> bool {
        matches!(self.oauth_code(), Some(AUTHORIZATION_PENDING | SLOW_DOWN))
    }
}

fn oauth_message(code: &str, description: &Option<String>) -> String {
    match description.as_deref() {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => code.to_string(),
    }
}
