//! HTTP client for the Yoto OAuth and REST APIs.
//!
//! [`YotoClient`] holds no token state. Every authenticated call takes the
//! caller's [`Credentials`] and returns an [`Authed`] value that carries
//! replacement credentials whenever the call had to refresh the token pair.
//!
//! # Authentication policy
//!
//! - No access token: [`YotoError::NotAuthenticated`] without touching the network.
//! - HTTP 401 with a refresh token: refresh once and retry the request once.
//! - A second 401, or a 401 without a refresh token: [`YotoError::AuthenticationExpired`].
//! - Any failure after a successful refresh is wrapped in
//!   [`YotoError::Refreshed`], so the rotated pair is never lost.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), yoto_core::YotoError> {
//! use yoto_core::{ClientConfig, Credentials, TokenPair, YotoClient};
//!
//! let client = YotoClient::new(ClientConfig::default());
//! let credentials = Credentials::new("client-id").with_tokens(TokenPair::new("access", "refresh"));
//!
//! let listing = client.list_content(&credentials, false).await?;
//! for card in &listing.value.cards {
//!     println!("{} {}", card.card_id, card.title);
//! }
//! # Ok(())
//! # }
//! ```

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::credentials::{Credentials, TokenPair};
use crate::error::{AUTHORIZATION_PENDING, YotoError};
use crate::model::{
    ApiErrorBody, CreateContentRequest, DeleteContentResponse, DeviceCodeResponse, DeviceCommand,
    DeviceStatus, DevicesResponse, DisplayIconsResponse, GetContentOptions, GetContentResponse,
    ListContentResponse, OAuthErrorBody, TokenResponse, TranscodedAudioResponse,
    UpdateContentRequest, UploadIconOptions, UploadIconResponse, UploadUrlResponse,
};

pub const DEFAULT_AUTH_BASE_URL: &str = "https://login.yotoplay.com";
pub const DEFAULT_API_BASE_URL: &str = "https://api.yotoplay.com";
pub const DEFAULT_AUDIENCE: &str = "https://api.yotoplay.com";
pub const DEFAULT_SCOPE: &str = "profile offline_access openid";

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// One original attempt plus one retry after a refresh.
const MAX_ATTEMPTS: usize = 2;

/// Endpoints and OAuth parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub auth_base_url: String,
    pub api_base_url: String,
    pub audience: String,
    pub scope: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            audience: DEFAULT_AUDIENCE.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Point both OAuth and REST calls at one base URL (used against mock servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            auth_base_url: base_url.clone(),
            api_base_url: base_url,
            ..Self::default()
        }
    }
}

/// Result of an authenticated call.
#[derive(Debug, Clone)]
pub struct Authed<T> {
    pub value: T,

    /// New credentials if the call refreshed the token pair.
    pub refreshed: Option<Credentials>,
}

impl<T> Authed<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            refreshed: None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Authed<U> {
        Authed {
            value: f(self.value),
            refreshed: self.refreshed,
        }
    }
}

/// Carries the newest credentials through a sequence of calls.
///
/// Each [`Authed`] result is absorbed so the next call uses refreshed tokens,
/// and [`finish`](CredentialChain::finish) reports whether anything changed.
#[derive(Debug, Clone)]
pub struct CredentialChain {
    current: Credentials,
    refreshed: bool,
}

impl CredentialChain {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            current: credentials,
            refreshed: false,
        }
    }

    pub fn current(&self) -> &Credentials {
        &self.current
    }

    /// Take the value out of `authed`, keeping any refreshed credentials.
    pub fn absorb<T>(&mut self, authed: Authed<T>) -> T {
        if let Some(credentials) = authed.refreshed {
            self.current = credentials;
            self.refreshed = true;
        }
        authed.value
    }

    /// Like [`absorb`](CredentialChain::absorb), but also keeps credentials
    /// carried by a failure.
    pub fn take<T>(&mut self, result: Result<Authed<T>, YotoError>) -> Result<T, YotoError> {
        match result {
            Ok(authed) => Ok(self.absorb(authed)),
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Attach the newest credentials to `err` if anything was refreshed.
    pub fn fail(&mut self, err: YotoError) -> YotoError {
        let (err, refreshed) = err.into_parts();
        if let Some(credentials) = refreshed {
            self.current = credentials;
            self.refreshed = true;
        }
        if self.refreshed {
            err.with_refreshed(self.current.clone())
        } else {
            err
        }
    }

    pub fn finish<T>(self, value: T) -> Authed<T> {
        Authed {
            value,
            refreshed: self.refreshed.then_some(self.current),
        }
    }
}

/// Outcome of a token exchange or refresh.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub response: TokenResponse,

    /// The previous credentials with the new token pair in place.
    pub credentials: Credentials,
}

enum Body {
    Empty,
    Json(Value),
    Raw {
        content_type: &'static str,
        bytes: Vec<u8>,
    },
}

/// A request that can be rebuilt for a retry.
struct ApiRequest {
    method: Method,
    url: Url,
    body: Body,
}

impl ApiRequest {
    fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            body: Body::Empty,
        }
    }

    fn build(&self, http: &reqwest::Client, access_token: &str) -> reqwest::RequestBuilder {
        let builder = http
            .request(self.method.clone(), self.url.clone())
            .bearer_auth(access_token);

        match &self.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Raw {
                content_type,
                bytes,
            } => builder.header(CONTENT_TYPE, *content_type).body(bytes.clone()),
        }
    }
}

/// Typed client for the Yoto APIs.
#[derive(Debug, Clone)]
pub struct YotoClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl YotoClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http_client(reqwest::Client::new(), config)
    }

    pub fn with_http_client(http: reqwest::Client, config: ClientConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ============ Authentication ============

    /// Start a device authorization grant.
    pub async fn init_device_flow(&self, client_id: &str) -> Result<DeviceCodeResponse, YotoError> {
        let url = join(&self.config.auth_base_url, "/oauth/device/code", &[])?;
        debug!("Requesting device code from {}", url);

        let (status, body) = self
            .form_post(
                url,
                &[
                    ("client_id", client_id),
                    ("scope", self.config.scope.as_str()),
                    ("audience", self.config.audience.as_str()),
                ],
            )
            .await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(err) => YotoError::auth(err.error, err.error_description),
                Err(_) => YotoError::Api {
                    status: status.as_u16(),
                    message: "Failed to init device flow".to_string(),
                },
            });
        }

        parse_body("/oauth/device/code", &body)
    }

    /// Exchange a device code for tokens.
    ///
    /// Fails with [`YotoError::Auth`] carrying the server's error code;
    /// `authorization_pending` and `slow_down` mean the caller should keep
    /// polling.
    pub async fn poll_for_token(
        &self,
        credentials: &Credentials,
        device_code: &str,
    ) -> Result<TokenGrant, YotoError> {
        let url = join(&self.config.auth_base_url, "/oauth/token", &[])?;

        let (status, body) = self
            .form_post(
                url,
                &[
                    ("client_id", credentials.client_id()),
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("device_code", device_code),
                ],
            )
            .await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(err) => YotoError::auth(err.error, err.error_description),
                Err(_) => {
                    debug!("Unrecognised token error body ({}), treating as pending", status);
                    YotoError::auth(AUTHORIZATION_PENDING, None)
                }
            });
        }

        let response: TokenResponse = parse_body("/oauth/token", &body)?;
        Ok(grant(credentials, response))
    }

    /// Exchange the refresh token for a new token pair.
    pub async fn refresh_access_token(
        &self,
        credentials: &Credentials,
    ) -> Result<TokenGrant, YotoError> {
        let refresh_token = credentials
            .refresh_token()
            .ok_or(YotoError::MissingRefreshToken)?;

        let url = join(&self.config.auth_base_url, "/oauth/token", &[])?;
        debug!("Refreshing access token");

        let (status, body) = self
            .form_post(
                url,
                &[
                    ("client_id", credentials.client_id()),
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.expose()),
                ],
            )
            .await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<OAuthErrorBody>(&body) {
                Ok(err) => YotoError::auth(err.error, err.error_description),
                Err(_) => YotoError::Api {
                    status: status.as_u16(),
                    message: "Failed to refresh token".to_string(),
                },
            });
        }

        let response: TokenResponse = parse_body("/oauth/token", &body)?;
        Ok(grant(credentials, response))
    }

    async fn form_post(
        &self,
        url: Url,
        form: &[(&str, &str)],
    ) -> Result<(StatusCode, String), YotoError> {
        let response = self.http.post(url).form(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    // ============ Request primitive ============

    async fn send<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        request: ApiRequest,
    ) -> Result<Authed<T>, YotoError> {
        let mut refreshed: Option<Credentials> = None;

        match self.send_with_retry(credentials, &request, &mut refreshed).await {
            Ok(value) => Ok(Authed { value, refreshed }),
            Err(err) => Err(match refreshed {
                Some(credentials) => err.with_refreshed(credentials),
                None => err,
            }),
        }
    }

    /// Leaves any refreshed credentials in `refreshed`, even on failure.
    async fn send_with_retry<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        request: &ApiRequest,
        refreshed: &mut Option<Credentials>,
    ) -> Result<T, YotoError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let current = refreshed.as_ref().unwrap_or(credentials);
            let access_token = current
                .access_token()
                .ok_or(YotoError::NotAuthenticated)?;

            debug!(
                method = %request.method,
                path = request.url.path(),
                attempt,
                "API request"
            );

            let response = request
                .build(&self.http, access_token.expose())
                .send()
                .await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                if attempt < MAX_ATTEMPTS && current.refresh_token().is_some() {
                    warn!("Access token rejected, refreshing and retrying once");
                    let grant = self.refresh_access_token(current).await?;
                    *refreshed = Some(grant.credentials);
                    continue;
                }
                return Err(YotoError::AuthenticationExpired);
            }

            let body = response.text().await?;

            if !status.is_success() {
                return Err(api_error(status, &body));
            }

            return parse_body(request.url.path(), &body);
        }

        Err(YotoError::AuthenticationExpired)
    }

    fn api_url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, YotoError> {
        join(&self.config.api_base_url, path, query)
    }

    // ============ Content ============

    pub async fn list_content(
        &self,
        credentials: &Credentials,
        show_deleted: bool,
    ) -> Result<Authed<ListContentResponse>, YotoError> {
        let query: &[(&str, &str)] = if show_deleted {
            &[("showdeleted", "true")]
        } else {
            &[]
        };
        let url = self.api_url("/content/mine", query)?;
        self.send(credentials, ApiRequest::get(url)).await
    }

    pub async fn get_content(
        &self,
        credentials: &Credentials,
        card_id: &str,
        options: &GetContentOptions,
    ) -> Result<Authed<GetContentResponse>, YotoError> {
        let mut query = Vec::new();
        if let Some(tz) = options.timezone.as_deref() {
            query.push(("timezone", tz));
        }
        if options.playable {
            query.push(("playable", "true"));
            query.push(("signingType", "s3"));
        }
        let url = self.api_url(&format!("/content/{}", card_id), &query)?;
        self.send(credentials, ApiRequest::get(url)).await
    }

    pub async fn create_content(
        &self,
        credentials: &Credentials,
        request: &CreateContentRequest,
    ) -> Result<Authed<GetContentResponse>, YotoError> {
        let body = serde_json::to_value(request).map_err(schema("/content"))?;
        self.post_json(credentials, "/content", body).await
    }

    /// Replace the whole card document.
    pub async fn update_content(
        &self,
        credentials: &Credentials,
        request: &UpdateContentRequest,
    ) -> Result<Authed<GetContentResponse>, YotoError> {
        let body = serde_json::to_value(request).map_err(schema("/content"))?;
        self.post_json(credentials, "/content", body).await
    }

    pub async fn delete_content(
        &self,
        credentials: &Credentials,
        card_id: &str,
    ) -> Result<Authed<DeleteContentResponse>, YotoError> {
        let url = self.api_url(&format!("/content/{}", card_id), &[])?;
        let request = ApiRequest {
            method: Method::DELETE,
            url,
            body: Body::Empty,
        };
        self.send(credentials, request).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        credentials: &Credentials,
        path: &str,
        body: Value,
    ) -> Result<Authed<T>, YotoError> {
        let url = self.api_url(path, &[])?;
        let request = ApiRequest {
            method: Method::POST,
            url,
            body: Body::Json(body),
        };
        self.send(credentials, request).await
    }

    // ============ Icons ============

    pub async fn public_icons(
        &self,
        credentials: &Credentials,
    ) -> Result<Authed<DisplayIconsResponse>, YotoError> {
        let url = self.api_url("/media/displayIcons/user/yoto", &[])?;
        self.send(credentials, ApiRequest::get(url)).await
    }

    /// Icons uploaded by `user_id`, or by the current user when `None`.
    pub async fn user_icons(
        &self,
        credentials: &Credentials,
        user_id: Option<&str>,
    ) -> Result<Authed<DisplayIconsResponse>, YotoError> {
        let path = format!("/media/displayIcons/user/{}", user_id.unwrap_or("me"));
        let url = self.api_url(&path, &[])?;
        self.send(credentials, ApiRequest::get(url)).await
    }

    pub async fn upload_icon(
        &self,
        credentials: &Credentials,
        bytes: Vec<u8>,
        options: &UploadIconOptions,
    ) -> Result<Authed<UploadIconResponse>, YotoError> {
        let auto_convert = options.auto_convert.map(|b| b.to_string());
        let mut query = Vec::new();
        if let Some(auto_convert) = auto_convert.as_deref() {
            query.push(("autoConvert", auto_convert));
        }
        if let Some(filename) = options.filename.as_deref() {
            query.push(("filename", filename));
        }

        let url = self.api_url("/media/displayIcons/user/me/upload", &query)?;
        let request = ApiRequest {
            method: Method::POST,
            url,
            body: Body::Raw {
                content_type: options.mime_type(),
                bytes,
            },
        };
        self.send(credentials, request).await
    }

    // ============ Media upload ============

    pub async fn audio_upload_url(
        &self,
        credentials: &Credentials,
        sha256: &str,
        filename: Option<&str>,
    ) -> Result<Authed<UploadUrlResponse>, YotoError> {
        let mut query = vec![("sha256", sha256)];
        if let Some(filename) = filename {
            query.push(("filename", filename));
        }
        let url = self.api_url("/media/transcode/audio/uploadUrl", &query)?;
        self.send(credentials, ApiRequest::get(url)).await
    }

    /// PUT raw bytes to a pre-signed upload URL. No bearer token is sent.
    pub async fn upload_file(&self, upload_url: &str, bytes: Vec<u8>) -> Result<(), YotoError> {
        debug!("Uploading {} bytes", bytes.len());
        let response = self.http.put(upload_url).body(bytes).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(YotoError::Api {
                status: status.as_u16(),
                message: format!("Failed to upload file: {}", status.as_u16()),
            });
        }
        Ok(())
    }

    pub async fn transcoded_audio(
        &self,
        credentials: &Credentials,
        upload_id: &str,
    ) -> Result<Authed<TranscodedAudioResponse>, YotoError> {
        let path = format!("/media/upload/{}/transcoded", upload_id);
        let url = self.api_url(&path, &[("loudnorm", "false")])?;
        self.send(credentials, ApiRequest::get(url)).await
    }

    // ============ Devices ============

    pub async fn devices(
        &self,
        credentials: &Credentials,
    ) -> Result<Authed<DevicesResponse>, YotoError> {
        let url = self.api_url("/device-v2/devices/mine", &[])?;
        self.send(credentials, ApiRequest::get(url)).await
    }

    pub async fn device_status(
        &self,
        credentials: &Credentials,
        device_id: &str,
    ) -> Result<Authed<DeviceStatus>, YotoError> {
        let url = self.api_url(&format!("/device-v2/{}/status", device_id), &[])?;
        self.send(credentials, ApiRequest::get(url)).await
    }

    pub async fn send_device_command(
        &self,
        credentials: &Credentials,
        device_id: &str,
        command: DeviceCommand,
    ) -> Result<Authed<()>, YotoError> {
        let path = format!("/device-v2/{}/command", device_id);
        let reply: Authed<Value> = self.post_json(credentials, &path, command.to_body()).await?;
        Ok(reply.map(|_| ()))
    }
}

fn grant(credentials: &Credentials, response: TokenResponse) -> TokenGrant {
    let credentials = credentials.with_tokens(TokenPair::from(&response));
    TokenGrant {
        response,
        credentials,
    }
}

fn join(base: &str, path: &str, query: &[(&str, &str)]) -> Result<Url, YotoError> {
    let mut url = Url::parse(&format!("{}{}", base.trim_end_matches('/'), path))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// Parse a 2xx body; an empty body is treated as JSON `null`.
fn parse_body<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, YotoError> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(schema(endpoint))
}

fn schema(endpoint: &str) -> impl FnOnce(serde_json::Error) -> YotoError + '_ {
    move |source| YotoError::Schema {
        endpoint: endpoint.to_string(),
        source,
    }
}

fn api_error(status: StatusCode, body: &str) -> YotoError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("API request failed: {}", status.as_u16()));

    YotoError::Api {
        status: status.as_u16(),
        message,
    }
}
