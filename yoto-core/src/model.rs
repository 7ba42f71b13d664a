//! Wire types for the Yoto OAuth and REST APIs.
//!
//! Card documents are pushed back whole after every edit, so every level of
//! the card keeps the fields it does not model in an `extra` map.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::YotoError;

/// Poll interval used when the server omits one.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

// ============ OAuth ============

/// Response to a device authorization request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    /// The device verification code (keep this secret).
    pub device_code: String,

    /// The code the user types at `verification_uri`.
    pub user_code: String,

    pub verification_uri: String,

    /// `verification_uri` with the user code embedded.
    pub verification_uri_complete: String,

    /// Seconds until the device code expires.
    pub expires_in: u64,

    /// Minimum seconds between polls.
    #[serde(default)]
    pub interval: Option<u64>,
}

impl DeviceCodeResponse {
    pub fn poll_interval_secs(&self) -> u64 {
        match self.interval {
            Some(secs) if secs > 0 => secs,
            _ => DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

/// Successful token exchange or refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// OAuth error payload (`{"error": ..., "error_description": ...}`).
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// REST error payload (`{"error": {"message": ...}}`).
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub error: Option<ApiErrorDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ApiErrorDetail {
    #[serde(default)]
    pub message: Option<String>,
}

// ============ Content ============

/// A playlist document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub card_id: String,
    pub title: String,
    #[serde(default)]
    pub metadata: CardMetadata,
    pub content: CardContent,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardContent {
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playback_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub key: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub key: String,
    pub title: String,
    pub track_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Length in seconds.
    #[serde(
        default,
        deserialize_with = "whole_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_end: Option<OnEnd>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Round a length in seconds to whole seconds; negatives become zero.
pub(crate) fn round_seconds(secs: f64) -> u64 {
    secs.round().max(0.0) as u64
}

/// Track lengths sometimes arrive fractional.
fn whole_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.map(round_seconds))
}

/// What the player does when a track finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnEnd {
    /// Continue to the next track.
    None,
    /// Pause and wait for a button press.
    Stop,
    /// Loop the track.
    Repeat,
}

impl FromStr for OnEnd {
    type Err = YotoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "stop" => Ok(Self::Stop),
            "repeat" => Ok(Self::Repeat),
            other => Err(YotoError::validation(format!(
                "Unknown on-end action: {}. Available: none, stop, repeat",
                other
            ))),
        }
    }
}

/// Row in the playlist listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSummary {
    pub card_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListContentResponse {
    pub cards: Vec<CardSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetContentResponse {
    pub card: Card,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteContentResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of a create request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateContentRequest {
    pub title: String,
    pub content: CardContent,
    pub metadata: CardMetadata,
}

/// Body of an update request; the whole document is replaced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContentRequest {
    pub card_id: String,
    pub title: String,
    pub content: CardContent,
    pub metadata: CardMetadata,
}

impl From<&Card> for UpdateContentRequest {
    fn from(card: &Card) -> Self {
        Self {
            card_id: card.card_id.clone(),
            title: card.title.clone(),
            content: card.content.clone(),
            metadata: card.metadata.clone(),
        }
    }
}

/// Options for [`get_content`](crate::YotoClient::get_content).
#[derive(Debug, Clone, Default)]
pub struct GetContentOptions {
    pub timezone: Option<String>,
    /// Ask for signed, playable track URLs.
    pub playable: bool,
}

// ============ Icons ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayIcon {
    pub display_icon_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub public_tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DisplayIcon {
    /// Case-insensitive substring match against the public tags.
    pub fn has_tag(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.public_tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayIconsResponse {
    pub display_icons: Vec<DisplayIcon>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadIconResponse {
    pub display_icon: DisplayIcon,
}

/// Options for [`upload_icon`](crate::YotoClient::upload_icon).
#[derive(Debug, Clone, Default)]
pub struct UploadIconOptions {
    pub filename: Option<String>,
    pub auto_convert: Option<bool>,
}

impl UploadIconOptions {
    /// Content type inferred from the filename extension.
    pub fn mime_type(&self) -> &'static str {
        let name = self.filename.as_deref().unwrap_or("icon.png");
        if name.ends_with(".png") {
            "image/png"
        } else if name.ends_with(".gif") {
            "image/gif"
        } else {
            "image/jpeg"
        }
    }
}

// ============ Media upload ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadUrlResponse {
    pub upload: UploadTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    pub upload_id: String,
    /// Absent when the server already has content with this hash.
    #[serde(default)]
    pub upload_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodedAudioResponse {
    pub transcode: Transcode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcoded_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcoded_info: Option<TranscodedInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<TranscodeProgress>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodedInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeProgress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

// ============ Devices ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub online: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Playback command sent to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    Volume(u8),
}

impl DeviceCommand {
    pub const DEFAULT_VOLUME: u8 = 50;

    /// Parse a command name plus the optional value used by `volume`.
    pub fn parse(name: &str, value: Option<&str>) -> Result<Self, YotoError> {
        match name.to_ascii_lowercase().as_str() {
            "play" => Ok(Self::Play),
            "pause" => Ok(Self::Pause),
            "stop" => Ok(Self::Stop),
            "next" => Ok(Self::Next),
            "previous" => Ok(Self::Previous),
            "volume" => {
                let level = match value {
                    Some(v) => v.trim().parse::<u8>().map_err(|_| {
                        YotoError::validation(format!("Invalid volume: {}", v))
                    })?,
                    None => Self::DEFAULT_VOLUME,
                };
                Ok(Self::Volume(level))
            }
            other => Err(YotoError::validation(format!(
                "Unknown command: {}. Available: play, pause, stop, next, previous, volume",
                other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::Volume(_) => "volume",
        }
    }

    /// JSON body for the command endpoint.
    pub fn to_body(&self) -> Value {
        match self {
            Self::Volume(level) => serde_json::json!({ "command": "volume", "value": level }),
            other => serde_json::json!({ "command": other.name() }),
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
