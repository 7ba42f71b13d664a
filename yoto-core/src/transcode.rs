//! Audio upload and transcode polling.
//!
//! After an audio file is uploaded the server transcodes it in the
//! background. [`TranscodePoller`] queries the job until it completes, fails,
//! or runs out of attempts. [`classify`] is the single place that decides
//! what a status response means, used both by the poller and by one-shot
//! status checks.

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::client::{Authed, CredentialChain, YotoClient};
use crate::clock::Clock;
use crate::credentials::Credentials;
use crate::error::YotoError;
use crate::model::{Transcode, TranscodedAudioResponse, round_seconds};

pub const DEFAULT_TRANSCODE_INTERVAL: Duration = Duration::from_secs(5);

/// Sixty attempts at five seconds is roughly five minutes.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;

const COMPLETE_PHASE: &str = "complete";
const IN_PROGRESS_PHASES: [&str; 3] = ["queued", "processing", "transcoding"];

/// A finished transcode, ready to be used as a track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodedTrack {
    pub upload_id: String,
    pub sha256: String,
    /// `yoto:#<sha256>`
    pub track_url: String,
    /// Length in whole seconds.
    pub duration: Option<u64>,
    pub file_size: Option<u64>,
}

/// What a transcode status response means.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeState {
    Complete(TranscodedTrack),
    InProgress {
        phase: Option<String>,
        percent: Option<f64>,
    },
    Failed {
        phase: String,
    },
}

/// Track URL for transcoded content.
pub fn track_url(sha256: &str) -> String {
    format!("yoto:#{}", sha256)
}

/// Interpret a transcode status.
///
/// Complete when the phase is `complete` or a transcoded hash is present;
/// failed when the phase is anything other than a known in-progress phase.
pub fn classify(upload_id: &str, transcode: &Transcode) -> Result<TranscodeState, YotoError> {
    let phase = transcode
        .progress
        .as_ref()
        .and_then(|p| p.phase.as_deref());

    if phase == Some(COMPLETE_PHASE) || transcode.transcoded_sha256.is_some() {
        let sha256 = transcode
            .transcoded_sha256
            .clone()
            .ok_or_else(|| YotoError::Api {
                status: 200,
                message: format!(
                    "Transcode of {} reported complete without a content hash",
                    upload_id
                ),
            })?;

        let info = transcode.transcoded_info.as_ref();
        return Ok(TranscodeState::Complete(TranscodedTrack {
            upload_id: upload_id.to_string(),
            track_url: track_url(&sha256),
            sha256,
            duration: info
                .and_then(|i| i.duration)
                .map(round_seconds),
            file_size: info.and_then(|i| i.file_size),
        }));
    }

    match phase {
        Some(p) if !IN_PROGRESS_PHASES.contains(&p) => Ok(TranscodeState::Failed {
            phase: p.to_string(),
        }),
        _ => Ok(TranscodeState::InProgress {
            phase: phase.map(str::to_string),
            percent: transcode.progress.as_ref().and_then(|p| p.percent),
        }),
    }
}

/// Source of transcode status responses.
#[async_trait]
pub trait TranscodeSource: Send + Sync {
    async fn transcoded_audio(
        &self,
        credentials: &Credentials,
        upload_id: &str,
    ) -> Result<Authed<TranscodedAudioResponse>, YotoError>;
}

#[async_trait]
impl TranscodeSource for YotoClient {
    async fn transcoded_audio(
        &self,
        credentials: &Credentials,
        upload_id: &str,
    ) -> Result<Authed<TranscodedAudioResponse>, YotoError> {
        YotoClient::transcoded_audio(self, credentials, upload_id).await
    }
}

/// Polls a transcode job at a fixed interval with a bounded number of attempts.
pub struct TranscodePoller<'a, S: ?Sized, C: ?Sized> {
    source: &'a S,
    clock: &'a C,
    interval: Duration,
    max_attempts: u32,
}

impl<'a, S, C> TranscodePoller<'a, S, C>
where
    S: TranscodeSource + ?Sized,
    C: Clock + ?Sized,
{
    pub fn new(source: &'a S, clock: &'a C) -> Self {
        Self {
            source,
            clock,
            interval: DEFAULT_TRANSCODE_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Query the job once.
    pub async fn check(
        &self,
        credentials: &Credentials,
        upload_id: &str,
    ) -> Result<Authed<TranscodeState>, YotoError> {
        let mut chain = CredentialChain::new(credentials.clone());
        let response = self.source.transcoded_audio(credentials, upload_id).await;
        let response = chain.take(response)?;
        let state = classify(upload_id, &response.transcode).map_err(|e| chain.fail(e))?;
        Ok(chain.finish(state))
    }

    /// Poll until the job completes.
    ///
    /// `on_progress` is called with every in-progress state.
    ///
    /// # Errors
    ///
    /// - [`YotoError::TranscodeFailed`] when the job reaches a failure phase
    /// - [`YotoError::Timeout`] when `max_attempts` queries all report in-progress
    pub async fn wait<F>(
        &self,
        credentials: &Credentials,
        upload_id: &str,
        mut on_progress: F,
    ) -> Result<Authed<TranscodedTrack>, YotoError>
    where
        F: FnMut(&TranscodeState),
    {
        let mut chain = CredentialChain::new(credentials.clone());

        for attempt in 1..=self.max_attempts {
            let checked = self.check(chain.current(), upload_id).await;
            let state = chain.take(checked)?;

            match state {
                TranscodeState::Complete(track) => {
                    info!(upload_id, attempt, "Transcode complete");
                    return Ok(chain.finish(track));
                }
                TranscodeState::Failed { phase } => {
                    return Err(chain.fail(YotoError::TranscodeFailed {
                        upload_id: upload_id.to_string(),
                        phase,
                    }));
                }
                in_progress => {
                    debug!(upload_id, attempt, state = ?in_progress, "Transcode in progress");
                    on_progress(&in_progress);
                }
            }

            if attempt < self.max_attempts {
                self.clock.sleep(self.interval).await;
            }
        }

        Err(chain.fail(YotoError::Timeout {
            message: format!(
                "Transcoding of {} did not finish after {} attempts",
                upload_id, self.max_attempts
            ),
        }))
    }
}

/// An audio file accepted by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioUpload {
    pub upload_id: String,
    pub sha256: String,
    /// False when the server already had this content and no bytes were sent.
    pub uploaded: bool,
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hash the file, request an upload URL, and upload the bytes if needed.
pub async fn upload_audio(
    client: &YotoClient,
    credentials: &Credentials,
    path: &Path,
) -> Result<Authed<AudioUpload>, YotoError> {
    let bytes = tokio::fs::read(path).await?;
    let sha256 = sha256_hex(&bytes);
    let filename = path.file_name().and_then(|n| n.to_str());
    debug!(?path, %sha256, size = bytes.len(), "Prepared audio upload");

    let mut chain = CredentialChain::new(credentials.clone());
    let target = client
        .audio_upload_url(credentials, &sha256, filename)
        .await;
    let target = chain.take(target)?.upload;

    let uploaded = match target.upload_url.as_deref() {
        Some(url) => {
            client
                .upload_file(url, bytes)
                .await
                .map_err(|e| chain.fail(e))?;
            true
        }
        None => {
            info!(%sha256, "Content already uploaded, skipping transfer");
            false
        }
    };

    Ok(chain.finish(AudioUpload {
        upload_id: target.upload_id,
        sha256,
        uploaded,
    }))
}
