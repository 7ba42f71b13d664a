//! Audio upload, transcode status, and one-step import.

use anyhow::Result;
use serde_json::json;
use std::path::Path;
use yoto_core::editor::import_track;
use yoto_core::transcode::upload_audio;
use yoto_core::{TokioClock, TranscodeState, YotoError};

use crate::context::Session;
use crate::output;

fn report_progress(quiet: bool) -> impl FnMut(&TranscodeState) {
    move |state| {
        if quiet {
            return;
        }
        if let TranscodeState::InProgress { phase, percent } = state {
            let phase = phase.as_deref().unwrap_or("waiting");
            match percent {
                Some(p) => output::progress(&format!("  {} {:.0}%\n", phase, p)),
                None => output::progress(&format!("  {}\n", phase)),
            }
        }
    }
}

pub async fn upload(mut session: Session, file: &Path, json: bool, no_wait: bool) -> Result<()> {
    let uploaded = upload_audio(&session.client, session.credentials(), file).await;
    let upload = session.settle(uploaded)?;

    if no_wait {
        if json {
            return output::json(&upload);
        }
        output::success(&format!("Uploaded {}", file.display()));
        output::info(&format!("Upload ID: {}", upload.upload_id));
        output::info(&format!(
            "Check status with: yoto track:transcode-status {}",
            upload.upload_id
        ));
        return Ok(());
    }

    if !json {
        output::info("Waiting for transcoding...");
    }

    let client = session.client.clone();
    let poller = session.settings.polling.transcode_poller(&client, &TokioClock);
    let waited = poller
        .wait(session.credentials(), &upload.upload_id, report_progress(json))
        .await;
    let track = session.settle(waited)?;

    if json {
        return output::json(&track);
    }

    output::success("Transcoding complete");
    output::info(&format!("Track URL: {}", track.track_url));
    if let Some(duration) = track.duration {
        output::info(&format!("Duration: {}", output::format_duration(duration)));
    }
    Ok(())
}

pub async fn transcode_status(
    mut session: Session,
    upload_id: &str,
    json: bool,
    wait: bool,
) -> Result<()> {
    let client = session.client.clone();
    let poller = session.settings.polling.transcode_poller(&client, &TokioClock);

    let state = if wait {
        let waited = poller
            .wait(session.credentials(), upload_id, report_progress(json))
            .await;
        TranscodeState::Complete(session.settle(waited)?)
    } else {
        let checked = poller.check(session.credentials(), upload_id).await;
        session.settle(checked)?
    };

    match state {
        TranscodeState::Complete(track) => {
            if json {
                return output::json(&json!({ "status": "complete", "track": track }));
            }
            output::success("Transcoding complete");
            output::info(&format!("Track URL: {}", track.track_url));
            if let Some(duration) = track.duration {
                output::info(&format!("Duration: {}", output::format_duration(duration)));
            }
        }
        TranscodeState::InProgress { phase, percent } => {
            if json {
                return output::json(&json!({
                    "status": "in_progress",
                    "uploadId": upload_id,
                    "phase": phase,
                    "percent": percent,
                }));
            }
            let phase = phase.as_deref().unwrap_or("waiting");
            match percent {
                Some(p) => output::info(&format!("Transcoding in progress: {} ({:.0}%)", phase, p)),
                None => output::info(&format!("Transcoding in progress: {}", phase)),
            }
        }
        TranscodeState::Failed { phase } => {
            return Err(YotoError::TranscodeFailed {
                upload_id: upload_id.to_string(),
                phase,
            }
            .into());
        }
    }
    Ok(())
}

pub async fn import(
    mut session: Session,
    card_id: &str,
    title: &str,
    file: &Path,
    icon: Option<String>,
    json: bool,
) -> Result<()> {
    if !json {
        output::info(&format!("Uploading {}...", file.display()));
    }

    let client = session.client.clone();
    let poller = session.settings.polling.transcode_poller(&client, &TokioClock);
    let imported = import_track(
        &client,
        &poller,
        session.credentials(),
        card_id,
        title,
        file,
        icon,
        report_progress(json),
    )
    .await;
    let imported = session.settle(imported)?;

    if json {
        return output::json(&imported);
    }

    output::success(&format!(
        "Imported \"{}\" as chapter {} of playlist {}",
        title, imported.chapter_index, imported.card_id
    ));
    output::info(&format!("Track URL: {}", imported.transcoded.track_url));
    Ok(())
}
