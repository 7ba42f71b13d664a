//! `login`, `logout`, `status`.

use anyhow::{Context, Result};
use tracing::debug;
use yoto_core::{DeviceFlow, FlowEvent, TokioClock, YotoClient};

use crate::config::Settings;
use crate::context::Session;
use crate::output;

pub async fn login(settings: Settings) -> Result<()> {
    let store = settings.credential_store()?;
    let client = YotoClient::new(settings.api.clone());

    output::info("Starting device authorization flow...");

    let flow = DeviceFlow::new(&client, &TokioClock, settings.client_id.as_str())
        .with_slow_down_increment(settings.polling.slow_down_increment());

    let grant = flow
        .run(|event| match event {
            FlowEvent::Started(device) => {
                println!("\nTo authorize this CLI:");
                println!("1. Go to: {}", device.verification_uri_complete);
                println!(
                    "   Or visit {} and enter code: {}",
                    device.verification_uri, device.user_code
                );
                println!("\n2. Log in with your Yoto account and approve access\n");
                output::info("Waiting for authorization...");
            }
            FlowEvent::Pending => output::progress("."),
            FlowEvent::SlowDown { interval } => {
                debug!("Poll interval now {}s", interval.as_secs());
                output::progress(".");
            }
        })
        .await;
    output::progress("\n");
    let grant = grant?;

    store
        .save(&grant.credentials)
        .with_context(|| format!("Failed to save credentials to {:?}", store.path()))?;

    output::success("Successfully logged in!");
    output::info(&format!("Credentials saved to {}", store.path().display()));
    Ok(())
}

pub async fn logout(settings: Settings) -> Result<()> {
    let store = settings.credential_store()?;
    store
        .clear()
        .with_context(|| format!("Failed to clear credentials at {:?}", store.path()))?;
    output::success("Logged out. Credentials removed.");
    Ok(())
}

/// Report whether stored credentials still work. Never fails on a bad token.
pub async fn status(settings: Settings) -> Result<()> {
    let mut session = match Session::open(settings) {
        Ok(session) => session,
        Err(_) => {
            output::info("Not logged in. Run 'yoto login' to authenticate.");
            return Ok(());
        }
    };

    let checked = session
        .client
        .list_content(session.credentials(), false)
        .await;

    match session.settle(checked) {
        Ok(_) => {
            output::success("Logged in and token is valid.");
        }
        Err(e) => {
            debug!("Token check failed: {}", e);
            output::error("Token may be expired. Try 'yoto login' to re-authenticate.");
        }
    }
    Ok(())
}
