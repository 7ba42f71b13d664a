//! Player listing, status, and remote commands.

use anyhow::Result;
use yoto_core::model::DeviceCommand;

use crate::context::Session;
use crate::output;

pub async fn list(mut session: Session, json: bool) -> Result<()> {
    let response = session.client.devices(session.credentials()).await;
    let devices = session.settle(response)?.devices;

    if json {
        return output::json(&devices);
    }

    if devices.is_empty() {
        output::info("No devices found.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = devices
        .iter()
        .map(|device| {
            vec![
                device.name.clone(),
                device.device_id.clone(),
                device.device_type.clone().unwrap_or_else(|| "-".to_string()),
                if device.online { "Yes" } else { "No" }.to_string(),
            ]
        })
        .collect();
    output::table(&["Name", "Device ID", "Type", "Online"], &rows);
    Ok(())
}

pub async fn status(mut session: Session, device_id: &str, json: bool) -> Result<()> {
    let response = session
        .client
        .device_status(session.credentials(), device_id)
        .await;
    let status = session.settle(response)?;

    if json {
        return output::json(&status);
    }

    println!("\nDevice Status: {}", device_id);
    if let Some(player_status) = &status.player_status {
        println!("  Status: {}", player_status);
    }
    if let Some(card_id) = &status.card_id {
        println!("  Playing Card: {}", card_id);
    }
    if let Some(chapter_key) = &status.chapter_key {
        println!("  Chapter: {}", chapter_key);
    }
    if let Some(track_key) = &status.track_key {
        println!("  Track: {}", track_key);
    }
    if let Some(volume) = status.volume {
        println!("  Volume: {}%", volume);
    }
    if let Some(battery) = status.battery_level {
        println!("  Battery: {}%", battery);
    }
    Ok(())
}

pub async fn command(
    mut session: Session,
    device_id: &str,
    command: &str,
    value: Option<&str>,
) -> Result<()> {
    let command = DeviceCommand::parse(command, value)?;

    let sent = session
        .client
        .send_device_command(session.credentials(), device_id, command)
        .await;
    session.settle(sent)?;

    output::success(&format!("Sent {} command to device", command));
    Ok(())
}
