//! Display icon listing and upload.

use anyhow::{Context, Result};
use std::path::Path;
use yoto_core::model::{DisplayIcon, UploadIconOptions};

use crate::context::Session;
use crate::output;

pub async fn list_public(mut session: Session, tag: Option<&str>, json: bool) -> Result<()> {
    let response = session.client.public_icons(session.credentials()).await;
    let mut icons = session.settle(response)?.display_icons;

    if let Some(tag) = tag {
        icons.retain(|icon| icon.has_tag(tag));
    }

    if json {
        return output::json(&icons);
    }

    if icons.is_empty() {
        output::info("No icons found.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = icons
        .iter()
        .map(|icon| {
            vec![
                icon.title.clone().unwrap_or_default(),
                icon.display_icon_id.clone(),
                icon.public_tags.join(", "),
            ]
        })
        .collect();
    output::table(&["Title", "ID", "Tags"], &rows);
    Ok(())
}

pub async fn list_mine(mut session: Session, json: bool) -> Result<()> {
    let response = session
        .client
        .user_icons(session.credentials(), None)
        .await;
    let icons = session.settle(response)?.display_icons;

    if json {
        return output::json(&icons);
    }

    if icons.is_empty() {
        output::info("No custom icons found.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = icons
        .iter()
        .map(|icon: &DisplayIcon| {
            vec![
                icon.display_icon_id.clone(),
                icon.url.clone().unwrap_or_default(),
            ]
        })
        .collect();
    output::table(&["ID", "URL"], &rows);
    Ok(())
}

pub async fn upload(mut session: Session, file: &Path, no_convert: bool, json: bool) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let options = UploadIconOptions {
        filename: file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string),
        auto_convert: Some(!no_convert),
    };

    let response = session
        .client
        .upload_icon(session.credentials(), bytes, &options)
        .await;
    let icon = session.settle(response)?.display_icon;

    if json {
        return output::json(&icon);
    }

    output::success(&format!("Uploaded icon: {}", icon.display_icon_id));
    if let Some(url) = icon.url.as_deref().filter(|u| !u.is_empty()) {
        output::info(&format!("URL: {}", url));
    }
    if let Some(media_id) = &icon.media_id {
        output::info(&format!("Use as icon with: yoto:#{}", media_id));
    }
    Ok(())
}
