//! Playlist, chapter, and track commands.

use anyhow::Result;
use yoto_core::editor::{
    ChapterChanges, NewChapter, NewPlaylist, NewTrack, PlaylistChanges, TrackChanges,
};
use yoto_core::model::{Card, GetContentOptions, OnEnd};
use yoto_core::Editor;

use crate::context::Session;
use crate::output;

pub async fn list(mut session: Session, json: bool) -> Result<()> {
    let listing = session
        .client
        .list_content(session.credentials(), false)
        .await;
    let cards = session.settle(listing)?.cards;

    if json {
        return output::json(&cards);
    }

    if cards.is_empty() {
        output::info("No playlists found.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = cards
        .iter()
        .map(|card| {
            vec![
                card.title.clone(),
                card.card_id.clone(),
                card.updated_at
                    .as_deref()
                    .map(output::format_date)
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    output::table(&["Title", "Card ID", "Updated"], &rows);
    Ok(())
}

pub async fn show(mut session: Session, card_id: &str, playable: bool, json: bool) -> Result<()> {
    let options = GetContentOptions {
        playable,
        ..Default::default()
    };
    let response = session
        .client
        .get_content(session.credentials(), card_id, &options)
        .await;
    let card = session.settle(response)?.card;

    if json {
        return output::json(&card);
    }

    print_card(&card, playable);
    Ok(())
}

fn print_card(card: &Card, playable: bool) {
    println!("\nTitle: {}", card.title);
    println!("Card ID: {}", card.card_id);
    if let Some(author) = &card.metadata.author {
        println!("Author: {}", author);
    }
    if let Some(description) = &card.metadata.description {
        println!("Description: {}", description);
    }
    println!("\nChapters ({}):", card.content.chapters.len());

    for (i, chapter) in card.content.chapters.iter().enumerate() {
        println!("\n  [{}] {}", i, chapter.title);
        if let Some(icon) = &chapter.icon {
            println!("      Icon: {}", icon);
        }
        println!("      Tracks ({}):", chapter.tracks.len());
        for (j, track) in chapter.tracks.iter().enumerate() {
            let duration = track
                .duration
                .map(|d| format!(" ({})", output::format_duration(d)))
                .unwrap_or_default();
            println!("        [{}] {}{}", j, track.title, duration);
            if playable {
                println!("            URL: {}", track.track_url);
            }
        }
    }
}

pub async fn create(
    mut session: Session,
    title: String,
    description: Option<String>,
    author: Option<String>,
) -> Result<()> {
    let created = Editor::new(&session.client)
        .create_playlist(
            session.credentials(),
            NewPlaylist {
                title,
                description,
                author,
            },
        )
        .await;
    let card = session.settle(created)?;

    output::success(&format!("Created playlist: {}", card.title));
    output::info(&format!("Card ID: {}", card.card_id));
    Ok(())
}

pub async fn edit(mut session: Session, card_id: &str, changes: PlaylistChanges) -> Result<()> {
    let updated = Editor::new(&session.client)
        .update_playlist(session.credentials(), card_id, changes)
        .await;
    let card = session.settle(updated)?;

    output::success(&format!("Updated playlist: {}", card.title));
    Ok(())
}

pub async fn delete(mut session: Session, card_id: &str) -> Result<()> {
    let deleted = Editor::new(&session.client)
        .delete_playlist(session.credentials(), card_id)
        .await;
    session.settle(deleted)?;

    output::success(&format!("Deleted playlist: {}", card_id));
    Ok(())
}

pub async fn add_chapter(
    mut session: Session,
    card_id: &str,
    title: String,
    icon: Option<String>,
) -> Result<()> {
    let added = Editor::new(&session.client)
        .add_chapter(
            session.credentials(),
            card_id,
            NewChapter {
                title: title.clone(),
                icon,
            },
        )
        .await;
    let index = session.settle(added)?;

    output::success(&format!("Added chapter \"{}\" to playlist (index {})", title, index));
    Ok(())
}

pub async fn update_chapter(
    mut session: Session,
    card_id: &str,
    chapter_index: usize,
    changes: ChapterChanges,
) -> Result<()> {
    let updated = Editor::new(&session.client)
        .update_chapter(session.credentials(), card_id, chapter_index, changes)
        .await;
    let chapter = session.settle(updated)?;

    output::success(&format!("Updated chapter \"{}\"", chapter.title));
    Ok(())
}

pub async fn delete_chapter(mut session: Session, card_id: &str, chapter_index: usize) -> Result<()> {
    let deleted = Editor::new(&session.client)
        .delete_chapter(session.credentials(), card_id, chapter_index)
        .await;
    let chapter = session.settle(deleted)?;

    output::success(&format!("Deleted chapter \"{}\"", chapter.title));
    Ok(())
}

pub async fn add_track(
    mut session: Session,
    card_id: &str,
    chapter_index: usize,
    track: NewTrack,
) -> Result<()> {
    let added = Editor::new(&session.client)
        .add_track(session.credentials(), card_id, chapter_index, track)
        .await;
    let edit = session.settle(added)?;

    output::success(&format!(
        "Added track \"{}\" to chapter \"{}\"",
        edit.track.title, edit.chapter_title
    ));
    Ok(())
}

pub async fn update_track(
    mut session: Session,
    card_id: &str,
    chapter_index: usize,
    track_index: usize,
    changes: TrackChanges,
) -> Result<()> {
    let updated = Editor::new(&session.client)
        .update_track(
            session.credentials(),
            card_id,
            chapter_index,
            track_index,
            changes,
        )
        .await;
    let edit = session.settle(updated)?;

    output::success(&format!("Updated track \"{}\"", edit.track.title));
    if let Some(on_end) = edit.track.on_end {
        let behaviour = match on_end {
            OnEnd::None => "continue to next track",
            OnEnd::Stop => "pause after track",
            OnEnd::Repeat => "loop track",
        };
        output::info(&format!("On end: {}", behaviour));
    }
    Ok(())
}

pub async fn delete_track(
    mut session: Session,
    card_id: &str,
    chapter_index: usize,
    track_index: usize,
) -> Result<()> {
    let deleted = Editor::new(&session.client)
        .delete_track(session.credentials(), card_id, chapter_index, track_index)
        .await;
    let edit = session.settle(deleted)?;

    output::success(&format!(
        "Deleted track \"{}\" from chapter \"{}\"",
        edit.track.title, edit.chapter_title
    ));
    Ok(())
}
