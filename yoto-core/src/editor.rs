//! Read-modify-write editing of playlist cards.
//!
//! The API has no partial update: every edit fetches the whole card, changes
//! one chapter or track by its 0-based position, and pushes the whole
//! document back. There is no concurrency token, so two editors working on
//! the same card race and the last push wins.
//!
//! Index validation happens before the push, so an out-of-range edit never
//! writes anything.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

use crate::client::{Authed, CredentialChain, YotoClient};
use crate::clock::Clock;
use crate::credentials::Credentials;
use crate::error::YotoError;
use crate::model::{
    Card, CardContent, CardMetadata, Chapter, CreateContentRequest, DeleteContentResponse,
    GetContentOptions, OnEnd, Track, UpdateContentRequest,
};
use crate::transcode::{self, TranscodePoller, TranscodeState, TranscodedTrack};

/// Playback type of newly created playlists.
pub const DEFAULT_PLAYBACK_TYPE: &str = "linear";

/// Whole-document storage for cards.
#[async_trait]
pub trait CardRepository: Send + Sync {
    async fn fetch_card(
        &self,
        credentials: &Credentials,
        card_id: &str,
    ) -> Result<Authed<Card>, YotoError>;

    /// Replace the stored card with `card`.
    async fn push_card(
        &self,
        credentials: &Credentials,
        card: &Card,
    ) -> Result<Authed<Card>, YotoError>;

    async fn create_card(
        &self,
        credentials: &Credentials,
        request: &CreateContentRequest,
    ) -> Result<Authed<Card>, YotoError>;

    async fn delete_card(
        &self,
        credentials: &Credentials,
        card_id: &str,
    ) -> Result<Authed<DeleteContentResponse>, YotoError>;
}

#[async_trait]
impl CardRepository for YotoClient {
    async fn fetch_card(
        &self,
        credentials: &Credentials,
        card_id: &str,
    ) -> Result<Authed<Card>, YotoError> {
        let response = self
            .get_content(credentials, card_id, &GetContentOptions::default())
            .await?;
        Ok(response.map(|r| r.card))
    }

    async fn push_card(
        &self,
        credentials: &Credentials,
        card: &Card,
    ) -> Result<Authed<Card>, YotoError> {
        let response = self
            .update_content(credentials, &UpdateContentRequest::from(card))
            .await?;
        Ok(response.map(|r| r.card))
    }

    async fn create_card(
        &self,
        credentials: &Credentials,
        request: &CreateContentRequest,
    ) -> Result<Authed<Card>, YotoError> {
        let response = self.create_content(credentials, request).await?;
        Ok(response.map(|r| r.card))
    }

    async fn delete_card(
        &self,
        credentials: &Credentials,
        card_id: &str,
    ) -> Result<Authed<DeleteContentResponse>, YotoError> {
        self.delete_content(credentials, card_id).await
    }
}

/// Key for a new chapter or track, e.g. `chapter-1718000000000`.
pub fn new_key(prefix: &str) -> String {
    format!("{}-{}", prefix, Utc::now().timestamp_millis())
}

#[derive(Debug, Clone, Default)]
pub struct NewPlaylist {
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PlaylistChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub playback_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewChapter {
    pub title: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ChapterChanges {
    pub title: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewTrack {
    pub title: String,
    pub url: String,
    pub icon: Option<String>,
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct TrackChanges {
    pub title: Option<String>,
    pub icon: Option<String>,
    pub url: Option<String>,
    pub on_end: Option<OnEnd>,
}

/// A track together with the title of the chapter it sits in.
#[derive(Debug, Clone)]
pub struct TrackEdit {
    pub chapter_title: String,
    pub track: Track,
}

impl Chapter {
    pub fn new(new: NewChapter) -> Self {
        Self {
            key: new_key("chapter"),
            title: new.title,
            icon: new.icon,
            tracks: Vec::new(),
            extra: Default::default(),
        }
    }

    pub fn track_mut(&mut self, index: usize) -> Result<&mut Track, YotoError> {
        self.tracks
            .get_mut(index)
            .ok_or_else(|| YotoError::validation(format!("Track {} not found.", index)))
    }
}

impl Track {
    pub fn new(new: NewTrack) -> Self {
        Self {
            key: new_key("track"),
            title: new.title,
            track_url: new.url,
            icon: new.icon,
            duration: new.duration,
            on_end: None,
            extra: Default::default(),
        }
    }
}

impl Card {
    pub fn chapter_mut(&mut self, index: usize) -> Result<&mut Chapter, YotoError> {
        self.content.chapters.get_mut(index).ok_or_else(|| {
            YotoError::validation(format!("Chapter {} not found. Use 0-based index.", index))
        })
    }

    pub fn track_mut(
        &mut self,
        chapter_index: usize,
        track_index: usize,
    ) -> Result<&mut Track, YotoError> {
        self.chapter_mut(chapter_index)?.track_mut(track_index)
    }

    /// Apply only the fields that are set.
    pub fn apply(&mut self, changes: PlaylistChanges) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.metadata.description = Some(description);
        }
        if let Some(author) = changes.author {
            self.metadata.author = Some(author);
        }
        if let Some(playback_type) = changes.playback_type {
            self.content.playback_type = Some(playback_type);
        }
    }
}

fn apply_chapter(chapter: &mut Chapter, changes: ChapterChanges) {
    if let Some(title) = changes.title {
        chapter.title = title;
    }
    if let Some(icon) = changes.icon {
        chapter.icon = Some(icon);
    }
}

fn apply_track(track: &mut Track, changes: TrackChanges) {
    if let Some(title) = changes.title {
        track.title = title;
    }
    if let Some(icon) = changes.icon {
        track.icon = Some(icon);
    }
    if let Some(url) = changes.url {
        track.track_url = url;
    }
    if let Some(on_end) = changes.on_end {
        track.on_end = Some(on_end);
    }
}

/// Card edits over a [`CardRepository`].
pub struct Editor<'a, R: ?Sized> {
    repo: &'a R,
}

impl<'a, R: CardRepository + ?Sized> Editor<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Fetch the card, run `mutate`, and push the result.
    ///
    /// If `mutate` fails nothing is pushed.
    pub async fn edit<T, F>(
        &self,
        credentials: &Credentials,
        card_id: &str,
        mutate: F,
    ) -> Result<Authed<T>, YotoError>
    where
        F: FnOnce(&mut Card) -> Result<T, YotoError>,
    {
        let mut chain = CredentialChain::new(credentials.clone());

        let fetched = self.repo.fetch_card(chain.current(), card_id).await;
        let mut card = chain.take(fetched)?;

        let outcome = mutate(&mut card).map_err(|e| chain.fail(e))?;

        debug!(card_id, chapters = card.content.chapters.len(), "Pushing edited card");
        let pushed = self.repo.push_card(chain.current(), &card).await;
        chain.take(pushed)?;

        Ok(chain.finish(outcome))
    }

    pub async fn create_playlist(
        &self,
        credentials: &Credentials,
        playlist: NewPlaylist,
    ) -> Result<Authed<Card>, YotoError> {
        let request = CreateContentRequest {
            title: playlist.title,
            content: CardContent {
                chapters: Vec::new(),
                playback_type: Some(DEFAULT_PLAYBACK_TYPE.to_string()),
                extra: Default::default(),
            },
            metadata: CardMetadata {
                description: playlist.description,
                author: playlist.author,
                extra: Default::default(),
            },
        };
        self.repo.create_card(credentials, &request).await
    }

    pub async fn update_playlist(
        &self,
        credentials: &Credentials,
        card_id: &str,
        changes: PlaylistChanges,
    ) -> Result<Authed<Card>, YotoError> {
        self.edit(credentials, card_id, |card| {
            card.apply(changes);
            Ok(card.clone())
        })
        .await
    }

    pub async fn delete_playlist(
        &self,
        credentials: &Credentials,
        card_id: &str,
    ) -> Result<Authed<DeleteContentResponse>, YotoError> {
        self.repo.delete_card(credentials, card_id).await
    }

    /// Append a chapter; returns its index.
    pub async fn add_chapter(
        &self,
        credentials: &Credentials,
        card_id: &str,
        chapter: NewChapter,
    ) -> Result<Authed<usize>, YotoError> {
        self.edit(credentials, card_id, |card| {
            card.content.chapters.push(Chapter::new(chapter));
            Ok(card.content.chapters.len() - 1)
        })
        .await
    }

    pub async fn update_chapter(
        &self,
        credentials: &Credentials,
        card_id: &str,
        chapter_index: usize,
        changes: ChapterChanges,
    ) -> Result<Authed<Chapter>, YotoError> {
        self.edit(credentials, card_id, |card| {
            let chapter = card.chapter_mut(chapter_index)?;
            apply_chapter(chapter, changes);
            Ok(chapter.clone())
        })
        .await
    }

    /// Remove a chapter; later chapters shift down by one.
    pub async fn delete_chapter(
        &self,
        credentials: &Credentials,
        card_id: &str,
        chapter_index: usize,
    ) -> Result<Authed<Chapter>, YotoError> {
        self.edit(credentials, card_id, |card| {
            card.chapter_mut(chapter_index)?;
            Ok(card.content.chapters.remove(chapter_index))
        })
        .await
    }

    pub async fn add_track(
        &self,
        credentials: &Credentials,
        card_id: &str,
        chapter_index: usize,
        track: NewTrack,
    ) -> Result<Authed<TrackEdit>, YotoError> {
        self.edit(credentials, card_id, |card| {
            let chapter = card.chapter_mut(chapter_index)?;
            let track = Track::new(track);
            chapter.tracks.push(track.clone());
            Ok(TrackEdit {
                chapter_title: chapter.title.clone(),
                track,
            })
        })
        .await
    }

    pub async fn update_track(
        &self,
        credentials: &Credentials,
        card_id: &str,
        chapter_index: usize,
        track_index: usize,
        changes: TrackChanges,
    ) -> Result<Authed<TrackEdit>, YotoError> {
        self.edit(credentials, card_id, |card| {
            let chapter = card.chapter_mut(chapter_index)?;
            let chapter_title = chapter.title.clone();
            let track = chapter.track_mut(track_index)?;
            apply_track(track, changes);
            Ok(TrackEdit {
                chapter_title,
                track: track.clone(),
            })
        })
        .await
    }

    pub async fn delete_track(
        &self,
        credentials: &Credentials,
        card_id: &str,
        chapter_index: usize,
        track_index: usize,
    ) -> Result<Authed<TrackEdit>, YotoError> {
        self.edit(credentials, card_id, |card| {
            let chapter = card.chapter_mut(chapter_index)?;
            chapter.track_mut(track_index)?;
            let track = chapter.tracks.remove(track_index);
            Ok(TrackEdit {
                chapter_title: chapter.title.clone(),
                track,
            })
        })
        .await
    }
}

/// Result of [`import_track`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedTrack {
    pub card_id: String,
    pub chapter_index: usize,
    pub chapter_key: String,
    pub track_key: String,
    #[serde(flatten)]
    pub transcoded: TranscodedTrack,
}

/// Upload an audio file, wait for transcoding, and append it to the card as
/// a new chapter holding a single track.
#[allow(clippy::too_many_arguments)]
pub async fn import_track<C, F>(
    client: &YotoClient,
    poller: &TranscodePoller<'_, YotoClient, C>,
    credentials: &Credentials,
    card_id: &str,
    title: &str,
    path: &Path,
    icon: Option<String>,
    on_progress: F,
) -> Result<Authed<ImportedTrack>, YotoError>
where
    C: Clock + ?Sized,
    F: FnMut(&TranscodeState),
{
    let mut chain = CredentialChain::new(credentials.clone());

    let upload = transcode::upload_audio(client, chain.current(), path).await;
    let upload = chain.take(upload)?;

    let transcoded = poller
        .wait(chain.current(), &upload.upload_id, on_progress)
        .await;
    let transcoded = chain.take(transcoded)?;

    let mut chapter = Chapter::new(NewChapter {
        title: title.to_string(),
        icon: icon.clone(),
    });
    let track = Track::new(NewTrack {
        title: title.to_string(),
        url: transcoded.track_url.clone(),
        icon,
        duration: transcoded.duration,
    });
    let chapter_key = chapter.key.clone();
    let track_key = track.key.clone();
    chapter.tracks.push(track);

    let edited = Editor::new(client)
        .edit(chain.current(), card_id, move |card| {
            card.content.chapters.push(chapter);
            Ok(card.content.chapters.len() - 1)
        })
        .await;
    let chapter_index = chain.take(edited)?;

    Ok(chain.finish(ImportedTrack {
        card_id: card_id.to_string(),
        chapter_index,
        chapter_key,
        track_key,
        transcoded,
    }))
}
