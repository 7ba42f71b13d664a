//! Integration tests for card editing.
//!
//! An in-memory repository records every push so the tests can check both
//! the stored document and that failed edits never write.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, method, path},
};
use yoto_core::{
    Authed, CardRepository, ClientConfig, Credentials, Editor, TokenPair, YotoClient, YotoError,
    editor::{ChapterChanges, NewChapter, NewPlaylist, NewTrack, PlaylistChanges, TrackChanges},
    model::{Card, CreateContentRequest, DeleteContentResponse, OnEnd},
};

#[derive(Default)]
struct InMemoryRepo {
    cards: Mutex<HashMap<String, Card>>,
    pushes: Mutex<u32>,
    refresh_on_fetch: Option<Credentials>,
    fail_push: bool,
}

impl InMemoryRepo {
    fn with_card(card: Card) -> Self {
        let repo = Self::default();
        repo.cards
            .lock()
            .unwrap()
            .insert(card.card_id.clone(), card);
        repo
    }

    fn card(&self, id: &str) -> Card {
        self.cards.lock().unwrap().get(id).cloned().unwrap()
    }

    fn pushes(&self) -> u32 {
        *self.pushes.lock().unwrap()
    }
}

#[async_trait]
impl CardRepository for InMemoryRepo {
    async fn fetch_card(
        &self,
        _credentials: &Credentials,
        card_id: &str,
    ) -> Result<Authed<Card>, YotoError> {
        let card = self
            .cards
            .lock()
            .unwrap()
            .get(card_id)
            .cloned()
            .ok_or_else(|| YotoError::Api {
                status: 404,
                message: format!("Card {} not found", card_id),
            })?;
        Ok(Authed {
            value: card,
            refreshed: self.refresh_on_fetch.clone(),
        })
    }

    async fn push_card(
        &self,
        credentials: &Credentials,
        card: &Card,
    ) -> Result<Authed<Card>, YotoError> {
        if let Some(fresh) = &self.refresh_on_fetch {
            assert_eq!(credentials, fresh, "push uses refreshed credentials");
        }
        if self.fail_push {
            return Err(YotoError::Api {
                status: 500,
                message: "Internal error".to_string(),
            });
        }
        *self.pushes.lock().unwrap() += 1;
        self.cards
            .lock()
            .unwrap()
            .insert(card.card_id.clone(), card.clone());
        Ok(Authed::new(card.clone()))
    }

    async fn create_card(
        &self,
        _credentials: &Credentials,
        request: &CreateContentRequest,
    ) -> Result<Authed<Card>, YotoError> {
        let card = Card {
            card_id: "new-card".to_string(),
            title: request.title.clone(),
            metadata: request.metadata.clone(),
            content: request.content.clone(),
            extra: Default::default(),
        };
        self.cards
            .lock()
            .unwrap()
            .insert(card.card_id.clone(), card.clone());
        Ok(Authed::new(card))
    }

    async fn delete_card(
        &self,
        _credentials: &Credentials,
        card_id: &str,
    ) -> Result<Authed<DeleteContentResponse>, YotoError> {
        self.cards.lock().unwrap().remove(card_id);
        Ok(Authed::new(DeleteContentResponse {
            status: Some("ok".to_string()),
            extra: Default::default(),
        }))
    }
}

fn sample_card() -> Card {
    serde_json::from_value(json!({
        "cardId": "card1",
        "title": "Stories",
        "createdByClientId": "web",
        "metadata": { "author": "Dad" },
        "content": {
            "playbackType": "linear",
            "chapters": [
                {
                    "key": "c0",
                    "title": "Intro",
                    "tracks": [
                        { "key": "t0", "title": "Hello", "trackUrl": "yoto:#aaa", "format": "aac" }
                    ]
                },
                {
                    "key": "c1",
                    "title": "Middle",
                    "tracks": []
                },
                {
                    "key": "c2",
                    "title": "End",
                    "tracks": []
                }
            ]
        }
    }))
    .unwrap()
}

fn credentials() -> Credentials {
    Credentials::new("test-client-id").with_tokens(TokenPair::new("access", "refresh"))
}

#[tokio::test]
async fn test_add_track_then_fetch() {
    let repo = InMemoryRepo::with_card(sample_card());
    let editor = Editor::new(&repo);

    let edit = editor
        .add_track(
            &credentials(),
            "card1",
            1,
            NewTrack {
                title: "Second".to_string(),
                url: "yoto:#bbb".to_string(),
                duration: Some(42),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .value;

    assert_eq!(edit.chapter_title, "Middle");
    assert!(edit.track.key.starts_with("track-"));

    let stored = repo.card("card1");
    let track = &stored.content.chapters[1].tracks[0];
    assert_eq!(track.title, "Second");
    assert_eq!(track.track_url, "yoto:#bbb");
    assert_eq!(track.duration, Some(42));

    // Everything the editor did not touch survives the push.
    assert_eq!(stored.extra["createdByClientId"], "web");
    assert_eq!(stored.content.chapters[0].tracks[0].extra["format"], "aac");
    assert_eq!(repo.pushes(), 1);
}

#[tokio::test]
async fn test_out_of_range_edit_does_not_push() {
    let repo = InMemoryRepo::with_card(sample_card());
    let editor = Editor::new(&repo);

    let err = editor
        .update_track(&credentials(), "card1", 0, 5, TrackChanges::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Track 5 not found"));

    let err = editor
        .delete_chapter(&credentials(), "card1", 9)
        .await
        .unwrap_err();
    assert!(matches!(err, YotoError::Validation { .. }));

    assert_eq!(repo.pushes(), 0);
    assert_eq!(repo.card("card1"), sample_card());
}

#[tokio::test]
async fn test_delete_chapter_shifts_later_chapters() {
    let repo = InMemoryRepo::with_card(sample_card());
    let editor = Editor::new(&repo);

    let removed = editor
        .delete_chapter(&credentials(), "card1", 0)
        .await
        .unwrap()
        .value;
    assert_eq!(removed.key, "c0");

    let titles: Vec<_> = repo
        .card("card1")
        .content
        .chapters
        .iter()
        .map(|c| c.title.clone())
        .collect();
    assert_eq!(titles, vec!["Middle", "End"]);
}

#[tokio::test]
async fn test_update_and_delete_track() {
    let repo = InMemoryRepo::with_card(sample_card());
    let editor = Editor::new(&repo);

    let edit = editor
        .update_track(
            &credentials(),
            "card1",
            0,
            0,
            TrackChanges {
                title: Some("Hi".to_string()),
                on_end: Some(OnEnd::Stop),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .value;
    assert_eq!(edit.track.title, "Hi");
    assert_eq!(edit.track.track_url, "yoto:#aaa");

    let removed = editor
        .delete_track(&credentials(), "card1", 0, 0)
        .await
        .unwrap()
        .value;
    assert_eq!(removed.track.title, "Hi");
    assert_eq!(removed.track.on_end, Some(OnEnd::Stop));
    assert!(repo.card("card1").content.chapters[0].tracks.is_empty());
}

#[tokio::test]
async fn test_chapter_lifecycle() {
    let repo = InMemoryRepo::with_card(sample_card());
    let editor = Editor::new(&repo);

    let index = editor
        .add_chapter(
            &credentials(),
            "card1",
            NewChapter {
                title: "Bonus".to_string(),
                icon: None,
            },
        )
        .await
        .unwrap()
        .value;
    assert_eq!(index, 3);

    let chapter = editor
        .update_chapter(
            &credentials(),
            "card1",
            index,
            ChapterChanges {
                icon: Some("yoto:#star".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .value;
    assert_eq!(chapter.title, "Bonus");
    assert_eq!(chapter.icon.as_deref(), Some("yoto:#star"));
    assert_eq!(repo.pushes(), 2);
}

#[tokio::test]
async fn test_playlist_create_update_delete() {
    let repo = InMemoryRepo::default();
    let editor = Editor::new(&repo);

    let card = editor
        .create_playlist(
            &credentials(),
            NewPlaylist {
                title: "Road Trip".to_string(),
                author: Some("Mum".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .value;
    assert_eq!(card.content.playback_type.as_deref(), Some("linear"));
    assert!(card.content.chapters.is_empty());

    let updated = editor
        .update_playlist(
            &credentials(),
            &card.card_id,
            PlaylistChanges {
                title: Some("Long Road Trip".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .value;
    assert_eq!(updated.title, "Long Road Trip");
    assert_eq!(updated.metadata.author.as_deref(), Some("Mum"));

    editor
        .delete_playlist(&credentials(), &card.card_id)
        .await
        .unwrap();
    assert!(repo.cards.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_edit_reports_refreshed_credentials() {
    let fresh = Credentials::new("test-client-id").with_tokens(TokenPair::new("a2", "r2"));
    let repo = InMemoryRepo {
        refresh_on_fetch: Some(fresh.clone()),
        ..InMemoryRepo::with_card(sample_card())
    };
    let editor = Editor::new(&repo);

    let result = editor
        .add_chapter(
            &credentials(),
            "card1",
            NewChapter {
                title: "Extra".to_string(),
                icon: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(result.refreshed, Some(fresh));
}

#[tokio::test]
async fn test_failed_push_still_reports_refreshed_credentials() {
    let fresh = Credentials::new("test-client-id").with_tokens(TokenPair::new("a2", "r2"));
    let repo = InMemoryRepo {
        refresh_on_fetch: Some(fresh.clone()),
        fail_push: true,
        ..InMemoryRepo::with_card(sample_card())
    };

    let err = Editor::new(&repo)
        .delete_chapter(&credentials(), "card1", 0)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Internal error");
    assert!(matches!(err.kind(), YotoError::Api { status: 500, .. }));
    assert_eq!(err.refreshed(), Some(&fresh));
    assert_eq!(repo.card("card1"), sample_card());
}

#[tokio::test]
async fn test_rejected_index_still_reports_refreshed_credentials() {
    let fresh = Credentials::new("test-client-id").with_tokens(TokenPair::new("a2", "r2"));
    let repo = InMemoryRepo {
        refresh_on_fetch: Some(fresh.clone()),
        ..InMemoryRepo::with_card(sample_card())
    };

    let err = Editor::new(&repo)
        .update_chapter(&credentials(), "card1", 7, ChapterChanges::default())
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), YotoError::Validation { .. }));
    assert_eq!(err.refreshed(), Some(&fresh));
    assert_eq!(repo.pushes(), 0);
}

#[tokio::test]
async fn test_client_pushes_whole_document() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/content/card1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "card": sample_card() })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/content"))
        .and(body_partial_json(json!({
            "cardId": "card1",
            "title": "Stories",
            "metadata": { "author": "Dad" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "card": sample_card() })))
        .expect(1)
        .mount(&server)
        .await;

    let client = YotoClient::new(ClientConfig::with_base_url(server.uri()));
    Editor::new(&client)
        .update_chapter(
            &credentials(),
            "card1",
            2,
            ChapterChanges {
                title: Some("Finale".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let pushed: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    let chapters = pushed["content"]["chapters"].as_array().unwrap();
    assert_eq!(chapters.len(), 3);
    assert_eq!(chapters[2]["title"], "Finale");
    assert_eq!(chapters[0]["tracks"][0]["format"], "aac");
}
