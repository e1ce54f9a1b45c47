//! Web API client for the streaming service
//!
//! Implements [`PlaylistService`] against the Spotify-shaped REST API the
//! playlist lives on. Only the handful of endpoints the engine needs are
//! covered; everything response-shaped stays private to this module.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use fairplay_common::{Error, Result};

use crate::planner::{PlaylistEntry, ReorderOp};
use crate::service::{EntriesPage, NowPlaying, PlaylistService};

const USER_AGENT: &str = "fairplay/0.1.0 (https://github.com/fairplay/fairplay)";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fields requested per playlist item; keeps page payloads small
const TRACK_PAGE_FIELDS: &str = "next,total,items(added_by.id,track(id,duration_ms))";
const TRACK_PAGE_LIMIT: u32 = 100;

/// `reqwest`-backed playlist service client
pub struct WebPlaylistClient {
    http_client: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl WebPlaylistClient {
    /// Build a client for the given API base URL using a bearer token.
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self {
            http_client,
            base_url,
            access_token: access_token.into(),
        })
    }

    /// Absolute URL for a request path. Pagination cursors come back as full
    /// URLs and pass through untouched.
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// GET a JSON payload. `Ok(None)` for an empty (204) response.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self
            .http_client
            .get(self.url(path))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        Self::read_json(response).await
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<Option<T>> {
        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| Error::Network(e.to_string()))
    }
}

#[async_trait]
impl PlaylistService for WebPlaylistClient {
    async fn playlist_version(&self, playlist_id: &str) -> Result<String> {
        let playlist: PlaylistJson = self
            .get_json(&format!("/playlists/{playlist_id}"))
            .await?
            .ok_or_else(|| Error::MissingField("playlist response".to_string()))?;

        playlist
            .snapshot_id
            .ok_or_else(|| Error::MissingField("playlist snapshot ID".to_string()))
    }

    async fn entries_page(&self, playlist_id: &str, cursor: Option<&str>) -> Result<EntriesPage> {
        let path = match cursor {
            Some(next) => next.to_string(),
            None => format!(
                "/playlists/{playlist_id}/tracks?fields={TRACK_PAGE_FIELDS}&limit={TRACK_PAGE_LIMIT}"
            ),
        };

        let page: TracksPageJson = self
            .get_json(&path)
            .await?
            .ok_or_else(|| Error::MissingField("playlist items response".to_string()))?;

        Ok(EntriesPage {
            items: page.items.into_iter().map(PlaylistEntry::from).collect(),
            next: page.next,
        })
    }

    async fn reorder(
        &self,
        playlist_id: &str,
        op: &ReorderOp,
        snapshot_id: &str,
    ) -> Result<Option<String>> {
        let request = ReorderRequestJson {
            range_start: op.from,
            range_length: 1,
            insert_before: op.insert_before,
            snapshot_id,
        };

        let response = self
            .http_client
            .put(self.url(&format!("/playlists/{playlist_id}/tracks")))
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let body: Option<SnapshotJson> = Self::read_json(response).await?;
        Ok(body.and_then(|b| b.snapshot_id))
    }

    async fn now_playing(&self) -> Result<Option<NowPlaying>> {
        // The full player-state endpoint, rather than currently-playing:
        // only it reports the playback context and the shuffle toggle.
        let state: Option<PlayerStateJson> = self.get_json("/me/player").await?;

        Ok(state.map(|state| NowPlaying {
            track_id: state.item.and_then(|item| item.id),
            context_uri: state.context.map(|context| context.uri),
            shuffle_enabled: state.shuffle_state.unwrap_or(false),
        }))
    }

    async fn upcoming_queue(&self) -> Result<Vec<String>> {
        let response: QueueJson = self
            .get_json("/me/player/queue")
            .await?
            .ok_or_else(|| Error::MissingField("player queue response".to_string()))?;

        Ok(response
            .queue
            .into_iter()
            .map(|item| item.id.unwrap_or_default())
            .collect())
    }

    fn playlist_context(&self, playlist_id: &str) -> String {
        format!("spotify:playlist:{playlist_id}")
    }
}

// ========================================
// Wire types
// ========================================

#[derive(Debug, Deserialize)]
struct PlaylistJson {
    snapshot_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TracksPageJson {
    next: Option<String>,
    items: Vec<TrackItemJson>,
}

#[derive(Debug, Deserialize)]
struct TrackItemJson {
    added_by: AddedByJson,
    track: TrackJson,
}

#[derive(Debug, Deserialize)]
struct AddedByJson {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TrackJson {
    id: String,
    duration_ms: u64,
}

impl From<TrackItemJson> for PlaylistEntry {
    fn from(item: TrackItemJson) -> Self {
        PlaylistEntry {
            contributor: item.added_by.id,
            track_id: item.track.id,
            duration_ms: item.track.duration_ms,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReorderRequestJson<'a> {
    range_start: usize,
    range_length: usize,
    insert_before: usize,
    snapshot_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct SnapshotJson {
    snapshot_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlayerStateJson {
    item: Option<PlayingItemJson>,
    context: Option<ContextJson>,
    shuffle_state: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PlayingItemJson {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContextJson {
    uri: String,
}

#[derive(Debug, Deserialize)]
struct QueueJson {
    queue: Vec<QueueItemJson>,
}

#[derive(Debug, Deserialize)]
struct QueueItemJson {
    id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_relative_paths() {
        let client = WebPlaylistClient::new("https://api.example/v1/", "tok").unwrap();
        assert_eq!(
            client.url("/playlists/abc"),
            "https://api.example/v1/playlists/abc"
        );
    }

    #[test]
    fn test_url_passes_absolute_cursors_through() {
        let client = WebPlaylistClient::new("https://api.example/v1", "tok").unwrap();
        let next = "https://api.example/v1/playlists/abc/tracks?offset=100";
        assert_eq!(client.url(next), next);
    }

    #[test]
    fn test_playlist_context() {
        let client = WebPlaylistClient::new("https://api.example/v1", "tok").unwrap();
        assert_eq!(
            client.playlist_context("37i9dQZF1DX"),
            "spotify:playlist:37i9dQZF1DX"
        );
    }

    #[test]
    fn test_track_page_deserialization() {
        let json = r#"{
            "next": "https://api.example/v1/playlists/abc/tracks?offset=2",
            "total": 3,
            "items": [
                {"added_by": {"id": "alice"}, "track": {"id": "t1", "duration_ms": 180000}},
                {"added_by": {"id": "bob"}, "track": {"id": "t2", "duration_ms": 240000}}
            ]
        }"#;

        let page: TracksPageJson = serde_json::from_str(json).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.next.is_some());

        let entry = PlaylistEntry::from(
            page.items.into_iter().next().unwrap(),
        );
        assert_eq!(entry.contributor, "alice");
        assert_eq!(entry.track_id, "t1");
        assert_eq!(entry.duration_ms, 180000);
    }

    #[test]
    fn test_player_state_deserialization() {
        let json = r#"{
            "item": {"id": "t9", "duration_ms": 100},
            "context": {"uri": "spotify:playlist:abc"},
            "shuffle_state": true
        }"#;

        let state: PlayerStateJson = serde_json::from_str(json).unwrap();
        assert_eq!(state.item.unwrap().id.as_deref(), Some("t9"));
        assert_eq!(state.context.unwrap().uri, "spotify:playlist:abc");
        assert_eq!(state.shuffle_state, Some(true));
    }

    #[test]
    fn test_player_state_tolerates_missing_fields() {
        let state: PlayerStateJson = serde_json::from_str("{}").unwrap();
        assert!(state.item.is_none());
        assert!(state.context.is_none());
        assert!(state.shuffle_state.is_none());
    }
}
