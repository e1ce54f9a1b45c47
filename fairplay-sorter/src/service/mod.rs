//! Playlist service abstraction
//!
//! The sort controller talks to the streaming service only through the
//! [`PlaylistService`] trait, so the engine can be driven against an
//! in-memory implementation in tests and against the real web API in the
//! binary. Wire formats are the implementation's concern; the trait deals in
//! the engine's own types.

use async_trait::async_trait;

use fairplay_common::Result;

use crate::planner::{PlaylistEntry, ReorderOp};

mod web;

pub use web::WebPlaylistClient;

/// One page of playlist entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntriesPage {
    /// Entries in playback order
    pub items: Vec<PlaylistEntry>,
    /// Opaque cursor for the next page, `None` when exhausted
    pub next: Option<String>,
}

/// What the player reports as currently playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    /// Identity of the playing track, when the player has one
    pub track_id: Option<String>,
    /// URI of the playback context (playlist, album, ...), when known
    pub context_uri: Option<String>,
    /// True when the player is shuffling; positions are meaningless then
    pub shuffle_enabled: bool,
}

/// Operations the engine needs from the streaming service.
#[async_trait]
pub trait PlaylistService: Send + Sync {
    /// Current version token of the playlist. Implementations must fail with
    /// `Error::MissingField` when the service returns none; mutating without
    /// a token loses concurrent edits.
    async fn playlist_version(&self, playlist_id: &str) -> Result<String>;

    /// One page of the playlist's entries. Pass the `next` cursor of the
    /// previous page to continue, `None` to start from the beginning.
    async fn entries_page(&self, playlist_id: &str, cursor: Option<&str>) -> Result<EntriesPage>;

    /// Apply a single move to the remote playlist, guarded by the version
    /// token. Returns the new token when the response carries one.
    async fn reorder(
        &self,
        playlist_id: &str,
        op: &ReorderOp,
        snapshot_id: &str,
    ) -> Result<Option<String>>;

    /// Currently playing item, `None` when nothing is playing.
    async fn now_playing(&self) -> Result<Option<NowPlaying>>;

    /// Track identities the player will play next, in order.
    async fn upcoming_queue(&self) -> Result<Vec<String>>;

    /// Context URI the player reports while playing the given playlist.
    fn playlist_context(&self, playlist_id: &str) -> String;
}
