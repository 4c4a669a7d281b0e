//! Playlist API.
//!
//! Endpoint: `SYNO.AudioStation.Playlist` (`list`, `getinfo`, `updatesongs`)
//!
//! `getinfo` returns the playlist wrapped in a one-element list, with its
//! songs under `additional`. `limit` and `offset` page through those songs:
//!
//! ```json
//! {
//!   "success": true,
//!   "data": {
//!     "playlists": [{
//!       "id": "playlist_personal_normal/Road", "name": "Road", "library": "personal",
//!       "additional": { "songs": [ ... ], "songs_offset": 0, "songs_total": 31 }
//!     }]
//!   }
//! }
//! ```
//!
//! `updatesongs` replaces the song range `[offset, offset + limit)` with
//! `songs`. Appending is `offset=-1&limit=0`, removal passes no songs. There
//! is no removal by song id.

use crate::client::AudioStationClient;
use crate::error::{AudioStationError, Result};
use crate::request::{ParamValue, Request};
use crate::types::{AdditionalField, Page, PagedResult, Playlist};
use serde::Deserialize;
use serde::de::IgnoredAny;

pub const PLAYLIST_API: &str = "SYNO.AudioStation.Playlist";

#[derive(Deserialize)]
struct PlaylistList {
    #[serde(default)]
    playlists: Vec<Playlist>,
}

impl AudioStationClient {
    /// List playlists from both the shared and the personal library,
    /// whatever the configured scope.
    pub async fn list_playlists(&self, page: Page) -> Result<PagedResult<Playlist>> {
        let request = Request::builder(PLAYLIST_API, "list")
            .param("library", "all")
            .build();
        self.query_list(&request, page).await
    }

    /// Fetch a playlist with one page of its songs.
    ///
    /// `additional` selects the detail blocks attached to each song. Returns
    /// `None` if the playlist does not exist.
    pub async fn get_playlist(
        &self,
        id: &str,
        songs: Page,
        additional: &[AdditionalField],
    ) -> Result<Option<Playlist>> {
        let fields = if additional.is_empty() {
            ParamValue::from("songs")
        } else {
            AdditionalField::join(additional, "songs_")
        };
        let request = self
            .library_request(PLAYLIST_API, "getinfo")
            .param("id", id)
            .param("additional", fields)
            .param("limit", songs.limit)
            .param("offset", songs.offset)
            .build();
        let list: PlaylistList = self.query_object(&request).await?;
        Ok(list.playlists.into_iter().next())
    }

    /// Append songs to the end of a playlist.
    ///
    /// # Errors
    ///
    /// - [`AudioStationError::InvalidArgument`] if `song_ids` is empty
    pub async fn add_songs_to_playlist(&self, id: &str, song_ids: &[&str]) -> Result<()> {
        if song_ids.is_empty() {
            return Err(AudioStationError::InvalidArgument("no songs to add".into()));
        }
        self.update_songs(id, -1, 0, ParamValue::list(song_ids)).await
    }

    /// Remove `count` songs starting at position `start` (0-based).
    ///
    /// Removing zero songs sends nothing.
    pub async fn remove_songs_from_playlist(
        &self,
        id: &str,
        start: u32,
        count: u32,
    ) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        self.update_songs(id, i64::from(start), count, ParamValue::from("")).await
    }

    async fn update_songs(
        &self,
        id: &str,
        offset: i64,
        limit: u32,
        songs: ParamValue,
    ) -> Result<()> {
        let request = Request::builder(PLAYLIST_API, "updatesongs")
            .param("id", id)
            .param("offset", offset)
            .param("limit", limit)
            .param("songs", songs)
            .build();
        self.query_object::<IgnoredAny>(&request).await?;
        Ok(())
    }
}
