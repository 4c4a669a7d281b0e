//! Song API: listing, details, rating and streaming.
//!
//! Endpoint: `SYNO.AudioStation.Song` (`list`, `getinfo`, `setrating`)
//!
//! ```json
//! {
//!   "success": true,
//!   "data": {
//!     "total": 1,
//!     "songs": [{
//!       "id": "music_42", "title": "Intro", "path": "/music/a/01.flac", "type": "file",
//!       "additional": { "song_rating": { "rating": 4 } }
//!     }]
//!   }
//! }
//! ```
//!
//! Audio itself comes from `SYNO.AudioStation.Stream`, see
//! [`stream`](crate::stream).

use crate::client::AudioStationClient;
use crate::error::{AudioStationError, Result};
use crate::request::Request;
use crate::stream::{AudioStream, TranscodeMode};
use crate::types::{AdditionalField, Page, PagedResult, Song, SongFilter};
use serde::Deserialize;
use serde::de::IgnoredAny;
use tokio_util::sync::CancellationToken;

pub const SONG_API: &str = "SYNO.AudioStation.Song";

#[derive(Deserialize)]
struct SongList {
    #[serde(default)]
    songs: Vec<Song>,
}

impl AudioStationClient {
    /// List songs matching all `filters`.
    ///
    /// `additional` selects the optional detail blocks to include with every
    /// song.
    pub async fn list_songs(
        &self,
        page: Page,
        additional: &[AdditionalField],
        filters: &[(SongFilter, &str)],
    ) -> Result<PagedResult<Song>> {
        let mut builder = self.library_request(SONG_API, "list");
        if !additional.is_empty() {
            builder = builder.param("additional", AdditionalField::join(additional, ""));
        }
        for (filter, value) in filters {
            builder = builder.param(filter.as_str(), *value);
        }
        self.query_list(&builder.build(), page).await
    }

    /// Full details of one song, every additional block included.
    ///
    /// Returns `None` if the server knows no song with this id.
    pub async fn get_song(&self, id: &str) -> Result<Option<Song>> {
        let request = Request::builder(SONG_API, "getinfo")
            .param("id", id)
            .param("additional", AdditionalField::join(&AdditionalField::ALL, ""))
            .build();
        let list: SongList = self.query_object(&request).await?;
        Ok(list.songs.into_iter().next())
    }

    /// Set the rating of a song, from 0 (unrated) to 5.
    ///
    /// # Errors
    ///
    /// - [`AudioStationError::InvalidArgument`] if `rating` is above 5; no
    ///   request is sent
    pub async fn rate_song(&self, id: &str, rating: u8) -> Result<()> {
        if rating > 5 {
            return Err(AudioStationError::InvalidArgument(format!(
                "rating must be between 0 and 5, got {rating}"
            )));
        }
        let request = Request::builder(SONG_API, "setrating")
            .param("id", id)
            .param("rating", rating)
            .build();
        self.query_object::<IgnoredAny>(&request).await?;
        Ok(())
    }

    /// Start downloading a song, starting `position_secs` into it.
    ///
    /// The returned stream stops when `cancel` fires.
    pub async fn stream_song(
        &self,
        id: &str,
        mode: TranscodeMode,
        position_secs: f64,
        cancel: CancellationToken,
    ) -> Result<AudioStream> {
        self.query_stream(&mode.request(id, position_secs), cancel).await
    }
}
