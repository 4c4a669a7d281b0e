//! Library browsing: folders, artists, albums, composers, genres and covers.
//!
//! All list endpoints share the same shape:
//!
//! ```text
//! GET /webapi/AudioStation/<api>.cgi?api=SYNO.AudioStation.<Api>&version=..&method=list
//!     &library=all&limit=50&offset=0
//! ```
//!
//! ```json
//! { "success": true, "data": { "total": 120, "offset": 0, "artists": [ { "name": "..." } ] } }
//! ```
//!
//! Covers come from `SYNO.AudioStation.Cover` as raw image bytes.

use crate::client::AudioStationClient;
use crate::error::Result;
use crate::request::Request;
use crate::types::{
    Album, Artist, ByteArrayData, Composer, Folder, Genre, Page, PagedResult, ServerInfo,
};

pub const SERVER_INFO_API: &str = "SYNO.AudioStation.Info";
pub const FOLDER_API: &str = "SYNO.AudioStation.Folder";
pub const ARTIST_API: &str = "SYNO.AudioStation.Artist";
pub const ALBUM_API: &str = "SYNO.AudioStation.Album";
pub const COMPOSER_API: &str = "SYNO.AudioStation.Composer";
pub const GENRE_API: &str = "SYNO.AudioStation.Genre";
pub const COVER_API: &str = "SYNO.AudioStation.Cover";

impl AudioStationClient {
    /// Audio Station version and the caller's privileges.
    pub async fn server_info(&self) -> Result<ServerInfo> {
        let request = Request::builder(SERVER_INFO_API, "getinfo").build();
        self.query_object(&request).await
    }

    /// List the children of `folder_id`, or the top-level music folders.
    ///
    /// Not recursive.
    pub async fn list_folders(
        &self,
        page: Page,
        folder_id: Option<&str>,
    ) -> Result<PagedResult<Folder>> {
        let request = self
            .library_request(FOLDER_API, "list")
            .param_opt("id", folder_id)
            .build();
        self.query_list(&request, page).await
    }

    pub async fn list_artists(&self, page: Page) -> Result<PagedResult<Artist>> {
        let request = self.library_request(ARTIST_API, "list").build();
        self.query_list(&request, page).await
    }

    /// List albums, optionally only those by `artist`.
    pub async fn list_albums(
        &self,
        page: Page,
        artist: Option<&str>,
    ) -> Result<PagedResult<Album>> {
        let request = self
            .library_request(ALBUM_API, "list")
            .param_opt("artist", artist)
            .build();
        self.query_list(&request, page).await
    }

    pub async fn list_composers(&self, page: Page) -> Result<PagedResult<Composer>> {
        let request = self.library_request(COMPOSER_API, "list").build();
        self.query_list(&request, page).await
    }

    pub async fn list_genres(&self, page: Page) -> Result<PagedResult<Genre>> {
        let request = self.library_request(GENRE_API, "list").build();
        self.query_list(&request, page).await
    }

    /// Cover image of an album.
    ///
    /// # Errors
    ///
    /// - [`AudioStationError::Api`](crate::AudioStationError::Api) when the
    ///   album has no cover
    pub async fn album_cover(&self, album_artist: &str, album: &str) -> Result<ByteArrayData> {
        let request = Request::builder(COVER_API, "getcover")
            .param("album_name", album)
            .param("album_artist_name", album_artist)
            .build();
        self.query_bytes(&request).await
    }

    /// Picture of an artist.
    pub async fn artist_cover(&self, artist: &str) -> Result<ByteArrayData> {
        let request = self
            .library_request(COVER_API, "getcover")
            .param("artist_name", artist)
            .build();
        self.query_bytes(&request).await
    }
}
