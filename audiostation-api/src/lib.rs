//! Synology Audio Station API client library.
//!
//! Typed, asynchronous access to the Audio Station web API of a DiskStation:
//! library browsing, song details and ratings, playlists, search, cover art,
//! file tag editing and audio streaming.
//!
//! # Usage
//!
//! ```no_run
//! use audiostation_api::{AudioStationClient, ClientConfig, Credentials, Page};
//!
//! # async fn run() -> audiostation_api::Result<()> {
//! let config = ClientConfig::new("https://nas.local:5001");
//! let client = AudioStationClient::new(config, Credentials::new("alice", "secret"))?;
//!
//! let page = client.list_artists(Page::new(50, 0)).await?;
//! println!("{} artists", page.total);
//! # Ok(())
//! # }
//! ```
//!
//! The client discovers the server's endpoints and logs in on first use. An
//! expired session is renewed transparently, once per call; concurrent calls
//! share a single login.
//!
//! # API endpoint mapping
//!
//! | Method                                        | API                          | Mode    |
//! |-----------------------------------------------|------------------------------|---------|
//! | [`AudioStationClient::server_info`]           | `SYNO.AudioStation.Info`     | object  |
//! | [`AudioStationClient::list_folders`]          | `SYNO.AudioStation.Folder`   | list    |
//! | [`AudioStationClient::list_artists`]          | `SYNO.AudioStation.Artist`   | list    |
//! | [`AudioStationClient::list_albums`]           | `SYNO.AudioStation.Album`    | list    |
//! | [`AudioStationClient::list_composers`]        | `SYNO.AudioStation.Composer` | list    |
//! | [`AudioStationClient::list_genres`]           | `SYNO.AudioStation.Genre`    | list    |
//! | [`AudioStationClient::list_songs`]            | `SYNO.AudioStation.Song`     | list    |
//! | [`AudioStationClient::get_song`]              | `SYNO.AudioStation.Song`     | object  |
//! | [`AudioStationClient::rate_song`]             | `SYNO.AudioStation.Song`     | object  |
//! | [`AudioStationClient::search`]                | `SYNO.AudioStation.Search`   | object  |
//! | [`AudioStationClient::list_playlists`]        | `SYNO.AudioStation.Playlist` | list    |
//! | [`AudioStationClient::get_playlist`]          | `SYNO.AudioStation.Playlist` | object  |
//! | [`AudioStationClient::add_songs_to_playlist`] | `SYNO.AudioStation.Playlist` | object  |
//! | [`AudioStationClient::album_cover`]           | `SYNO.AudioStation.Cover`    | bytes   |
//! | [`AudioStationClient::artist_cover`]          | `SYNO.AudioStation.Cover`    | bytes   |
//! | [`AudioStationClient::stream_song`]           | `SYNO.AudioStation.Stream`   | stream  |
//! | [`AudioStationClient::song_file_tags`]        | tag editor (fixed path)      | bytes   |
//! | [`AudioStationClient::set_song_file_tags`]    | tag editor (fixed path)      | object  |
//!
//! Endpoints without a wrapper are reachable through the generic
//! [`query_object`](AudioStationClient::query_object),
//! [`query_list`](AudioStationClient::query_list),
//! [`query_bytes`](AudioStationClient::query_bytes) and
//! [`query_stream`](AudioStationClient::query_stream) with a hand-built
//! [`Request`], as long as the API name is on the configured allow-list.
//! Handlers outside `/webapi` are reached with [`Request::fixed`].

pub mod auth;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
#[cfg(test)]
mod fake_transport;
mod library;
mod playlist;
pub mod registry;
pub mod request;
mod search;
mod song;
pub mod stream;
mod tags;
pub mod transport;
pub mod types;

pub use auth::{Credentials, SessionContext};
pub use client::AudioStationClient;
pub use config::ClientConfig;
pub use error::{AudioStationError, Result};
pub use library::{
    ALBUM_API, ARTIST_API, COMPOSER_API, COVER_API, FOLDER_API, GENRE_API, SERVER_INFO_API,
};
pub use playlist::PLAYLIST_API;
pub use registry::ApiDescriptor;
pub use request::{HttpMethod, ParamValue, Request, RequestBuilder};
pub use search::SEARCH_API;
pub use song::SONG_API;
pub use stream::{AudioStream, STREAM_API, TranscodeMode};
pub use tags::TAG_EDITOR_ENDPOINT;
pub use types::{ByteArrayData, Page, PagedResult};
