//! Data types for Audio Station API responses.
//!
//! Field names mostly follow the API's own `snake_case` naming, so most types
//! deserialize directly from the `data` object of the response envelope.
//! Everything the server may omit is `#[serde(default)]`.

use crate::request::ParamValue;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// A window into a server-side collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of items. `0` asks only for the total.
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }

    /// Ask for the total count only.
    pub fn count_only() -> Self {
        Self { limit: 0, offset: 0 }
    }

    /// The page following this one.
    pub fn next(self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset.saturating_add(self.limit),
        }
    }
}

/// One page of a list query.
///
/// `items.len() <= limit` always holds. Consecutive pages are not a snapshot:
/// if the library changes between calls, items may shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Size of the whole collection on the server.
    pub total: u64,
    pub offset: u64,
    pub items: Vec<T>,
}

/// Item types returned by list queries.
///
/// `ITEMS` is the key of the item array inside the response `data`:
///
/// ```json
/// { "total": 25, "offset": 0, "songs": [ ... ] }
/// ```
pub trait Listing: DeserializeOwned {
    const ITEMS: &'static str;
}

/// Raw body of a byte-array query (cover art and similar).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteArrayData {
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Optional song detail blocks, requested via the `additional` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdditionalField {
    SongTag,
    SongAudio,
    SongRating,
}

impl AdditionalField {
    /// Declaration order, which is also wire order.
    pub const ALL: [Self; 3] = [Self::SongTag, Self::SongAudio, Self::SongRating];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SongTag => "song_tag",
            Self::SongAudio => "song_audio",
            Self::SongRating => "song_rating",
        }
    }

    /// Comma-joined wire value for `fields`, each name prefixed by `prefix`.
    ///
    /// Output order is fixed by [`ALL`](Self::ALL), whatever order `fields`
    /// is in, and duplicates collapse.
    pub fn join(fields: &[Self], prefix: &str) -> ParamValue {
        ParamValue::list(
            Self::ALL
                .iter()
                .filter(|f| fields.contains(*f))
                .map(|f| format!("{prefix}{}", f.as_str())),
        )
    }
}

/// Column to filter songs by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SongFilter {
    Album,
    AlbumArtist,
    Artist,
    Composer,
    Genre,
    Title,
}

impl SongFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Album => "album",
            Self::AlbumArtist => "album_artist",
            Self::Artist => "artist",
            Self::Composer => "composer",
            Self::Genre => "genre",
            Self::Title => "title",
        }
    }
}

/// Server and account information from `SYNO.AudioStation.Info`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerInfo {
    pub has_music_share: bool,
    pub is_manager: bool,
    pub version: u64,
    pub version_string: String,
}

/// A song.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Song {
    /// Audio Station song id, e.g. `music_1234`.
    pub id: String,
    pub title: String,
    /// Path of the file on the NAS.
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional: Option<SongAdditional>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SongAdditional {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_tag: Option<SongTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_audio: Option<SongAudio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song_rating: Option<SongRating>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SongTag {
    pub album: String,
    pub album_artist: String,
    pub artist: String,
    pub comment: String,
    pub composer: String,
    pub disc: u32,
    pub genre: String,
    pub track: u32,
    pub year: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SongAudio {
    /// Bits per second.
    pub bitrate: u64,
    pub channel: u32,
    pub codec: String,
    pub container: String,
    /// Seconds.
    pub duration: u64,
    pub filesize: u64,
    /// Sample rate in Hz.
    pub frequency: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SongRating {
    /// 0 (unrated) to 5.
    pub rating: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Album {
    pub name: String,
    pub album_artist: String,
    pub display_artist: String,
    pub year: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Artist {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Composer {
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Genre {
    pub name: String,
}

/// A folder or file entry of the music share.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Folder {
    pub id: String,
    pub title: String,
    pub path: String,
    /// `folder` or `file`.
    #[serde(rename = "type")]
    pub kind: String,
    pub is_personal: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    /// `personal` or `shared`.
    pub library: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional: Option<PlaylistAdditional>,
}

/// Song list attached to a playlist by `getinfo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistAdditional {
    pub songs: Vec<Song>,
    pub songs_offset: u64,
    pub songs_total: u64,
}

/// Results of a library-wide keyword search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResults {
    pub albums: Vec<Album>,
    #[serde(rename = "albumTotal")]
    pub album_total: u64,
    pub artists: Vec<Artist>,
    #[serde(rename = "artistTotal")]
    pub artist_total: u64,
    pub songs: Vec<Song>,
    #[serde(rename = "songTotal")]
    pub song_total: u64,
}

/// A music file addressed by its path on the DiskStation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInfo {
    /// Share path with forward slashes, e.g. `/music/Blue/01.flac`.
    pub path: String,
}

impl AudioInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Tags read from music files by the tag editor.
///
/// Unlike the `/webapi` handlers the tag editor puts its fields next to
/// `success` instead of under `data`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTags {
    pub files: Vec<FileTag>,
    /// Files whose tags could not be read.
    pub read_fail_count: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTag {
    pub path: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: String,
    pub composer: String,
    pub genre: String,
    pub comment: String,
    pub year: u32,
    pub track: u32,
    pub disc: u32,
}

/// A batch tag edit. Fields left as `None` are not changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTagChange {
    #[serde(rename = "audioInfos")]
    pub audio_infos: Vec<AudioInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc: Option<u32>,
}

impl Listing for Song {
    const ITEMS: &'static str = "songs";
}

impl Listing for Album {
    const ITEMS: &'static str = "albums";
}

impl Listing for Artist {
    const ITEMS: &'static str = "artists";
}

impl Listing for Composer {
    const ITEMS: &'static str = "composers";
}

impl Listing for Genre {
    const ITEMS: &'static str = "genres";
}

impl Listing for Folder {
    const ITEMS: &'static str = "items";
}

impl Listing for Playlist {
    const ITEMS: &'static str = "playlists";
}
