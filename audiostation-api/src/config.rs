//! Client configuration.
//!
//! The configuration file lives at `~/.config/audiostation/config.json`:
//!
//! ```json
//! {
//!   "base_url": "https://nas.local:5001",
//!   "timeout_secs": 30,
//!   "personal_library_only": false
//! }
//! ```
//!
//! Every field is optional. `apis` is the allow-list of logical API names the
//! client is willing to resolve; adding a name here is enough to reach a new
//! endpoint, provided the server advertises it.

use crate::error::{AudioStationError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// APIs the client uses out of the box.
pub const DEFAULT_APIS: &[&str] = &[
    "SYNO.API.Auth",
    "SYNO.AudioStation.Info",
    "SYNO.AudioStation.Album",
    "SYNO.AudioStation.Composer",
    "SYNO.AudioStation.Genre",
    "SYNO.AudioStation.Artist",
    "SYNO.AudioStation.Folder",
    "SYNO.AudioStation.Song",
    "SYNO.AudioStation.Cover",
    "SYNO.AudioStation.Stream",
    "SYNO.AudioStation.Search",
    "SYNO.AudioStation.Lyrics",
    "SYNO.AudioStation.Playlist",
];

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Scheme, host and port of the DSM web server, e.g. `http://nas:5000`.
    pub base_url: String,
    /// Allow-list of logical API names.
    pub apis: Vec<String>,
    /// Deadline for non-streaming calls. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    /// Session name sent on login/logout.
    pub session_name: String,
    /// Restrict library queries to the user's personal music folder.
    pub personal_library_only: bool,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_owned(),
            apis: DEFAULT_APIS.iter().map(|s| (*s).to_owned()).collect(),
            timeout_secs: Some(30),
            session_name: "AudioStation".to_owned(),
            personal_library_only: false,
            user_agent: USER_AGENT.to_owned(),
        }
    }
}

impl ClientConfig {
    /// Default configuration pointed at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// The `library` parameter value for library-scoped queries.
    pub fn library(&self) -> &'static str {
        if self.personal_library_only {
            "personal"
        } else {
            "all"
        }
    }

    /// Check that `base_url` is an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| AudioStationError::Config(format!("invalid base_url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AudioStationError::Config(format!(
                "unsupported scheme `{}` in base_url",
                url.scheme()
            )));
        }
        Ok(())
    }

    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data)
            .map_err(|e| AudioStationError::Config(format!("{}: {e}", path.display())))
    }

    /// Load from [`default_path`](Self::default_path), falling back to
    /// defaults when the file does not exist.
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    pub fn default_path() -> Result<PathBuf> {
        let config = dirs::config_dir()
            .ok_or_else(|| AudioStationError::Config("cannot determine config directory".into()))?;
        Ok(config.join("audiostation").join("config.json"))
    }
}
