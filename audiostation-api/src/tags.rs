//! Music file tag editor.
//!
//! Endpoint: `webman/3rdparty/AudioStation/tagEditorUI/tag_editor.cgi`
//!
//! The tag editor belongs to the Audio Station web UI. It is not a `/webapi`
//! handler, so it is never advertised by discovery and is addressed by its
//! path. Files are named by share path, passed as a JSON array:
//!
//! ```text
//! action=load&audioInfos=[{"path":"/music/Blue/01.flac"}]&requestFrom=
//! action=apply&data=[{"audioInfos":[{"path":"/music/Blue/01.flac"}],"title":"Intro"}]
//! ```

use crate::client::AudioStationClient;
use crate::error::{AudioStationError, Result};
use crate::request::{ParamValue, Request};
use crate::types::{AudioInfo, FileTagChange, FileTags};
use serde::de::IgnoredAny;

pub const TAG_EDITOR_ENDPOINT: &str = "webman/3rdparty/AudioStation/tagEditorUI/tag_editor.cgi";

fn check_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut count = 0;
    for path in paths {
        if path.contains('\\') {
            return Err(AudioStationError::InvalidArgument(format!(
                "path must use forward slashes: {path}"
            )));
        }
        count += 1;
    }
    if count == 0 {
        return Err(AudioStationError::InvalidArgument("no files given".into()));
    }
    Ok(())
}

impl AudioStationClient {
    /// Read the tags stored in the given music files.
    ///
    /// # Errors
    ///
    /// - [`AudioStationError::InvalidArgument`] if `paths` is empty or a path
    ///   contains a backslash
    pub async fn song_file_tags(&self, paths: &[&str]) -> Result<FileTags> {
        check_paths(paths.iter().copied())?;
        let infos: Vec<AudioInfo> = paths.iter().map(|p| AudioInfo::new(*p)).collect();
        let request = Request::fixed(TAG_EDITOR_ENDPOINT, "load")
            .param("audioInfos", ParamValue::json(&infos)?)
            .param("requestFrom", "")
            .build();
        let response = self.query_bytes(&request).await?;
        Ok(serde_json::from_slice(&response.data)?)
    }

    /// Write `change` to every file it lists.
    ///
    /// # Errors
    ///
    /// - [`AudioStationError::InvalidArgument`] if `change` lists no files or
    ///   a path contains a backslash
    pub async fn set_song_file_tags(&self, change: &FileTagChange) -> Result<()> {
        check_paths(change.audio_infos.iter().map(|a| a.path.as_str()))?;
        let request = Request::fixed(TAG_EDITOR_ENDPOINT, "apply")
            .param("data", ParamValue::json(&[change])?)
            .post()
            .build();
        self.query_object::<IgnoredAny>(&request).await?;
        Ok(())
    }
}
