//! Streaming audio responses and transcoding parameters.
//!
//! `SYNO.AudioStation.Stream` serves either the original file
//! (`method=stream`) or a server-side transcode (`method=transcode`) under a
//! sub-path naming the target container:
//!
//! ```text
//! GET /webapi/AudioStation/stream.cgi/0.mp3?api=SYNO.AudioStation.Stream&version=2
//!     &method=transcode&id=music_42&format=mp3&bitrate=320000&position=12.5&_sid=...
//! ```

use crate::error::{AudioStationError, Result};
use crate::request::Request;
use crate::transport::ByteStream;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::debug;

pub const STREAM_API: &str = "SYNO.AudioStation.Stream";

/// How the server should encode a streamed song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscodeMode {
    /// The file as stored, no transcoding.
    #[default]
    Original,
    Mp3_128,
    Mp3_192,
    Mp3_256,
    Mp3_320,
    Wav,
}

impl TranscodeMode {
    /// Wire `method` for this mode.
    pub fn action(self) -> &'static str {
        match self {
            Self::Original => "stream",
            _ => "transcode",
        }
    }

    pub fn format(self) -> Option<&'static str> {
        match self {
            Self::Original => None,
            Self::Mp3_128 | Self::Mp3_192 | Self::Mp3_256 | Self::Mp3_320 => Some("mp3"),
            Self::Wav => Some("wav"),
        }
    }

    /// Target bitrate in bits per second.
    pub fn bitrate(self) -> Option<u32> {
        match self {
            Self::Mp3_128 => Some(128_000),
            Self::Mp3_192 => Some(192_000),
            Self::Mp3_256 => Some(256_000),
            Self::Mp3_320 => Some(320_000),
            Self::Original | Self::Wav => None,
        }
    }

    pub fn sub_path(self) -> Option<String> {
        self.format().map(|f| format!("/0.{f}"))
    }

    /// Build the stream request for `song_id`, starting at `position_secs`.
    pub fn request(self, song_id: &str, position_secs: f64) -> Request {
        let mut builder = Request::builder(STREAM_API, self.action()).param("id", song_id);
        if let Some(sub) = self.sub_path() {
            builder = builder.sub_path(sub);
        }
        builder = builder
            .param_opt("format", self.format())
            .param_opt("bitrate", self.bitrate());
        if position_secs > 0.0 {
            builder = builder.param("position", format_position(position_secs));
        }
        builder.build()
    }
}

/// Seconds rounded to 4 decimals, without trailing zeros.
fn format_position(secs: f64) -> String {
    let rounded = (secs * 10_000.0).round() / 10_000.0;
    rounded.to_string()
}

/// A song being downloaded.
///
/// Yields the body chunk by chunk. The connection is closed when the server
/// finishes, when the stream is dropped, or when its cancellation token fires.
/// After cancellation the stream yields one [`AudioStationError::Cancelled`]
/// and then ends; no data is produced after that point. A stream cannot be
/// restarted.
pub struct AudioStream {
    body: Option<ByteStream>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    content_type: Option<String>,
    bytes_read: u64,
}

impl AudioStream {
    pub(crate) fn new(
        body: ByteStream,
        content_type: Option<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            body: Some(body),
            cancelled: Box::pin(cancel.cancelled_owned()),
            content_type,
            bytes_read: 0,
        }
    }

    /// `Content-Type` reported by the server, e.g. `audio/mpeg`.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Whether the connection has been released.
    pub fn is_closed(&self) -> bool {
        self.body.is_none()
    }

    /// Feed every chunk to `on_chunk` until the stream ends.
    ///
    /// Returns the total number of bytes delivered. Consumes the stream, so
    /// the connection is released on every exit path.
    pub async fn for_each_chunk<F>(mut self, mut on_chunk: F) -> Result<u64>
    where
        F: FnMut(&[u8]),
    {
        while let Some(chunk) = self.next().await {
            on_chunk(&chunk?);
        }
        Ok(self.bytes_read)
    }

    fn close(&mut self) {
        if self.body.take().is_some() {
            debug!(bytes_read = self.bytes_read, "stream closed");
        }
    }
}

impl Stream for AudioStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(body) = this.body.as_mut() else {
            return Poll::Ready(None);
        };
        if this.cancelled.as_mut().poll(cx).is_ready() {
            this.close();
            return Poll::Ready(Some(Err(AudioStationError::Cancelled)));
        }
        match body.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes_read += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => {
                this.close();
                Poll::Ready(Some(Err(err)))
            }
            Poll::Ready(None) => {
                this.close();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
