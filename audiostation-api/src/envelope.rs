//! Response envelope decoding.
//!
//! Every JSON response is wrapped the same way:
//!
//! ```json
//! { "success": true,  "data": { ... } }
//! { "success": false, "error": { "code": 105 } }
//! ```
//!
//! Failures become [`AudioStationError::Api`] with the code untouched.

use crate::error::{AudioStationError, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Session timed out.
pub const SESSION_TIMEOUT: i64 = 106;
/// Session interrupted by a duplicate login.
pub const SESSION_INTERRUPTED: i64 = 107;
/// Session id not found.
pub const SESSION_NOT_FOUND: i64 = 119;

/// Used when `success` is `false` but no error object was sent.
pub const UNKNOWN_ERROR: i64 = 100;

/// Whether `code` means the current session id is no longer usable.
pub fn is_session_invalid(code: i64) -> bool {
    matches!(code, SESSION_TIMEOUT | SESSION_INTERRUPTED | SESSION_NOT_FOUND)
}

#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub code: i64,
    /// Per-field details some APIs attach. Not interpreted.
    #[serde(default)]
    pub errors: Option<Value>,
}

impl Envelope {
    /// Parse a response body as an envelope.
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| {
            AudioStationError::Decode(format!("response is not an API envelope: {e}"))
        })
    }

    /// The error code, if this envelope reports failure.
    pub fn error_code(&self) -> Option<i64> {
        if self.success {
            return None;
        }
        Some(self.error.as_ref().map_or(UNKNOWN_ERROR, |e| e.code))
    }

    /// Deserialize `data` into `T`, or raise the envelope's error.
    ///
    /// A missing `data` field decodes as JSON `null`, so `()` and `Option<_>`
    /// payloads work for actions that return nothing.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T> {
        if let Some(code) = self.error_code() {
            return Err(AudioStationError::Api { code });
        }
        let data = self.data.unwrap_or(Value::Null);
        serde_json::from_value(data)
            .map_err(|e| AudioStationError::Decode(format!("unexpected data shape: {e}")))
    }
}

/// Decode a full response body into `T`.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    Envelope::parse(body)?.into_data()
}

/// Whether a body could be a JSON envelope rather than raw media.
pub fn looks_like_json(content_type: Option<&str>, body: &[u8]) -> bool {
    if content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json")) {
        return true;
    }
    body.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{')
}

/// Error code of a failure envelope, without committing to a parse.
///
/// Returns `None` for raw payloads, for success envelopes, and for JSON that
/// is not an envelope at all.
pub fn peek_error_code(content_type: Option<&str>, body: &[u8]) -> Option<i64> {
    if !looks_like_json(content_type, body) {
        return None;
    }
    Envelope::parse(body).ok()?.error_code()
}
