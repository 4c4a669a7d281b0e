//! Keyword search across the library.
//!
//! Endpoint: `SYNO.AudioStation.Search`, method `list`
//!
//! Request parameters:
//! - `keyword`: text to search for
//! - `additional`: detail blocks attached to matching songs
//!
//! Response:
//! ```json
//! {
//!   "success": true,
//!   "data": {
//!     "albumTotal": 1, "albums": [ ... ],
//!     "artistTotal": 0, "artists": [],
//!     "songTotal": 3, "songs": [ ... ]
//!   }
//! }
//! ```

use crate::client::AudioStationClient;
use crate::error::{AudioStationError, Result};
use crate::request::Request;
use crate::types::{AdditionalField, SearchResults};

pub const SEARCH_API: &str = "SYNO.AudioStation.Search";

impl AudioStationClient {
    /// Search albums, artists and songs for `keyword`.
    ///
    /// Songs come with every additional block.
    ///
    /// # Errors
    ///
    /// - [`AudioStationError::InvalidArgument`] for a blank keyword
    pub async fn search(&self, keyword: &str) -> Result<SearchResults> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(AudioStationError::InvalidArgument("empty search keyword".into()));
        }
        let request = Request::builder(SEARCH_API, "list")
            .param("additional", AdditionalField::join(&AdditionalField::ALL, ""))
            .param("keyword", keyword)
            .build();
        self.query_object(&request).await
    }
}
