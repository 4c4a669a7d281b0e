//! Logical API name → versioned endpoint resolution.
//!
//! The server advertises its APIs through `SYNO.API.Info`:
//!
//! ```json
//! {
//!   "success": true,
//!   "data": {
//!     "SYNO.API.Auth":          { "path": "auth.cgi", "minVersion": 1, "maxVersion": 6 },
//!     "SYNO.AudioStation.Song": {
//!       "path": "AudioStation/song.cgi", "minVersion": 1, "maxVersion": 3
//!     }
//!   }
//! }
//! ```
//!
//! Discovery runs once, on the first [`ApiRegistry::resolve`], and only for
//! names on the configured allow-list.

use crate::error::{AudioStationError, Result};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// The discovery API. Its location is fixed, so it is never looked up.
pub const INFO_API: &str = "SYNO.API.Info";
pub const AUTH_API: &str = "SYNO.API.Auth";

/// A resolved API endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDescriptor {
    /// Logical name, e.g. `SYNO.AudioStation.Song`.
    pub name: String,
    /// Path under `/webapi/`.
    pub path: String,
    /// Version the client speaks (the highest the server offers).
    pub version: u32,
    pub min_version: u32,
    pub max_version: u32,
}

impl ApiDescriptor {
    pub(crate) fn info() -> Self {
        Self {
            name: INFO_API.to_owned(),
            path: "query.cgi".to_owned(),
            version: 1,
            min_version: 1,
            max_version: 1,
        }
    }
}

/// One entry of the `SYNO.API.Info` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvertisedApi {
    pub path: String,
    #[serde(rename = "minVersion")]
    pub min_version: u32,
    #[serde(rename = "maxVersion")]
    pub max_version: u32,
}

pub type Capabilities = HashMap<String, AdvertisedApi>;

/// Cache of resolved endpoints, valid for the lifetime of one client.
pub struct ApiRegistry {
    allowed: HashSet<String>,
    advertised: OnceCell<Capabilities>,
    resolved: Mutex<HashMap<String, ApiDescriptor>>,
}

impl ApiRegistry {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            advertised: OnceCell::new(),
            resolved: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed.contains(name)
    }

    /// Whether capability discovery has completed.
    pub fn is_discovered(&self) -> bool {
        self.advertised.initialized()
    }

    /// Resolve `name`, running `discover` if the server has not been asked yet.
    ///
    /// Concurrent first callers share a single discovery. A failed discovery
    /// is returned to its callers and retried by the next `resolve`.
    pub async fn resolve<F, Fut>(&self, name: &str, discover: F) -> Result<ApiDescriptor>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Capabilities>>,
    {
        if name == INFO_API {
            return Ok(ApiDescriptor::info());
        }
        if !self.is_allowed(name) {
            return Err(AudioStationError::UnsupportedApi(name.to_owned()));
        }
        if let Some(descriptor) = self.resolved.lock().get(name) {
            return Ok(descriptor.clone());
        }

        let api = self
            .ensure_discovered(discover)
            .await?
            .get(name)
            .ok_or_else(|| AudioStationError::UnsupportedApi(name.to_owned()))?;
        let descriptor = ApiDescriptor {
            name: name.to_owned(),
            path: api.path.clone(),
            version: api.max_version,
            min_version: api.min_version,
            max_version: api.max_version,
        };
        debug!(api = name, path = %descriptor.path, version = descriptor.version, "resolved API");
        self.resolved
            .lock()
            .insert(name.to_owned(), descriptor.clone());
        Ok(descriptor)
    }

    /// Run capability discovery unless it has already succeeded.
    pub async fn ensure_discovered<F, Fut>(&self, discover: F) -> Result<&Capabilities>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Capabilities>>,
    {
        self.advertised
            .get_or_try_init(|| async move {
                let caps = discover().await?;
                self.check_allow_list(&caps);
                Ok::<_, AudioStationError>(caps)
            })
            .await
    }

    /// Allow-listed APIs the server advertises, sorted by name.
    ///
    /// Empty until discovery has run.
    pub fn available(&self) -> Vec<ApiDescriptor> {
        let Some(advertised) = self.advertised.get() else {
            return Vec::new();
        };
        let mut out: Vec<_> = advertised
            .iter()
            .filter(|(name, _)| self.is_allowed(name))
            .map(|(name, api)| ApiDescriptor {
                name: name.clone(),
                path: api.path.clone(),
                version: api.max_version,
                min_version: api.min_version,
                max_version: api.max_version,
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    fn check_allow_list(&self, caps: &Capabilities) {
        let mut missing: Vec<&str> = self
            .allowed
            .iter()
            .filter(|name| !caps.contains_key(name.as_str()))
            .map(String::as_str)
            .collect();
        missing.sort_unstable();
        debug!(advertised = caps.len(), "capability discovery complete");
        if !missing.is_empty() {
            warn!(?missing, "allow-listed APIs not advertised by the server");
        }
    }
}
