//! Outbound request assembly.
//!
//! A [`Request`] names a logical API, an action (the wire `method`
//! parameter) and an ordered list of parameters already coerced to their wire
//! strings. It carries no session id and no resolved path, so the same value
//! can be replayed after a re-login.
//!
//! On the wire every call looks like:
//!
//! ```text
//! GET /webapi/<path><sub_path>?api=<name>&version=<v>&method=<action>&<params>&_sid=<sid>
//! ```
//!
//! POST requests carry the same pairs as a form body.
//!
//! A few web UI handlers live outside `/webapi` and are not advertised by
//! discovery. [`Request::fixed`] targets such a path directly; the action is
//! sent as `action` and there is no `api`/`version`:
//!
//! ```text
//! GET /<path>?action=<action>&<params>&_sid=<sid>
//! ```

use crate::error::Result;
use crate::registry::ApiDescriptor;
use crate::transport::HttpRequest;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// A parameter value in its wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamValue(String);

impl ParamValue {
    /// Comma-joined list, e.g. song ids or additional fields.
    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut out = String::new();
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(item.as_ref());
        }
        Self(out)
    }

    /// Pre-serialized JSON value.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self(serde_json::to_string(value)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&String> for ParamValue {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self(if b { "true" } else { "false" }.to_owned())
    }
}

macro_rules! int_param {
    ($($t:ty),*) => {
        $(impl From<$t> for ParamValue {
            fn from(n: $t) -> Self {
                Self(n.to_string())
            }
        })*
    };
}

int_param!(i32, i64, u8, u32, u64, usize);

/// A fully self-describing API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    api: String,
    action: String,
    http_method: HttpMethod,
    params: Vec<(String, ParamValue)>,
    sub_path: Option<String>,
    fixed_path: Option<String>,
    requires_session: bool,
    timeout: Option<Duration>,
}

impl Request {
    /// Start a request for `api` (e.g. `SYNO.AudioStation.Song`) and
    /// `action` (e.g. `list`).
    pub fn builder(api: impl Into<String>, action: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            request: Self {
                api: api.into(),
                action: action.into(),
                http_method: HttpMethod::Get,
                params: Vec::new(),
                sub_path: None,
                fixed_path: None,
                requires_session: true,
                timeout: None,
            },
        }
    }

    /// Start a request for a handler at a fixed `path` under the web root,
    /// bypassing API resolution. [`api`](Self::api) reports the path.
    pub fn fixed(path: impl Into<String>, action: impl Into<String>) -> RequestBuilder {
        let path = path.into();
        let mut builder = Self::builder(path.clone(), action);
        builder.request.fixed_path = Some(path);
        builder
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn http_method(&self) -> HttpMethod {
        self.http_method
    }

    pub fn sub_path(&self) -> Option<&str> {
        self.sub_path.as_deref()
    }

    /// Path of a [`fixed`](Self::fixed) request.
    pub fn fixed_path(&self) -> Option<&str> {
        self.fixed_path.as_deref()
    }

    pub fn requires_session(&self) -> bool {
        self.requires_session
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Look up a parameter's wire value.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Copy of this request with extra parameters appended.
    pub(crate) fn with_params<I>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, ParamValue)>,
    {
        let mut builder = RequestBuilder {
            request: self.clone(),
        };
        for (name, value) in extra {
            builder = builder.param(name, value);
        }
        builder.build()
    }

    /// Render into a transport request.
    ///
    /// `descriptor` is the resolved endpoint; it is `None` only for
    /// [`fixed`](Self::fixed) requests.
    pub(crate) fn to_http(
        &self,
        base_url: &str,
        descriptor: Option<&ApiDescriptor>,
        sid: Option<&str>,
    ) -> HttpRequest {
        let base = base_url.trim_end_matches('/');
        let mut params = Vec::with_capacity(self.params.len() + 4);
        let mut url = match descriptor {
            Some(descriptor) => {
                params.push(("api".to_owned(), self.api.clone()));
                params.push(("version".to_owned(), descriptor.version.to_string()));
                params.push(("method".to_owned(), self.action.clone()));
                format!("{base}/webapi/{}", descriptor.path.trim_start_matches('/'))
            }
            None => {
                params.push(("action".to_owned(), self.action.clone()));
                let path = self.fixed_path.as_deref().unwrap_or(&self.api);
                format!("{base}/{}", path.trim_start_matches('/'))
            }
        };
        if let Some(sub) = &self.sub_path {
            url.push_str(sub);
        }
        for (name, value) in &self.params {
            params.push((name.clone(), value.as_str().to_owned()));
        }
        if let Some(sid) = sid {
            params.push(("_sid".to_owned(), sid.to_owned()));
        }

        HttpRequest {
            method: self.http_method,
            url,
            params,
        }
    }
}

/// Builder for [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Append a parameter.
    ///
    /// Names must be unique. Setting a name twice keeps its original
    /// position and replaces the value.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.request.params.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.request.params.push((name, value)),
        }
        self
    }

    /// Append a parameter only when `value` is `Some`.
    pub fn param_opt<V: Into<ParamValue>>(
        self,
        name: impl Into<String>,
        value: Option<V>,
    ) -> Self {
        match value {
            Some(v) => self.param(name, v),
            None => self,
        }
    }

    /// Send parameters as a form body instead of a query string.
    pub fn post(mut self) -> Self {
        self.request.http_method = HttpMethod::Post;
        self
    }

    /// Path segment appended to the resolved endpoint (e.g. `/0.mp3`).
    pub fn sub_path(mut self, sub_path: impl Into<String>) -> Self {
        self.request.sub_path = Some(sub_path.into());
        self
    }

    /// Do not attach a session id (discovery and login).
    pub fn anonymous(mut self) -> Self {
        self.request.requires_session = false;
        self
    }

    /// Per-call deadline overriding the client default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}
