//! HTTP transport boundary.
//!
//! The dispatcher never talks to `reqwest` directly; it hands a fully
//! rendered [`HttpRequest`] to a [`Transport`]. Production code uses
//! [`HttpTransport`], tests substitute an in-memory fake.

use crate::config::ClientConfig;
use crate::error::{AudioStationError, Result};
use crate::request::HttpMethod;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use std::pin::Pin;
use std::time::Duration;

/// Incremental response body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A request ready to go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    /// Query pairs for GET, form pairs for POST.
    pub params: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Response whose body is read chunk by chunk.
pub struct StreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ByteStream,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and buffer the whole body.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Send a request and return as soon as the headers arrive.
    ///
    /// Dropping the returned body closes the connection.
    async fn open_stream(&self, request: HttpRequest) -> Result<StreamResponse>;
}

/// [`Transport`] backed by a [`reqwest::Client`].
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        // No total timeout here: it would cut long streams. Non-streaming
        // deadlines are enforced by the dispatcher.
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }

    fn prepare(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        match request.method {
            HttpMethod::Get => self.http.get(&request.url).query(&request.params),
            HttpMethod::Post => self.http.post(&request.url).form(&request.params),
        }
    }
}

fn content_type(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let resp = self.prepare(&request).send().await?;
        let status = resp.status().as_u16();
        let content_type = content_type(&resp);
        let body = resp.bytes().await?;
        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<StreamResponse> {
        let resp = self.prepare(&request).send().await?;
        let status = resp.status().as_u16();
        let content_type = content_type(&resp);
        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(AudioStationError::from));
        Ok(StreamResponse {
            status,
            content_type,
            body: Box::pin(body),
        })
    }
}
