//! In-memory [`Transport`] for tests.
//!
//! Answers discovery and login like a DiskStation would and hands every other
//! request to a test-supplied handler. All requests are recorded.

use crate::auth::Credentials;
use crate::client::AudioStationClient;
use crate::config::ClientConfig;
use crate::error::{AudioStationError, Result};
use crate::registry::{AUTH_API, INFO_API};
use crate::transport::{ByteStream, HttpRequest, HttpResponse, StreamResponse, Transport};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// What the fake server answers.
pub enum Reply {
    /// `200 application/json`.
    Json(Value),
    Raw {
        content_type: Option<&'static str>,
        body: Vec<u8>,
    },
    /// Empty body with the given status.
    Status(u16),
    Stream {
        content_type: Option<&'static str>,
        body: ByteStream,
    },
    Delayed(Duration, Box<Reply>),
}

type Handler = Box<dyn Fn(&HttpRequest) -> Reply + Send + Sync>;
type LoginHandler = Box<dyn Fn(usize) -> Reply + Send + Sync>;

pub struct FakeTransport {
    capabilities: Value,
    login: LoginHandler,
    handler: Handler,
    sent: Mutex<Vec<HttpRequest>>,
    /// Number of login requests received.
    pub logins: AtomicUsize,
}

impl FakeTransport {
    /// Server advertising `apis`. Login `n` succeeds with sid `sid-n`.
    pub fn audio_station<H>(apis: &[&str], handler: H) -> Arc<Self>
    where
        H: Fn(&HttpRequest) -> Reply + Send + Sync + 'static,
    {
        Self::audio_station_with_login(
            apis,
            |n| Reply::Json(json!({ "success": true, "data": { "sid": format!("sid-{n}") } })),
            handler,
        )
    }

    /// Like [`audio_station`](Self::audio_station), with login `n` (1-based)
    /// answered by `login(n)`.
    pub fn audio_station_with_login<L, H>(apis: &[&str], login: L, handler: H) -> Arc<Self>
    where
        L: Fn(usize) -> Reply + Send + Sync + 'static,
        H: Fn(&HttpRequest) -> Reply + Send + Sync + 'static,
    {
        let capabilities: Map<String, Value> = apis
            .iter()
            .map(|name| {
                let entry = if *name == AUTH_API {
                    json!({ "path": "auth.cgi", "minVersion": 1, "maxVersion": 6 })
                } else {
                    let leaf = name.rsplit('.').next().unwrap_or(name).to_lowercase();
                    let path = format!("AudioStation/{leaf}.cgi");
                    json!({ "path": path, "minVersion": 1, "maxVersion": 2 })
                };
                ((*name).to_owned(), entry)
            })
            .collect();
        Arc::new(Self {
            capabilities: Value::Object(capabilities),
            login: Box::new(login),
            handler: Box::new(handler),
            sent: Mutex::new(Vec::new()),
            logins: AtomicUsize::new(0),
        })
    }

    pub fn sent(&self) -> Vec<HttpRequest> {
        self.sent.lock().clone()
    }

    /// Number of recorded requests for `api` and `method`.
    pub fn count(&self, api: &str, method: &str) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|r| r.param("api") == Some(api) && r.param("method") == Some(method))
            .count()
    }

    fn route(&self, request: &HttpRequest) -> Reply {
        match (request.param("api"), request.param("method")) {
            (Some(INFO_API), _) => {
                Reply::Json(json!({ "success": true, "data": self.capabilities }))
            }
            (Some(AUTH_API), Some("login")) => {
                let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
                (self.login)(n)
            }
            (Some(AUTH_API), _) => Reply::Json(json!({ "success": true })),
            _ => (self.handler)(request),
        }
    }
}

fn single(chunk: Vec<u8>) -> ByteStream {
    Box::pin(stream::once(async move {
        Ok::<_, AudioStationError>(Bytes::from(chunk))
    }))
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut response = self.open_stream(request).await?;
        let mut body = BytesMut::new();
        while let Some(chunk) = response.body.next().await {
            body.extend_from_slice(&chunk?);
        }
        Ok(HttpResponse {
            status: response.status,
            content_type: response.content_type,
            body: body.freeze(),
        })
    }

    async fn open_stream(&self, request: HttpRequest) -> Result<StreamResponse> {
        let mut reply = self.route(&request);
        self.sent.lock().push(request);
        while let Reply::Delayed(delay, next) = reply {
            tokio::time::sleep(delay).await;
            reply = *next;
        }
        let response = match reply {
            Reply::Json(value) => StreamResponse {
                status: 200,
                content_type: Some("application/json; charset=utf-8".to_owned()),
                body: single(value.to_string().into_bytes()),
            },
            Reply::Raw { content_type, body } => StreamResponse {
                status: 200,
                content_type: content_type.map(str::to_owned),
                body: single(body),
            },
            Reply::Status(status) => StreamResponse {
                status,
                content_type: None,
                body: Box::pin(stream::empty()),
            },
            Reply::Stream { content_type, body } => StreamResponse {
                status: 200,
                content_type: content_type.map(str::to_owned),
                body,
            },
            Reply::Delayed(..) => unreachable!("delays are unwrapped above"),
        };
        Ok(response)
    }
}

/// Sets `released` when dropped, standing in for the HTTP connection.
struct Connection {
    rx: mpsc::Receiver<Result<Bytes>>,
    released: Arc<AtomicBool>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// A body fed through a channel. The flag is set once the body is dropped.
pub fn channel_stream() -> (mpsc::Sender<Result<Bytes>>, ByteStream, Arc<AtomicBool>) {
    let (tx, rx) = mpsc::channel(16);
    let released = Arc::new(AtomicBool::new(false));
    let conn = Connection {
        rx,
        released: Arc::clone(&released),
    };
    let body = stream::unfold(conn, |mut conn| async move {
        let chunk = conn.rx.recv().await?;
        Some((chunk, conn))
    });
    (tx, Box::pin(body), released)
}

/// Client for `http://nas:5000` over `transport`, logging in as `admin`.
pub fn client_for(transport: &Arc<FakeTransport>) -> AudioStationClient {
    AudioStationClient::with_transport(
        ClientConfig::new("http://nas:5000"),
        Credentials::new("admin", "secret"),
        transport.clone(),
    )
}
