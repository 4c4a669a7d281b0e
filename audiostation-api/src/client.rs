//! Audio Station client and the generic request dispatcher.
//!
//! Every API method ends up in one of four dispatch modes:
//!
//! | Mode                                           | Body handling                      |
//! |------------------------------------------------|------------------------------------|
//! | [`query_object`](AudioStationClient::query_object) | envelope → `T`                 |
//! | [`query_list`](AudioStationClient::query_list)     | envelope → [`PagedResult<T>`]  |
//! | [`query_bytes`](AudioStationClient::query_bytes)   | raw bytes, unless error envelope |
//! | [`query_stream`](AudioStationClient::query_stream) | chunked, cancellable           |
//!
//! All four share the same pipeline: resolve the endpoint, attach the
//! session id, send, and on a session-expired code log in again and resend
//! exactly once.

use crate::auth::{Credentials, SessionContext, SessionManager, describe_auth_code};
use crate::config::ClientConfig;
use crate::envelope::{self, is_session_invalid, looks_like_json, peek_error_code};
use crate::error::{AudioStationError, Result};
use crate::registry::{AUTH_API, ApiDescriptor, ApiRegistry, Capabilities, INFO_API};
use crate::request::{ParamValue, Request, RequestBuilder};
use crate::stream::AudioStream;
use crate::transport::{ByteStream, HttpResponse, HttpTransport, Transport};
use crate::types::{ByteArrayData, Listing, Page, PagedResult};
use bytes::{Bytes, BytesMut};
use futures_util::{StreamExt, stream};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Asynchronous client for the Audio Station web API.
///
/// Holds the transport, the endpoint registry and the session. API methods
/// are implemented in separate modules (`library`, `song`, `playlist`,
/// `search`) as `impl AudioStationClient` blocks.
///
/// All methods take `&self`; share the client between tasks with an [`Arc`].
pub struct AudioStationClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    registry: ApiRegistry,
    session: SessionManager,
}

#[derive(Deserialize)]
struct LoginData {
    sid: String,
}

#[derive(Deserialize)]
struct ListData {
    total: u64,
    #[serde(default)]
    offset: Option<u64>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl AudioStationClient {
    /// Create a client talking HTTP to `config.base_url`.
    ///
    /// Nothing is sent until the first call.
    pub fn new(config: ClientConfig, credentials: Credentials) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, credentials, Arc::new(transport)))
    }

    /// Create a client over a custom [`Transport`].
    pub fn with_transport(
        config: ClientConfig,
        credentials: Credentials,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            registry: ApiRegistry::new(config.apis.iter().cloned()),
            session: SessionManager::new(credentials),
            transport,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolve a logical API name to its endpoint.
    pub async fn resolve(&self, api: &str) -> Result<ApiDescriptor> {
        self.registry.resolve(api, || self.discover()).await
    }

    /// Allow-listed APIs the server advertises.
    pub async fn supported_apis(&self) -> Result<Vec<ApiDescriptor>> {
        self.registry.ensure_discovered(|| self.discover()).await?;
        Ok(self.registry.available())
    }

    async fn discover(&self) -> Result<Capabilities> {
        let request = Request::builder(INFO_API, "query")
            .param("query", "all")
            .anonymous()
            .build();
        debug!("discovering server APIs");
        let response = self
            .send(&request, Some(&ApiDescriptor::info()), None)
            .await?;
        envelope::decode(&response.body)
    }

    /// Log in unless a session is already live.
    pub async fn login(&self) -> Result<SessionContext> {
        self.session
            .ensure_authenticated(|c| self.authenticate(c))
            .await
    }

    /// Replace the credentials used for the next login.
    pub async fn set_credentials(&self, credentials: Credentials) {
        self.session.set_credentials(credentials).await;
    }

    /// End the session on the server.
    ///
    /// The local session is dropped first, so it is gone even if the server
    /// call fails. Does nothing when not logged in.
    pub async fn logout(&self) -> Result<()> {
        let Some(session) = self.session.sign_out().await else {
            return Ok(());
        };
        let descriptor = self.resolve(AUTH_API).await?;
        let request = Request::builder(AUTH_API, "logout")
            .param("session", self.config.session_name.as_str())
            .anonymous()
            .build();
        let response = self
            .send(&request, Some(&descriptor), Some(session.sid()))
            .await?;
        envelope::decode::<IgnoredAny>(&response.body)?;
        info!("logged out");
        Ok(())
    }

    async fn authenticate(&self, credentials: Credentials) -> Result<String> {
        let descriptor = self.resolve(AUTH_API).await?;
        let request = Request::builder(AUTH_API, "login")
            .param("account", credentials.account.as_str())
            .param("passwd", credentials.password())
            .param("session", self.config.session_name.as_str())
            .param("format", "sid")
            .param_opt("otp_code", credentials.otp_code.as_deref())
            .anonymous()
            .post()
            .build();
        let response = self.send(&request, Some(&descriptor), None).await?;
        let login: LoginData = envelope::decode(&response.body).map_err(|err| match err {
            AudioStationError::Api { code } => AudioStationError::Authentication {
                code: Some(code),
                message: describe_auth_code(code),
            },
            other => other,
        })?;
        Ok(login.sid)
    }

    /// Start a request carrying the configured `library` scope.
    pub(crate) fn library_request(&self, api: &str, action: &str) -> RequestBuilder {
        Request::builder(api, action).param("library", self.config.library())
    }

    /// The endpoint `request` goes to; `None` for a fixed path.
    async fn endpoint_for(&self, request: &Request) -> Result<Option<ApiDescriptor>> {
        if request.fixed_path().is_some() {
            return Ok(None);
        }
        self.resolve(request.api()).await.map(Some)
    }

    fn deadline(&self, request: &Request) -> Option<Duration> {
        request.timeout().or_else(|| self.config.timeout())
    }

    /// One round-trip, no session handling.
    async fn send(
        &self,
        request: &Request,
        descriptor: Option<&ApiDescriptor>,
        sid: Option<&str>,
    ) -> Result<HttpResponse> {
        let http = request.to_http(&self.config.base_url, descriptor, sid);
        debug!(
            api = request.api(),
            method = request.action(),
            version = descriptor.map(|d| d.version),
            "dispatching request"
        );
        let response = with_deadline(self.deadline(request), self.transport.send(http)).await?;
        check_status(
            response.status,
            response.content_type.as_deref(),
            &response.body,
        )?;
        Ok(response)
    }

    /// Resolve, authenticate, send, and retry once on an expired session.
    async fn execute(&self, request: &Request) -> Result<HttpResponse> {
        let descriptor = self.endpoint_for(request).await?;
        if !request.requires_session() {
            return self.send(request, descriptor.as_ref(), None).await;
        }

        let session = self.login().await?;
        let response = self
            .send(request, descriptor.as_ref(), Some(session.sid()))
            .await?;
        match peek_error_code(response.content_type.as_deref(), &response.body) {
            Some(code) if is_session_invalid(code) => {
                warn!(api = request.api(), code, "session rejected by server");
                let session = self
                    .session
                    .reauthenticate(&session, |c| self.authenticate(c))
                    .await?;
                self.send(request, descriptor.as_ref(), Some(session.sid())).await
            }
            _ => Ok(response),
        }
    }

    /// Dispatch `request` and decode the envelope's `data` into `T`.
    pub async fn query_object<T: DeserializeOwned>(&self, request: &Request) -> Result<T> {
        let response = self.execute(request).await?;
        envelope::decode(&response.body)
    }

    /// Dispatch `request` for one page of `T`.
    ///
    /// `limit` and `offset` are appended to the request. The client never
    /// fetches further pages on its own; if the server returns more than
    /// `limit` items the surplus is dropped.
    pub async fn query_list<T: Listing>(
        &self,
        request: &Request,
        page: Page,
    ) -> Result<PagedResult<T>> {
        let request = request.with_params([
            ("limit", ParamValue::from(page.limit)),
            ("offset", ParamValue::from(page.offset)),
        ]);
        let mut data: ListData = self.query_object(&request).await?;

        let mut items: Vec<T> = match data.rest.remove(T::ITEMS) {
            None | Some(Value::Null) => Vec::new(),
            Some(value) => serde_json::from_value(value).map_err(|e| {
                AudioStationError::Decode(format!("unexpected `{}` items: {e}", T::ITEMS))
            })?,
        };
        let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
        if items.len() > limit {
            warn!(
                api = request.api(),
                returned = items.len(),
                limit,
                "server returned more items than requested"
            );
            items.truncate(limit);
        }

        Ok(PagedResult {
            total: data.total,
            offset: data.offset.unwrap_or(u64::from(page.offset)),
            items,
        })
    }

    /// Dispatch `request` and return the body untouched.
    ///
    /// Binary endpoints answer with raw bytes on success but with a JSON
    /// envelope on failure. A body that looks like JSON and parses as a
    /// failure envelope becomes [`AudioStationError::Api`]; anything else,
    /// JSON included, is returned as is.
    pub async fn query_bytes(&self, request: &Request) -> Result<ByteArrayData> {
        let response = self.execute(request).await?;
        if let Some(code) = peek_error_code(response.content_type.as_deref(), &response.body) {
            return Err(AudioStationError::Api { code });
        }
        Ok(ByteArrayData {
            content_type: response.content_type,
            data: response.body,
        })
    }

    /// Dispatch `request` and return its body as an [`AudioStream`].
    ///
    /// Returns once the response headers arrive. An error envelope at that
    /// point is handled like any other response, including the single
    /// session retry, since no bytes have been handed out yet. Failures after
    /// that are reported through the stream and never retried.
    ///
    /// Audio, image and octet-stream bodies are handed over untouched. For
    /// any other content type the first chunk is inspected: a body starting
    /// with `{` is read in full and decoded as an envelope, anything else is
    /// streamed with that chunk put back in front.
    ///
    /// `cancel` aborts the open as well as the transfer.
    pub async fn query_stream(
        &self,
        request: &Request,
        cancel: CancellationToken,
    ) -> Result<AudioStream> {
        let descriptor = self.endpoint_for(request).await?;
        let mut session = if request.requires_session() {
            Some(self.login().await?)
        } else {
            None
        };
        let mut retried = false;

        loop {
            let http = request.to_http(
                &self.config.base_url,
                descriptor.as_ref(),
                session.as_ref().map(SessionContext::sid),
            );
            debug!(api = request.api(), method = request.action(), "opening stream");
            let open = with_deadline(self.deadline(request), self.transport.open_stream(http));
            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AudioStationError::Cancelled),
                response = open => response?,
            };
            let status = response.status;
            let content_type = response.content_type;
            let mut body = response.body;

            if is_media(content_type.as_deref()) {
                check_status(status, None, &[])?;
                return Ok(AudioStream::new(body, content_type, cancel));
            }

            let head = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AudioStationError::Cancelled),
                chunk = body.next() => chunk.transpose()?.unwrap_or_default(),
            };
            if !looks_like_json(content_type.as_deref(), &head) {
                check_status(status, None, &[])?;
                let body: ByteStream = if head.is_empty() {
                    body
                } else {
                    Box::pin(
                        stream::once(async move { Ok::<_, AudioStationError>(head) }).chain(body),
                    )
                };
                return Ok(AudioStream::new(body, content_type, cancel));
            }

            let rest = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(AudioStationError::Cancelled),
                rest = read_to_end(body) => rest?,
            };
            let mut buf = BytesMut::with_capacity(head.len() + rest.len());
            buf.extend_from_slice(&head);
            buf.extend_from_slice(&rest);
            let body = buf.freeze();

            match peek_error_code(content_type.as_deref(), &body) {
                Some(code) if is_session_invalid(code) && !retried => {
                    if let Some(stale) = session.take() {
                        warn!(api = request.api(), code, "session rejected by server");
                        retried = true;
                        session = Some(
                            self.session
                                .reauthenticate(&stale, |c| self.authenticate(c))
                                .await?,
                        );
                        continue;
                    }
                    return Err(AudioStationError::Api { code });
                }
                Some(code) => return Err(AudioStationError::Api { code }),
                None => {
                    check_status(status, content_type.as_deref(), &body)?;
                    let replay: ByteStream =
                        Box::pin(stream::once(async move { Ok::<_, AudioStationError>(body) }));
                    return Ok(AudioStream::new(replay, content_type, cancel));
                }
            }
        }
    }
}

/// Content types that are never an API envelope.
fn is_media(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        let ct = ct.trim_start().to_ascii_lowercase();
        ["audio/", "video/", "image/", "application/octet-stream"]
            .iter()
            .any(|prefix| ct.starts_with(prefix))
    })
}

async fn with_deadline<T, F>(deadline: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| AudioStationError::Timeout(limit))?,
        None => fut.await,
    }
}

/// Non-2xx responses are errors unless they carry an API error envelope,
/// which is left for the envelope decoder.
fn check_status(status: u16, content_type: Option<&str>, body: &[u8]) -> Result<()> {
    if (200..300).contains(&status) || peek_error_code(content_type, body).is_some() {
        return Ok(());
    }
    Err(AudioStationError::HttpStatus(status))
}

async fn read_to_end(mut body: ByteStream) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_transport::{FakeTransport, Reply, channel_stream, client_for as client};
    use crate::stream::TranscodeMode;
    use crate::types::Song;
    use futures_util::future::join_all;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    const SONG: &str = "SYNO.AudioStation.Song";
    const COVER: &str = "SYNO.AudioStation.Cover";
    const STREAM: &str = "SYNO.AudioStation.Stream";

    fn songs(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| {
                json!({ "id": format!("music_{i}"), "title": format!("Track {i}"), "type": "file" })
            })
            .collect()
    }

    fn getinfo() -> Request {
        Request::builder(SONG, "getinfo").param("id", "music_1").build()
    }

    #[tokio::test]
    async fn unadvertised_api_fails_after_discovery_only() {
        let transport = FakeTransport::audio_station(&[AUTH_API, "SYNO.AudioStation.Album"], |_| {
            Reply::Json(json!({ "success": true }))
        });
        let client = client(&transport);

        let err = client.resolve(SONG).await.unwrap_err();
        assert!(matches!(err, AudioStationError::UnsupportedApi(ref n) if n == SONG));
        let err = client.query_object::<Value>(&getinfo()).await.unwrap_err();
        assert!(matches!(err, AudioStationError::UnsupportedApi(_)));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].param("api"), Some(INFO_API));
        assert_eq!(sent[0].url, "http://nas:5000/webapi/query.cgi");
    }

    #[tokio::test]
    async fn discovery_runs_once() {
        let transport = FakeTransport::audio_station(&[AUTH_API, SONG], |_| {
            Reply::Json(json!({ "success": true, "data": {} }))
        });
        let client = client(&transport);

        let a = client.resolve(SONG).await.unwrap();
        let b = client.resolve(SONG).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.path, "AudioStation/song.cgi");
        client.query_object::<Value>(&getinfo()).await.unwrap();
        assert_eq!(transport.count(INFO_API, "query"), 1);
    }

    #[tokio::test]
    async fn error_envelope_surfaces_code() {
        let transport = FakeTransport::audio_station(&[AUTH_API, SONG], |_| {
            Reply::Json(json!({ "success": false, "error": { "code": 105 } }))
        });
        let err = client(&transport)
            .query_object::<Value>(&getinfo())
            .await
            .unwrap_err();
        assert!(matches!(err, AudioStationError::Api { code: 105 }));
    }

    #[tokio::test]
    async fn requests_carry_session_and_version() {
        let transport = FakeTransport::audio_station(&[AUTH_API, SONG], |_| {
            Reply::Json(json!({ "success": true, "data": { "songs": [] } }))
        });
        client(&transport)
            .query_object::<Value>(&getinfo())
            .await
            .unwrap();

        let sent = transport.sent();
        let login = sent.iter().find(|r| r.param("method") == Some("login")).unwrap();
        assert_eq!(login.method, crate::request::HttpMethod::Post);
        assert_eq!(login.param("account"), Some("admin"));
        assert_eq!(login.param("format"), Some("sid"));
        assert_eq!(login.param("session"), Some("AudioStation"));

        let call = sent.last().unwrap();
        assert_eq!(call.url, "http://nas:5000/webapi/AudioStation/song.cgi");
        assert_eq!(call.param("version"), Some("2"));
        assert_eq!(call.param("method"), Some("getinfo"));
        assert_eq!(call.param("_sid"), Some("sid-1"));
    }

    fn paging_server() -> Arc<FakeTransport> {
        FakeTransport::audio_station(&[AUTH_API, SONG], |req| {
            let all = songs(25);
            let limit: usize = req.param("limit").unwrap().parse().unwrap();
            let offset: usize = req.param("offset").unwrap().parse().unwrap();
            let window: Vec<_> = all.iter().skip(offset).take(limit).cloned().collect();
            Reply::Json(json!({
                "success": true,
                "data": { "total": all.len(), "offset": offset, "songs": window }
            }))
        })
    }

    #[tokio::test]
    async fn list_returns_requested_window() {
        let transport = paging_server();
        let client = client(&transport);
        let request = Request::builder(SONG, "list").build();

        let page = client
            .query_list::<Song>(&request, Page::new(10, 0))
            .await
            .unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.items[0].id, "music_0");

        let last = client
            .query_list::<Song>(&request, Page::new(10, 20))
            .await
            .unwrap();
        assert_eq!(last.items.len(), 5);
        assert_eq!(last.offset, 20);
        assert_eq!(last.items[4].id, "music_24");
    }

    #[tokio::test]
    async fn list_with_zero_limit_counts_only() {
        let transport = paging_server();
        let page = client(&transport)
            .query_list::<Song>(&Request::builder(SONG, "list").build(), Page::count_only())
            .await
            .unwrap();
        assert_eq!(page.total, 25);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn list_truncates_oversized_pages() {
        let transport = FakeTransport::audio_station(&[AUTH_API, SONG], |_| {
            Reply::Json(json!({ "success": true, "data": { "total": 25, "songs": songs(25) } }))
        });
        let page = client(&transport)
            .query_list::<Song>(&Request::builder(SONG, "list").build(), Page::new(3, 0))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.offset, 0);
    }

    #[tokio::test]
    async fn list_without_total_is_decode_error() {
        let transport = FakeTransport::audio_station(&[AUTH_API, SONG], |_| {
            Reply::Json(json!({ "success": true, "data": { "songs": [] } }))
        });
        let err = client(&transport)
            .query_list::<Song>(&Request::builder(SONG, "list").build(), Page::new(3, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, AudioStationError::Decode(_)));
    }

    /// Rejects `sid-1` with 119, accepts any later session.
    fn expiring_server() -> Arc<FakeTransport> {
        FakeTransport::audio_station(&[AUTH_API, SONG], |req| {
            if req.param("_sid") == Some("sid-1") {
                Reply::Json(json!({ "success": false, "error": { "code": 119 } }))
            } else {
                Reply::Json(json!({ "success": true, "data": { "sid": req.param("_sid") } }))
            }
        })
    }

    #[tokio::test]
    async fn expired_session_is_renewed_once_for_concurrent_calls() {
        let transport = expiring_server();
        let client = client(&transport);
        client.login().await.unwrap();

        let request = getinfo();
        let results = join_all((0..8).map(|_| client.query_object::<Value>(&request))).await;

        assert_eq!(transport.logins.load(Ordering::SeqCst), 2);
        for r in results {
            assert_eq!(r.unwrap()["sid"], "sid-2");
        }
    }

    #[tokio::test]
    async fn second_expiry_is_surfaced() {
        let transport = FakeTransport::audio_station(&[AUTH_API, SONG], |_| {
            Reply::Json(json!({ "success": false, "error": { "code": 106 } }))
        });
        let err = client(&transport)
            .query_object::<Value>(&getinfo())
            .await
            .unwrap_err();
        assert!(matches!(err, AudioStationError::Api { code: 106 }));
        assert_eq!(transport.logins.load(Ordering::SeqCst), 2);
        assert_eq!(transport.count(SONG, "getinfo"), 2);
    }

    #[tokio::test]
    async fn failed_relogin_is_shared() {
        let transport = FakeTransport::audio_station_with_login(
            &[AUTH_API, SONG],
            |n| {
                if n == 1 {
                    Reply::Json(json!({ "success": true, "data": { "sid": "sid-1" } }))
                } else {
                    Reply::Json(json!({ "success": false, "error": { "code": 400 } }))
                }
            },
            |_| Reply::Json(json!({ "success": false, "error": { "code": 119 } })),
        );
        let client = client(&transport);
        client.login().await.unwrap();

        let request = getinfo();
        let results = join_all((0..5).map(|_| client.query_object::<Value>(&request))).await;

        assert_eq!(transport.logins.load(Ordering::SeqCst), 2);
        for r in results {
            let err = r.unwrap_err();
            assert!(matches!(err, AudioStationError::Authentication { code: Some(400), .. }));
        }
    }

    #[tokio::test]
    async fn rejected_login() {
        let transport = FakeTransport::audio_station_with_login(
            &[AUTH_API, SONG],
            |_| Reply::Json(json!({ "success": false, "error": { "code": 400 } })),
            |_| Reply::Json(json!({ "success": true })),
        );
        let err = client(&transport).login().await.unwrap_err();
        match err {
            AudioStationError::Authentication { code, message } => {
                assert_eq!(code, Some(400));
                assert!(message.contains("incorrect password"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn logout_ends_session() {
        let transport = FakeTransport::audio_station(&[AUTH_API, SONG], |_| {
            Reply::Json(json!({ "success": true, "data": {} }))
        });
        let client = client(&transport);
        client.query_object::<Value>(&getinfo()).await.unwrap();
        client.logout().await.unwrap();
        client.logout().await.unwrap();
        assert_eq!(transport.count(AUTH_API, "logout"), 1);
        let logout = transport
            .sent()
            .into_iter()
            .find(|r| r.param("method") == Some("logout"))
            .unwrap();
        assert_eq!(logout.param("_sid"), Some("sid-1"));

        client.query_object::<Value>(&getinfo()).await.unwrap();
        assert_eq!(transport.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bytes_match_raw_transport() {
        let cover: Vec<u8> = vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
        let body = cover.clone();
        let transport = FakeTransport::audio_station(&[AUTH_API, COVER], move |_| {
            Reply::Raw {
                content_type: Some("image/jpeg"),
                body: body.clone(),
            }
        });
        let client = client(&transport);
        let request = Request::builder(COVER, "getcover")
            .param("album_name", "Blue")
            .param("album_artist_name", "Someone")
            .build();

        let data = client.query_bytes(&request).await.unwrap();
        let raw = transport
            .send(transport.sent().last().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(data.data, raw.body);
        assert_eq!(data.data.as_ref(), cover.as_slice());
        assert_eq!(data.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn bytes_error_envelope_becomes_api_error() {
        let transport = FakeTransport::audio_station(&[AUTH_API, COVER], |_| {
            Reply::Raw {
                content_type: Some("text/plain"),
                body: br#"{"success":false,"error":{"code":105}}"#.to_vec(),
            }
        });
        let request = Request::builder(COVER, "getcover").build();
        let err = client(&transport).query_bytes(&request).await.unwrap_err();
        assert!(matches!(err, AudioStationError::Api { code: 105 }));
    }

    #[tokio::test]
    async fn bytes_json_success_is_returned_verbatim() {
        let body = br#"{"success":true,"data":{"playlists":[]}}"#;
        let transport = FakeTransport::audio_station(&[AUTH_API, SONG], move |_| Reply::Raw {
            content_type: Some("application/json"),
            body: body.to_vec(),
        });
        let data = client(&transport).query_bytes(&getinfo()).await.unwrap();
        assert_eq!(data.data.as_ref(), body.as_slice());
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let transport = FakeTransport::audio_station(&[AUTH_API, SONG], |_| {
            Reply::Delayed(
                Duration::from_secs(10),
                Box::new(Reply::Json(json!({ "success": true }))),
            )
        });
        let request = Request::builder(SONG, "getinfo")
            .timeout(Duration::from_millis(50))
            .build();
        let err = client(&transport)
            .query_object::<Value>(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, AudioStationError::Timeout(d) if d == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn bare_http_error_status() {
        let transport = FakeTransport::audio_station(&[AUTH_API, SONG], |_| Reply::Status(502));
        let err = client(&transport)
            .query_object::<Value>(&getinfo())
            .await
            .unwrap_err();
        assert!(matches!(err, AudioStationError::HttpStatus(502)));
    }

    #[tokio::test]
    async fn stream_cancelled_after_two_chunks() {
        let (tx, body, released) = channel_stream();
        for i in 0..10u8 {
            tx.send(Ok(Bytes::from(vec![i; 8]))).await.unwrap();
        }
        let body = parking_lot::Mutex::new(Some(body));
        let transport = FakeTransport::audio_station(&[AUTH_API, STREAM], move |_| Reply::Stream {
            content_type: Some("audio/mpeg"),
            body: body.lock().take().expect("stream opened once"),
        });
        let client = client(&transport);
        let cancel = CancellationToken::new();

        let stream = client
            .query_stream(&TranscodeMode::Mp3_320.request("music_1", 0.0), cancel.clone())
            .await
            .unwrap();
        assert_eq!(stream.content_type(), Some("audio/mpeg"));

        let mut calls = 0;
        let err = stream
            .for_each_chunk(|_| {
                calls += 1;
                if calls == 2 {
                    cancel.cancel();
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AudioStationError::Cancelled));
        assert_eq!(calls, 2);
        assert!(released.load(Ordering::SeqCst));

        let sent = transport.sent().pop().unwrap();
        assert!(sent.url.ends_with("/0.mp3"));
        assert_eq!(sent.param("method"), Some("transcode"));
        assert_eq!(sent.param("_sid"), Some("sid-1"));
    }

    #[tokio::test]
    async fn stream_open_error_envelope() {
        let transport = FakeTransport::audio_station(&[AUTH_API, STREAM], |_| {
            Reply::Json(json!({ "success": false, "error": { "code": 105 } }))
        });
        let err = client(&transport)
            .query_stream(
                &TranscodeMode::Original.request("music_1", 0.0),
                CancellationToken::new(),
            )
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AudioStationError::Api { code: 105 }));
    }

    #[tokio::test]
    async fn stream_open_renews_expired_session() {
        let transport = FakeTransport::audio_station(&[AUTH_API, STREAM], |req| {
            if req.param("_sid") == Some("sid-1") {
                Reply::Json(json!({ "success": false, "error": { "code": 106 } }))
            } else {
                Reply::Raw {
                    content_type: Some("audio/flac"),
                    body: b"fLaC....".to_vec(),
                }
            }
        });
        let stream = client(&transport)
            .query_stream(
                &TranscodeMode::Original.request("music_1", 0.0),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let mut data = Vec::new();
        stream
            .for_each_chunk(|c| data.extend_from_slice(c))
            .await
            .unwrap();
        assert_eq!(data, b"fLaC....");
        assert_eq!(transport.logins.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_before_open() {
        let transport = FakeTransport::audio_station(&[AUTH_API, STREAM], |_| {
            Reply::Delayed(
                Duration::from_secs(10),
                Box::new(Reply::Raw {
                    content_type: Some("audio/mpeg"),
                    body: vec![0; 4],
                }),
            )
        });
        let client = client(&transport);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let result = tokio::time::timeout(
            Duration::from_secs(2),
            client.query_stream(&TranscodeMode::Original.request("music_1", 0.0), cancel),
        )
        .await
        .expect("cancellation must abort the open");
        assert!(matches!(result.err(), Some(AudioStationError::Cancelled)));
    }

    #[tokio::test]
    async fn first_login_timeout_is_shared_by_concurrent_calls() {
        let transport = FakeTransport::audio_station_with_login(
            &[AUTH_API, SONG],
            |_| {
                Reply::Delayed(
                    Duration::from_secs(5),
                    Box::new(Reply::Json(json!({ "success": true, "data": { "sid": "late" } }))),
                )
            },
            |_| Reply::Json(json!({ "success": true, "data": {} })),
        );
        let config = ClientConfig {
            timeout_secs: Some(1),
            ..ClientConfig::new("http://nas:5000")
        };
        let client = AudioStationClient::with_transport(
            config,
            Credentials::new("admin", "secret"),
            transport.clone(),
        );

        let request = getinfo();
        let started = std::time::Instant::now();
        let results = join_all((0..5).map(|_| client.query_object::<Value>(&request))).await;

        assert_eq!(transport.logins.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(3));
        for r in results {
            let err = r.unwrap_err();
            assert!(matches!(err, AudioStationError::Timeout(d) if d == Duration::from_secs(1)));
        }
        assert_eq!(transport.count(SONG, "getinfo"), 0);
    }

    #[tokio::test]
    async fn stream_open_sniffs_envelope_sent_as_text() {
        let transport = FakeTransport::audio_station(&[AUTH_API, STREAM], |req| {
            if req.param("_sid") == Some("sid-1") {
                Reply::Raw {
                    content_type: Some("text/plain"),
                    body: br#"{"success":false,"error":{"code":119}}"#.to_vec(),
                }
            } else {
                Reply::Raw {
                    content_type: Some("audio/mpeg"),
                    body: b"ID3\x04".to_vec(),
                }
            }
        });
        let stream = client(&transport)
            .query_stream(
                &TranscodeMode::Original.request("music_1", 0.0),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(stream.content_type(), Some("audio/mpeg"));
        let mut data = Vec::new();
        stream
            .for_each_chunk(|c| data.extend_from_slice(c))
            .await
            .unwrap();
        assert_eq!(data, b"ID3\x04");
        assert_eq!(transport.logins.load(Ordering::SeqCst), 2);
        assert_eq!(transport.count(STREAM, "stream"), 2);
    }

    #[tokio::test]
    async fn stream_without_content_type_keeps_first_chunk() {
        let (tx, body, _released) = channel_stream();
        tx.send(Ok(Bytes::from_static(b"RIFF"))).await.unwrap();
        tx.send(Ok(Bytes::from_static(b"WAVE"))).await.unwrap();
        drop(tx);
        let body = parking_lot::Mutex::new(Some(body));
        let transport = FakeTransport::audio_station(&[AUTH_API, STREAM], move |_| Reply::Stream {
            content_type: None,
            body: body.lock().take().expect("stream opened once"),
        });
        let stream = client(&transport)
            .query_stream(&TranscodeMode::Wav.request("music_1", 0.0), CancellationToken::new())
            .await
            .unwrap();
        let mut data = Vec::new();
        let total = stream
            .for_each_chunk(|c| data.extend_from_slice(c))
            .await
            .unwrap();
        assert_eq!(data, b"RIFFWAVE");
        assert_eq!(total, 8);
        assert_eq!(transport.logins.load(Ordering::SeqCst), 1);
    }
}
