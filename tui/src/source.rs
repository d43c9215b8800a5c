//! Auto-reconnecting `text/event-stream` client.
//!
//! [`EventSource::spawn`] starts a background task that opens the stream,
//! decodes frames, reports them to a [`SourceHandler`], and reconnects with
//! back-off whenever the transport fails. Only [`SourceHandle::close`] (or
//! dropping the handle) stops it.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, HOST};
use hyper::{Request, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use shared::framing::FrameDecoder;
use shared::types::{EVENTS_PATH, SseFrame};

/// Upper bound on TCP connect + HTTP handshake + response headers.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Floor for a server-sent `retry:` hint.
pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Invalid server url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Timed out connecting after {0:?}")]
    Timeout(Duration),

    #[error("HTTP request failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("Failed to build request: {0}")]
    Request(#[from] http::Error),

    #[error("Server answered {0}")]
    Status(StatusCode),

    #[error("Server did not send an event stream (content-type {0:?})")]
    ContentType(String),

    #[error("Event stream ended by server")]
    Ended,
}

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Where the stream lives: `http://host:port` plus the fixed events path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    /// `host:port` to dial
    pub authority: String,
    /// Value for the `Host` header
    pub host: String,
    /// Request target, always [`EVENTS_PATH`]
    pub path: String,
}

impl Endpoint {
    /// Build from a base url such as `http://127.0.0.1:3001`. Any path on the base is ignored.
    pub fn from_base_url(base_url: &str) -> Result<Self, SourceError> {
        let invalid = |reason: &str| SourceError::InvalidUrl {
            url: base_url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = base_url.parse().map_err(|_| invalid("not a url"))?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(_) => return Err(invalid("only http:// is supported")),
            None => return Err(invalid("missing http:// scheme")),
        }
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let port = uri.port_u16().unwrap_or(80);

        Ok(Self {
            authority: format!("{}:{}", host, port),
            host: uri
                .authority()
                .map(|a| a.as_str().to_string())
                .unwrap_or_else(|| host.to_string()),
            path: EVENTS_PATH.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Reconnect policy
// ---------------------------------------------------------------------------

/// Exponential back-off between connection attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    pub const DEFAULT: ReconnectPolicy = ReconnectPolicy {
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
    };

    /// Delay before reconnect number `attempt` (0-based) when the current base is `base`.
    pub fn delay(&self, base: Duration, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        base.saturating_mul(factor).min(self.max_delay)
    }

    /// Base delay for a `retry:` hint of `ms` milliseconds, never below [`MIN_RETRY_DELAY`].
    pub fn hinted_base(ms: u64) -> Duration {
        Duration::from_millis(ms).max(MIN_RETRY_DELAY)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Callbacks from the background task. Called from a single task, in order.
pub trait SourceHandler: Send + 'static {
    /// The stream is open (2xx with an event-stream body).
    fn on_open(&mut self);

    /// The transport failed. A reconnect follows unless the source was closed.
    fn on_error(&mut self, error: &SourceError);

    /// One decoded event.
    fn on_frame(&mut self, frame: SseFrame);

    /// The source stopped for good.
    fn on_close(&mut self) {}
}

// ---------------------------------------------------------------------------
// EventSource / SourceHandle
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum SourceCommand {
    Close,
}

pub struct EventSource;

impl EventSource {
    /// Start streaming from `endpoint`, reporting to `handler`.
    pub fn spawn<H: SourceHandler>(
        endpoint: Endpoint,
        policy: ReconnectPolicy,
        handler: H,
    ) -> SourceHandle {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let task = tokio::spawn(drive(endpoint, policy, handler, cmd_rx));
        SourceHandle { cmd_tx, task }
    }
}

/// Control handle for a running [`EventSource`]. Dropping it stops the source.
#[derive(Debug)]
pub struct SourceHandle {
    cmd_tx: mpsc::Sender<SourceCommand>,
    task: JoinHandle<()>,
}

impl SourceHandle {
    /// Stop the source, drop its socket, cancel any pending reconnect, and
    /// wait for the background task to finish.
    pub async fn close(mut self) {
        // Err means the task is already gone.
        let _ = self.cmd_tx.send(SourceCommand::Close).await;
        if let Err(e) = (&mut self.task).await {
            if !e.is_cancelled() {
                warn!("Event source task failed: {}", e);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SourceHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Internal: one HTTP connection
// ---------------------------------------------------------------------------

/// Aborts the HTTP connection task, closing its socket, when dropped.
struct ConnGuard(JoinHandle<()>);

impl Drop for ConnGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// An open response body and the connection carrying it.
struct OpenStream {
    body: Incoming,
    _conn: ConnGuard,
}

async fn connect(endpoint: &Endpoint) -> Result<OpenStream, SourceError> {
    let tcp = TcpStream::connect(&endpoint.authority)
        .await
        .map_err(|source| SourceError::Connect {
            addr: endpoint.authority.clone(),
            source,
        })?;

    let (mut sender, conn) = http1::handshake(TokioIo::new(tcp)).await?;
    let conn = ConnGuard(tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!("Event stream connection ended: {}", e);
        }
    }));

    let req = Request::get(endpoint.path.as_str())
        .header(HOST, endpoint.host.as_str())
        .header(ACCEPT, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .body(Empty::<Bytes>::new())?;

    let resp = sender.send_request(req).await?;

    if !resp.status().is_success() {
        return Err(SourceError::Status(resp.status()));
    }

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.starts_with("text/event-stream") {
        return Err(SourceError::ContentType(content_type));
    }

    Ok(OpenStream {
        body: resp.into_body(),
        _conn: conn,
    })
}

// ---------------------------------------------------------------------------
// Internal: background driver
// ---------------------------------------------------------------------------

async fn drive<H: SourceHandler>(
    endpoint: Endpoint,
    policy: ReconnectPolicy,
    mut handler: H,
    mut cmd_rx: mpsc::Receiver<SourceCommand>,
) {
    let mut attempt: u32 = 0;
    let mut base_delay = policy.base_delay;

    loop {
        // --- Establish connection ---
        debug!(authority = %endpoint.authority, attempt, "Event stream connecting");
        let connected = tokio::select! {
            biased;
            cmd = cmd_rx.recv() => {
                debug!(?cmd, "Event source closing while connecting");
                handler.on_close();
                return;
            }
            result = tokio::time::timeout(CONNECT_TIMEOUT, connect(&endpoint)) => {
                result.unwrap_or_else(|_| Err(SourceError::Timeout(CONNECT_TIMEOUT)))
            }
        };

        let failure = match connected {
            Ok(mut stream) => {
                info!(authority = %endpoint.authority, "Event stream open");
                handler.on_open();

                // The back-off only resets once the stream has carried an event.
                let mut delivered = false;
                let mut decoder = FrameDecoder::new();
                loop {
                    tokio::select! {
                        biased;
                        cmd = cmd_rx.recv() => {
                            info!(?cmd, "Event source closing");
                            handler.on_close();
                            return;
                        }
                        frame = stream.body.frame() => match frame {
                            Some(Ok(frame)) => {
                                let Ok(data) = frame.into_data() else { continue };
                                decoder.push(&data);
                                loop {
                                    match decoder.next_frame() {
                                        Ok(Some(event)) => {
                                            if !delivered {
                                                delivered = true;
                                                attempt = 0;
                                            }
                                            handler.on_frame(event);
                                        }
                                        Ok(None) => break,
                                        Err(e) => warn!("Skipping undecodable line: {}", e),
                                    }
                                }
                                if let Some(ms) = decoder.retry_hint() {
                                    base_delay = ReconnectPolicy::hinted_base(ms);
                                }
                            }
                            Some(Err(e)) => break SourceError::Http(e),
                            None => break SourceError::Ended,
                        }
                    }
                }
            }
            Err(e) => e,
        };

        warn!(error = %failure, "Event stream unavailable");
        handler.on_error(&failure);

        // --- Back off, unless closed meanwhile ---
        let delay = policy.delay(base_delay, attempt);
        attempt = attempt.saturating_add(1);
        debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Event stream reconnecting after backoff"
        );

        tokio::select! {
            biased;
            cmd = cmd_rx.recv() => {
                debug!(?cmd, "Event source closing during backoff");
                handler.on_close();
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
