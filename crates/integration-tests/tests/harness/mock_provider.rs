//! Mock upstream provider for integration tests
//!
//! Serves canned replies keyed by request path and records every request it
//! receives, so tests can assert on both sides of the wire.

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use futures_util::{StreamExt, stream};
use tokio_util::sync::CancellationToken;

/// Event sent between chunks of a never-ending Anthropic stream
const ANTHROPIC_PING: &str = "event: ping\ndata: {\"type\":\"ping\"}\n\n";

/// Canned reply for one path
#[derive(Clone)]
pub struct Reply {
    status: StatusCode,
    content_type: &'static str,
    headers: Vec<(&'static str, String)>,
    body: ReplyBody,
    delay: Option<Duration>,
}

#[derive(Clone)]
enum ReplyBody {
    Full(String),
    /// First chunk, then keep-alive pings until the client hangs up
    Endless { first: String, released: Arc<AtomicBool> },
}

impl Reply {
    /// `200` with a JSON body
    pub fn json(body: &serde_json::Value) -> Self {
        Self::raw(StatusCode::OK, "application/json", body.to_string())
    }

    /// Server-sent events, one `data:` frame per value
    pub fn sse<'a>(events: impl IntoIterator<Item = &'a serde_json::Value>) -> Self {
        let body: String = events.into_iter().map(|e| format!("data: {e}\n\n")).collect();
        Self::raw(StatusCode::OK, "text/event-stream", body)
    }

    /// Server-sent events terminated by the `[DONE]` sentinel
    pub fn sse_done<'a>(events: impl IntoIterator<Item = &'a serde_json::Value>) -> Self {
        let mut reply = Self::sse(events);
        if let ReplyBody::Full(ref mut body) = reply.body {
            body.push_str("data: [DONE]\n\n");
        }
        reply
    }

    /// Named server-sent events, as Anthropic sends them
    pub fn named_sse<'a>(events: impl IntoIterator<Item = &'a serde_json::Value>) -> Self {
        let body: String = events
            .into_iter()
            .map(|e| format!("event: {}\ndata: {e}\n\n", e["type"].as_str().unwrap_or("message")))
            .collect();
        Self::raw(StatusCode::OK, "text/event-stream", body)
    }

    /// Newline-delimited JSON
    pub fn ndjson<'a>(lines: impl IntoIterator<Item = &'a serde_json::Value>) -> Self {
        let body: String = lines.into_iter().map(|l| format!("{l}\n")).collect();
        Self::raw(StatusCode::OK, "application/x-ndjson", body)
    }

    /// Error status with a JSON body
    pub fn error(status: u16, body: &serde_json::Value) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::raw(status, "application/json", body.to_string())
    }

    /// Anthropic stream that opens a text block, then pings until released
    ///
    /// `released` flips once the server drops the body, which happens when
    /// the client closes the connection.
    pub fn endless_anthropic(text: &str, released: Arc<AtomicBool>) -> Self {
        let start = serde_json::json!({"type": "message_start", "message": {"usage": {"input_tokens": 3}}});
        let block = serde_json::json!({
            "type": "content_block_start",
            "index": 0,
            "content_block": {"type": "text", "text": text}
        });
        let first = format!("event: message_start\ndata: {start}\n\nevent: content_block_start\ndata: {block}\n\n");

        Self {
            status: StatusCode::OK,
            content_type: "text/event-stream",
            headers: Vec::new(),
            body: ReplyBody::Endless { first, released },
            delay: None,
        }
    }

    fn raw(status: StatusCode, content_type: &'static str, body: String) -> Self {
        Self {
            status,
            content_type,
            headers: Vec::new(),
            body: ReplyBody::Full(body),
            delay: None,
        }
    }

    /// Add a response header
    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Wait before answering
    pub const fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A request as the mock received it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

#[derive(Default)]
struct MockState {
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<Recorded>>,
}

/// Mock provider bound to an ephemeral local port
pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

impl MockProvider {
    /// Start the mock server, returning immediately
    pub async fn start() -> anyhow::Result<Self> {
        super::init_tracing();

        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Serve `reply` for every request to `path`
    pub fn on(&self, path: &str, reply: Reply) -> &Self {
        self.state.replies.lock().unwrap().insert(path.to_owned(), reply);
        self
    }

    /// Base URL with the given path prefix, e.g. `/v1`
    pub fn url(&self, prefix: &str) -> url::Url {
        format!("http://{}{prefix}", self.addr).parse().unwrap()
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    /// The only request received, panicking otherwise
    pub fn single_request(&self) -> Recorded {
        let requests = self.requests();
        assert_eq!(requests.len(), 1, "expected exactly one request, got {}", requests.len());
        requests.into_iter().next().unwrap()
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Sets its flag when dropped
struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

async fn handle(State(state): State<Arc<MockState>>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let path = uri.path().to_owned();
    state.requests.lock().unwrap().push(Recorded {
        path: path.clone(),
        query: uri.query().map(ToOwned::to_owned),
        headers,
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    });

    let reply = state.replies.lock().unwrap().get(&path).cloned();
    let Some(reply) = reply else {
        return (StatusCode::NOT_FOUND, format!("no reply registered for {path}")).into_response();
    };

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    let body = match reply.body {
        ReplyBody::Full(body) => Body::from(body),
        ReplyBody::Endless { first, released } => {
            let guard = ReleaseFlag(released);
            let head = stream::once(async move { Ok::<_, Infallible>(Bytes::from(first)) });
            let pings = stream::unfold(guard, |guard| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Some((Ok(Bytes::from_static(ANTHROPIC_PING.as_bytes())), guard))
            });
            Body::from_stream(head.chain(pings))
        }
    };

    let mut response = Response::builder()
        .status(reply.status)
        .header(header::CONTENT_TYPE, reply.content_type);
    for (name, value) in reply.headers {
        response = response.header(name, value);
    }
    response.body(body).unwrap()
}
