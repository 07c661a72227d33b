//! Streaming transport decoding and reconstruction plumbing
//!
//! Provider bodies are decoded into typed frames (server-sent events or
//! newline-delimited JSON), then fed through a per-provider
//! [`Reconstructor`] that yields normalized [`Response`] chunks.

use std::pin::Pin;

use eventsource_stream::{EventStreamError, Eventsource};
use futures_util::{Stream, StreamExt, future, stream};
use serde::de::DeserializeOwned;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::classify::{self, ClassifyContext};
use crate::error::BridgeError;
use crate::types::Response;

/// Lazy sequence of normalized chunks
///
/// The stream owns the underlying transport; dropping it releases the
/// connection even when it has not been read to completion.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<Response, BridgeError>> + Send>>;

/// Terminal sentinel of `OpenAI`-style event streams
const DONE_SENTINEL: &str = "[DONE]";

/// Per-provider state machine turning frames into normalized chunks
pub trait Reconstructor {
    /// Decoded provider frame
    type Frame;

    /// Consume one frame, returning the chunks it completes
    ///
    /// An `Err` item ends the stream.
    fn on_frame(&mut self, frame: Self::Frame) -> Vec<Result<Response, BridgeError>>;

    /// Flush anything still buffered once the provider sequence ends
    fn finish(&mut self) -> Vec<Result<Response, BridgeError>>;
}

/// Drive frames through a reconstructor
///
/// Empty chunks are suppressed and the stream ends after the first error.
pub fn reconstruct<S, R>(frames: S, reconstructor: R) -> ResponseStream
where
    S: Stream<Item = Result<R::Frame, BridgeError>> + Send + 'static,
    R: Reconstructor + Send + 'static,
    R::Frame: Send + 'static,
{
    let items = frames
        .map(Some)
        .chain(stream::once(future::ready(None)))
        .scan(reconstructor, |state, frame| {
            let chunks = match frame {
                Some(Ok(frame)) => state.on_frame(frame),
                Some(Err(e)) => vec![Err(e)],
                None => state.finish(),
            };
            future::ready(Some(stream::iter(chunks)))
        })
        .flatten()
        .filter(|item| future::ready(!matches!(item, Ok(chunk) if chunk.is_empty())))
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
        .inspect(|item| match item {
            Ok(chunk) => tracing::trace!(
                text_len = chunk.text_content().len(),
                tool_calls = chunk.tool_calls.len(),
                usage = chunk.usage.is_some(),
                "reconstructed chunk"
            ),
            Err(e) => tracing::debug!(error = %e, "stream ended with error"),
        });

    Box::pin(items)
}

/// Decode a server-sent event body into typed frames
///
/// A `[DONE]` data line ends the sequence without reading further. Frames
/// that fail to parse are skipped.
pub fn sse_frames<T>(response: reqwest::Response, ctx: ClassifyContext) -> impl Stream<Item = Result<T, BridgeError>> + Send
where
    T: DeserializeOwned + Send + 'static,
{
    response
        .bytes_stream()
        .eventsource()
        .take_while(|event| future::ready(!matches!(event, Ok(e) if e.data.trim() == DONE_SENTINEL)))
        .filter_map(move |event| {
            let frame = match event {
                Ok(event) => parse_frame(&event.data),
                Err(EventStreamError::Transport(e)) => Some(Err(classify::transport(e, &ctx))),
                Err(e) => Some(Err(BridgeError::response_parsing(e.to_string(), None))),
            };
            future::ready(frame)
        })
}

/// Decode a newline-delimited JSON body into typed frames
pub fn ndjson_frames<T>(
    response: reqwest::Response,
    ctx: ClassifyContext,
) -> impl Stream<Item = Result<T, BridgeError>> + Send
where
    T: DeserializeOwned + Send + 'static,
{
    let body = response.bytes_stream().map(|chunk| chunk.map_err(std::io::Error::other));
    let lines = FramedRead::new(StreamReader::new(body), LinesCodec::new());
    lines_to_frames(lines, ctx)
}

/// Parse decoded lines into frames, classifying transport failures
fn lines_to_frames<S, T>(lines: S, ctx: ClassifyContext) -> impl Stream<Item = Result<T, BridgeError>> + Send
where
    S: Stream<Item = Result<String, LinesCodecError>> + Send,
    T: DeserializeOwned + Send + 'static,
{
    lines.filter_map(move |line| {
        let frame = match line {
            Ok(line) => parse_frame(&line),
            Err(LinesCodecError::Io(e)) => Some(Err(classify::classify(Box::new(e), &ctx))),
            Err(e @ LinesCodecError::MaxLineLengthExceeded) => {
                Some(Err(BridgeError::response_parsing(e.to_string(), Some(Box::new(e)))))
            }
        };
        future::ready(frame)
    })
}

fn parse_frame<T: DeserializeOwned>(data: &str) -> Option<Result<T, BridgeError>> {
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str(data) {
        Ok(frame) => Some(Ok(frame)),
        Err(e) => {
            tracing::debug!(error = %e, "skipping unparseable stream frame");
            None
        }
    }
}
