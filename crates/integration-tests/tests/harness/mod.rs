//! Shared fixtures for integration tests

#![allow(dead_code)]

pub mod config;
pub mod mock_provider;

use futures_util::StreamExt;
use switchboard_llm::{BridgeError, Response, ResponseStream, ToolCall, Usage};
use tracing_subscriber::EnvFilter;

/// Route bridge logs to the test writer, filtered by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Everything a stream yielded, folded together
#[derive(Debug, Default)]
pub struct Collected {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    pub chunks: usize,
    pub error: Option<BridgeError>,
}

/// Drain a response stream
pub async fn collect(mut stream: ResponseStream) -> Collected {
    let mut out = Collected::default();
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => absorb(&mut out, chunk),
            Err(e) => {
                out.error = Some(e);
                break;
            }
        }
    }
    out
}

fn absorb(out: &mut Collected, chunk: Response) {
    out.chunks += 1;
    out.text.push_str(chunk.text_content());
    out.tool_calls.extend(chunk.tool_calls);
    if chunk.usage.is_some() {
        out.usage = chunk.usage;
    }
}
