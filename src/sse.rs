//! Server-sent event decoding.
//!
//! Raw byte chunks are split into frames, each frame's `data` is decoded into
//! the caller's type and delivered as [`SseEvent::Message`]. Frames that fail
//! to decode are dropped; only connection-level failures reach the caller.

use futures::stream::{self, BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::Result;
use crate::transport::{ByteStream, HttpRequest, Transport};

#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent<T> {
    Connected,
    Message(T),
    Disconnected,
}

impl<T> SseEvent<T> {
    pub fn into_message(self) -> Option<T> {
        match self {
            SseEvent::Message(message) => Some(message),
            _ => None,
        }
    }
}

pub type SseStream<T> = BoxStream<'static, Result<SseEvent<T>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental `text/event-stream` line parser.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
    event: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if line.is_empty() {
                if let Some(frame) = self.dispatch() {
                    frames.push(frame);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (&*line, ""),
            };
            match field {
                "data" => self.data.push(value.to_string()),
                "event" => self.event = Some(value.to_string()),
                _ => {}
            }
        }

        frames
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = self.data.join("\n");
        self.data.clear();
        Some(SseFrame { event, data })
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Connecting,
    Open,
    Closed,
}

struct DecodeState<T> {
    chunks: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<T>,
    phase: Phase,
}

fn decode_frame<T: DeserializeOwned>(frame: &SseFrame) -> Option<T> {
    match serde_json::from_str::<T>(&frame.data) {
        Ok(message) => Some(message),
        Err(err) => {
            debug!("Dropping undecodable SSE frame: {}", err);
            None
        }
    }
}

/// Turn a chunk stream into `Connected, Message*, Disconnected`.
///
/// A transport error ends the stream after being yielded once.
pub fn decode_events<T>(chunks: ByteStream) -> SseStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    let state = DecodeState {
        chunks,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        phase: Phase::Connecting,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            match state.phase {
                Phase::Connecting => {
                    state.phase = Phase::Open;
                    return Some((Ok(SseEvent::Connected), state));
                }
                Phase::Closed => return None,
                Phase::Open => {
                    if let Some(message) = state.pending.pop_front() {
                        return Some((Ok(SseEvent::Message(message)), state));
                    }
                    match state.chunks.next().await {
                        Some(Ok(bytes)) => {
                            for frame in state.decoder.push(&bytes) {
                                if let Some(message) = decode_frame(&frame) {
                                    state.pending.push_back(message);
                                }
                            }
                        }
                        Some(Err(err)) => {
                            state.phase = Phase::Closed;
                            return Some((Err(err), state));
                        }
                        None => {
                            info!("SSE stream closed by server");
                            state.phase = Phase::Closed;
                            return Some((Ok(SseEvent::Disconnected), state));
                        }
                    }
                }
            }
        }
    })
    .boxed()
}

/// Raw SSE subscription: `subscribe(path, headers, timeout)`.
#[derive(Clone)]
pub struct SseSubscriber {
    transport: Arc<dyn Transport>,
}

impl SseSubscriber {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn subscribe<T>(
        &self,
        request: HttpRequest,
        headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<SseStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let request = request.with_headers(headers).with_timeout(timeout);
        let chunks = self.transport.open_stream(&request).await?;
        Ok(decode_events(chunks))
    }
}
