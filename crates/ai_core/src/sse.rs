//! Server-sent event stream handling
//!
//! All supported providers stream over SSE. The decoder buffers partial
//! lines across network chunks; each provider supplies a parser for the
//! `data:` payloads.

use std::collections::VecDeque;
use std::fmt::Display;

use futures::stream::{self, Stream, StreamExt};
use tracing::trace;

use crate::{
    error::InferenceError,
    ports::{StreamingChunk, StreamingResponse},
};

/// What a provider parser made of one `data:` payload
#[derive(Debug, PartialEq)]
pub(crate) enum SseEvent {
    /// A text delta (possibly empty)
    Chunk(StreamingChunk),
    /// Metadata or keep-alive with no text
    Skip,
    /// Provider signalled the end of the response
    Done,
}

/// Splits a byte stream into SSE `data:` payloads
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed bytes, returning every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            self.handle_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }
        events
    }

    /// Flush whatever is left once the body has ended
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest);
            self.handle_line(line.trim_end_matches('\r'), &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    fn handle_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            self.dispatch(events);
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        // `event:`, `id:`, `retry:` and comments carry nothing the parsers need
    }

    fn dispatch(&mut self, events: &mut Vec<String>) {
        if !self.data.is_empty() {
            events.push(self.data.join("\n"));
            self.data.clear();
        }
    }
}

struct SseState<S, P> {
    body: S,
    decoder: SseDecoder,
    parse: P,
    pending: VecDeque<Result<StreamingChunk, InferenceError>>,
    finished: bool,
}

impl<S, P> SseState<S, P>
where
    P: Fn(&str) -> Result<SseEvent, InferenceError>,
{
    fn enqueue(&mut self, payloads: Vec<String>) {
        for payload in payloads {
            if self.finished {
                return;
            }
            trace!(payload = %payload, "Parsing stream event");
            match (self.parse)(&payload) {
                Ok(SseEvent::Chunk(chunk)) => {
                    if chunk.done {
                        self.finished = true;
                    }
                    self.pending.push_back(Ok(chunk));
                },
                Ok(SseEvent::Skip) => {},
                Ok(SseEvent::Done) => {
                    self.finished = true;
                    self.pending.push_back(Ok(StreamingChunk::finished()));
                },
                Err(e) => {
                    self.finished = true;
                    self.pending.push_back(Err(e));
                },
            }
        }
    }
}

/// Create a streaming response from a byte stream of SSE frames
///
/// The stream ends after the provider's terminator, after the first error, or
/// when the body ends. The body is dropped together with the returned stream.
pub(crate) fn create_stream<S, B, E, P>(body: S, parse: P) -> StreamingResponse
where
    S: Stream<Item = Result<B, E>> + Unpin + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
    P: Fn(&str) -> Result<SseEvent, InferenceError> + Send + 'static,
{
    let state = SseState {
        body,
        decoder: SseDecoder::default(),
        parse,
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    let payloads = state.decoder.push(bytes.as_ref());
                    state.enqueue(payloads);
                },
                Some(Err(e)) => {
                    state.finished = true;
                    state
                        .pending
                        .push_back(Err(InferenceError::StreamError(e.to_string())));
                },
                None => {
                    let payloads = state.decoder.finish();
                    state.enqueue(payloads);
                    state.finished = true;
                },
            }
        }
    }))
}
