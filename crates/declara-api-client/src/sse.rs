//! Server-sent events decoding.
//!
//! The backend frames every event as `data: <json>\n\n`. [`SseDecoder`] turns arbitrary
//! byte chunks into complete `data` payloads, and [`decode_events`] lifts a streaming
//! response body into a typed [`EventStream`].

use std::collections::VecDeque;

use bytes::Bytes;
use declara_core::models::StreamPayload;
use declara_core::{BackendError, EventStream};
use futures::stream::{self, BoxStream, StreamExt};

/// Incremental SSE frame decoder.
///
/// Only the `data` field is used. Multiple `data` lines of one event are joined with `\n`;
/// comments and other fields are ignored. Partial lines (including split UTF-8 sequences)
/// stay buffered until the rest arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every payload completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(payload) = self.process_line(line) {
                events.push(payload);
            }
        }
        events
    }

    /// Flush whatever is buffered once the body has ended.
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string();
            if let Some(payload) = self.process_line(&line) {
                events.push(payload);
            }
        }
        if let Some(payload) = self.data.take() {
            events.push(payload);
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.data.take();
        }

        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            match self.data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => self.data = Some(value.to_string()),
            }
        }

        None
    }
}

struct DecodeState<T> {
    body: BoxStream<'static, Result<Bytes, reqwest::Error>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
    _marker: std::marker::PhantomData<fn() -> T>,
}

/// Decode a streaming response body into typed events.
///
/// A transport failure is yielded once as `Err` and ends the stream. An undecodable
/// payload is yielded as `Err` too, and ends the stream only for payload types whose
/// `MALFORMED_ENDS_STREAM` is set. Payloads that decode to nothing are skipped.
pub fn decode_events<T: StreamPayload>(response: reqwest::Response) -> EventStream<T> {
    decode_body(response.bytes_stream().boxed())
}

pub(crate) fn decode_body<T: StreamPayload>(
    body: BoxStream<'static, Result<Bytes, reqwest::Error>>,
) -> EventStream<T> {
    let state = DecodeState::<T> {
        body,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
        _marker: std::marker::PhantomData,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(data) = state.pending.pop_front() {
                match T::from_data(&data) {
                    Ok(Some(event)) => return Some((Ok(event), state)),
                    Ok(None) => continue,
                    Err(e) if T::MALFORMED_ENDS_STREAM => {
                        state.pending.clear();
                        state.finished = true;
                        return Some((Err(e), state));
                    }
                    Err(e) => return Some((Err(e), state)),
                }
            }

            if state.finished {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.feed(&chunk);
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(BackendError::Transport(e.to_string())), state));
                }
                None => {
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}
