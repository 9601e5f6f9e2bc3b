//! Streaming decoder (Bytes -> JSON Value)
//!
//! Line framing rules:
//! - bytes are fed through one stateful UTF-8 decoder, so a character split across two
//!   chunks is reassembled instead of being replaced; a leading BOM is dropped
//! - only complete lines are interpreted; the trailing fragment waits for the next feed
//! - blank lines and lines without the event prefix are ignored (comments, keepalives)
//! - the done signal is skipped but does not stop decoding; only transport EOF does
//! - a prefixed line that is not a JSON object is logged and skipped

use crate::config::SseConfig;
use crate::{BoxStream, Error};
use bytes::Bytes;
use encoding_rs::{CoderResult, Decoder as Utf8Decoder, UTF_8};
use futures::{stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Where a [`StreamDecoder`] is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Nothing emitted yet.
    Accumulating,
    /// At least one event emitted.
    Emitting,
    /// `finalize` ran after a clean end-of-stream.
    Terminated,
    /// The transport failed; no further input is accepted.
    Error,
}

/// Per-request incremental decoder. Never shared between requests.
pub struct StreamDecoder {
    utf8: Utf8Decoder,
    buffer: String,
    prefix: String,
    done_signal: String,
    state: DecoderState,
    malformed: usize,
}

impl std::fmt::Debug for StreamDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDecoder")
            .field("buffered", &self.buffer.len())
            .field("state", &self.state)
            .field("malformed", &self.malformed)
            .finish()
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new(&SseConfig::default())
    }
}

impl StreamDecoder {
    pub fn new(config: &SseConfig) -> Self {
        Self {
            utf8: UTF_8.new_decoder_with_bom_removal(),
            buffer: String::new(),
            prefix: config.prefix.clone(),
            done_signal: config.done_signal.clone(),
            state: DecoderState::Accumulating,
            malformed: 0,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, DecoderState::Terminated | DecoderState::Error)
    }

    /// Number of prefixed lines that failed to parse so far.
    pub fn malformed_count(&self) -> usize {
        self.malformed
    }

    /// Text still waiting for a line break.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Append `chunk` and return every event completed by it, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Value> {
        if self.is_finished() {
            debug!(len = chunk.len(), "chunk fed to finished decoder, ignoring");
            return Vec::new();
        }
        self.decode_into_buffer(chunk, false);
        self.drain_complete_lines()
    }

    /// Flush the decoder at transport end-of-stream.
    ///
    /// Any incomplete multi-byte sequence becomes U+FFFD and the unterminated last line is
    /// interpreted like any other line.
    pub fn finalize(&mut self) -> Vec<Value> {
        if self.is_finished() {
            return Vec::new();
        }
        self.decode_into_buffer(&[], true);
        let mut events = self.drain_complete_lines();
        let tail = std::mem::take(&mut self.buffer);
        if let Some(event) = self.interpret_line(&tail) {
            events.push(event);
        }
        self.state = DecoderState::Terminated;
        events
    }

    /// Mark the stream failed. Buffered text is discarded.
    pub fn fail(&mut self) {
        self.buffer.clear();
        self.state = DecoderState::Error;
    }

    fn decode_into_buffer(&mut self, mut src: &[u8], last: bool) {
        loop {
            let needed = self
                .utf8
                .max_utf8_buffer_length(src.len())
                .unwrap_or(src.len().saturating_mul(3).saturating_add(4));
            self.buffer.reserve(needed);

            let (result, read, _replaced) =
                self.utf8.decode_to_string(src, &mut self.buffer, last);
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    fn drain_complete_lines(&mut self) -> Vec<Value> {
        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete
            .split_terminator('\n')
            .filter_map(|line| self.interpret_line(line))
            .collect()
    }

    fn interpret_line(&mut self, raw: &str) -> Option<Value> {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.trim().is_empty() {
            return None;
        }

        let payload = line.strip_prefix(self.prefix.as_str())?;
        if payload.trim() == self.done_signal {
            debug!("done signal received, draining until end of stream");
            return None;
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value @ Value::Object(_)) => {
                self.state = DecoderState::Emitting;
                Some(value)
            }
            Ok(other) => {
                self.malformed += 1;
                warn!(
                    line = %truncate(payload),
                    kind = json_kind(&other),
                    "skipping stream fragment that is not a JSON object"
                );
                None
            }
            Err(source) => {
                self.malformed += 1;
                let err = Error::Decode {
                    line: truncate(payload),
                    source,
                };
                warn!(error = %err, "skipping malformed stream fragment");
                None
            }
        }
    }
}

fn truncate(payload: &str) -> String {
    payload.chars().take(120).collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode a byte stream lazily into JSON events.
///
/// Events are yielded as soon as the chunk that completes them arrives. When the input
/// reports an error, the input stream is dropped (releasing the connection) before the error
/// is yielded, and the output ends right after it. Dropping the returned stream early also
/// drops the input.
pub fn decode_stream(
    input: BoxStream<'static, Bytes>,
    config: &SseConfig,
) -> BoxStream<'static, Value> {
    struct Pump {
        input: Option<BoxStream<'static, Bytes>>,
        decoder: StreamDecoder,
        ready: VecDeque<Value>,
    }

    let pump = Pump {
        input: Some(input),
        decoder: StreamDecoder::new(config),
        ready: VecDeque::new(),
    };

    let stream = stream::unfold(pump, |mut pump| async move {
        loop {
            if let Some(event) = pump.ready.pop_front() {
                return Some((Ok(event), pump));
            }

            let input = pump.input.as_mut()?;
            match input.next().await {
                Some(Ok(chunk)) => {
                    let events = pump.decoder.feed(&chunk);
                    pump.ready.extend(events);
                }
                Some(Err(e)) => {
                    pump.input = None;
                    pump.decoder.fail();
                    return Some((Err(e), pump));
                }
                None => {
                    pump.input = None;
                    let events = pump.decoder.finalize();
                    pump.ready.extend(events);
                }
            }
        }
    });

    Box::pin(stream)
}

/// Feed every chunk through one decoder and finalize it.
pub fn decode_all<'a>(
    chunks: impl IntoIterator<Item = &'a [u8]>,
    config: &SseConfig,
) -> Vec<Value> {
    let mut decoder = StreamDecoder::new(config);
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(decoder.feed(chunk));
    }
    events.extend(decoder.finalize());
    events
}
