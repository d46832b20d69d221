use std::fmt::Display;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::buffer_utils::{LineBuffer, LineError};
use crate::error::ChatError;

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// One decoded unit of a streaming completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental piece of assistant text, to be appended in arrival order
    Fragment(String),

    /// No further fragments will arrive
    Done,

    /// The stream failed; no further events follow
    Error(ChatError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

/// Live sequence of events for one streaming call.
///
/// Yields fragments, then exactly one terminal event, then ends. Dropping it
/// cancels the call and releases the underlying connection.
pub type ChatStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

// Wire shape of a chat-completions stream record. Everything is optional so
// that control records (prompt filter results, role-only deltas) still parse.
#[derive(Debug, Default, Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

impl ChatStreamChunk {
    fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
    }
}

/// Counters describing what a decoder saw, including everything it skipped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Complete lines taken from the buffer
    pub lines: u64,
    pub fragments: u64,
    /// Non-empty lines without the `data: ` prefix (comments, `event:` fields)
    pub ignored_lines: u64,
    /// `data:` records that parsed but carried no text
    pub empty_deltas: u64,
    /// Lines that were not valid UTF-8, exceeded the length limit, or were not valid JSON
    pub malformed_lines: u64,
}

/// Incremental server-sent-event decoder for one streaming call.
///
/// Feed it raw transport chunks in order; it keeps the trailing partial line
/// between calls and turns every complete `data:` line into at most one
/// [`StreamEvent`]. Once a terminal event has been produced the decoder is
/// finished and ignores further input.
#[derive(Debug)]
pub struct StreamDecoder {
    buffer: LineBuffer,
    finished: bool,
    stats: DecoderStats,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            buffer: LineBuffer::with_capacity(8192),
            finished: false,
            stats: DecoderStats::default(),
        }
    }

    /// Decoder that drops lines longer than `max` bytes
    pub fn with_max_line_length(max: usize) -> Self {
        Self {
            buffer: LineBuffer::with_capacity(8192).with_max_line_length(max),
            ..Self::new()
        }
    }

    /// Process one chunk of raw transport data.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend(chunk);

        while let Some(line_result) = self.buffer.next_line() {
            self.stats.lines += 1;

            let line = match line_result {
                Ok(line) => line,
                Err(LineError::InvalidUtf8(e)) => {
                    self.stats.malformed_lines += 1;
                    tracing::debug!(error = %e, "Skipping stream line with invalid UTF-8");
                    continue;
                }
                Err(LineError::TooLong(length)) => {
                    self.stats.malformed_lines += 1;
                    tracing::warn!(length, "Skipping over-long stream line");
                    continue;
                }
            };

            let Some(data) = line.strip_prefix(DATA_PREFIX) else {
                if !line.is_empty() {
                    self.stats.ignored_lines += 1;
                }
                continue;
            };

            if data.trim() == DONE_MARKER {
                self.finished = true;
                self.buffer.clear();
                events.push(StreamEvent::Done);
                break;
            }

            match serde_json::from_str::<ChatStreamChunk>(data) {
                Ok(chunk) => match chunk.content() {
                    Some(content) if !content.is_empty() => {
                        self.stats.fragments += 1;
                        events.push(StreamEvent::Fragment(content.to_string()));
                    }
                    _ => self.stats.empty_deltas += 1,
                },
                Err(e) => {
                    self.stats.malformed_lines += 1;
                    tracing::debug!(error = %e, line = %data, "Skipping unparseable stream record");
                }
            }
        }

        events
    }

    /// Transport reached end-of-stream. Yields `Done` unless already finished.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        self.buffer.clear();
        Some(StreamEvent::Done)
    }

    /// Transport failed. Yields `Error` unless already finished.
    pub fn fail(&mut self, error: ChatError) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        self.buffer.clear();
        Some(StreamEvent::Error(error))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }
}

/// Decode a raw byte stream (e.g. `reqwest::Response::bytes_stream()`) into
/// a [`ChatStream`].
pub fn decode_event_stream<S, B, E>(byte_stream: S) -> ChatStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(byte_stream);
        let mut decoder = StreamDecoder::new();

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    for event in decoder.feed(bytes.as_ref()) {
                        yield event;
                    }
                    if decoder.is_finished() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Stream transport error");
                    if let Some(event) = decoder.fail(ChatError::Transport(e.to_string())) {
                        yield event;
                    }
                    break;
                }
            }
        }

        if let Some(event) = decoder.finish() {
            tracing::debug!("Transport closed without [DONE] marker");
            yield event;
        }

        let stats = decoder.stats();
        tracing::debug!(
            lines = stats.lines,
            fragments = stats.fragments,
            ignored = stats.ignored_lines,
            empty_deltas = stats.empty_deltas,
            malformed = stats.malformed_lines,
            "Stream decoded"
        );
        if stats.malformed_lines > 0 {
            tracing::warn!(malformed = stats.malformed_lines, "Stream contained unparseable records");
        }
    })
}

/// Callback receiver for a streaming completion.
///
/// `on_fragment` is called once per fragment in arrival order, then exactly
/// one of `on_done` / `on_error`. Nothing is delivered after a terminal call.
pub trait StreamHandler: Send {
    fn on_fragment(&mut self, text: &str);
    fn on_done(&mut self);
    fn on_error(&mut self, error: &ChatError);
}

/// Drive `stream` to its terminal event, forwarding everything to `handler`.
///
/// A stream that ends without a terminal event is reported as `on_done`.
pub async fn dispatch_events(mut stream: ChatStream, handler: &mut dyn StreamHandler) {
    while let Some(event) = stream.next().await {
        let terminal = event.is_terminal();
        match event {
            StreamEvent::Fragment(text) => handler.on_fragment(&text),
            StreamEvent::Done => handler.on_done(),
            StreamEvent::Error(error) => handler.on_error(&error),
        }
        if terminal {
            return;
        }
    }

    tracing::debug!("Event stream ended without a terminal event");
    handler.on_done();
}

/// Handler that concatenates fragments into the full reply
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    fragments: usize,
    outcome: Option<Result<(), ChatError>>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, Some(Ok(())))
    }

    pub fn error(&self) -> Option<&ChatError> {
        match &self.outcome {
            Some(Err(e)) => Some(e),
            _ => None,
        }
    }

    /// Full reply, or the error that ended the stream
    pub fn into_result(self) -> Result<String, ChatError> {
        match self.outcome {
            Some(Err(e)) => Err(e),
            _ => Ok(self.text),
        }
    }
}

impl StreamHandler for StreamAccumulator {
    fn on_fragment(&mut self, text: &str) {
        self.text.push_str(text);
        self.fragments += 1;
    }

    fn on_done(&mut self) {
        self.outcome = Some(Ok(()));
    }

    fn on_error(&mut self, error: &ChatError) {
        self.outcome = Some(Err(error.clone()));
    }
}
