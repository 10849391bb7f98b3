//! Stream Decoder
//!
//! Turns the raw body of a streaming chat-completion response into protocol
//! events.
//!
//! # Wire Format
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}\n
//! data: {"choices":[{"delta":{"content":"lo"}}]}\n
//! : keep-alive comments and blank lines are ignored\n
//! data: [DONE]\n
//! ```
//!
//! Chunks arrive with arbitrary boundaries: a chunk may end mid-line or in the
//! middle of a multi-byte UTF-8 sequence. The decoder buffers both cases until
//! the rest arrives.

use serde::Deserialize;

/// Prefix of every meaningful line
pub const DATA_PREFIX: &str = "data: ";

/// Terminator payload
pub const DONE_MARKER: &str = "[DONE]";

/// Event decoded from the response body
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// Assistant text delta (may be empty)
    ContentDelta(String),
    /// End of the response
    StreamEnd,
    /// A `data: ` line whose payload could not be parsed
    ParseError(String),
}

/// `{"choices":[{"delta":{"content":"..."}}]}`
#[derive(Debug, Deserialize)]
struct ChunkEnvelope {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

impl ChunkEnvelope {
    fn into_content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .unwrap_or_default()
    }
}

/// Incremental decoder for one response body
///
/// Buffers incoming chunks and yields complete protocol events. One decoder
/// serves exactly one response; after `StreamEnd` it ignores all input.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Decoded text not yet terminated by a newline
    pending: String,
    /// Trailing bytes of an incomplete UTF-8 sequence
    partial_utf8: Vec<u8>,
    /// Whether `StreamEnd` has been emitted
    done: bool,
}

impl StreamDecoder {
    /// Create a new decoder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `StreamEnd` has been emitted
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of buffered bytes not yet turned into events
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len() + self.partial_utf8.len()
    }

    /// Feed a chunk of raw bytes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ProtocolEvent> {
        if self.done {
            return Vec::new();
        }
        self.decode_utf8(chunk);
        self.drain_lines()
    }

    /// Feed a chunk of already-decoded text
    pub fn feed_str(&mut self, chunk: &str) -> Vec<ProtocolEvent> {
        if self.done {
            return Vec::new();
        }
        // Held bytes can only complete with more bytes, never with text.
        self.flush_partial_utf8();
        self.pending.push_str(chunk);
        self.drain_lines()
    }

    /// Signal end of body
    ///
    /// Processes an unterminated final line and guarantees a trailing
    /// `StreamEnd`, even when the server never sent `[DONE]`.
    pub fn finish(&mut self) -> Vec<ProtocolEvent> {
        if self.done {
            return Vec::new();
        }

        self.flush_partial_utf8();
        let mut events = self.drain_lines();

        if !self.done {
            let last = std::mem::take(&mut self.pending);
            self.process_line(&last, &mut events);
        }
        if !self.done {
            self.done = true;
            events.push(ProtocolEvent::StreamEnd);
        }
        events
    }

    /// Append bytes to the text buffer, holding back an incomplete trailing
    /// sequence. Invalid bytes become U+FFFD.
    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.partial_utf8.extend_from_slice(chunk);

        loop {
            match std::str::from_utf8(&self.partial_utf8) {
                Ok(text) => {
                    self.pending.push_str(text);
                    self.partial_utf8.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.pending
                        .push_str(&String::from_utf8_lossy(&self.partial_utf8[..valid]));

                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            self.partial_utf8.drain(..valid);
                            return;
                        }
                        Some(len) => {
                            tracing::debug!(bytes = len, "Replacing invalid UTF-8 in stream");
                            self.pending.push(char::REPLACEMENT_CHARACTER);
                            self.partial_utf8.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    fn flush_partial_utf8(&mut self) {
        if !self.partial_utf8.is_empty() {
            let bytes = std::mem::take(&mut self.partial_utf8);
            self.pending.push_str(&String::from_utf8_lossy(&bytes));
        }
    }

    /// Extract and process every complete line in the buffer
    fn drain_lines(&mut self) -> Vec<ProtocolEvent> {
        let mut events = Vec::new();

        while !self.done {
            let Some(pos) = self.pending.find('\n') else {
                break;
            };
            let line: String = self.pending.drain(..=pos).collect();
            self.process_line(&line, &mut events);
        }

        if self.done {
            self.pending.clear();
            self.partial_utf8.clear();
        }
        events
    }

    fn process_line(&mut self, line: &str, events: &mut Vec<ProtocolEvent>) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let payload = line.strip_prefix(DATA_PREFIX);
        if payload.unwrap_or(line) == DONE_MARKER {
            self.done = true;
            events.push(ProtocolEvent::StreamEnd);
            return;
        }

        let Some(payload) = payload else {
            return;
        };

        match serde_json::from_str::<ChunkEnvelope>(payload) {
            Ok(envelope) => {
                if let Some(ref error) = envelope.error {
                    tracing::warn!(error = %error, "Provider reported an error mid-stream");
                }
                events.push(ProtocolEvent::ContentDelta(envelope.into_content()));
            }
            Err(e) => {
                tracing::debug!(error = %e, line = line, "Skipping malformed stream line");
                events.push(ProtocolEvent::ParseError(line.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn delta(text: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    fn content(text: &str) -> ProtocolEvent {
        ProtocolEvent::ContentDelta(text.to_string())
    }

    #[test]
    fn test_decode_complete_lines() {
        let mut decoder = StreamDecoder::new();
        let body = format!("{}{}data: [DONE]\n", delta("Hello"), delta(" world"));

        let events = decoder.feed(body.as_bytes());
        assert_eq!(
            events,
            vec![content("Hello"), content(" world"), ProtocolEvent::StreamEnd]
        );
        assert!(decoder.is_done());
    }

    #[test]
    fn test_decode_partial_line() {
        let mut decoder = StreamDecoder::new();
        let line = delta("Hello");
        let (head, tail) = line.split_at(10);

        assert!(decoder.feed(head.as_bytes()).is_empty());
        assert_eq!(decoder.pending_len(), 10);

        assert_eq!(decoder.feed(tail.as_bytes()), vec![content("Hello")]);
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_decode_split_multibyte_character() {
        let mut decoder = StreamDecoder::new();
        let line = delta("héllo ✓");
        let bytes = line.as_bytes();
        // Split inside the three-byte check mark
        let check = line.find('✓').unwrap();

        assert!(decoder.feed(&bytes[..check + 1]).is_empty());
        assert_eq!(decoder.feed(&bytes[check + 1..]), vec![content("héllo ✓")]);
    }

    #[test]
    fn test_invalid_bytes_do_not_fail() {
        let mut decoder = StreamDecoder::new();
        let mut bytes = b"data: {\"choices\":[{\"delta\":{\"content\":\"a".to_vec();
        bytes.push(0xFF);
        bytes.extend_from_slice(b"b\"}}]}\n");

        assert_eq!(decoder.feed(&bytes), vec![content("a\u{FFFD}b")]);
    }

    #[test]
    fn test_done_stops_decoder() {
        let mut decoder = StreamDecoder::new();
        let body = format!("data: [DONE]\n{}", delta("late"));

        assert_eq!(decoder.feed(body.as_bytes()), vec![ProtocolEvent::StreamEnd]);
        assert!(decoder.feed(delta("later").as_bytes()).is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_bare_done_line() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.feed(b"[DONE]\n"), vec![ProtocolEvent::StreamEnd]);
    }

    #[test]
    fn test_finish_without_done() {
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.feed(delta("Hi").as_bytes()), vec![content("Hi")]);
        assert_eq!(decoder.finish(), vec![ProtocolEvent::StreamEnd]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_finish_processes_unterminated_line() {
        let mut decoder = StreamDecoder::new();
        let line = delta("tail");
        assert!(decoder.feed(line.trim_end().as_bytes()).is_empty());

        assert_eq!(
            decoder.finish(),
            vec![content("tail"), ProtocolEvent::StreamEnd]
        );
    }

    #[test]
    fn test_finish_with_unterminated_done() {
        let mut decoder = StreamDecoder::new();
        decoder.feed(b"data: [DONE]");
        assert_eq!(decoder.finish(), vec![ProtocolEvent::StreamEnd]);
    }

    #[test]
    fn test_malformed_line_is_reported_and_skipped() {
        let mut decoder = StreamDecoder::new();
        let body = format!("{}data: {{not json\n{}", delta("a"), delta("b"));

        assert_eq!(
            decoder.feed(body.as_bytes()),
            vec![
                content("a"),
                ProtocolEvent::ParseError("data: {not json".to_string()),
                content("b"),
            ]
        );
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let mut decoder = StreamDecoder::new();
        let body = ": OPENROUTER PROCESSING\n\nevent: ping\nid: 7\n\r\n";
        assert!(decoder.feed(body.as_bytes()).is_empty());
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut decoder = StreamDecoder::new();
        let body = delta("x").replace('\n', "\r\n");
        assert_eq!(decoder.feed(body.as_bytes()), vec![content("x")]);
    }

    #[test]
    fn test_missing_or_null_content_is_empty_delta() {
        let mut decoder = StreamDecoder::new();
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":null}}]}\n",
            "data: {\"choices\":[]}\n",
            "data: {\"choices\":[{\"finish_reason\":\"stop\"}]}\n",
        );

        assert_eq!(
            decoder.feed(body.as_bytes()),
            vec![content(""), content(""), content(""), content("")]
        );
    }

    #[test]
    fn test_feed_str() {
        let mut decoder = StreamDecoder::new();
        let line = delta("text transport");
        let (head, tail) = line.split_at(20);
        assert!(decoder.feed_str(head).is_empty());
        assert_eq!(decoder.feed_str(tail), vec![content("text transport")]);
    }
}
