//! Stream Reducer
//!
//! Folds [`ProtocolEvent`]s into the assistant message of one request.
//!
//! ```text
//!   new() ──► Streaming ──ContentDelta──► Streaming (snapshot)
//!                 │
//!                 ├──StreamEnd──► Closed (finished conversation)
//!                 └──cancel()───► Closed (nothing)
//! ```
//!
//! The display text and title are always derived from the full accumulated
//! text, never stored, so a marker split across deltas is stripped exactly
//! once.

use chrono::Utc;

use super::decoder::ProtocolEvent;
use super::title::{extract_title, TitleScan};
use crate::conversation::{Conversation, ConversationMessage};
use crate::messages::MessageId;

/// Reducer lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReducerState {
    /// Accepting events
    Streaming,
    /// Finished or cancelled; all events are ignored
    Closed,
}

/// Terminal value of a completed stream
#[derive(Clone, Debug, PartialEq)]
pub struct FinishedStream {
    /// Base conversation plus the finalized assistant message
    pub conversation: Conversation,
    /// The finalized assistant message
    pub message: ConversationMessage,
    /// Extracted title, if any
    pub title: Option<String>,
}

/// Output of applying one event
#[derive(Clone, Debug, PartialEq)]
pub enum ReducerOutput {
    /// In-progress assistant message
    Snapshot(ConversationMessage),
    /// The stream completed
    Finished(FinishedStream),
}

/// Per-request reducer
#[derive(Debug)]
pub struct StreamReducer {
    /// Conversation the response is appended to
    base: Conversation,
    /// ID of the assistant message being built
    message_id: MessageId,
    /// Raw concatenation of all deltas (title not stripped)
    accumulated: String,
    /// Snapshot template; carries the message creation time
    streaming: ConversationMessage,
    state: ReducerState,
    deltas: u32,
    parse_errors: u32,
}

impl StreamReducer {
    /// Start reducing a response for `base`
    #[must_use]
    pub fn new(base: Conversation) -> Self {
        Self::with_message_id(base, MessageId::new())
    }

    /// Start reducing with a specific assistant message ID
    #[must_use]
    pub fn with_message_id(base: Conversation, message_id: MessageId) -> Self {
        Self {
            base,
            streaming: ConversationMessage::streaming(message_id.clone()),
            message_id,
            accumulated: String::new(),
            state: ReducerState::Streaming,
            deltas: 0,
            parse_errors: 0,
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ReducerState {
        self.state
    }

    /// ID of the assistant message being built
    #[must_use]
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// Conversation the response will be appended to
    #[must_use]
    pub fn base(&self) -> &Conversation {
        &self.base
    }

    /// Raw accumulated text, marker included
    #[must_use]
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Current display text (marker stripped, untrimmed)
    #[must_use]
    pub fn display_text(&self) -> String {
        self.scan().display_text
    }

    /// Best-known title so far
    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.scan().title
    }

    /// Number of malformed lines skipped
    #[must_use]
    pub fn parse_errors(&self) -> u32 {
        self.parse_errors
    }

    /// Base conversation with the current snapshot as its last message
    ///
    /// Returns `None` once closed or before any text arrived.
    #[must_use]
    pub fn preview(&self) -> Option<Conversation> {
        if self.state == ReducerState::Closed || self.accumulated.is_empty() {
            return None;
        }
        let mut conversation = self.base.clone();
        conversation.upsert_streaming(self.snapshot()).ok()?;
        Some(conversation)
    }

    /// Apply one event
    ///
    /// Returns a snapshot for non-empty deltas and the finished stream for
    /// `StreamEnd`. Everything else, and every event after closing, yields
    /// `None`.
    pub fn apply(&mut self, event: ProtocolEvent) -> Option<ReducerOutput> {
        if self.state == ReducerState::Closed {
            tracing::trace!(message_id = %self.message_id, "Ignoring event after close");
            return None;
        }

        match event {
            ProtocolEvent::ContentDelta(text) => {
                if text.is_empty() {
                    return None;
                }
                self.deltas += 1;
                self.accumulated.push_str(&text);
                Some(ReducerOutput::Snapshot(self.snapshot()))
            }
            ProtocolEvent::ParseError(raw) => {
                self.parse_errors += 1;
                tracing::debug!(
                    message_id = %self.message_id,
                    raw = %raw,
                    "Skipped malformed stream line"
                );
                None
            }
            ProtocolEvent::StreamEnd => Some(ReducerOutput::Finished(self.finish())),
        }
    }

    /// Discard the partial message and close
    ///
    /// Safe to call in any state.
    pub fn cancel(&mut self) {
        if self.state == ReducerState::Streaming {
            tracing::debug!(
                message_id = %self.message_id,
                discarded_bytes = self.accumulated.len(),
                "Stream reducer cancelled"
            );
        }
        self.accumulated.clear();
        self.state = ReducerState::Closed;
    }

    fn scan(&self) -> TitleScan {
        extract_title(&self.accumulated)
    }

    fn snapshot(&self) -> ConversationMessage {
        ConversationMessage {
            content: self.display_text(),
            ..self.streaming.clone()
        }
    }

    fn finish(&mut self) -> FinishedStream {
        self.state = ReducerState::Closed;

        let TitleScan {
            display_text,
            title,
        } = self.scan();
        let now = Utc::now();

        let message = ConversationMessage {
            id: self.message_id.clone(),
            role: self.streaming.role,
            content: display_text.trim().to_string(),
            created_at: now,
            is_streaming: false,
        };

        let mut conversation = self.base.clone();
        if let Some(ref title) = title {
            conversation.name.clone_from(title);
        }
        conversation.messages.push(message.clone());
        conversation.updated_at = now;

        tracing::debug!(
            message_id = %self.message_id,
            deltas = self.deltas,
            parse_errors = self.parse_errors,
            title = ?title,
            "Stream reduced"
        );

        FinishedStream {
            conversation,
            message,
            title,
        }
    }
}
