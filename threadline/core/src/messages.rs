//! Identifiers and Stream Updates
//!
//! Identifiers shared by conversations and messages, and the updates the
//! chat client pushes to a UI surface while a response is streaming.
//!
//! # Design Philosophy
//!
//! UI surfaces are pure renderers. They receive a [`StreamUpdate`] for every
//! in-progress snapshot and exactly one terminal update (finished, cancelled
//! or failed). They never see decoder internals or parse errors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::{Conversation, ConversationMessage};

/// Unique message identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generate a new unique message ID
    #[must_use]
    pub fn new() -> Self {
        Self(format!("msg_{}", Uuid::new_v4().simple()))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conversation identifier
///
/// Also the suffix of the storage key a conversation is persisted under.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Generate a new unique conversation ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User input
    User,
    /// Model response. Older records store this role as `"ai"`.
    #[serde(alias = "ai")]
    Assistant,
}

impl MessageRole {
    /// Role name used on the chat-completion wire
    #[must_use]
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Update pushed to a UI surface while a response streams
#[derive(Clone, Debug)]
pub enum StreamUpdate {
    /// In-progress assistant message (title already stripped)
    Snapshot(ConversationMessage),

    /// Stream completed and the conversation was persisted
    Finished {
        /// The finalized conversation, as written to storage
        conversation: Conversation,
        /// Title extracted from the response, if any
        title: Option<String>,
    },

    /// Stream was cancelled; nothing was persisted
    Cancelled {
        /// The assistant message that was being streamed
        message_id: Option<MessageId>,
    },

    /// Stream failed; nothing was persisted
    Failed {
        /// The assistant message that was being streamed (if streaming began)
        message_id: Option<MessageId>,
        /// Error description suitable for display
        error: String,
        /// Text rendered before the failure. Never persisted.
        partial_content: String,
    },
}

impl StreamUpdate {
    /// Whether this is the last update of a stream
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Snapshot(_))
    }
}
