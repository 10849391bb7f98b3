//! Conversation Management
//!
//! A conversation is one chat thread: a name, a chronological list of
//! messages, and timestamps. Conversations are persisted as JSON blobs by
//! [`crate::storage::ChatStore`].
//!
//! # Invariants
//!
//! - Messages are kept in insertion (chronological) order.
//! - Only the trailing message may be streaming, and only a streaming message
//!   may be replaced. Once a message is finalized it is never mutated again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::{ConversationId, MessageId, MessageRole};

/// Errors raised when mutating a conversation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    /// A snapshot passed to [`Conversation::upsert_streaming`] was already final
    #[error("message {0} is not streaming")]
    NotStreaming(MessageId),

    /// The trailing message is finalized and cannot be replaced
    #[error("message {0} is finalized and cannot be replaced")]
    Finalized(MessageId),
}

/// A message in the conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    /// Unique message ID
    pub id: MessageId,
    /// Who sent this message
    pub role: MessageRole,
    /// Message content (title marker already stripped)
    pub content: String,
    /// When the message was created
    pub created_at: DateTime<Utc>,
    /// Whether the message is still being streamed
    #[serde(default)]
    pub is_streaming: bool,
}

impl ConversationMessage {
    /// Create a new finalized message
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            is_streaming: false,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an empty streaming assistant message
    #[must_use]
    pub fn streaming(id: MessageId) -> Self {
        Self {
            id,
            role: MessageRole::Assistant,
            content: String::new(),
            created_at: Utc::now(),
            is_streaming: true,
        }
    }
}

/// A chat thread
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,
    /// Display name, replaced by the first extracted title
    pub name: String,
    /// Messages in chronological order
    pub messages: Vec<ConversationMessage>,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the conversation last changed
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(ConversationId::new(), name)
    }

    /// Create an empty conversation with a specific ID
    pub fn with_id(id: ConversationId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refresh the `updated_at` timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Append a user message
    pub fn push_user_message(&mut self, content: impl Into<String>) -> MessageId {
        let msg = ConversationMessage::user(content);
        let id = msg.id.clone();
        self.messages.push(msg);
        self.touch();
        id
    }

    /// Insert or replace the trailing streaming message
    ///
    /// The first snapshot of a response is appended; later snapshots with the
    /// same ID replace it in place.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot is not streaming, or if the trailing message with
    /// the same ID has already been finalized.
    pub fn upsert_streaming(
        &mut self,
        snapshot: ConversationMessage,
    ) -> Result<(), ConversationError> {
        if !snapshot.is_streaming {
            return Err(ConversationError::NotStreaming(snapshot.id));
        }

        match self.messages.last_mut() {
            Some(last) if last.id == snapshot.id => {
                if !last.is_streaming {
                    return Err(ConversationError::Finalized(last.id.clone()));
                }
                *last = snapshot;
            }
            _ => self.messages.push(snapshot),
        }
        Ok(())
    }

    /// Get message by ID
    #[must_use]
    pub fn get_message(&self, id: &MessageId) -> Option<&ConversationMessage> {
        self.messages.iter().find(|m| &m.id == id)
    }

    /// The most recent message
    #[must_use]
    pub fn last_message(&self) -> Option<&ConversationMessage> {
        self.messages.last()
    }

    /// Whether the trailing message is still streaming
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.messages.last().is_some_and(|m| m.is_streaming)
    }

    /// Case-insensitive match of the name against a search query
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        self.name.to_lowercase().contains(&query)
    }
}
