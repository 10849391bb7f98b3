//! Chat store
//!
//! Maps conversations onto `chat-<id>` keys of a [`KeyValueStore`].

use std::sync::Arc;

use super::KeyValueStore;
use crate::conversation::Conversation;
use crate::error::ChatError;
use crate::messages::ConversationId;

/// Key prefix for conversation records
pub const CHAT_PREFIX: &str = "chat-";

/// Conversation records on top of a key-value store
pub struct ChatStore<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> Clone for ChatStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore> ChatStore<S> {
    /// Wrap a store
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    /// The underlying store
    #[must_use]
    pub fn inner(&self) -> &Arc<S> {
        &self.store
    }

    /// Storage key for a conversation
    #[must_use]
    pub fn key_for(id: &ConversationId) -> String {
        format!("{CHAT_PREFIX}{id}")
    }

    /// Load every conversation, most recently updated first
    ///
    /// Records that fail to parse are skipped. A failing store yields an
    /// empty list.
    pub async fn load_chats(&self) -> Vec<Conversation> {
        let keys = match self.store.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list chats");
                return Vec::new();
            }
        };

        let mut chats = Vec::new();
        for key in keys.iter().filter(|k| k.starts_with(CHAT_PREFIX)) {
            match self.store.get(key).await {
                Ok(Some(blob)) => match serde_json::from_str::<Conversation>(&blob) {
                    Ok(chat) => chats.push(chat),
                    Err(e) => tracing::warn!(key = %key, error = %e, "Skipping malformed chat"),
                },
                Ok(None) => {}
                Err(e) => tracing::warn!(key = %key, error = %e, "Failed to read chat"),
            }
        }

        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        chats
    }

    /// Load one conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is malformed.
    pub async fn get_chat(&self, id: &ConversationId) -> Result<Option<Conversation>, ChatError> {
        match self.store.get(&Self::key_for(id)).await? {
            Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }

    /// Write one conversation
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the store fails.
    pub async fn save(&self, conversation: &Conversation) -> Result<(), ChatError> {
        let blob = serde_json::to_string(conversation)?;
        self.store.set(&Self::key_for(&conversation.id), blob).await?;
        tracing::debug!(
            conversation_id = %conversation.id,
            messages = conversation.messages.len(),
            "Saved chat"
        );
        Ok(())
    }

    /// Empty conversation named `New Chat <n>`, not yet persisted
    ///
    /// `n` is the number of stored chats plus one.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn draft_chat(&self) -> Result<Conversation, ChatError> {
        let existing = self
            .store
            .list_keys()
            .await?
            .iter()
            .filter(|k| k.starts_with(CHAT_PREFIX))
            .count();
        Ok(Conversation::new(format!("New Chat {}", existing + 1)))
    }

    /// Create and persist an empty conversation named `New Chat <n>`
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn create_chat(&self) -> Result<Conversation, ChatError> {
        let chat = self.draft_chat().await?;
        self.save(&chat).await?;
        tracing::info!(conversation_id = %chat.id, name = %chat.name, "Created chat");
        Ok(chat)
    }

    /// Append a user message and persist
    ///
    /// With no ID a new conversation is created for the message.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::ChatNotFound` for an unknown ID, or a store error.
    pub async fn add_user_message(
        &self,
        id: Option<&ConversationId>,
        content: &str,
    ) -> Result<Conversation, ChatError> {
        let mut chat = match id {
            Some(id) => self
                .get_chat(id)
                .await?
                .ok_or_else(|| ChatError::ChatNotFound(id.to_string()))?,
            None => self.create_chat().await?,
        };

        chat.push_user_message(content);
        self.save(&chat).await?;
        Ok(chat)
    }

    /// Remove a conversation
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn delete_chat(&self, id: &ConversationId) -> Result<(), ChatError> {
        self.store.delete(&Self::key_for(id)).await?;
        tracing::info!(conversation_id = %id, "Deleted chat");
        Ok(())
    }
}

/// Conversations whose name contains `query`, ignoring case
#[must_use]
pub fn filter_chats(chats: &[Conversation], query: &str) -> Vec<Conversation> {
    chats
        .iter()
        .filter(|chat| chat.matches_query(query))
        .cloned()
        .collect()
}
