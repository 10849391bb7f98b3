//! Chat Client
//!
//! Runs one exchange end to end: the user message is appended in memory, the
//! response is streamed through a [`StreamReducer`], snapshots are pushed to
//! the UI, and the finished conversation is written to storage exactly once.
//!
//! Cancelled and failed exchanges write nothing.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::backend::{ChatBackend, ChatRequest};
use crate::config::ClientConfig;
use crate::conversation::Conversation;
use crate::error::ChatError;
use crate::messages::{MessageId, StreamUpdate};
use crate::storage::{ChatStore, KeyValueStore};
use crate::streaming::{
    pump_stream, PumpResult, StreamHandle, StreamManager, StreamManagerConfig, StreamOutcome,
    StreamReducer, StreamRegisterError,
};

/// User input for one exchange
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Prompt {
    /// Message text
    pub text: String,
    /// Optional JPEG attachment, base64-encoded
    pub image_jpeg_base64: Option<String>,
}

impl Prompt {
    /// Text-only prompt
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_jpeg_base64: None,
        }
    }

    /// Attach a base64-encoded JPEG
    #[must_use]
    pub fn with_image(mut self, jpeg_base64: impl Into<String>) -> Self {
        self.image_jpeg_base64 = Some(jpeg_base64.into());
        self
    }
}

/// Streaming chat client
pub struct ChatClient<B: ChatBackend, S: KeyValueStore> {
    backend: Arc<B>,
    chats: ChatStore<S>,
    config: ClientConfig,
}

impl<B, S> ChatClient<B, S>
where
    B: ChatBackend + 'static,
    S: KeyValueStore + 'static,
{
    /// Create a client
    pub fn new(backend: B, chats: ChatStore<S>, config: ClientConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            chats,
            config,
        }
    }

    /// Conversation storage
    pub fn chats(&self) -> &ChatStore<S> {
        &self.chats
    }

    /// Active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The backend in use
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Stream manager capped by `max_concurrent_streams`
    pub fn stream_manager(&self) -> StreamManager {
        StreamManager::with_config(StreamManagerConfig::from(&self.config))
    }

    /// Channel sized for UI updates
    pub fn update_channel(&self) -> (mpsc::Sender<StreamUpdate>, mpsc::Receiver<StreamUpdate>) {
        mpsc::channel(self.config.update_channel_capacity.max(1))
    }

    /// Request for one prompt: system prompt, then the user turn
    pub fn build_request(&self, prompt: &Prompt) -> ChatRequest {
        let request = ChatRequest::new(&self.config.model).with_system(&self.config.system_prompt);
        match prompt.image_jpeg_base64.as_deref() {
            Some(image) => request.with_user_image(&prompt.text, image),
            None => request.with_user(&prompt.text),
        }
    }

    /// Run one exchange to its end
    ///
    /// Exactly one terminal update is sent (unless the receiver is gone).
    /// On completion the conversation, with the user message and the final
    /// assistant message, is persisted once.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the request or body fails, or the
    /// storage error if the final write fails.
    pub async fn send_message(
        &self,
        mut conversation: Conversation,
        prompt: Prompt,
        updates: mpsc::Sender<StreamUpdate>,
        cancel: CancellationToken,
    ) -> Result<StreamOutcome, ChatError> {
        conversation.push_user_message(&prompt.text);
        let conversation_id = conversation.id.clone();
        let request = self.build_request(&prompt);

        tracing::info!(
            conversation_id = %conversation_id,
            backend = self.backend.name(),
            model = %request.model,
            "Sending message"
        );

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            opened = self.backend.open_stream(&request) => Some(opened),
        };

        let body = match opened {
            None => {
                tracing::info!(conversation_id = %conversation_id, "Cancelled before response");
                notify(&updates, StreamUpdate::Cancelled { message_id: None }).await;
                return Ok(StreamOutcome::Cancelled);
            }
            Some(Err(e)) => {
                tracing::warn!(conversation_id = %conversation_id, code = e.code(), error = %e, "Request failed");
                notify(
                    &updates,
                    StreamUpdate::Failed {
                        message_id: None,
                        error: e.to_string(),
                        partial_content: String::new(),
                    },
                )
                .await;
                return Err(e);
            }
            Some(Ok(body)) => body,
        };

        let reducer = StreamReducer::with_message_id(conversation, MessageId::new());
        match pump_stream(body, reducer, &updates, &cancel).await {
            PumpResult::Finished(finished) => {
                // Late cancellation still wins over persisting
                if cancel.is_cancelled() {
                    notify(
                        &updates,
                        StreamUpdate::Cancelled {
                            message_id: Some(finished.message.id.clone()),
                        },
                    )
                    .await;
                    return Ok(StreamOutcome::Cancelled);
                }

                if let Err(e) = self.chats.save(&finished.conversation).await {
                    tracing::error!(conversation_id = %conversation_id, error = %e, "Failed to persist chat");
                    notify(
                        &updates,
                        StreamUpdate::Failed {
                            message_id: Some(finished.message.id.clone()),
                            error: e.to_string(),
                            partial_content: finished.message.content.clone(),
                        },
                    )
                    .await;
                    return Err(e);
                }

                tracing::info!(
                    conversation_id = %conversation_id,
                    chars = finished.message.content.len(),
                    title = ?finished.title,
                    "Response complete"
                );
                notify(
                    &updates,
                    StreamUpdate::Finished {
                        conversation: finished.conversation.clone(),
                        title: finished.title.clone(),
                    },
                )
                .await;
                Ok(StreamOutcome::Completed(finished))
            }
            PumpResult::Cancelled { message_id } => {
                tracing::info!(conversation_id = %conversation_id, "Stream cancelled");
                notify(
                    &updates,
                    StreamUpdate::Cancelled {
                        message_id: Some(message_id),
                    },
                )
                .await;
                Ok(StreamOutcome::Cancelled)
            }
            PumpResult::Failed {
                message_id,
                error,
                partial_content,
            } => {
                tracing::warn!(conversation_id = %conversation_id, error = %error, "Stream failed");
                notify(
                    &updates,
                    StreamUpdate::Failed {
                        message_id: Some(message_id),
                        error: error.to_string(),
                        partial_content,
                    },
                )
                .await;
                Err(error)
            }
        }
    }

    /// Run an exchange as a background task
    pub fn spawn_message(
        self: &Arc<Self>,
        conversation: Conversation,
        prompt: Prompt,
        updates: mpsc::Sender<StreamUpdate>,
    ) -> StreamHandle {
        let cancel = CancellationToken::new();
        let conversation_id = conversation.id.clone();
        let client = Arc::clone(self);
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            client
                .send_message(conversation, prompt, updates, token)
                .await
        });
        StreamHandle::new(conversation_id, cancel, task)
    }

    /// Spawn an exchange and track it in `manager`
    ///
    /// A stream already running for the same conversation is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `MaxStreamsReached` without starting anything when the
    /// manager is full.
    pub fn start_message(
        self: &Arc<Self>,
        manager: &mut StreamManager,
        conversation: Conversation,
        prompt: Prompt,
        updates: mpsc::Sender<StreamUpdate>,
    ) -> Result<Option<StreamHandle>, StreamRegisterError> {
        manager.check_capacity(&conversation.id)?;
        let handle = self.spawn_message(conversation, prompt, updates);
        Ok(manager.register(handle))
    }
}

/// Deliver an update, ignoring a closed receiver
async fn notify(updates: &mpsc::Sender<StreamUpdate>, update: StreamUpdate) {
    if updates.send(update).await.is_err() {
        tracing::trace!("Update receiver dropped");
    }
}
