//! Stream Manager Implementation
//!
//! Tracks in-flight responses. Each conversation has at most one active
//! stream; starting another for the same conversation cancels the first.

use std::collections::HashMap;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::reducer::FinishedStream;
use crate::config::ClientConfig;
use crate::error::ChatError;
use crate::messages::ConversationId;

// ============================================================================
// Stream Handle
// ============================================================================

/// How a stream ended without error
#[derive(Clone, Debug, PartialEq)]
pub enum StreamOutcome {
    /// The response completed and was persisted
    Completed(FinishedStream),
    /// The stream was cancelled; nothing was persisted
    Cancelled,
}

impl StreamOutcome {
    /// The finished stream, if completed
    #[must_use]
    pub fn finished(&self) -> Option<&FinishedStream> {
        match self {
            Self::Completed(finished) => Some(finished),
            Self::Cancelled => None,
        }
    }
}

/// Handle to a spawned stream task
#[derive(Debug)]
pub struct StreamHandle {
    conversation_id: ConversationId,
    cancel: CancellationToken,
    task: JoinHandle<Result<StreamOutcome, ChatError>>,
}

impl StreamHandle {
    /// Wrap a spawned task and the token that cancels it
    #[must_use]
    pub fn new(
        conversation_id: ConversationId,
        cancel: CancellationToken,
        task: JoinHandle<Result<StreamOutcome, ChatError>>,
    ) -> Self {
        Self {
            conversation_id,
            cancel,
            task,
        }
    }

    /// Conversation this stream belongs to
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Request cancellation
    ///
    /// Idempotent, and a no-op once the stream has finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Whether the task has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to end
    ///
    /// # Errors
    ///
    /// Returns the stream's error, or `ChatError::Stream` if the task panicked.
    pub async fn join(self) -> Result<StreamOutcome, ChatError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Ok(StreamOutcome::Cancelled),
            Err(e) => Err(ChatError::Stream(format!("stream task failed: {e}"))),
        }
    }
}

// ============================================================================
// Stream Manager
// ============================================================================

/// Configuration for the stream manager
#[derive(Clone, Debug)]
pub struct StreamManagerConfig {
    /// Maximum number of concurrent streams
    pub max_concurrent_streams: usize,
}

impl Default for StreamManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: 4,
        }
    }
}

impl From<&ClientConfig> for StreamManagerConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_concurrent_streams: config.max_concurrent_streams.max(1),
        }
    }
}

/// Error when registering a stream
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StreamRegisterError {
    /// Maximum concurrent streams reached
    #[error("maximum concurrent streams reached")]
    MaxStreamsReached,
}

/// Active streams keyed by conversation
#[derive(Debug, Default)]
pub struct StreamManager {
    streams: HashMap<ConversationId, StreamHandle>,
    config: StreamManagerConfig,
    total_streams_started: u64,
    total_streams_cancelled: u64,
}

impl StreamManager {
    /// Create a new stream manager with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(StreamManagerConfig::default())
    }

    /// Create a new stream manager with custom configuration
    #[must_use]
    pub fn with_config(config: StreamManagerConfig) -> Self {
        Self {
            streams: HashMap::new(),
            config,
            total_streams_started: 0,
            total_streams_cancelled: 0,
        }
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &StreamManagerConfig {
        &self.config
    }

    /// Get the number of tracked streams (finished ones included until reaped)
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.streams.len()
    }

    /// Check if any streams are tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Check if a conversation has a running stream
    #[must_use]
    pub fn is_streaming(&self, conversation_id: &ConversationId) -> bool {
        self.streams
            .get(conversation_id)
            .is_some_and(|h| !h.is_finished())
    }

    /// Check whether a stream for `conversation_id` may start
    ///
    /// Finished streams are reaped first. Replacing a conversation's own
    /// stream never counts against the limit.
    ///
    /// # Errors
    ///
    /// Returns `MaxStreamsReached` when the limit is hit.
    pub fn check_capacity(
        &mut self,
        conversation_id: &ConversationId,
    ) -> Result<(), StreamRegisterError> {
        self.reap_finished();
        if self.streams.contains_key(conversation_id)
            || self.streams.len() < self.config.max_concurrent_streams
        {
            Ok(())
        } else {
            Err(StreamRegisterError::MaxStreamsReached)
        }
    }

    /// Track a stream, cancelling any previous stream of the same conversation
    ///
    /// Returns the replaced handle, already cancelled.
    pub fn register(&mut self, handle: StreamHandle) -> Option<StreamHandle> {
        let id = handle.conversation_id().clone();
        self.total_streams_started += 1;

        let previous = self.streams.insert(id.clone(), handle);
        if let Some(ref previous) = previous {
            if !previous.is_finished() {
                tracing::debug!(conversation_id = %id, "Replacing in-flight stream");
                self.total_streams_cancelled += 1;
            }
            previous.cancel();
        }
        previous
    }

    /// Cancel and remove a conversation's stream
    ///
    /// Returns the removed handle so the caller can join it.
    pub fn cancel(&mut self, conversation_id: &ConversationId) -> Option<StreamHandle> {
        let handle = self.streams.remove(conversation_id)?;
        if !handle.is_finished() {
            self.total_streams_cancelled += 1;
        }
        handle.cancel();
        Some(handle)
    }

    /// Cancel every stream
    ///
    /// Returns the number of streams that were still running.
    pub fn cancel_all(&mut self) -> usize {
        let mut running = 0;
        for (_, handle) in self.streams.drain() {
            if !handle.is_finished() {
                running += 1;
            }
            handle.cancel();
        }
        self.total_streams_cancelled += running as u64;
        running
    }

    /// Remove streams whose task has ended
    pub fn reap_finished(&mut self) -> Vec<StreamHandle> {
        let finished: Vec<ConversationId> = self
            .streams
            .iter()
            .filter(|(_, h)| h.is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        finished
            .iter()
            .filter_map(|id| self.streams.remove(id))
            .collect()
    }

    /// Get IDs of all tracked streams
    #[must_use]
    pub fn active_stream_ids(&self) -> Vec<ConversationId> {
        self.streams.keys().cloned().collect()
    }

    /// Total streams registered (lifetime)
    #[must_use]
    pub fn total_streams_started(&self) -> u64 {
        self.total_streams_started
    }

    /// Total streams cancelled while running (lifetime)
    #[must_use]
    pub fn total_streams_cancelled(&self) -> u64 {
        self.total_streams_cancelled
    }
}

// ============================================================================
// Tests
// ============================================================================
