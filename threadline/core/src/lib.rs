//! Threadline Core - Streaming Chat Client Library
//!
//! This crate turns a streamed chat-completion response into conversation
//! state: it decodes `data: `-framed events, accumulates the assistant
//! message, strips the `TITLE:` line the model appends, and persists the
//! finished conversation once. It has no UI dependencies; surfaces receive
//! [`StreamUpdate`]s over a channel and render them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                UI Surface (CLI, app, tests)                  │
//! └──────────────▲──────────────────────────────┬────────────────┘
//!                │ StreamUpdate                 │ Prompt, cancel
//! ┌──────────────┴──────────────────────────────▼────────────────┐
//! │                         ChatClient                           │
//! │  ┌─────────────┐   ┌───────────────────────┐   ┌───────────┐ │
//! │  │ ChatBackend │──►│ StreamDecoder/Reducer │──►│ ChatStore │ │
//! │  │ (HTTP body) │   │ (per request)         │   │ (1 write) │ │
//! │  └─────────────┘   └───────────────────────┘   └───────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use threadline_core::{
//!     ChatClient, ChatStore, ClientConfig, FileStore, OpenRouterBackend, Prompt,
//! };
//!
//! let config = ClientConfig::load()?;
//! let backend = OpenRouterBackend::from_config(&config)?;
//! let chats = ChatStore::new(FileStore::open(config.resolved_data_dir()).await?);
//! let client = Arc::new(ChatClient::new(backend, chats, config));
//!
//! let chat = client.chats().create_chat().await?;
//! let (tx, mut rx) = client.update_channel();
//! let handle = client.spawn_message(chat, Prompt::text("Hello!"), tx);
//! while let Some(update) = rx.recv().await {
//!     // render
//! }
//! handle.join().await?;
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: Chat-completion providers (OpenRouter)
//! - [`client`]: One exchange end to end
//! - [`config`]: Layered configuration
//! - [`conversation`]: Conversation and message records
//! - [`error`]: Error types
//! - [`messages`]: Identifiers and UI updates
//! - [`storage`]: Key-value persistence
//! - [`streaming`]: Decoder, reducer, title extraction, stream tracking

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod messages;
pub mod storage;
pub mod streaming;

// Re-exports for convenience
pub use backend::{ByteStream, ChatBackend, ChatRequest, OpenRouterBackend};
pub use client::{ChatClient, Prompt};
pub use config::{default_config_path, ClientConfig, ConfigError};
pub use conversation::{Conversation, ConversationError, ConversationMessage};
pub use error::ChatError;
pub use messages::{ConversationId, MessageId, MessageRole, StreamUpdate};
pub use storage::{filter_chats, ChatStore, FileStore, KeyValueStore, MemoryStore, StoreError};

// Streaming exports
pub use streaming::{
    extract_title, pump_stream, FinishedStream, ProtocolEvent, PumpResult, ReducerOutput,
    ReducerState, StreamDecoder, StreamHandle, StreamManager, StreamManagerConfig, StreamOutcome,
    StreamReducer, StreamRegisterError, TitleScan,
};
