//! Chat Backend Integration
//!
//! Access to streaming chat-completion endpoints through a common trait.
//!
//! # Available Backends
//!
//! - **OpenRouter** (and any OpenAI-compatible `/chat/completions` endpoint)
//!
//! # Usage
//!
//! ```ignore
//! use threadline_core::backend::{ChatBackend, ChatRequest, OpenRouterBackend};
//!
//! let backend = OpenRouterBackend::from_config(&config)?;
//! let request = ChatRequest::new("deepseek/deepseek-r1:free").with_user("Hello!");
//! let body = backend.open_stream(&request).await?;
//! ```

mod openrouter;
mod traits;

pub use openrouter::OpenRouterBackend;
pub use traits::{ByteStream, ChatBackend, ChatRequest, ContentPart, ImageUrl, RequestContent, RequestMessage};
