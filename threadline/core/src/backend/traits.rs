//! Chat Backend Traits
//!
//! The client only needs one thing from a provider: open a streaming
//! request and hand back the raw response body. Decoding happens in
//! [`crate::streaming`], so every provider shares one decoder.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::error::ChatError;
use crate::messages::MessageRole;

/// Raw response body, chunk by chunk
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ChatError>>;

/// Body of a chat-completion request
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// System prompt followed by the user turn
    pub messages: Vec<RequestMessage>,
    /// Always `true`; the client only consumes streams
    pub stream: bool,
}

/// One message on the wire
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Plain text or multi-part content
    pub content: RequestContent,
}

/// Message content
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestContent {
    /// Plain text
    Text(String),
    /// Text plus attachments
    Parts(Vec<ContentPart>),
}

/// Part of a multi-part message
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Text part
    Text {
        /// The text
        text: String,
    },
    /// Image part
    ImageUrl {
        /// Image location
        image_url: ImageUrl,
    },
}

/// Image reference (a data URL for attachments)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImageUrl {
    /// URL or `data:` URL
    pub url: String,
}

impl ChatRequest {
    /// Create an empty streaming request for `model`
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            stream: true,
        }
    }

    /// Add a system message
    #[must_use]
    pub fn with_system(mut self, prompt: impl Into<String>) -> Self {
        self.messages.push(RequestMessage {
            role: "system".to_string(),
            content: RequestContent::Text(prompt.into()),
        });
        self
    }

    /// Add a plain-text user message
    #[must_use]
    pub fn with_user(mut self, text: impl Into<String>) -> Self {
        self.messages.push(RequestMessage {
            role: MessageRole::User.as_wire_str().to_string(),
            content: RequestContent::Text(text.into()),
        });
        self
    }

    /// Add a user message with a base64-encoded JPEG attached
    #[must_use]
    pub fn with_user_image(mut self, text: impl Into<String>, jpeg_base64: &str) -> Self {
        self.messages.push(RequestMessage {
            role: MessageRole::User.as_wire_str().to_string(),
            content: RequestContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:image/jpeg;base64,{jpeg_base64}"),
                    },
                },
            ]),
        });
        self
    }
}

/// Chat backend trait
///
/// Implement this trait to add support for different providers.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Get the backend name (e.g., "OpenRouter")
    fn name(&self) -> &str;

    /// Send a streaming request and return the response body
    ///
    /// A non-2xx response must fail here, before any body is returned.
    /// Dropping the returned stream releases the connection.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_text_request_body() {
        let request = ChatRequest::new("deepseek/deepseek-r1:free")
            .with_system("Be brief")
            .with_user("Hello");

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "deepseek/deepseek-r1:free",
                "messages": [
                    {"role": "system", "content": "Be brief"},
                    {"role": "user", "content": "Hello"}
                ],
                "stream": true
            })
        );
    }

    #[test]
    fn test_image_request_body() {
        let request = ChatRequest::new("qwen/qwen2.5-vl-72b-instruct:free")
            .with_user_image("What is this?", "AAAA");

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body["messages"][0]["content"],
            serde_json::json!([
                {"type": "text", "text": "What is this?"},
                {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,AAAA"}}
            ])
        );
    }
}
