//! Error Types
//!
//! Only transport failures reach the user. Malformed stream lines are
//! absorbed by the decoder and cancellation is an outcome, not an error.

use thiserror::Error;

use crate::storage::StoreError;

/// Errors surfaced by the chat client
#[derive(Debug, Error)]
pub enum ChatError {
    /// No API key configured
    #[error("API key not found")]
    MissingApiKey,

    /// Could not reach the endpoint
    #[error("Network error: {0}")]
    Network(String),

    /// Endpoint answered with a non-2xx status
    #[error("{message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message from the error body, or a generic one
        message: String,
    },

    /// Response body failed while streaming
    #[error("Error processing stream: {0}")]
    Stream(String),

    /// No conversation with this ID
    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    /// Persistence failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Conversation record could not be encoded or decoded
    #[error("Invalid chat record: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChatError {
    /// Stable error code for UI surfaces
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "API_KEY_MISSING",
            Self::Network(_) => "NETWORK_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::Stream(_) => "STREAM_ERROR",
            Self::ChatNotFound(_) => "CHAT_NOT_FOUND",
            Self::Store(_) => "STORAGE_ERROR",
            Self::Serialization(_) => "INVALID_RECORD",
        }
    }

    /// Whether this failure came from the transport
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Api { .. } | Self::Stream(_))
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_body() || e.is_decode() {
            Self::Stream(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ChatError::MissingApiKey.code(), "API_KEY_MISSING");
        assert_eq!(
            ChatError::Api {
                status: 500,
                message: "boom".into()
            }
            .code(),
            "API_ERROR"
        );
        assert_eq!(ChatError::ChatNotFound("1".into()).code(), "CHAT_NOT_FOUND");
    }

    #[test]
    fn test_transport_classification() {
        assert!(ChatError::Network("refused".into()).is_transport());
        assert!(ChatError::Stream("reset".into()).is_transport());
        assert!(!ChatError::ChatNotFound("1".into()).is_transport());
        assert!(!ChatError::MissingApiKey.is_transport());
    }

    #[test]
    fn test_api_error_displays_message() {
        let err = ChatError::Api {
            status: 401,
            message: "Invalid key".into(),
        };
        assert_eq!(err.to_string(), "Invalid key");
    }
}
