//! OpenRouter Backend Implementation
//!
//! Streaming client for OpenRouter and other OpenAI-compatible
//! chat-completion APIs.
//!
//! # API
//!
//! - `POST {base_url}/chat/completions` with `stream: true` answers with a
//!   `data: `-framed event stream terminated by `data: [DONE]`.
//! - Errors come back as non-2xx responses with a JSON body such as
//!   `{"error": {"message": "...", "code": 401}}`.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};

use super::traits::{ByteStream, ChatBackend, ChatRequest};
use crate::config::ClientConfig;
use crate::error::ChatError;

/// OpenRouter backend client
#[derive(Clone)]
pub struct OpenRouterBackend {
    /// API base URL, without trailing slash
    base_url: String,
    /// Bearer token
    api_key: String,
    /// Optional `X-Title` header value
    app_title: Option<String>,
    /// HTTP client
    http_client: reqwest::Client,
}

impl std::fmt::Debug for OpenRouterBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterBackend")
            .field("base_url", &self.base_url)
            .field("app_title", &self.app_title)
            .finish_non_exhaustive()
    }
}

impl OpenRouterBackend {
    /// Create a new backend
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Network` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ChatError> {
        Self::with_client(base_url, api_key, reqwest::Client::builder().build()?)
    }

    fn with_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        http_client: reqwest::Client,
    ) -> Result<Self, ChatError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ChatError::MissingApiKey);
        }
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            app_title: None,
            http_client,
        })
    }

    /// Create from client configuration
    ///
    /// # Errors
    ///
    /// Returns `ChatError::MissingApiKey` when no key is configured.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ChatError> {
        let api_key = config.api_key.as_deref().ok_or(ChatError::MissingApiKey)?;
        // No overall timeout: a response may stream for minutes.
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        let mut backend = Self::with_client(config.base_url.clone(), api_key, http_client)?;
        backend.app_title.clone_from(&config.app_title);
        Ok(backend)
    }

    /// Get completions endpoint URL
    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn extra_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = self
            .app_title
            .as_deref()
            .and_then(|t| HeaderValue::from_str(t).ok())
        {
            headers.insert("x-title", value);
        }
        headers
    }
}

/// Build an API error from a non-2xx response body
///
/// Prefers `error` (string or `{message}`), then `message`, then a generic
/// message with the status code.
pub(crate) fn api_error(status: u16, body: &str) -> ChatError {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|data| {
        let error = data.get("error");
        error
            .and_then(serde_json::Value::as_str)
            .or_else(|| {
                error
                    .and_then(|e| e.get("message"))
                    .and_then(serde_json::Value::as_str)
            })
            .or_else(|| data.get("message").and_then(serde_json::Value::as_str))
            .map(str::to_string)
    });

    ChatError::Api {
        status,
        message: message.unwrap_or_else(|| format!("Server error ({status})")),
    }
}

#[async_trait]
impl ChatBackend for OpenRouterBackend {
    fn name(&self) -> &'static str {
        "OpenRouter"
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        let url = self.completions_url();
        tracing::debug!(url = %url, model = %request.model, "Opening chat stream");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .headers(self.extra_headers())
            .json(request)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        // Check for HTTP errors
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status, "Chat endpoint rejected request");
            return Err(api_error(status, &body));
        }

        let body = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| bytes.to_vec())
                .map_err(|e| ChatError::Stream(e.to_string()))
        });

        Ok(body.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_creation() {
        let backend = OpenRouterBackend::new("https://openrouter.ai/api/v1/", "sk-test").unwrap();
        assert_eq!(backend.base_url, "https://openrouter.ai/api/v1");
        assert_eq!(
            backend.completions_url(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(backend.name(), "OpenRouter");
    }

    #[test]
    fn test_missing_api_key() {
        let err = OpenRouterBackend::new("https://example.com", "  ").unwrap_err();
        assert!(matches!(err, ChatError::MissingApiKey));

        let config = ClientConfig::default();
        let err = OpenRouterBackend::from_config(&config).unwrap_err();
        assert!(matches!(err, ChatError::MissingApiKey));
    }

    #[test]
    fn test_from_config() {
        let config = ClientConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "http://localhost:8080/v1".to_string(),
            app_title: Some("threadline".to_string()),
            ..ClientConfig::default()
        };

        let backend = OpenRouterBackend::from_config(&config).unwrap();
        assert_eq!(backend.completions_url(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(
            backend.extra_headers().get("X-Title").unwrap(),
            "threadline"
        );
    }

    #[test]
    fn test_debug_hides_api_key() {
        let backend = OpenRouterBackend::new("https://example.com", "sk-secret").unwrap();
        assert!(!format!("{backend:?}").contains("sk-secret"));
    }

    #[test]
    fn test_api_error_from_string_field() {
        let err = api_error(400, r#"{"error": "Bad model"}"#);
        assert!(matches!(err, ChatError::Api { status: 400, ref message } if message == "Bad model"));
    }

    #[test]
    fn test_api_error_from_nested_message() {
        let err = api_error(401, r#"{"error": {"message": "No auth credentials found", "code": 401}}"#);
        assert_eq!(err.to_string(), "No auth credentials found");
    }

    #[test]
    fn test_api_error_from_message_field() {
        let err = api_error(429, r#"{"message": "Rate limited"}"#);
        assert_eq!(err.to_string(), "Rate limited");
    }

    #[test]
    fn test_api_error_fallback() {
        assert_eq!(api_error(502, "<html>").to_string(), "Server error (502)");
        assert_eq!(api_error(500, "{}").to_string(), "Server error (500)");
    }
}
