//! Client Configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables. Command-line flags are applied by the binary.
//!
//! # File
//!
//! `$XDG_CONFIG_HOME/threadline/config.toml` (platform config dir elsewhere):
//!
//! ```toml
//! model = "deepseek/deepseek-r1:free"
//! base_url = "https://openrouter.ai/api/v1"
//! app_title = "threadline"
//! data_dir = "/home/me/.local/share/threadline/chats"
//! ```
//!
//! # Environment Variables
//!
//! - `THREADLINE_API_KEY` or `OPENROUTER_API_KEY`: API key
//! - `THREADLINE_MODEL`: model identifier
//! - `THREADLINE_BASE_URL`: chat-completion API base URL
//! - `THREADLINE_APP_TITLE`: value of the `X-Title` header
//! - `THREADLINE_DATA_DIR`: directory for conversation records

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default chat-completion endpoint base
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model identifier
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-lite-preview-02-05:free";

/// System prompt asking the model to append a `TITLE:` line
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. For each response, you will: \
1. Provide a direct answer to the user's query \
2. On a new line after your response, provide a brief title (3-4 words) for this conversation, \
formatted exactly as: TITLE: your_title_here";

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config {path:?}: {source}")]
    Read {
        /// Path that was read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        /// Path that was parsed
        path: PathBuf,
        /// Underlying error
        source: toml::de::Error,
    },
}

/// Chat client configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API key (usually supplied through the environment)
    pub api_key: Option<String>,
    /// Chat-completion API base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Application title sent as `X-Title`
    pub app_title: Option<String>,
    /// System prompt prepended to every request
    pub system_prompt: String,
    /// Directory for conversation records
    pub data_dir: Option<PathBuf>,
    /// Timeout for establishing a request, in seconds
    pub connect_timeout_secs: u64,
    /// Capacity of the UI update channel
    pub update_channel_capacity: usize,
    /// Maximum concurrently streaming conversations
    pub max_concurrent_streams: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            app_title: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            data_dir: None,
            connect_timeout_secs: 30,
            update_channel_capacity: 100,
            max_concurrent_streams: 4,
        }
    }
}

impl ClientConfig {
    /// Load from the default path (if present) plus environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match default_config_path() {
            Some(path) if path.exists() => Self::load_from_path(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load a TOML file without environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = ?path, "Loaded config file");
        Ok(config)
    }

    /// Parse TOML text
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the text does not match the schema.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply environment variable overrides
    pub fn apply_env(&mut self) {
        if let Ok(key) =
            std::env::var("THREADLINE_API_KEY").or_else(|_| std::env::var("OPENROUTER_API_KEY"))
        {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("THREADLINE_MODEL") {
            self.model = model;
        }
        if let Ok(base_url) = std::env::var("THREADLINE_BASE_URL") {
            self.base_url = base_url;
        }
        if let Ok(title) = std::env::var("THREADLINE_APP_TITLE") {
            self.app_title = Some(title);
        }
        if let Ok(dir) = std::env::var("THREADLINE_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Connect timeout as a `Duration`
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Directory for conversation records
    ///
    /// Falls back to the platform data dir, then the working directory.
    #[must_use]
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("threadline")
                .join("chats")
        })
    }
}

/// `<config dir>/threadline/config.toml`
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("threadline").join("config.toml"))
}
