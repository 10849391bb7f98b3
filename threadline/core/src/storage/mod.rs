//! Conversation Persistence
//!
//! A minimal key-value interface that conversation records are written to,
//! with an in-memory and a file-backed implementation, and [`ChatStore`],
//! which maps conversations onto keys.
//!
//! # Usage
//!
//! ```ignore
//! use threadline_core::storage::{ChatStore, FileStore};
//!
//! let store = FileStore::open("/tmp/threadline-chats").await?;
//! let chats = ChatStore::new(store);
//! for chat in chats.load_chats().await {
//!     println!("{} {}", chat.id, chat.name);
//! }
//! ```

mod chats;
mod file;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use chats::{filter_chats, ChatStore, CHAT_PREFIX};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors from a key-value store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failure
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key cannot be stored (empty, or contains path components)
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Key-value persistence collaborator
///
/// Blobs are JSON text. Implementations must be safe to share between tasks.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a blob
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a blob, replacing any previous value
    async fn set(&self, key: &str, blob: String) -> Result<(), StoreError>;

    /// Remove a blob. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List every stored key
    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Reject keys that are empty or could escape a storage directory
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = key.is_empty()
        || key.contains(['/', '\\', '\0'])
        || key.contains("..")
        || key.starts_with('.');
    if invalid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("chat-1700000000000").is_ok());
        assert!(validate_key("chat-9f2c").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
        assert!(validate_key(".hidden").is_err());
    }
}
