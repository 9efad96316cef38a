//! Durable client-side storage.
//!
//! A small key/value abstraction with browser-`localStorage` semantics: string
//! keys, string values, and an optional byte quota that makes writes fail with
//! [`StorageError::QuotaExceeded`] instead of growing without bound.
//!
//! Two keys are used by the client:
//! - [`CART_KEY`] - the JSON-serialized cart snapshot
//! - [`TOKEN_KEY`] - the session token

mod cart_store;
mod file;
mod memory;

pub use cart_store::CartStore;
pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Key holding the persisted cart snapshot.
pub const CART_KEY: &str = "cartItems";

/// Key holding the session token.
pub const TOKEN_KEY: &str = "token";

/// Errors raised by a [`KeyValueStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// Writing the value would exceed the store's byte quota.
    #[error("storage quota exceeded writing {key}: need {needed} bytes, quota is {quota}")]
    QuotaExceeded {
        key: String,
        needed: u64,
        quota: u64,
    },

    /// Key contains characters the backend cannot store.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Underlying I/O failed.
    #[error("storage I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Returns `true` for quota failures.
    #[must_use]
    pub const fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// Synchronous string key/value storage.
///
/// Implementations must be safe to share between tasks.
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::QuotaExceeded`] if the write does not fit, or
    /// an I/O error.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Bytes a key/value pair counts against a quota.
fn entry_size(key: &str, value: &str) -> u64 {
    u64::try_from(key.len() + value.len()).unwrap_or(u64::MAX)
}
