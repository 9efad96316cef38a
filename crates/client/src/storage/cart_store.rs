//! Persisted cart snapshot.

use std::sync::Arc;

use bazaar_core::CartSnapshot;
use tracing::warn;

use super::{CART_KEY, KeyValueStore, StorageError};

/// Reads and writes the one durable cart snapshot.
///
/// Loading never fails: absent, unreadable or malformed data yields an empty
/// cart, and malformed data is deleted so the next load starts clean.
#[derive(Clone)]
pub struct CartStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CartStore {
    /// Wrap a key/value backend.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Load the stored snapshot, or an empty one.
    #[must_use]
    pub fn load(&self) -> CartSnapshot {
        let raw = match self.backend.get(CART_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return CartSnapshot::new(),
            Err(error) => {
                warn!(%error, "failed to read stored cart, starting empty");
                return CartSnapshot::new();
            }
        };

        match CartSnapshot::from_json_str(&raw) {
            Ok(snapshot) => snapshot,
            Err(error) => {
                warn!(%error, "discarding malformed stored cart");
                if let Err(error) = self.backend.remove(CART_KEY) {
                    warn!(%error, "failed to delete malformed stored cart");
                }
                CartSnapshot::new()
            }
        }
    }

    /// Persist a snapshot.
    ///
    /// # Errors
    ///
    /// Returns the storage failure (typically
    /// [`StorageError::QuotaExceeded`]) as a non-fatal warning; the caller's
    /// in-memory state stays authoritative.
    pub fn save(&self, snapshot: &CartSnapshot) -> Result<(), StorageError> {
        self.backend
            .set(CART_KEY, &snapshot.to_json_string())
            .inspect_err(|error| warn!(%error, "failed to persist cart"))
    }

    /// Delete the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns the storage failure as a non-fatal warning.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.backend
            .remove(CART_KEY)
            .inspect_err(|error| warn!(%error, "failed to clear stored cart"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store_with(raw: Option<&str>) -> (Arc<MemoryStore>, CartStore) {
        let backend = Arc::new(MemoryStore::new());
        if let Some(raw) = raw {
            backend.set(CART_KEY, raw).unwrap();
        }
        let store = CartStore::new(backend.clone());
        (backend, store)
    }

    #[test]
    fn test_load_absent_is_empty() {
        let (_, store) = store_with(None);
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_load_malformed_self_heals() {
        for raw in ["{broken", "null", "[]", "42"] {
            let (backend, store) = store_with(Some(raw));
            assert!(store.load().is_empty(), "{raw} should load empty");
            assert_eq!(backend.get(CART_KEY).unwrap(), None, "{raw} should be deleted");
        }
    }

    #[test]
    fn test_save_load_is_noop_for_well_formed_data() {
        let raw = r#"{"P1":{"L":2,"M":1}}"#;
        let (backend, store) = store_with(Some(raw));

        store.save(&store.load()).unwrap();
        assert_eq!(backend.get(CART_KEY).unwrap().as_deref(), Some(raw));
    }

    #[test]
    fn test_save_reports_quota_without_panicking() {
        let backend = Arc::new(MemoryStore::with_quota(12));
        let store = CartStore::new(backend);
        let snapshot = CartSnapshot::from_json_str(r#"{"P1":{"M":1}}"#).unwrap();

        let err = store.save(&snapshot).unwrap_err();
        assert!(err.is_quota_exceeded());
    }

    #[test]
    fn test_clear() {
        let (backend, store) = store_with(Some(r#"{"P1":{"M":1}}"#));
        store.clear().unwrap();
        assert_eq!(backend.get(CART_KEY).unwrap(), None);
    }
}
