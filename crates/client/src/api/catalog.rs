//! Product catalog client.
//!
//! The product list is cached with `moka` for the configured TTL. Refreshes
//! are single-slot: starting a new fetch aborts any fetch still in flight,
//! and the caller waiting on the aborted one gets [`CatalogError::Superseded`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bazaar_core::{Catalog, CatalogEntry};
use moka::future::Cache;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::task::AbortHandle;
use tracing::{debug, instrument, warn};

use super::{ApiClient, ApiError, Auth};

/// Errors fetching the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A newer refresh replaced this one before it finished.
    #[error("catalog fetch superseded by a newer request")]
    Superseded,

    /// The fetch task panicked.
    #[error("catalog fetch task failed: {0}")]
    Task(String),
}

/// Cache key for catalog responses.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
enum CacheKey {
    ProductList,
}

#[derive(Deserialize)]
struct ProductListResponse {
    #[serde(default)]
    products: Vec<Value>,
}

/// Client for the product list.
///
/// Cheaply cloneable via `Arc`; clones share the cache and the in-flight slot.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    api: ApiClient,
    cache: Cache<CacheKey, Arc<Catalog>>,
    in_flight: Mutex<InFlight>,
}

#[derive(Default)]
struct InFlight {
    generation: u64,
    handle: Option<AbortHandle>,
}

impl CatalogClient {
    /// Create a catalog client caching the list for `ttl`.
    #[must_use]
    pub fn new(api: ApiClient, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(1).time_to_live(ttl).build();

        Self {
            inner: Arc::new(CatalogClientInner {
                api,
                cache,
                in_flight: Mutex::default(),
            }),
        }
    }

    /// The product list, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if a fetch is needed and fails or is superseded.
    pub async fn products(&self) -> Result<Arc<Catalog>, CatalogError> {
        if let Some(catalog) = self.inner.cache.get(&CacheKey::ProductList).await {
            debug!("Cache hit for product list");
            return Ok(catalog);
        }
        self.refresh().await
    }

    /// Fetch the product list, bypassing and then repopulating the cache.
    ///
    /// Aborts any refresh already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Superseded`] if another refresh starts before
    /// this one completes, or the API error.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<Arc<Catalog>, CatalogError> {
        // Refreshes are ordered by when they take the slot lock.
        let (task, generation) = {
            let mut slot = self.lock_slot();
            if let Some(previous) = slot.handle.take() {
                previous.abort();
                debug!("Aborted superseded catalog fetch");
            }
            let api = self.inner.api.clone();
            let task = tokio::spawn(async move { fetch_products(&api).await });
            slot.handle = Some(task.abort_handle());
            slot.generation = slot.generation.wrapping_add(1);
            (task, slot.generation)
        };

        let result = task.await;

        {
            let mut slot = self.lock_slot();
            if slot.generation == generation {
                slot.handle = None;
            }
        }

        match result {
            Ok(Ok(catalog)) => {
                let catalog = Arc::new(catalog);
                self.inner
                    .cache
                    .insert(CacheKey::ProductList, Arc::clone(&catalog))
                    .await;
                Ok(catalog)
            }
            Ok(Err(e)) => Err(CatalogError::Api(e)),
            Err(e) if e.is_cancelled() => Err(CatalogError::Superseded),
            Err(e) => Err(CatalogError::Task(e.to_string())),
        }
    }

    /// Drop the cached list so the next [`products`](Self::products) call fetches.
    pub async fn invalidate(&self) {
        self.inner.cache.invalidate(&CacheKey::ProductList).await;
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, InFlight> {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fetch and decode the list, newest product first.
///
/// Entries that fail to decode are skipped with a warning instead of failing
/// the whole list.
async fn fetch_products(api: &ApiClient) -> Result<Catalog, ApiError> {
    let response: ProductListResponse = api.get("product/list", Auth::Public).await?;
    Ok(decode_products(response.products))
}

fn decode_products(raw: Vec<Value>) -> Catalog {
    let mut entries: Vec<CatalogEntry> = raw
        .into_iter()
        .filter_map(|value| {
            serde_json::from_value::<CatalogEntry>(value)
                .inspect_err(|error| warn!(%error, "Skipping malformed product"))
                .ok()
        })
        .collect();
    entries.reverse();
    Catalog::new(entries)
}
