//! Cart reconciliation between the in-memory snapshot, durable storage and
//! the server cart.
//!
//! # Protocol
//!
//! - **Anonymous**: every mutation lands in memory and durable storage only.
//! - **Syncing**: on login the stored cart is pushed to the server, one
//!   `set_quantity` per line (local value wins, never additive), then the
//!   server cart is re-fetched and adopted. Server-only lines are kept.
//! - **Stable**: mutations are applied optimistically (memory, then storage),
//!   then sent to the server. A failed call reverts memory and storage to
//!   the snapshot taken just before the mutation.
//!
//! An authorization failure anywhere ends the session. The local cart stays.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use bazaar_core::{Catalog, CartSnapshot, ProductId, SizeLabel, pricing};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, CartGateway};
use crate::error::{CartError, add_breadcrumb};
use crate::session::SessionGate;
use crate::storage::{CartStore, StorageError};

/// Where the reconciler is in the login lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No session; the cart is local only.
    Anonymous,
    /// Login reconciliation in progress.
    Syncing,
    /// Signed in and reconciled; mutations go to the server.
    Stable,
}

impl SyncPhase {
    /// Whether moving from `self` to `to` is allowed.
    #[must_use]
    pub const fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Anonymous | Self::Stable, Self::Syncing)
                | (Self::Syncing, Self::Stable)
                | (_, Self::Anonymous)
        )
    }
}

/// How a login reconciliation ended.
#[derive(Debug)]
pub enum LoginSync {
    /// No session token; nothing to reconcile.
    Anonymous,
    /// Another reconciliation was already running; this call did nothing.
    AlreadyRunning,
    /// The local cart was empty and the server cart was adopted.
    AdoptedServer,
    /// Local lines were pushed, the merged server cart adopted and the
    /// stored cart cleared.
    Merged { pushed: usize, failed: usize },
    /// The server could not be read; the local cart is in use.
    FellBack { error: CartError },
    /// The server refused the token; the session has been ended.
    SignedOut { error: CartError },
    /// The session ended while reconciling; the server cart was not
    /// adopted and the stored cart was kept.
    Interrupted,
}

/// Result of a cart mutation.
#[derive(Debug)]
pub enum MutationOutcome {
    /// The change stuck. A failed durable write is reported as a warning.
    Applied {
        snapshot: CartSnapshot,
        storage_warning: Option<CartError>,
    },
    /// The server call failed and the change was reverted. If the revert
    /// could not be written, storage still holds the optimistic cart and
    /// `storage_warning` says so.
    RolledBack {
        snapshot: CartSnapshot,
        error: CartError,
        storage_warning: Option<CartError>,
    },
}

impl MutationOutcome {
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// The cart after the operation (reverted on rollback).
    #[must_use]
    pub const fn snapshot(&self) -> &CartSnapshot {
        match self {
            Self::Applied { snapshot, .. } | Self::RolledBack { snapshot, .. } => snapshot,
        }
    }

    /// The rollback cause, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&CartError> {
        match self {
            Self::Applied { .. } => None,
            Self::RolledBack { error, .. } => Some(error),
        }
    }

    /// The failed durable write, if any. Memory is correct regardless.
    #[must_use]
    pub const fn storage_warning(&self) -> Option<&CartError> {
        match self {
            Self::Applied {
                storage_warning, ..
            }
            | Self::RolledBack {
                storage_warning, ..
            } => storage_warning.as_ref(),
        }
    }

    /// Collapse into a `Result`, dropping any storage warning.
    ///
    /// # Errors
    ///
    /// Returns the rollback cause.
    pub fn into_result(self) -> Result<CartSnapshot, CartError> {
        match self {
            Self::Applied { snapshot, .. } => Ok(snapshot),
            Self::RolledBack { error, .. } => Err(error),
        }
    }
}

/// The server call mirroring a local mutation.
enum RemoteOp<'a> {
    Add(&'a ProductId, &'a SizeLabel),
    Set(&'a ProductId, &'a SizeLabel, u32),
    Clear,
}

impl RemoteOp<'_> {
    const fn name(&self) -> &'static str {
        match self {
            Self::Add(..) => "add_item",
            Self::Set(..) => "update_quantity",
            Self::Clear => "clear",
        }
    }
}

/// Owner of the one in-memory cart snapshot.
///
/// Cheaply cloneable via `Arc`; clones share state.
pub struct Reconciler<G: CartGateway> {
    inner: Arc<ReconcilerInner<G>>,
}

impl<G: CartGateway> Clone for Reconciler<G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ReconcilerInner<G> {
    gateway: Arc<G>,
    store: CartStore,
    session: SessionGate,
    state: Mutex<CartState>,
    sync_in_flight: AtomicBool,
    snapshots: watch::Sender<CartSnapshot>,
}

struct CartState {
    phase: SyncPhase,
    snapshot: CartSnapshot,
}

impl CartState {
    fn advance(&mut self, to: SyncPhase) -> bool {
        if self.phase.can_transition(to) {
            self.phase = to;
            true
        } else {
            warn!(from = ?self.phase, to = ?to, "Ignoring invalid cart phase transition");
            false
        }
    }
}

/// Holds the pending-sync flag; clears it on drop, including on early return.
struct SyncGuard<'a>(&'a AtomicBool);

impl<'a> SyncGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<G: CartGateway> Reconciler<G> {
    /// Create a reconciler holding the stored cart.
    #[must_use]
    pub fn new(gateway: G, store: CartStore, session: SessionGate) -> Self {
        let snapshot = store.load();
        let (snapshots, _) = watch::channel(snapshot.clone());

        Self {
            inner: Arc::new(ReconcilerInner {
                gateway: Arc::new(gateway),
                store,
                session,
                state: Mutex::new(CartState {
                    phase: SyncPhase::Anonymous,
                    snapshot,
                }),
                sync_in_flight: AtomicBool::new(false),
                snapshots,
            }),
        }
    }

    /// Bring the cart up for this session.
    ///
    /// Without a token the stored cart is loaded and the phase stays
    /// Anonymous; with one, login reconciliation runs.
    pub async fn start(&self) -> LoginSync {
        if self.inner.session.is_authenticated() {
            return self.login_sync().await;
        }

        let local = self.inner.store.load();
        let mut state = self.lock_state();
        state.advance(SyncPhase::Anonymous);
        self.show(&mut state, local);
        LoginSync::Anonymous
    }

    /// Merge the stored cart into the server cart after sign-in.
    ///
    /// A call made while another is running returns
    /// [`LoginSync::AlreadyRunning`] without touching anything.
    #[instrument(skip(self))]
    pub async fn login_sync(&self) -> LoginSync {
        if !self.inner.session.is_authenticated() {
            return LoginSync::Anonymous;
        }
        let Some(_guard) = SyncGuard::acquire(&self.inner.sync_in_flight) else {
            debug!("Login sync already running");
            return LoginSync::AlreadyRunning;
        };

        if !self.lock_state().advance(SyncPhase::Syncing) {
            return LoginSync::AlreadyRunning;
        }
        let local = self.inner.store.load();

        match self.reconcile(&local).await {
            Ok(outcome) => {
                info!(?outcome, "Cart reconciliation finished");
                outcome
            }
            Err(error) if error.is_unauthorized() => {
                error.report();
                self.force_logout();
                LoginSync::SignedOut { error }
            }
            Err(error) => {
                error.report();
                let mut state = self.lock_state();
                if state.advance(SyncPhase::Stable) {
                    self.show(&mut state, local);
                }
                LoginSync::FellBack { error }
            }
        }
    }

    async fn reconcile(&self, local: &CartSnapshot) -> Result<LoginSync, CartError> {
        let server = self.inner.gateway.fetch_cart().await?;

        if local.is_empty() {
            if !self.adopt(server) {
                return Ok(LoginSync::Interrupted);
            }
            return Ok(LoginSync::AdoptedServer);
        }

        let (pushed, failed) = self.push_lines(local).await?;
        let merged = self.inner.gateway.fetch_cart().await?;
        if !self.adopt(merged) {
            return Ok(LoginSync::Interrupted);
        }
        // Best effort; the warning is logged by the store.
        let _ = self.inner.store.clear();
        Ok(LoginSync::Merged { pushed, failed })
    }

    /// Send every local line as an independent `set_quantity`.
    ///
    /// Individual failures are counted, not propagated, unless the server
    /// refused the token.
    async fn push_lines(&self, local: &CartSnapshot) -> Result<(usize, usize), CartError> {
        let mut batch = JoinSet::new();
        for line in local.lines() {
            let gateway = Arc::clone(&self.inner.gateway);
            let product_id = line.product_id.clone();
            let size = line.size.clone();
            let quantity = line.quantity;
            batch.spawn(async move { gateway.set_quantity(&product_id, &size, quantity).await });
        }

        let mut pushed = 0;
        let mut failed = 0;
        let mut rejected: Option<ApiError> = None;
        while let Some(joined) = batch.join_next().await {
            match joined {
                Ok(Ok(())) => pushed += 1,
                Ok(Err(error)) => {
                    warn!(%error, "Failed to push cart line");
                    failed += 1;
                    if error.is_unauthorized() {
                        rejected = Some(error);
                    }
                }
                Err(error) => {
                    warn!(%error, "Cart line push task failed");
                    failed += 1;
                }
            }
        }

        match rejected {
            Some(error) => Err(CartError::from(error)),
            None => Ok((pushed, failed)),
        }
    }

    /// Adopt a server snapshot unless the session ended meanwhile.
    fn adopt(&self, server: CartSnapshot) -> bool {
        let mut state = self.lock_state();
        if !state.advance(SyncPhase::Stable) {
            return false;
        }
        self.show(&mut state, server);
        true
    }

    /// Increment `(product_id, size)` by one.
    pub async fn add_item(&self, product_id: &ProductId, size: &SizeLabel) -> MutationOutcome {
        self.mutate(RemoteOp::Add(product_id, size), |cart| {
            cart.add_one(product_id, size);
        })
        .await
    }

    /// Set `(product_id, size)` to `quantity`; zero removes the line.
    pub async fn update_quantity(
        &self,
        product_id: &ProductId,
        size: &SizeLabel,
        quantity: u32,
    ) -> MutationOutcome {
        self.mutate(RemoteOp::Set(product_id, size, quantity), |cart| {
            cart.set_quantity(product_id, size, quantity);
        })
        .await
    }

    /// Empty the cart.
    pub async fn clear(&self) -> MutationOutcome {
        self.mutate(RemoteOp::Clear, CartSnapshot::clear).await
    }

    async fn mutate(
        &self,
        op: RemoteOp<'_>,
        apply: impl FnOnce(&mut CartSnapshot),
    ) -> MutationOutcome {
        let (previous, snapshot, storage_warning) = {
            let mut state = self.lock_state();
            let previous = state.snapshot.clone();
            let mut next = previous.clone();
            apply(&mut next);
            let storage_warning = self
                .replace(&mut state, next.clone())
                .err()
                .map(CartError::from);
            (previous, next, storage_warning)
        };
        let operation = op.name();
        add_breadcrumb("cart", operation, &[]);

        if !self.inner.session.is_authenticated() {
            return MutationOutcome::Applied {
                snapshot,
                storage_warning,
            };
        }

        let gateway = &self.inner.gateway;
        let result = match op {
            RemoteOp::Add(product_id, size) => gateway.add_item(product_id, size).await,
            RemoteOp::Set(product_id, size, quantity) => {
                gateway.set_quantity(product_id, size, quantity).await
            }
            RemoteOp::Clear => gateway.clear().await,
        };

        match result {
            Ok(()) => MutationOutcome::Applied {
                snapshot,
                storage_warning,
            },
            Err(error) => {
                let error = CartError::from(error);
                let storage_warning = {
                    let mut state = self.lock_state();
                    self.replace(&mut state, previous.clone())
                        .err()
                        .map(CartError::from)
                };
                if let Some(warning) = &storage_warning {
                    warn!(
                        operation,
                        error = %warning,
                        "Cart reverted in memory but the stored cart still holds the change"
                    );
                }
                if error.is_unauthorized() {
                    self.force_logout();
                }
                error.report();
                MutationOutcome::RolledBack {
                    snapshot: previous,
                    error,
                    storage_warning,
                }
            }
        }
    }

    /// Drop the local cart after the backend took ownership of it (order placed).
    ///
    /// The server cart is not touched.
    pub fn discard_local(&self) {
        let mut state = self.lock_state();
        let _ = self.replace(&mut state, CartSnapshot::new());
    }

    /// End the session. The local cart is kept.
    pub fn force_logout(&self) {
        self.inner.session.force_logout();
        self.lock_state().advance(SyncPhase::Anonymous);
    }

    /// Current cart.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.lock_state().snapshot.clone()
    }

    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.lock_state().phase
    }

    /// Watch cart changes, optimistic ones included.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.snapshots.subscribe()
    }

    #[must_use]
    pub fn item_count(&self) -> u64 {
        pricing::item_count(&self.lock_state().snapshot)
    }

    /// Subtotal of listed products, without delivery.
    #[must_use]
    pub fn cart_amount(&self, catalog: &Catalog) -> Decimal {
        pricing::cart_amount(&self.lock_state().snapshot, catalog)
    }

    /// Set memory and notify, without touching durable storage.
    fn show(&self, state: &mut CartState, snapshot: CartSnapshot) {
        state.snapshot = snapshot.clone();
        self.inner.snapshots.send_replace(snapshot);
    }

    /// Set memory, persist and notify, under the state lock.
    fn replace(&self, state: &mut CartState, snapshot: CartSnapshot) -> Result<(), StorageError> {
        let persisted = self.inner.store.save(&snapshot);
        self.show(state, snapshot);
        persisted
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CartState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::storage::{CART_KEY, KeyValueStore, MemoryStore, TOKEN_KEY};
    use crate::testing::{Call, Failure, FakeGateway};

    struct Harness {
        cart: Reconciler<FakeGateway>,
        gateway: FakeGateway,
        backend: Arc<MemoryStore>,
        session: SessionGate,
    }

    fn harness(local: Option<&str>, signed_in: bool, gateway: FakeGateway) -> Harness {
        harness_with(Arc::new(MemoryStore::new()), local, signed_in, gateway)
    }

    fn harness_with(
        backend: Arc<MemoryStore>,
        local: Option<&str>,
        signed_in: bool,
        gateway: FakeGateway,
    ) -> Harness {
        if let Some(raw) = local {
            backend.set(CART_KEY, raw).unwrap();
        }
        if signed_in {
            backend.set(TOKEN_KEY, "tok").unwrap();
        }
        let session = SessionGate::restore(backend.clone());
        let cart = Reconciler::new(
            gateway.clone(),
            CartStore::new(backend.clone()),
            session.clone(),
        );
        Harness {
            cart,
            gateway,
            backend,
            session,
        }
    }

    /// Accepts `budget` writes, then fails every further one.
    struct WriteLimitedStore {
        inner: MemoryStore,
        budget: AtomicUsize,
    }

    impl WriteLimitedStore {
        fn new(budget: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                budget: AtomicUsize::new(budget),
            }
        }
    }

    impl KeyValueStore for WriteLimitedStore {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            let allowed = self
                .budget
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                .is_ok();
            if !allowed {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed: u64::try_from(value.len()).unwrap_or(u64::MAX),
                    quota: 0,
                });
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    fn cart(raw: &str) -> CartSnapshot {
        CartSnapshot::from_json_str(raw).unwrap()
    }

    fn id(s: &str) -> ProductId {
        ProductId::parse(s).unwrap()
    }

    fn size(s: &str) -> SizeLabel {
        SizeLabel::parse(s).unwrap()
    }

    fn stored(backend: &MemoryStore) -> Option<CartSnapshot> {
        backend
            .get(CART_KEY)
            .unwrap()
            .map(|raw| CartSnapshot::from_json_str(&raw).unwrap())
    }

    #[test]
    fn test_phase_transitions() {
        use super::SyncPhase::{Anonymous, Stable, Syncing};

        assert!(Anonymous.can_transition(Syncing));
        assert!(Syncing.can_transition(Stable));
        assert!(Syncing.can_transition(Anonymous));
        assert!(Stable.can_transition(Anonymous));
        assert!(Stable.can_transition(Syncing));
        assert!(!Anonymous.can_transition(Stable));
        assert!(!Syncing.can_transition(Syncing));
    }

    #[tokio::test]
    async fn test_start_without_token_loads_local() {
        let h = harness(Some(r#"{"P1":{"M":2}}"#), false, FakeGateway::default());

        assert!(matches!(h.cart.start().await, LoginSync::Anonymous));
        assert_eq!(h.cart.phase(), SyncPhase::Anonymous);
        assert_eq!(h.cart.snapshot(), cart(r#"{"P1":{"M":2}}"#));
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_add_makes_no_network_call() {
        let h = harness(None, false, FakeGateway::default());

        let outcome = h.cart.add_item(&id("P1"), &size("M")).await;

        assert!(outcome.is_applied());
        assert_eq!(outcome.snapshot(), &cart(r#"{"P1":{"M":1}}"#));
        assert_eq!(stored(&h.backend), Some(cart(r#"{"P1":{"M":1}}"#)));
        assert!(h.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_authenticated_add_pushes_to_server() {
        let h = harness(None, true, FakeGateway::default());
        h.cart.start().await;

        let outcome = h.cart.add_item(&id("P1"), &size("M")).await;

        assert!(outcome.is_applied());
        assert_eq!(
            h.gateway.calls().last(),
            Some(&Call::Add("P1".into(), "M".into()))
        );
        assert_eq!(h.gateway.server(), cart(r#"{"P1":{"M":1}}"#));
    }

    #[tokio::test]
    async fn test_failed_add_rolls_back_memory_and_storage() {
        let h = harness(Some(r#"{"A":{"M":1}}"#), true, FakeGateway::default());
        h.cart.start().await;
        h.backend.set(CART_KEY, r#"{"A":{"M":1}}"#).unwrap();
        h.gateway.fail_next(Failure::Network);

        let outcome = h.cart.add_item(&id("A"), &size("M")).await;

        assert!(matches!(
            outcome.error(),
            Some(CartError::Network(ApiError::Status { status: 500, .. }))
        ));
        assert_eq!(h.cart.snapshot().quantity("A", "M"), 1);
        assert_eq!(stored(&h.backend), Some(cart(r#"{"A":{"M":1}}"#)));
        assert!(h.session.is_authenticated());
    }

    #[tokio::test]
    async fn test_rollback_restores_only_the_failed_mutation() {
        let h = harness(None, true, FakeGateway::default());
        h.gateway.succeed_next();
        h.gateway.fail_next(Failure::Network);

        assert!(h.cart.add_item(&id("A"), &size("M")).await.is_applied());
        let outcome = h.cart.add_item(&id("A"), &size("M")).await;

        assert!(!outcome.is_applied());
        assert_eq!(outcome.snapshot(), &cart(r#"{"A":{"M":1}}"#));
        assert_eq!(stored(&h.backend), Some(cart(r#"{"A":{"M":1}}"#)));
        assert_eq!(h.gateway.server(), cart(r#"{"A":{"M":1}}"#));
    }

    #[tokio::test]
    async fn test_failed_revert_write_is_reported() {
        let backend = Arc::new(WriteLimitedStore::new(1));
        backend.inner.set(TOKEN_KEY, "tok").unwrap();
        let session = SessionGate::restore(backend.clone());
        let gateway = FakeGateway::default();
        let cart_handle = Reconciler::new(gateway.clone(), CartStore::new(backend.clone()), session);
        gateway.fail_next(Failure::Network);

        let outcome = cart_handle.add_item(&id("A"), &size("M")).await;

        match outcome {
            MutationOutcome::RolledBack {
                snapshot,
                error,
                storage_warning,
            } => {
                assert!(snapshot.is_empty());
                assert!(matches!(error, CartError::Network(_)));
                assert!(matches!(
                    storage_warning,
                    Some(CartError::StorageQuotaExceeded(_))
                ));
            }
            MutationOutcome::Applied { .. } => panic!("failed call must roll back"),
        }
        assert!(cart_handle.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_unauthorized_forces_logout_and_keeps_cart() {
        let h = harness(None, true, FakeGateway::with_server(r#"{"A":{"M":1}}"#));
        h.cart.start().await;
        h.gateway.fail_next(Failure::Unauthorized);

        let outcome = h.cart.add_item(&id("B"), &size("S")).await;

        assert!(outcome.error().unwrap().is_unauthorized());
        assert!(!h.session.is_authenticated());
        assert_eq!(h.backend.get(TOKEN_KEY).unwrap(), None);
        assert_eq!(h.cart.phase(), SyncPhase::Anonymous);
        assert_eq!(h.cart.snapshot(), cart(r#"{"A":{"M":1}}"#));
        assert_eq!(stored(&h.backend), Some(cart(r#"{"A":{"M":1}}"#)));
    }

    #[tokio::test]
    async fn test_update_to_zero_removes_line() {
        let h = harness(None, true, FakeGateway::with_server(r#"{"A":{"M":2,"L":1}}"#));
        h.cart.start().await;

        let outcome = h.cart.update_quantity(&id("A"), &size("M"), 0).await;

        assert_eq!(outcome.snapshot(), &cart(r#"{"A":{"L":1}}"#));
        assert_eq!(
            h.gateway.calls().last(),
            Some(&Call::Set("A".into(), "M".into(), 0))
        );
    }

    #[tokio::test]
    async fn test_clear_rolls_back_on_failure() {
        let h = harness(None, true, FakeGateway::with_server(r#"{"A":{"M":1}}"#));
        h.cart.start().await;
        h.gateway.fail_all(Failure::Network);

        let outcome = h.cart.clear().await;

        assert!(!outcome.is_applied());
        assert_eq!(h.cart.snapshot(), cart(r#"{"A":{"M":1}}"#));
    }

    #[tokio::test]
    async fn test_storage_quota_is_a_warning() {
        let h = harness_with(
            Arc::new(MemoryStore::with_quota(8)),
            None,
            false,
            FakeGateway::default(),
        );

        let outcome = h.cart.add_item(&id("P1"), &size("M")).await;

        match outcome {
            MutationOutcome::Applied {
                snapshot,
                storage_warning,
            } => {
                assert_eq!(snapshot.quantity("P1", "M"), 1);
                let warning = storage_warning.unwrap();
                assert!(matches!(
                    warning,
                    CartError::StorageQuotaExceeded(ref e) if e.is_quota_exceeded()
                ));
                assert_eq!(warning.notice(), "Your cart could not be saved on this device");
            }
            MutationOutcome::RolledBack { .. } => panic!("quota must not roll back"),
        }
        assert_eq!(h.cart.snapshot().quantity("P1", "M"), 1);
    }

    #[tokio::test]
    async fn test_login_pushes_local_lines_and_clears_store() {
        let h = harness(Some(r#"{"P2":{"L":1}}"#), true, FakeGateway::default());

        let result = h.cart.start().await;

        assert!(matches!(result, LoginSync::Merged { pushed: 1, failed: 0 }));
        assert_eq!(
            h.gateway.calls(),
            [
                Call::Fetch,
                Call::Set("P2".into(), "L".into(), 1),
                Call::Fetch
            ]
        );
        assert_eq!(h.cart.snapshot(), cart(r#"{"P2":{"L":1}}"#));
        assert_eq!(h.cart.phase(), SyncPhase::Stable);
        assert_eq!(h.backend.get(CART_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_local_quantity_overwrites_remote() {
        let h = harness(
            Some(r#"{"A":{"M":2}}"#),
            true,
            FakeGateway::with_server(r#"{"A":{"M":5}}"#),
        );

        h.cart.login_sync().await;

        assert_eq!(h.cart.snapshot().quantity("A", "M"), 2);
    }

    #[tokio::test]
    async fn test_remote_only_lines_are_preserved() {
        let h = harness(
            Some(r#"{"A":{"M":1}}"#),
            true,
            FakeGateway::with_server(r#"{"B":{"S":3}}"#),
        );

        h.cart.login_sync().await;

        assert_eq!(h.cart.snapshot(), cart(r#"{"A":{"M":1},"B":{"S":3}}"#));
    }

    #[tokio::test]
    async fn test_empty_local_adopts_server() {
        let h = harness(None, true, FakeGateway::with_server(r#"{"X":{"S":3}}"#));

        let result = h.cart.login_sync().await;

        assert!(matches!(result, LoginSync::AdoptedServer));
        assert_eq!(h.gateway.calls(), [Call::Fetch]);
        assert_eq!(h.cart.snapshot(), cart(r#"{"X":{"S":3}}"#));
    }

    #[tokio::test]
    async fn test_batch_failures_do_not_abort() {
        let h = harness(
            Some(r#"{"A":{"M":1},"B":{"M":2}}"#),
            true,
            FakeGateway::default(),
        );
        h.gateway.fail_sets_for("A");

        let result = h.cart.login_sync().await;

        assert!(matches!(result, LoginSync::Merged { pushed: 1, failed: 1 }));
        assert!(h.gateway.calls().contains(&Call::Set("A".into(), "M".into(), 1)));
        assert_eq!(h.cart.snapshot(), cart(r#"{"B":{"M":2}}"#));
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_local() {
        let h = harness(Some(r#"{"A":{"M":1}}"#), true, FakeGateway::default());
        h.gateway.fail_next(Failure::Network);

        let result = h.cart.login_sync().await;

        assert!(matches!(result, LoginSync::FellBack { .. }));
        assert_eq!(h.cart.phase(), SyncPhase::Stable);
        assert_eq!(h.cart.snapshot(), cart(r#"{"A":{"M":1}}"#));
        assert_eq!(stored(&h.backend), Some(cart(r#"{"A":{"M":1}}"#)));
    }

    #[tokio::test]
    async fn test_login_unauthorized_signs_out() {
        let h = harness(Some(r#"{"A":{"M":1}}"#), true, FakeGateway::default());
        h.gateway.fail_next(Failure::Unauthorized);

        let result = h.cart.login_sync().await;

        assert!(matches!(result, LoginSync::SignedOut { .. }));
        assert!(!h.session.is_authenticated());
        assert_eq!(h.cart.phase(), SyncPhase::Anonymous);
        assert_eq!(h.cart.snapshot(), cart(r#"{"A":{"M":1}}"#));
    }

    #[tokio::test]
    async fn test_logout_during_merge_is_not_reported_as_merged() {
        let gateway = FakeGateway::default().with_latency(Duration::from_millis(30));
        let h = harness(Some(r#"{"A":{"M":1}}"#), true, gateway);

        let cart_handle = h.cart.clone();
        let sync = tokio::spawn(async move { cart_handle.login_sync().await });
        tokio::time::sleep(Duration::from_millis(45)).await;
        h.cart.force_logout();

        assert!(matches!(sync.await.unwrap(), LoginSync::Interrupted));
        assert_eq!(h.cart.phase(), SyncPhase::Anonymous);
        assert_eq!(h.cart.snapshot(), cart(r#"{"A":{"M":1}}"#));
        assert_eq!(stored(&h.backend), Some(cart(r#"{"A":{"M":1}}"#)));
    }

    #[tokio::test]
    async fn test_concurrent_login_sync_is_noop() {
        let gateway = FakeGateway::default().with_latency(Duration::from_millis(20));
        let h = harness(Some(r#"{"A":{"M":1}}"#), true, gateway);

        let (first, second) = tokio::join!(h.cart.login_sync(), h.cart.login_sync());

        assert!(matches!(first, LoginSync::Merged { .. }));
        assert!(matches!(second, LoginSync::AlreadyRunning));
        assert_eq!(
            h.gateway
                .calls()
                .iter()
                .filter(|c| matches!(c, Call::Set(..)))
                .count(),
            1
        );

        // Flag is released afterwards.
        assert!(!matches!(h.cart.login_sync().await, LoginSync::AlreadyRunning));
    }

    #[tokio::test]
    async fn test_subscribers_see_optimistic_value() {
        let gateway = FakeGateway::default().with_latency(Duration::from_millis(20));
        let h = harness(None, true, gateway);
        let mut rx = h.cart.subscribe();

        let cart_handle = h.cart.clone();
        let task = tokio::spawn(async move { cart_handle.add_item(&id("P1"), &size("M")).await });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().quantity("P1", "M"), 1);
        assert!(task.await.unwrap().is_applied());
    }

    #[tokio::test]
    async fn test_discard_local_clears_memory_and_storage() {
        let h = harness(Some(r#"{"A":{"M":1}}"#), false, FakeGateway::default());

        h.cart.discard_local();

        assert!(h.cart.snapshot().is_empty());
        assert_eq!(stored(&h.backend), Some(CartSnapshot::new()));
        assert!(h.gateway.calls().is_empty());
    }
}
