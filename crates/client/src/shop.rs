//! The per-session shop context.
//!
//! [`ShopContext`] wires storage, session, cart reconciliation and the API
//! clients together. Construct one when a session starts and drop it at
//! logout; nothing in it is global.

use std::sync::Arc;

use bazaar_core::{
    Catalog, CurrencyCode, DeliveryAddress, Email, OrderDraft, OtpCode, PaymentMethod,
    PhoneNumber, pricing,
};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::api::{
    ApiClient, AuthClient, CatalogClient, CheckoutError, HttpCartGateway, OrderClient,
    PaymentInitiation,
};
use crate::config::ClientConfig;
use crate::error::{ShopError, clear_sentry_user, set_sentry_user};
use crate::reconciler::{LoginSync, Reconciler};
use crate::session::SessionGate;
use crate::storage::{CartStore, FileStore, KeyValueStore};

/// Cart figures for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    pub item_count: u64,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub currency: CurrencyCode,
}

/// Shared shop state for one session.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct ShopContext {
    inner: Arc<ShopContextInner>,
}

struct ShopContextInner {
    config: ClientConfig,
    session: SessionGate,
    cart: Reconciler<HttpCartGateway>,
    catalog: CatalogClient,
    auth: AuthClient,
    orders: OrderClient,
}

impl ShopContext {
    /// Create a context persisting to `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, ShopError> {
        let store =
            FileStore::new(config.data_dir.clone()).with_quota(config.storage_quota_bytes);
        Self::with_store(config, Arc::new(store))
    }

    /// Create a context over an explicit key/value backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_store(
        config: ClientConfig,
        backend: Arc<dyn KeyValueStore>,
    ) -> Result<Self, ShopError> {
        let api = ApiClient::new(&config)?;
        let session = SessionGate::restore(Arc::clone(&backend));
        let cart = Reconciler::new(
            HttpCartGateway::new(api.clone(), session.clone()),
            CartStore::new(backend),
            session.clone(),
        );

        Ok(Self {
            inner: Arc::new(ShopContextInner {
                catalog: CatalogClient::new(api.clone(), config.catalog_ttl),
                auth: AuthClient::new(api.clone()),
                orders: OrderClient::new(api),
                config,
                session,
                cart,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &SessionGate {
        &self.inner.session
    }

    #[must_use]
    pub fn cart(&self) -> &Reconciler<HttpCartGateway> {
        &self.inner.cart
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.inner.catalog
    }

    #[must_use]
    pub fn auth(&self) -> &AuthClient {
        &self.inner.auth
    }

    #[must_use]
    pub fn orders(&self) -> &OrderClient {
        &self.inner.orders
    }

    /// Load the cart, reconciling with the server if a session was restored.
    pub async fn start(&self) -> LoginSync {
        if let Some(user_id) = self.inner.session.token().and_then(|t| t.user_id()) {
            set_sentry_user(&user_id);
        }
        self.inner.cart.start().await
    }

    /// Verify an OTP, start the session and merge the local cart into it.
    ///
    /// # Errors
    ///
    /// Returns an error if verification fails. A failure to persist the
    /// token is logged and otherwise ignored.
    pub async fn sign_in_with_otp(
        &self,
        phone: &PhoneNumber,
        otp: &OtpCode,
        email: Option<&Email>,
    ) -> Result<LoginSync, ShopError> {
        let login = self.inner.auth.verify_otp(phone, otp, email).await?;
        if let Some(user_id) = login.token.user_id() {
            set_sentry_user(&user_id);
        }
        if let Err(error) = self.inner.session.sign_in(login.token) {
            warn!(%error, "Session will not survive a restart");
        }
        Ok(self.inner.cart.login_sync().await)
    }

    /// End the session. The local cart is kept for anonymous browsing.
    pub fn logout(&self) {
        self.inner.cart.force_logout();
        clear_sentry_user();
        info!("Logged out");
    }

    /// Totals for the current cart against `catalog`.
    #[must_use]
    pub fn cart_totals(&self, catalog: &Catalog) -> CartTotals {
        let snapshot = self.inner.cart.snapshot();
        let delivery_fee = self.inner.config.delivery_fee;

        CartTotals {
            item_count: pricing::item_count(&snapshot),
            subtotal: pricing::cart_amount(&snapshot, catalog),
            delivery_fee,
            total: pricing::order_total(&snapshot, catalog, delivery_fee),
            currency: self.inner.config.currency,
        }
    }

    /// Place an order for the current cart.
    ///
    /// Cash-on-delivery orders clear the local cart once placed. For the
    /// other methods the cart is kept until payment completes.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::NotSignedIn`] without a session, a draft
    /// error for an empty cart, or the API failure. A rejected token ends
    /// the session.
    pub async fn checkout(
        &self,
        address: DeliveryAddress,
        method: PaymentMethod,
    ) -> Result<PaymentInitiation, ShopError> {
        let token = self
            .inner
            .session
            .token()
            .ok_or(CheckoutError::NotSignedIn)?;
        let catalog = self.inner.catalog.products().await?;
        let draft = OrderDraft::build(
            &self.inner.cart.snapshot(),
            &catalog,
            address,
            self.inner.config.delivery_fee,
        )
        .map_err(CheckoutError::from)?;

        let initiation = match self.inner.orders.place(&draft, method, &token).await {
            Ok(initiation) => initiation,
            Err(CheckoutError::Api(error)) if error.is_unauthorized() => {
                self.logout();
                return Err(CheckoutError::Api(error).into());
            }
            Err(error) => return Err(error.into()),
        };

        if initiation == PaymentInitiation::Placed {
            self.inner.cart.discard_local();
        }
        Ok(initiation)
    }
}
