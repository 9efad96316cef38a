//! Error taxonomy with Sentry integration.
//!
//! [`CartError`] is what a rolled-back cart mutation reports, and what a
//! failed durable write is surfaced as. Every variant has a user-safe
//! [`notice`](CartError::notice) for a toast; server-class failures are
//! captured to Sentry by [`CartError::report`]. Malformed stored carts are
//! repaired by [`CartStore`](crate::storage::CartStore) and never surface.

use bazaar_core::{ContactError, EmailError};
use thiserror::Error;

use crate::api::{ApiError, CatalogError, CheckoutError};
use crate::config::ConfigError;
use crate::storage::StorageError;

/// Why a cart operation did not stick.
#[derive(Debug, Error)]
pub enum CartError {
    /// Transport failure, non-2xx status or a rejected request.
    #[error("Network error: {0}")]
    Network(ApiError),

    /// No token, or the backend refused it. The session has been ended.
    #[error("Unauthorized: {0}")]
    Unauthorized(ApiError),

    /// The durable write failed. In-memory state is still correct.
    #[error("Storage error: {0}")]
    StorageQuotaExceeded(StorageError),
}

impl From<ApiError> for CartError {
    fn from(error: ApiError) -> Self {
        if error.is_unauthorized() {
            Self::Unauthorized(error)
        } else {
            Self::Network(error)
        }
    }
}

impl From<StorageError> for CartError {
    fn from(error: StorageError) -> Self {
        Self::StorageQuotaExceeded(error)
    }
}

impl CartError {
    /// Text safe to show the user.
    #[must_use]
    pub fn notice(&self) -> String {
        match self {
            Self::Network(ApiError::Rejected(message)) => message.clone(),
            Self::Network(ApiError::RateLimited(secs)) => {
                format!("Too many requests, try again in {secs} seconds")
            }
            Self::Network(_) => "Could not reach the store, your cart was not changed".to_string(),
            Self::Unauthorized(_) => "Your session has expired, please sign in again".to_string(),
            Self::StorageQuotaExceeded(_) => {
                "Your cart could not be saved on this device".to_string()
            }
        }
    }

    /// Returns `true` if the session was ended because of this error.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Log the error, and capture server-class failures to Sentry.
    pub fn report(&self) {
        match self {
            Self::Network(ApiError::Rejected(_) | ApiError::RateLimited(_)) => {
                tracing::warn!(error = %self, "Cart operation rejected");
            }
            Self::Network(_) => {
                let event_id = sentry::capture_error(self);
                tracing::error!(
                    error = %self,
                    sentry_event_id = %event_id,
                    "Cart operation failed"
                );
            }
            Self::Unauthorized(_) => tracing::info!(error = %self, "Session rejected"),
            Self::StorageQuotaExceeded(_) => {
                tracing::warn!(error = %self, "Local cart storage problem");
            }
        }
    }
}

/// Top-level error for [`ShopContext`](crate::ShopContext) operations.
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Invalid contact details: {0}")]
    Contact(#[from] ContactError),

    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ShopError {
    /// Text safe to show the user.
    #[must_use]
    pub fn notice(&self) -> String {
        match self {
            Self::Cart(error) => error.notice(),
            Self::Api(ApiError::Rejected(message))
            | Self::Checkout(CheckoutError::Api(ApiError::Rejected(message))) => message.clone(),
            Self::Api(error) | Self::Checkout(CheckoutError::Api(error))
                if error.is_unauthorized() =>
            {
                "Please sign in to continue".to_string()
            }
            Self::Api(_) | Self::Catalog(_) | Self::Checkout(CheckoutError::Api(_)) => {
                "Something went wrong, please try again".to_string()
            }
            Self::Config(_) | Self::Storage(_) => "The app is misconfigured".to_string(),
            Self::Checkout(error) => error.to_string(),
            Self::Contact(error) => error.to_string(),
            Self::Email(error) => error.to_string(),
        }
    }
}

/// Associate subsequent Sentry events with a signed-in user.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Stop associating Sentry events with a user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Record a cart action as a Sentry breadcrumb.
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}
