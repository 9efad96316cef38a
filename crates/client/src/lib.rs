//! Bazaar client library.
//!
//! The state layer between a storefront UI and the Bazaar backend: an owned
//! cart that is optimistically mutated, mirrored to durable local storage and
//! reconciled with the server cart whenever the user holds a session token.
//!
//! # Architecture
//!
//! - [`storage`] - Durable key/value store and the persisted cart snapshot
//! - [`api`] - `reqwest` clients for the cart, catalog, OTP login and order endpoints
//! - [`session`] - Session token ownership (sign-in, forced logout)
//! - [`reconciler`] - Cart reconciliation state machine
//! - [`shop`] - [`ShopContext`], the per-session object UIs hold on to
//!
//! # Example
//!
//! ```rust,ignore
//! use bazaar_client::{ClientConfig, ShopContext};
//!
//! let shop = ShopContext::new(ClientConfig::from_env()?)?;
//! shop.start().await;
//!
//! let outcome = shop.cart().add_item(&product_id, &size).await;
//! if let Some(error) = outcome.error() {
//!     show_toast(error.notice());
//! }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod error;
pub mod reconciler;
pub mod session;
pub mod shop;
pub mod storage;

#[cfg(test)]
mod testing;

pub use config::{ClientConfig, ConfigError};
pub use error::{CartError, ShopError};
pub use reconciler::{LoginSync, MutationOutcome, Reconciler, SyncPhase};
pub use session::{SessionGate, SessionStatus, SessionToken};
pub use shop::{CartTotals, ShopContext};
