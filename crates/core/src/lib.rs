//! Bazaar Core - Shared types library.
//!
//! This crate provides the types shared by every Bazaar component:
//! - `client` - Cart reconciliation, remote gateways and the shop context
//! - `cli` - Command-line consumer of the client
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! storage access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for product ids, sizes, contact details and prices
//! - [`cart`] - The cart snapshot and its mutation rules
//! - [`catalog`] - Read-only product catalog
//! - [`pricing`] - Derived values (item count, cart amount)
//! - [`order`] - Order drafts built from a cart at checkout

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod order;
pub mod pricing;
pub mod types;

pub use cart::{CartSnapshot, SnapshotError};
pub use catalog::{Catalog, CatalogEntry};
pub use order::{DeliveryAddress, OrderDraft, OrderDraftError, OrderLine};
pub use types::*;
