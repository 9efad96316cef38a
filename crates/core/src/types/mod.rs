//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod email;
pub mod id;
pub mod payment;
pub mod price;

pub use contact::{ContactError, OtpCode, PhoneNumber};
pub use email::{Email, EmailError};
pub use id::*;
pub use payment::PaymentMethod;
pub use price::{CurrencyCode, Price, PriceError};
