//! Order drafts built from a cart at checkout.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cart::CartSnapshot;
use crate::catalog::{Catalog, CatalogEntry};
use crate::pricing;
use crate::types::{Email, PhoneNumber, SizeLabel};

/// Reasons a cart cannot become an order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderDraftError {
    /// No cart line matched a listed product.
    #[error("your cart is empty")]
    EmptyCart,
    /// Items and delivery fee add up to nothing.
    #[error("order total is zero")]
    ZeroTotal,
}

/// Where the order is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zipcode: String,
    pub country: String,
    pub phone: PhoneNumber,
}

/// A product snapshot with the chosen size and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLine {
    #[serde(flatten)]
    pub product: CatalogEntry,
    pub size: SizeLabel,
    pub quantity: u32,
}

/// Everything the backend needs to place an order, minus the user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDraft {
    pub address: DeliveryAddress,
    pub items: Vec<OrderLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl OrderDraft {
    /// Build a draft from the cart.
    ///
    /// One line per `(product, size)` whose product is listed in `catalog`;
    /// unknown products are left out. `amount` is the cart amount plus
    /// `delivery_fee`.
    ///
    /// # Errors
    ///
    /// Returns [`OrderDraftError::EmptyCart`] if no line survives, or
    /// [`OrderDraftError::ZeroTotal`] if the amount is zero.
    pub fn build(
        snapshot: &CartSnapshot,
        catalog: &Catalog,
        address: DeliveryAddress,
        delivery_fee: Decimal,
    ) -> Result<Self, OrderDraftError> {
        let items: Vec<OrderLine> = snapshot
            .lines()
            .filter_map(|line| {
                catalog.get(line.product_id.as_str()).map(|product| OrderLine {
                    product: product.clone(),
                    size: line.size.clone(),
                    quantity: line.quantity,
                })
            })
            .collect();

        if items.is_empty() {
            return Err(OrderDraftError::EmptyCart);
        }

        let amount = pricing::order_total(snapshot, catalog, delivery_fee);
        if amount.is_zero() {
            return Err(OrderDraftError::ZeroTotal);
        }

        Ok(Self {
            address,
            items,
            amount,
        })
    }
}
