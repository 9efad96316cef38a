//! Cart snapshot: product id → size → quantity.
//!
//! # Invariants
//!
//! - Every stored quantity is strictly positive.
//! - A product with no remaining sizes is removed entirely.
//!
//! Both hold for every value reachable through the public API, including
//! snapshots decoded from JSON: zero, negative and non-integer quantities
//! are dropped on the way in.
//!
//! # Wire format
//!
//! ```json
//! { "P1": { "M": 2, "L": 1 }, "P2": { "32": 1 } }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{ProductId, SizeLabel};

/// Errors decoding a snapshot from untrusted JSON.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The input was not valid JSON.
    #[error("malformed cart JSON: {0}")]
    Malformed(String),
    /// The top-level value was not a JSON object (`null`, array, number, ...).
    #[error("cart must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Sizes and quantities held for a single product.
pub type SizeQuantities = BTreeMap<SizeLabel, u32>;

/// One (product, size, quantity) line of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine<'a> {
    pub product_id: &'a ProductId,
    pub size: &'a SizeLabel,
    pub quantity: u32,
}

/// A point-in-time view of a cart.
///
/// Cheap to clone; readers always receive their own copy.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct CartSnapshot(BTreeMap<ProductId, SizeQuantities>);

impl CartSnapshot {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns `true` if the cart holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Quantity held for `(product_id, size)`, zero if absent.
    #[must_use]
    pub fn quantity(&self, product_id: &str, size: &str) -> u32 {
        self.0
            .get(product_id)
            .and_then(|sizes| sizes.get(size))
            .copied()
            .unwrap_or(0)
    }

    /// Sizes held for a product.
    #[must_use]
    pub fn sizes(&self, product_id: &str) -> Option<&SizeQuantities> {
        self.0.get(product_id)
    }

    /// Returns `true` if the product has at least one size in the cart.
    #[must_use]
    pub fn contains_product(&self, product_id: &str) -> bool {
        self.0.contains_key(product_id)
    }

    /// Number of distinct products in the cart.
    #[must_use]
    pub fn product_count(&self) -> usize {
        self.0.len()
    }

    /// Iterate over every line in product then size order.
    pub fn lines(&self) -> impl Iterator<Item = CartLine<'_>> {
        self.0.iter().flat_map(|(product_id, sizes)| {
            sizes.iter().map(move |(size, &quantity)| CartLine {
                product_id,
                size,
                quantity,
            })
        })
    }

    /// Increment `(product_id, size)` by one.
    pub fn add_one(&mut self, product_id: &ProductId, size: &SizeLabel) {
        let sizes = self.0.entry(product_id.clone()).or_default();
        let quantity = sizes.entry(size.clone()).or_insert(0);
        *quantity = quantity.saturating_add(1);
    }

    /// Set `(product_id, size)` to an absolute quantity.
    ///
    /// A quantity of zero removes the line, and the product with it when no
    /// other sizes remain. Setting the same quantity twice is a no-op.
    pub fn set_quantity(&mut self, product_id: &ProductId, size: &SizeLabel, quantity: u32) {
        if quantity == 0 {
            if let Some(sizes) = self.0.get_mut(product_id.as_str()) {
                sizes.remove(size.as_str());
                if sizes.is_empty() {
                    self.0.remove(product_id.as_str());
                }
            }
            return;
        }

        self.0
            .entry(product_id.clone())
            .or_default()
            .insert(size.clone(), quantity);
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Decode a snapshot from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] if the input is not JSON or not an object.
    pub fn from_json_str(raw: &str) -> Result<Self, SnapshotError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
        Self::from_json_value(value)
    }

    /// Decode a snapshot from a JSON value.
    ///
    /// The top level must be an object. Below it decoding is lenient: entries
    /// whose sizes are not an object, whose keys are blank, or whose quantities
    /// are not positive integers are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotAnObject`] if `value` is not a JSON object.
    pub fn from_json_value(value: Value) -> Result<Self, SnapshotError> {
        let Value::Object(products) = value else {
            return Err(SnapshotError::NotAnObject(json_kind(&value)));
        };

        let mut snapshot = Self::new();
        for (raw_id, raw_sizes) in products {
            let Ok(product_id) = ProductId::parse(&raw_id) else {
                continue;
            };
            let Value::Object(sizes) = raw_sizes else {
                continue;
            };
            for (raw_size, raw_quantity) in sizes {
                let Ok(size) = SizeLabel::parse(&raw_size) else {
                    continue;
                };
                let quantity = raw_quantity
                    .as_u64()
                    .and_then(|q| u32::try_from(q).ok())
                    .unwrap_or(0);
                snapshot.set_quantity(&product_id, &size, quantity);
            }
        }
        Ok(snapshot)
    }

    /// Encode the snapshot as a JSON string.
    #[must_use]
    pub fn to_json_string(&self) -> String {
        // A map of strings to maps of strings to integers always serializes.
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

impl<'de> Deserialize<'de> for CartSnapshot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_json_value(value).map_err(serde::de::Error::custom)
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
