//! Read-only product catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId, SizeLabel};

/// A product as listed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(rename = "_id")]
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub sizes: Vec<SizeLabel>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sub_category: Option<String>,
    /// Image URLs, first one is the thumbnail.
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub bestseller: bool,
}

impl CatalogEntry {
    /// Returns `true` if the product is offered in `size`.
    ///
    /// Products that list no sizes accept any size.
    #[must_use]
    pub fn offers_size(&self, size: &str) -> bool {
        self.sizes.is_empty() || self.sizes.iter().any(|s| s.as_str() == size)
    }
}

/// An ordered product list with lookup by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<ProductId, usize>,
}

impl Catalog {
    /// Build a catalog, keeping list order. If an id repeats, the first entry wins.
    #[must_use]
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            index.entry(entry.id.clone()).or_insert(position);
        }
        Self { entries, index }
    }

    /// Look up a product by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.index.get(id).and_then(|&i| self.entries.get(i))
    }

    /// Products in list order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    /// Number of listed products (duplicates included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is listed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<CatalogEntry> for Catalog {
    fn from_iter<I: IntoIterator<Item = CatalogEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
