//! Derived cart values. Pure functions, no I/O.

use rust_decimal::Decimal;

use crate::cart::CartSnapshot;
use crate::catalog::Catalog;

/// Total number of units in the cart, summed across products and sizes.
#[must_use]
pub fn item_count(snapshot: &CartSnapshot) -> u64 {
    snapshot
        .lines()
        .filter(|line| line.quantity > 0)
        .map(|line| u64::from(line.quantity))
        .sum()
}

/// `price × quantity`, saturating at [`Decimal::MAX`].
///
/// Prices are non-negative, so the only overflow is upwards.
#[must_use]
pub fn line_amount(price: Decimal, quantity: u32) -> Decimal {
    price
        .checked_mul(Decimal::from(quantity))
        .unwrap_or(Decimal::MAX)
}

/// Sum of `price × quantity` over lines whose product is in `catalog`.
///
/// Lines for unknown products are skipped. The delivery fee is not
/// included; see [`order_total`]. Saturates at [`Decimal::MAX`].
#[must_use]
pub fn cart_amount(snapshot: &CartSnapshot, catalog: &Catalog) -> Decimal {
    snapshot
        .lines()
        .filter(|line| line.quantity > 0)
        .filter_map(|line| {
            catalog
                .get(line.product_id.as_str())
                .map(|entry| line_amount(entry.price.amount(), line.quantity))
        })
        .fold(Decimal::ZERO, saturating_add)
}

/// Cart amount plus delivery fee.
#[must_use]
pub fn order_total(snapshot: &CartSnapshot, catalog: &Catalog, delivery_fee: Decimal) -> Decimal {
    saturating_add(cart_amount(snapshot, catalog), delivery_fee)
}

fn saturating_add(total: Decimal, amount: Decimal) -> Decimal {
    total.checked_add(amount).unwrap_or(Decimal::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::CatalogEntry;

    fn catalog() -> Catalog {
        let entries: Vec<CatalogEntry> = serde_json::from_str(
            r#"[
                {"_id": "A", "name": "Tee", "price": 250},
                {"_id": "B", "name": "Jeans", "price": "999.50"}
            ]"#,
        )
        .unwrap();
        Catalog::new(entries)
    }

    #[test]
    fn test_item_count() {
        let cart = CartSnapshot::from_json_str(r#"{"A":{"M":2,"L":1},"B":{"32":3}}"#).unwrap();
        assert_eq!(item_count(&cart), 6);
        assert_eq!(item_count(&CartSnapshot::new()), 0);
    }

    #[test]
    fn test_item_count_ignores_dropped_zero_entries() {
        let cart = CartSnapshot::from_json_str(r#"{"A":{"M":0,"L":-4,"S":2}}"#).unwrap();
        assert_eq!(item_count(&cart), 2);
    }

    #[test]
    fn test_cart_amount_skips_unknown_products() {
        let cart =
            CartSnapshot::from_json_str(r#"{"A":{"M":2},"B":{"32":1},"GONE":{"M":5}}"#).unwrap();
        assert_eq!(cart_amount(&cart, &catalog()), Decimal::new(149_950, 2));
    }

    #[test]
    fn test_order_total_adds_fee_once() {
        let cart = CartSnapshot::from_json_str(r#"{"A":{"M":1}}"#).unwrap();
        assert_eq!(
            order_total(&cart, &catalog(), Decimal::ONE),
            Decimal::new(251, 0)
        );
        assert_eq!(
            order_total(&CartSnapshot::new(), &catalog(), Decimal::ONE),
            Decimal::ONE
        );
    }

    #[test]
    fn test_huge_prices_saturate_instead_of_overflowing() {
        let entries: Vec<CatalogEntry> = serde_json::from_str(
            r#"[
                {"_id": "A", "name": "Yacht", "price": "50000000000000000000000000000"},
                {"_id": "B", "name": "Tee", "price": 250}
            ]"#,
        )
        .unwrap();
        let catalog = Catalog::new(entries);
        let cart = CartSnapshot::from_json_str(r#"{"A":{"M":2},"B":{"S":1}}"#).unwrap();

        assert_eq!(cart_amount(&cart, &catalog), Decimal::MAX);
        assert_eq!(order_total(&cart, &catalog, Decimal::ONE), Decimal::MAX);
        assert_eq!(line_amount(Decimal::MAX, 3), Decimal::MAX);
        assert_eq!(line_amount(Decimal::new(250, 0), 3), Decimal::new(750, 0));
    }
}
