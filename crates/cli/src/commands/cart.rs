//! `bazaar cart ...`

use bazaar_client::{CartError, MutationOutcome, ShopContext, ShopError, SyncPhase};
use bazaar_core::{CartSnapshot, Catalog, ProductId, SizeLabel, pricing};
use tracing::warn;

use super::CliError;

/// Print each cart line and the totals.
///
/// Lines whose product is no longer listed are shown without a price.
///
/// # Errors
///
/// Does not fail when the catalog is unreachable; prices are omitted instead.
#[allow(clippy::print_stdout)]
pub async fn show(shop: &ShopContext) -> Result<(), CliError> {
    let snapshot = shop.cart().snapshot();
    if snapshot.is_empty() {
        println!("Your cart is empty.");
        return Ok(());
    }

    let catalog = match shop.catalog().products().await {
        Ok(catalog) => catalog,
        Err(error) => {
            warn!(%error, "Catalog unavailable, showing cart without prices");
            std::sync::Arc::new(Catalog::default())
        }
    };
    let currency = shop.config().currency;

    for line in snapshot.lines() {
        match catalog.get(line.product_id.as_str()) {
            Some(entry) => println!(
                "{:>3} x {:<32} {:<4} {:>10}",
                line.quantity,
                entry.name,
                line.size.as_str(),
                currency.format(pricing::line_amount(entry.price.amount(), line.quantity)),
            ),
            None => println!(
                "{:>3} x {:<32} {:<4} {:>10}",
                line.quantity,
                line.product_id.as_str(),
                line.size.as_str(),
                "-"
            ),
        }
    }

    let totals = shop.cart_totals(&catalog);
    println!();
    println!("Items:    {}", totals.item_count);
    println!("Subtotal: {}", currency.format(totals.subtotal));
    println!("Delivery: {}", currency.format(totals.delivery_fee));
    println!("Total:    {}", currency.format(totals.total));
    if shop.cart().phase() == SyncPhase::Anonymous {
        println!("(not signed in; cart is kept on this device)");
    }
    Ok(())
}

/// Add one unit of `size`.
///
/// # Errors
///
/// Returns an error for a blank id or size, a size the product does not
/// come in, or a server failure (the cart is rolled back).
pub async fn add(shop: &ShopContext, product_id: &str, size: &str) -> Result<(), CliError> {
    let product_id = ProductId::parse(product_id)?;
    let size = SizeLabel::parse(size)?;

    match shop.catalog().products().await {
        Ok(catalog) => {
            if let Some(entry) = catalog.get(product_id.as_str())
                && !entry.offers_size(size.as_str())
            {
                return Err(CliError::Argument(format!(
                    "{} is not available in size {size}",
                    entry.name
                )));
            }
        }
        Err(error) => warn!(%error, "Catalog unavailable, size not checked"),
    }

    report(shop.cart().add_item(&product_id, &size).await, "Added to cart")
}

/// Set the quantity of `size`; zero removes the line.
///
/// # Errors
///
/// Returns an error for a blank id or size, or a server failure.
pub async fn set(
    shop: &ShopContext,
    product_id: &str,
    size: &str,
    quantity: u32,
) -> Result<(), CliError> {
    let product_id = ProductId::parse(product_id)?;
    let size = SizeLabel::parse(size)?;
    let done = if quantity == 0 {
        "Removed from cart"
    } else {
        "Cart updated"
    };
    report(
        shop.cart()
            .update_quantity(&product_id, &size, quantity)
            .await,
        done,
    )
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the server cart could not be cleared.
pub async fn clear(shop: &ShopContext) -> Result<(), CliError> {
    report(shop.cart().clear().await, "Cart cleared")
}

#[allow(clippy::print_stdout)]
fn report(outcome: MutationOutcome, done: &str) -> Result<(), CliError> {
    match outcome {
        MutationOutcome::Applied {
            snapshot,
            storage_warning,
        } => {
            if let Some(error) = &storage_warning {
                warn!(%error, "Cart not saved on this device");
            }
            println!("{}", summary(done, &snapshot, storage_warning.as_ref()));
            Ok(())
        }
        MutationOutcome::RolledBack {
            error,
            storage_warning,
            ..
        } => {
            if let Some(warning) = &storage_warning {
                warn!(error = %warning, "Stored cart could not be reverted");
            }
            Err(ShopError::from(error).into())
        }
    }
}

fn summary(done: &str, snapshot: &CartSnapshot, storage_warning: Option<&CartError>) -> String {
    let line = format!("{done} ({} items)", pricing::item_count(snapshot));
    match storage_warning {
        Some(warning) => format!("{line}\n{}", warning.notice()),
        None => line,
    }
}
