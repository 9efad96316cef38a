//! `bazaar products`

use bazaar_client::ShopContext;
use bazaar_client::ShopError;
use bazaar_core::SizeLabel;

use super::CliError;

/// Print the product list.
///
/// # Errors
///
/// Returns an error if the list cannot be fetched.
#[allow(clippy::print_stdout)]
pub async fn list(shop: &ShopContext, refresh: bool) -> Result<(), CliError> {
    let catalog = if refresh {
        shop.catalog().refresh().await
    } else {
        shop.catalog().products().await
    }
    .map_err(ShopError::from)?;

    if catalog.is_empty() {
        println!("No products listed.");
        return Ok(());
    }

    let currency = shop.config().currency;
    for entry in catalog.iter() {
        let sizes: Vec<&str> = entry.sizes.iter().map(SizeLabel::as_str).collect();
        let badge = if entry.bestseller { " *bestseller*" } else { "" };
        println!(
            "{:<26} {:<32} {:>10}  [{}]{badge}",
            entry.id.as_str(),
            entry.name,
            currency.format(entry.price.amount()),
            sizes.join(", "),
        );
    }
    Ok(())
}
