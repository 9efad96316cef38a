//! `bazaar checkout` and `bazaar verify-payment`

use std::path::Path;

use bazaar_client::api::{CheckoutError, PaymentInitiation, RazorpayPayment};
use bazaar_client::{ShopContext, ShopError};
use bazaar_core::{DeliveryAddress, OrderId, PaymentMethod};
use tracing::info;

use super::CliError;

/// Read a delivery address from a YAML file.
///
/// ```yaml
/// firstName: Asha
/// lastName: Rao
/// email: asha@example.com
/// street: 12 MG Road
/// city: Pune
/// state: Maharashtra
/// zipcode: "411001"
/// country: India
/// phone: "9876543210"
/// ```
///
/// # Errors
///
/// Returns an error if the file cannot be read or a field is missing or invalid.
pub fn load_address(path: &Path) -> Result<DeliveryAddress, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Place an order for the current cart.
///
/// # Errors
///
/// Returns an error if not signed in, the cart is empty, or placement fails.
#[allow(clippy::print_stdout)]
pub async fn place(
    shop: &ShopContext,
    address: &Path,
    method: PaymentMethod,
) -> Result<(), CliError> {
    let address = load_address(address)?;
    info!(%method, "Placing order");

    match shop.checkout(address, method).await? {
        PaymentInitiation::Placed => println!("Order placed. Pay on delivery."),
        PaymentInitiation::Redirect { session_url } => {
            println!("Complete payment at: {session_url}");
        }
        PaymentInitiation::GatewayOrder(order) => {
            println!("Gateway order created.");
            println!("  order id: {}", order.id);
            println!("  amount:   {} {} (minor units)", order.amount, order.currency);
            println!("  receipt:  {}", order.receipt);
            println!("After paying, run `bazaar verify-payment --order-id {}` with the gateway's ids.", order.receipt);
        }
    }
    Ok(())
}

/// Confirm a completed gateway payment and drop the local cart.
///
/// # Errors
///
/// Returns an error if not signed in or the signature is rejected.
#[allow(clippy::print_stdout)]
pub async fn verify_payment(
    shop: &ShopContext,
    order_id: &str,
    payment: RazorpayPayment,
) -> Result<(), CliError> {
    let order_id = OrderId::parse(order_id)?;
    let token = shop
        .session()
        .token()
        .ok_or(ShopError::Checkout(CheckoutError::NotSignedIn))?;

    shop.orders()
        .verify_razorpay(&payment, &order_id, &token)
        .await
        .map_err(ShopError::from)?;
    shop.cart().discard_local();
    println!("Payment verified. Order {order_id} is confirmed.");
    Ok(())
}
