//! Integration tests for checkout and payment initiation.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use bazaar_client::api::{ApiError, CheckoutError, PaymentInitiation, RazorpayPayment};
use bazaar_client::storage::{KeyValueStore, MemoryStore, TOKEN_KEY};
use bazaar_client::{ShopContext, ShopError};
use bazaar_core::{
    DeliveryAddress, OrderDraftError, OrderId, PaymentMethod, ProductId, SizeLabel,
};
use bazaar_integration_tests::{AuthFailure, MockBackend, USER_ID, session_token};
use serde_json::json;

fn address() -> DeliveryAddress {
    serde_json::from_value(json!({
        "firstName": "Asha",
        "lastName": "Rao",
        "email": "asha@example.com",
        "street": "12 MG Road",
        "city": "Pune",
        "state": "Maharashtra",
        "zipcode": "411001",
        "country": "India",
        "phone": "9876543210"
    }))
    .unwrap()
}

/// Signed-in shop with two shirts (499 each) in the cart.
async fn shop_with_cart(backend: &MockBackend) -> ShopContext {
    backend.state().products = vec![
        json!({"_id": "shirt", "name": "Cotton Shirt", "price": 499, "sizes": ["M"]}),
        json!({"_id": "cap", "name": "Cap", "price": 199, "sizes": ["OS"]}),
    ];
    let store = Arc::new(MemoryStore::new());
    store.set(TOKEN_KEY, &session_token()).unwrap();
    let shop = ShopContext::with_store(backend.config(), store).unwrap();
    shop.start().await;

    let shirt = ProductId::parse("shirt").unwrap();
    let size = SizeLabel::parse("M").unwrap();
    shop.cart().update_quantity(&shirt, &size, 2).await;
    shop
}

// =============================================================================
// Payment Method Tests
// =============================================================================

#[tokio::test]
async fn test_cash_on_delivery_places_order_and_clears_cart() {
    let backend = MockBackend::start().await.unwrap();
    let shop = shop_with_cart(&backend).await;

    let result = shop.checkout(address(), PaymentMethod::Cod).await.unwrap();

    assert_eq!(result, PaymentInitiation::Placed);
    assert!(shop.cart().snapshot().is_empty());

    let body = backend.bodies("order/place").pop().unwrap();
    assert_eq!(body["userId"], USER_ID);
    assert_eq!(body["amount"].as_f64(), Some(999.0));
    assert_eq!(body["address"]["firstName"], "Asha");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["_id"], "shirt");
    assert_eq!(body["items"][0]["size"], "M");
    assert_eq!(body["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn test_stripe_returns_redirect_and_keeps_cart() {
    let backend = MockBackend::start().await.unwrap();
    let shop = shop_with_cart(&backend).await;

    let result = shop
        .checkout(address(), PaymentMethod::Stripe)
        .await
        .unwrap();

    match result {
        PaymentInitiation::Redirect { session_url } => {
            assert_eq!(session_url.host_str(), Some("checkout.stripe.com"));
        }
        other => panic!("expected redirect, got {other:?}"),
    }
    assert_eq!(shop.cart().item_count(), 2);
}

#[tokio::test]
async fn test_razorpay_order_and_verification() {
    let backend = MockBackend::start().await.unwrap();
    let shop = shop_with_cart(&backend).await;

    let result = shop
        .checkout(address(), PaymentMethod::Razorpay)
        .await
        .unwrap();
    let PaymentInitiation::GatewayOrder(order) = result else {
        panic!("expected gateway order, got {result:?}");
    };
    assert_eq!(order.amount, 99_900);
    assert_eq!(order.currency, "INR");
    assert_eq!(order.receipt, OrderId::parse("order-db-1").unwrap());

    let token = shop.session().token().unwrap();
    let rejected = shop
        .orders()
        .verify_razorpay(
            &RazorpayPayment {
                razorpay_order_id: order.id.clone(),
                razorpay_payment_id: "pay_1".into(),
                razorpay_signature: "forged".into(),
            },
            &order.receipt,
            &token,
        )
        .await
        .unwrap_err();
    assert!(matches!(rejected, CheckoutError::Api(ApiError::Rejected(_))));

    shop.orders()
        .verify_razorpay(
            &RazorpayPayment {
                razorpay_order_id: order.id,
                razorpay_payment_id: "pay_1".into(),
                razorpay_signature: "valid".into(),
            },
            &order.receipt,
            &token,
        )
        .await
        .unwrap();

    let body = backend.bodies("order/verifyRazorpay").pop().unwrap();
    assert_eq!(body["localOrderId"], "order-db-1");
    assert_eq!(body["userId"], USER_ID);
    assert_eq!(body["razorpay_payment_id"], "pay_1");
}

// =============================================================================
// Failure Tests
// =============================================================================

#[tokio::test]
async fn test_empty_cart_is_not_submitted() {
    let backend = MockBackend::start().await.unwrap();
    let shop = shop_with_cart(&backend).await;
    shop.cart().clear().await;

    let err = shop
        .checkout(address(), PaymentMethod::Cod)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ShopError::Checkout(CheckoutError::Draft(OrderDraftError::EmptyCart))
    ));
    assert!(backend.bodies("order/place").is_empty());
}

#[tokio::test]
async fn test_rejected_token_at_checkout_signs_out() {
    let backend = MockBackend::start().await.unwrap();
    let shop = shop_with_cart(&backend).await;
    backend.state().auth_failure = AuthFailure::Unauthorized;

    let err = shop
        .checkout(address(), PaymentMethod::Cod)
        .await
        .unwrap_err();

    assert_eq!(err.notice(), "Please sign in to continue");
    assert!(!shop.session().is_authenticated());
    assert_eq!(shop.cart().item_count(), 2, "cart survives a failed checkout");
}
