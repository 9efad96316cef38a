//! Order placement and payment initiation.
//!
//! The order endpoints authenticate with a `token` header rather than a
//! bearer token, and expect the user id from the token's payload in the body.

use bazaar_core::{OrderDraft, OrderDraftError, OrderId, PaymentMethod, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

use super::{ApiClient, ApiError, Auth};
use crate::session::SessionToken;

/// Errors placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart cannot become an order.
    #[error(transparent)]
    Draft(#[from] OrderDraftError),

    /// Checkout requires a session.
    #[error("sign in to place an order")]
    NotSignedIn,

    /// The session token carries no user id.
    #[error("session token has no user id")]
    MissingUserId,

    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The hosted checkout URL returned by the backend is not a URL.
    #[error("invalid checkout redirect: {0}")]
    InvalidRedirect(#[from] url::ParseError),
}

/// An order created with the payment gateway, to be completed client-side.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayOrder {
    /// Gateway-side order id.
    pub id: String,
    /// Amount in the currency's minor unit.
    pub amount: u64,
    pub currency: String,
    /// The backend's own order id.
    pub receipt: OrderId,
}

/// What the caller has to do after placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentInitiation {
    /// Cash on delivery; the order is placed.
    Placed,
    /// Send the user to a hosted checkout page.
    Redirect { session_url: Url },
    /// Open the gateway's payment widget for this order.
    GatewayOrder(GatewayOrder),
}

/// Payment confirmation returned by the gateway's widget.
#[derive(Debug, Clone, Serialize)]
pub struct RazorpayPayment {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaceRequest<'a> {
    user_id: &'a UserId,
    #[serde(flatten)]
    draft: &'a OrderDraft,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    #[serde(flatten)]
    payment: &'a RazorpayPayment,
    local_order_id: &'a OrderId,
    user_id: &'a UserId,
}

#[derive(Deserialize)]
struct Acknowledged {}

#[derive(Deserialize)]
struct StripeResponse {
    session_url: String,
}

#[derive(Deserialize)]
struct RazorpayResponse {
    order: GatewayOrder,
}

/// Client for the `/order` endpoints.
#[derive(Clone)]
pub struct OrderClient {
    api: ApiClient,
}

impl OrderClient {
    /// Create an order client.
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Submit `draft` and start payment with `method`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::MissingUserId`] if the token carries no user
    /// id, or the API failure.
    #[instrument(skip(self, draft, token), fields(items = draft.items.len()))]
    pub async fn place(
        &self,
        draft: &OrderDraft,
        method: PaymentMethod,
        token: &SessionToken,
    ) -> Result<PaymentInitiation, CheckoutError> {
        let user_id = token.user_id().ok_or(CheckoutError::MissingUserId)?;
        let body = PlaceRequest {
            user_id: &user_id,
            draft,
        };
        let auth = Auth::TokenHeader(token);

        let initiation = match method {
            PaymentMethod::Cod => {
                let _: Acknowledged = self.api.post("order/place", &body, auth).await?;
                PaymentInitiation::Placed
            }
            PaymentMethod::Stripe => {
                let response: StripeResponse = self.api.post("order/stripe", &body, auth).await?;
                PaymentInitiation::Redirect {
                    session_url: Url::parse(&response.session_url)?,
                }
            }
            PaymentMethod::Razorpay => {
                let response: RazorpayResponse =
                    self.api.post("order/razorpay", &body, auth).await?;
                PaymentInitiation::GatewayOrder(response.order)
            }
        };

        info!(%method, "Order submitted");
        Ok(initiation)
    }

    /// Confirm a completed gateway payment for the backend order `local_order_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature is rejected or the request fails.
    #[instrument(skip(self, payment, token), fields(order_id = %local_order_id))]
    pub async fn verify_razorpay(
        &self,
        payment: &RazorpayPayment,
        local_order_id: &OrderId,
        token: &SessionToken,
    ) -> Result<(), CheckoutError> {
        let user_id = token.user_id().ok_or(CheckoutError::MissingUserId)?;
        let body = VerifyRequest {
            payment,
            local_order_id,
            user_id: &user_id,
        };
        let _: Acknowledged = self
            .api
            .post("order/verifyRazorpay", &body, Auth::TokenHeader(token))
            .await?;
        info!("Payment verified");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_gateway_order_decodes() {
        let response: RazorpayResponse = serde_json::from_value(json!({
            "success": true,
            "order": {
                "id": "order_9A33XWu170gUtm",
                "amount": 50000,
                "currency": "INR",
                "receipt": "665f1c",
                "status": "created"
            }
        }))
        .unwrap();

        assert_eq!(response.order.amount, 50_000);
        assert_eq!(response.order.receipt.as_str(), "665f1c");
    }

    #[test]
    fn test_verify_request_shape() {
        let payment = RazorpayPayment {
            razorpay_order_id: "order_1".into(),
            razorpay_payment_id: "pay_1".into(),
            razorpay_signature: "sig".into(),
        };
        let order_id = OrderId::parse("665f1c").unwrap();
        let user_id = UserId::parse("u-1").unwrap();

        let body = serde_json::to_value(VerifyRequest {
            payment: &payment,
            local_order_id: &order_id,
            user_id: &user_id,
        })
        .unwrap();

        assert_eq!(
            body,
            json!({
                "razorpay_order_id": "order_1",
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": "sig",
                "localOrderId": "665f1c",
                "userId": "u-1"
            })
        );
    }
}
