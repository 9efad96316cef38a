//! Remote cart gateway.
//!
//! Every call needs a session token. Calls are never retried; the caller
//! decides what a failure means for local state.

use std::future::Future;

use bazaar_core::{CartSnapshot, ProductId, SizeLabel};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ApiClient, ApiError, Auth};
use crate::session::SessionGate;

/// Authenticated operations on the server-side cart.
///
/// The reconciler is generic over this trait so tests can substitute an
/// in-memory backend.
pub trait CartGateway: Send + Sync + 'static {
    /// The authoritative server cart, empty if the user has none.
    fn fetch_cart(&self) -> impl Future<Output = Result<CartSnapshot, ApiError>> + Send;

    /// Increment `(product_id, size)` by one.
    fn add_item(
        &self,
        product_id: &ProductId,
        size: &SizeLabel,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Set `(product_id, size)` to `quantity`; zero removes the line.
    fn set_quantity(
        &self,
        product_id: &ProductId,
        size: &SizeLabel,
        quantity: u32,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Delete the server cart.
    fn clear(&self) -> impl Future<Output = Result<(), ApiError>> + Send;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartResponse {
    #[serde(default)]
    cart_data: Option<CartSnapshot>,
}

#[derive(Deserialize)]
struct Acknowledged {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LineRequest<'a> {
    product_id: &'a ProductId,
    size: &'a SizeLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    quantity: Option<u32>,
}

/// [`CartGateway`] over the backend's `/cart` endpoints.
///
/// Reads the token from the [`SessionGate`] at call time, so a logout takes
/// effect for the very next request.
#[derive(Clone)]
pub struct HttpCartGateway {
    api: ApiClient,
    session: SessionGate,
}

impl HttpCartGateway {
    /// Create a gateway.
    #[must_use]
    pub const fn new(api: ApiClient, session: SessionGate) -> Self {
        Self { api, session }
    }

    async fn post_line(&self, path: &str, line: LineRequest<'_>) -> Result<(), ApiError> {
        let token = self.session.token().ok_or(ApiError::MissingToken)?;
        let _: Acknowledged = self.api.post(path, &line, Auth::Bearer(&token)).await?;
        Ok(())
    }
}

impl CartGateway for HttpCartGateway {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<CartSnapshot, ApiError> {
        let token = self.session.token().ok_or(ApiError::MissingToken)?;
        let response: CartResponse = self.api.get("cart", Auth::Bearer(&token)).await?;
        Ok(response.cart_data.unwrap_or_default())
    }

    #[instrument(skip_all, fields(product_id = %product_id, size = %size))]
    async fn add_item(&self, product_id: &ProductId, size: &SizeLabel) -> Result<(), ApiError> {
        self.post_line(
            "cart/add",
            LineRequest {
                product_id,
                size,
                quantity: None,
            },
        )
        .await
    }

    #[instrument(skip_all, fields(product_id = %product_id, size = %size, quantity = quantity))]
    async fn set_quantity(
        &self,
        product_id: &ProductId,
        size: &SizeLabel,
        quantity: u32,
    ) -> Result<(), ApiError> {
        self.post_line(
            "cart/update",
            LineRequest {
                product_id,
                size,
                quantity: Some(quantity),
            },
        )
        .await
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<(), ApiError> {
        let token = self.session.token().ok_or(ApiError::MissingToken)?;
        let _: Acknowledged = self
            .api
            .post("cart/clear", &serde_json::json!({}), Auth::Bearer(&token))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_line_request_shape() {
        let product_id = ProductId::parse("P1").unwrap();
        let size = SizeLabel::parse("M").unwrap();

        let add = serde_json::to_value(LineRequest {
            product_id: &product_id,
            size: &size,
            quantity: None,
        })
        .unwrap();
        assert_eq!(add, serde_json::json!({"productId": "P1", "size": "M"}));

        let update = serde_json::to_value(LineRequest {
            product_id: &product_id,
            size: &size,
            quantity: Some(0),
        })
        .unwrap();
        assert_eq!(
            update,
            serde_json::json!({"productId": "P1", "size": "M", "quantity": 0})
        );
    }

    #[test]
    fn test_cart_response_tolerates_missing_or_null_data() {
        let missing: CartResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(missing.cart_data.is_none());

        let null: CartResponse =
            serde_json::from_str(r#"{"success":true,"cartData":null}"#).unwrap();
        assert!(null.cart_data.is_none());

        let some: CartResponse =
            serde_json::from_str(r#"{"success":true,"cartData":{"A":{"M":5}}}"#).unwrap();
        assert_eq!(some.cart_data.unwrap().quantity("A", "M"), 5);
    }
}
