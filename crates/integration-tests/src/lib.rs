//! Integration tests for Bazaar.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```
//!
//! Tests run against [`MockBackend`], an in-process `axum` server bound to a
//! random local port that imitates the Bazaar backend's cart, product, OTP
//! and order endpoints. No external services are needed.
//!
//! # Test Categories
//!
//! - `cart_gateway` - HTTP cart gateway wire behavior
//! - `catalog` - Product list caching and cancel-and-replace
//! - `login_flow` - OTP sign-in and cart reconciliation end to end
//! - `checkout` - Order placement and payment initiation

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bazaar_client::ClientConfig;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// OTP the mock backend accepts.
pub const VALID_OTP: &str = "1234";

/// User id carried in [`session_token`].
pub const USER_ID: &str = "user-1";

/// A JWT-shaped token for [`USER_ID`], as the backend issues on verification.
#[must_use]
pub fn session_token() -> String {
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"id":"{USER_ID}","iat":1700000000}}"#));
    format!("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.{payload}.c2lnbmF0dXJl")
}

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub path: String,
    pub body: Value,
}

/// How the mock misbehaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthFailure {
    /// Accept the session token.
    #[default]
    None,
    /// Answer authenticated calls with 401.
    Unauthorized,
    /// Answer authenticated calls with the backend's JWT error (HTTP 500).
    JwtError,
}

/// Mutable backend state, inspectable from tests.
#[derive(Debug, Default)]
pub struct MockState {
    pub cart: BTreeMap<String, BTreeMap<String, u64>>,
    pub products: Vec<Value>,
    pub requests: Vec<Recorded>,
    /// Number of upcoming cart writes to fail with HTTP 500.
    pub failing_cart_writes: usize,
    /// Cart lines whose `update` always fails with HTTP 500.
    pub failing_products: Vec<String>,
    pub auth_failure: AuthFailure,
    pub product_list_delay: Option<Duration>,
    pub product_list_hits: usize,
}

type Shared = Arc<Mutex<MockState>>;

/// In-process imitation of the Bazaar backend.
///
/// The server task is aborted on drop.
pub struct MockBackend {
    base_url: String,
    state: Shared,
    task: JoinHandle<()>,
}

impl MockBackend {
    /// Start the server on a random local port.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Shared::default();
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let router = Router::new()
            .route("/api/cart", get(cart_get))
            .route("/api/cart/add", post(cart_add))
            .route("/api/cart/update", post(cart_update))
            .route("/api/cart/clear", post(cart_clear))
            .route("/api/product/list", get(product_list))
            .route("/api/user/{action}", post(user_action))
            .route("/api/order/{method}", post(order_action))
            .with_state(Arc::clone(&state));

        let task = tokio::spawn(async move {
            // Ends when the task is aborted.
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            base_url: format!("http://{addr}/api"),
            state,
            task,
        })
    }

    /// Base URL including the `/api` prefix.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Client configuration pointing at this backend.
    ///
    /// # Panics
    ///
    /// Never; the base URL is always well formed.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn config(&self) -> ClientConfig {
        ClientConfig::with_api_url(&self.base_url).unwrap()
    }

    /// Lock the backend state for setup or inspection.
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }

    /// Replace the server cart.
    pub fn set_cart(&self, cart: Value) {
        self.state().cart = serde_json::from_value(cart).unwrap_or_default();
    }

    /// Server cart as JSON.
    #[must_use]
    pub fn cart(&self) -> Value {
        json!(self.state().cart)
    }

    /// Paths of every request received, in order.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.state().requests.iter().map(|r| r.path.clone()).collect()
    }

    /// Bodies received on `path`.
    #[must_use]
    pub fn bodies(&self, path: &str) -> Vec<Value> {
        self.state()
            .requests
            .iter()
            .filter(|r| r.path == path)
            .map(|r| r.body.clone())
            .collect()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record(state: &Shared, path: &str, body: Value) {
    lock(state).requests.push(Recorded {
        path: path.to_string(),
        body,
    });
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// Check credentials the way the backend middleware does.
fn authorize(state: &Shared, headers: &HeaderMap, header: &str) -> Result<(), Response> {
    let failure = lock(state).auth_failure;
    let expected = session_token();
    let presented = headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start_matches("Bearer ").to_string());

    match (failure, presented) {
        (AuthFailure::None, Some(token)) if token == expected => Ok(()),
        (AuthFailure::JwtError, Some(_)) => Err(reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"success": false, "data": {"error": {"name": "JsonWebTokenError"}}}),
        )),
        _ => Err(reply(
            StatusCode::UNAUTHORIZED,
            json!({"success": false, "message": "Not Authorized Login Again"}),
        )),
    }
}

fn take_write_failure(state: &Shared) -> bool {
    let mut state = lock(state);
    if state.failing_cart_writes > 0 {
        state.failing_cart_writes -= 1;
        true
    } else {
        false
    }
}

fn server_error() -> Response {
    reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"success": false, "message": "database unavailable"}),
    )
}

fn line(body: &Value) -> Option<(String, String)> {
    let product_id = body.get("productId")?.as_str()?.to_string();
    let size = body.get("size")?.as_str()?.to_string();
    Some((product_id, size))
}

async fn cart_get(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "cart", Value::Null);
    if let Err(response) = authorize(&state, &headers, "authorization") {
        return response;
    }
    let cart = json!(lock(&state).cart);
    reply(StatusCode::OK, json!({"success": true, "cartData": cart}))
}

async fn cart_add(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "cart/add", body.clone());
    if let Err(response) = authorize(&state, &headers, "authorization") {
        return response;
    }
    if take_write_failure(&state) {
        return server_error();
    }
    let Some((product_id, size)) = line(&body) else {
        return reply(StatusCode::BAD_REQUEST, json!({"success": false, "message": "bad line"}));
    };
    *lock(&state)
        .cart
        .entry(product_id)
        .or_default()
        .entry(size)
        .or_insert(0) += 1;
    reply(StatusCode::OK, json!({"success": true, "message": "Added To Cart"}))
}

async fn cart_update(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "cart/update", body.clone());
    if let Err(response) = authorize(&state, &headers, "authorization") {
        return response;
    }
    let Some((product_id, size)) = line(&body) else {
        return reply(StatusCode::BAD_REQUEST, json!({"success": false, "message": "bad line"}));
    };
    if take_write_failure(&state) || lock(&state).failing_products.contains(&product_id) {
        return server_error();
    }
    let quantity = body.get("quantity").and_then(Value::as_u64).unwrap_or(0);

    let mut guard = lock(&state);
    if quantity == 0 {
        if let Some(sizes) = guard.cart.get_mut(&product_id) {
            sizes.remove(&size);
            if sizes.is_empty() {
                guard.cart.remove(&product_id);
            }
        }
    } else {
        guard.cart.entry(product_id).or_default().insert(size, quantity);
    }
    drop(guard);
    reply(StatusCode::OK, json!({"success": true, "message": "Cart Updated"}))
}

async fn cart_clear(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "cart/clear", Value::Null);
    if let Err(response) = authorize(&state, &headers, "authorization") {
        return response;
    }
    if take_write_failure(&state) {
        return server_error();
    }
    lock(&state).cart.clear();
    reply(StatusCode::OK, json!({"success": true}))
}

async fn product_list(State(state): State<Shared>) -> Response {
    record(&state, "product/list", Value::Null);
    let delay = {
        let mut guard = lock(&state);
        guard.product_list_hits += 1;
        guard.product_list_delay
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    let products = lock(&state).products.clone();
    reply(StatusCode::OK, json!({"success": true, "products": products}))
}

async fn user_action(
    State(state): State<Shared>,
    Path(action): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    record(&state, &format!("user/{action}"), body.clone());
    match action.as_str() {
        "sendOTP" | "resendOTP" | "sendOTPAdmin" => {
            reply(StatusCode::OK, json!({"success": true, "message": "OTP sent successfully"}))
        }
        "verifyOTP" if body.get("otp").and_then(Value::as_str) == Some(VALID_OTP) => reply(
            StatusCode::OK,
            json!({
                "success": true,
                "token": session_token(),
                "email": body.get("email").cloned().unwrap_or(Value::Null),
                "message": "Login successful"
            }),
        ),
        "verifyOTP" => reply(StatusCode::OK, json!({"success": false, "message": "Invalid OTP"})),
        _ => reply(StatusCode::NOT_FOUND, json!({"success": false, "message": "not found"})),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
async fn order_action(
    State(state): State<Shared>,
    Path(method): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, &format!("order/{method}"), body.clone());
    if let Err(response) = authorize(&state, &headers, "token") {
        return response;
    }
    if body.get("userId").and_then(Value::as_str) != Some(USER_ID) {
        return reply(StatusCode::OK, json!({"success": false, "message": "unknown user"}));
    }

    match method.as_str() {
        "place" => {
            lock(&state).cart.clear();
            reply(StatusCode::OK, json!({"success": true, "message": "Order Placed"}))
        }
        "stripe" => reply(
            StatusCode::OK,
            json!({"success": true, "session_url": "https://checkout.stripe.com/c/pay/cs_test_a1"}),
        ),
        "razorpay" => {
            let paise = body
                .get("amount")
                .and_then(Value::as_f64)
                .map_or(0, |amount| (amount * 100.0).round() as u64);
            reply(
                StatusCode::OK,
                json!({
                    "success": true,
                    "order": {
                        "id": "order_Mock123",
                        "amount": paise,
                        "currency": "INR",
                        "receipt": "order-db-1",
                        "status": "created"
                    }
                }),
            )
        }
        "verifyRazorpay" => {
            let valid = body.get("razorpay_signature").and_then(Value::as_str) == Some("valid");
            if valid {
                lock(&state).cart.clear();
                reply(StatusCode::OK, json!({"success": true, "message": "Payment Successful"}))
            } else {
                reply(StatusCode::OK, json!({"success": false, "message": "Payment Failed"}))
            }
        }
        _ => reply(StatusCode::NOT_FOUND, json!({"success": false, "message": "not found"})),
    }
}
