//! Bazaar backend API clients.
//!
//! # Architecture
//!
//! - One shared [`ApiClient`] (a `reqwest::Client` plus the base URL) does
//!   transport, status mapping and envelope checks
//! - Feature clients wrap it: [`cart`], [`catalog`], [`auth`], [`orders`]
//! - The backend is the source of truth for carts and orders; only the
//!   product list is cached locally (`moka`, TTL from config)
//!
//! # Envelope
//!
//! Every endpoint answers `{ "success": bool, "message"?: string, ... }`.
//! `success: false` is surfaced as [`ApiError::Rejected`] even on HTTP 200.
//!
//! # Retries
//!
//! None. Failures are returned to the caller; retry policy belongs to the UI.

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod orders;

pub use auth::{AuthClient, VerifiedLogin};
pub use cart::{CartGateway, HttpCartGateway};
pub use catalog::{CatalogClient, CatalogError};
pub use orders::{CheckoutError, GatewayOrder, OrderClient, PaymentInitiation, RazorpayPayment};

use std::sync::Arc;

use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::ClientConfig;
use crate::session::SessionToken;

/// Errors that can occur when calling the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint path could not be resolved against the base URL.
    #[error("Invalid endpoint: {0}")]
    Url(#[from] url::ParseError),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An authenticated call was attempted without a session token.
    #[error("Not signed in")]
    MissingToken,

    /// Backend rejected the token (HTTP 401, or a JWT error reported as 500).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// HTTP success but `success: false` in the body.
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl ApiError {
    /// Returns `true` if the failure means the session is no longer valid.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::MissingToken | Self::Unauthorized(_))
    }
}

/// How a request authenticates.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Auth<'a> {
    /// No credentials.
    Public,
    /// `Authorization: Bearer <token>`.
    Bearer(&'a SessionToken),
    /// `token: <token>` header, used by the order endpoints.
    TokenHeader(&'a SessionToken),
}

/// Shared HTTP transport for every feature client.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (e.g. TLS backend
    /// initialization fails).
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
            }),
        })
    }

    /// Base URL endpoint paths are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    fn authorize(request: RequestBuilder, auth: Auth<'_>) -> RequestBuilder {
        match auth {
            Auth::Public => request,
            Auth::Bearer(token) => request.bearer_auth(token.expose()),
            Auth::TokenHeader(token) => request.header("token", token.expose()),
        }
    }

    /// `GET` an endpoint and decode its envelope.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        auth: Auth<'_>,
    ) -> Result<T, ApiError> {
        let request = self.inner.client.get(self.endpoint(path)?);
        Self::execute(Self::authorize(request, auth)).await
    }

    /// `POST` a JSON body and decode the envelope.
    pub(crate) async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        auth: Auth<'_>,
    ) -> Result<T, ApiError> {
        let request = self.inner.client.post(self.endpoint(path)?).json(body);
        Self::execute(Self::authorize(request, auth)).await
    }

    /// Send a request, map failures and check the `success` flag.
    async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        // Read as text first for better error diagnostics
        let body = response.text().await?;
        let parsed = serde_json::from_str::<Value>(&body);

        if !status.is_success() {
            return Err(status_error(status, &body, parsed.as_ref().ok()));
        }

        let value = parsed.map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&body, 500),
                "Backend returned a non-JSON body"
            );
            ApiError::Parse(e)
        })?;

        if !value.get("success").and_then(Value::as_bool).unwrap_or(false) {
            let message = backend_message(&value)
                .unwrap_or_else(|| "request was not successful".to_string());
            tracing::debug!(%message, "Backend rejected request");
            return Err(ApiError::Rejected(message));
        }

        serde_json::from_value(value).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate(&body, 500),
                "Failed to decode backend response"
            );
            ApiError::Parse(e)
        })
    }
}

/// Map a non-success status to an error.
///
/// The backend reports JWT verification failures as HTTP 500 with
/// `data.error.name == "JsonWebTokenError"`; those count as unauthorized.
fn status_error(status: StatusCode, body: &str, parsed: Option<&Value>) -> ApiError {
    let message = parsed
        .and_then(backend_message)
        .unwrap_or_else(|| truncate(body, 200));

    if status == StatusCode::UNAUTHORIZED {
        return ApiError::Unauthorized(message);
    }

    let jwt_error = parsed
        .and_then(|v| v.pointer("/data/error/name"))
        .and_then(Value::as_str)
        .is_some_and(|name| name == "JsonWebTokenError");
    if status == StatusCode::INTERNAL_SERVER_ERROR && jwt_error {
        return ApiError::Unauthorized(message);
    }

    tracing::error!(
        status = %status,
        body = %truncate(body, 500),
        "Backend returned non-success status"
    );
    ApiError::Status {
        status: status.as_u16(),
        message,
    }
}

fn backend_message(value: &Value) -> Option<String> {
    value
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
