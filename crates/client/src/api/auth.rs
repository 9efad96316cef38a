//! OTP login endpoints.

use bazaar_core::{Email, OtpCode, PhoneNumber};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{ApiClient, ApiError, Auth};
use crate::session::SessionToken;

/// Result of a successful OTP verification.
#[derive(Debug, Clone)]
pub struct VerifiedLogin {
    pub token: SessionToken,
    /// Email on file for the account, if the backend returned one.
    pub email: Option<String>,
    pub message: Option<String>,
}

#[derive(Serialize)]
struct PhoneRequest<'a> {
    phone: &'a PhoneNumber,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    phone: &'a PhoneNumber,
    otp: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a Email>,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Unauthenticated client for the `/user` OTP endpoints.
#[derive(Clone)]
pub struct AuthClient {
    api: ApiClient,
}

impl AuthClient {
    /// Create an auth client.
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Ask the backend to text a login code to `phone`.
    ///
    /// Returns the backend's confirmation message.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    #[instrument(skip_all)]
    pub async fn send_otp(&self, phone: &PhoneNumber) -> Result<String, ApiError> {
        self.phone_request("user/sendOTP", phone).await
    }

    /// Send a fresh code to `phone`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    #[instrument(skip_all)]
    pub async fn resend_otp(&self, phone: &PhoneNumber) -> Result<String, ApiError> {
        self.phone_request("user/resendOTP", phone).await
    }

    /// Send a login code for the admin account registered to `phone`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    #[instrument(skip_all)]
    pub async fn send_admin_otp(&self, phone: &PhoneNumber) -> Result<String, ApiError> {
        self.phone_request("user/sendOTPAdmin", phone).await
    }

    /// Exchange a code for a session token.
    ///
    /// `email` is only needed the first time a phone number signs in.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Rejected`] for a wrong or expired code, or if the
    /// backend reports success without a token.
    #[instrument(skip_all)]
    pub async fn verify_otp(
        &self,
        phone: &PhoneNumber,
        otp: &OtpCode,
        email: Option<&Email>,
    ) -> Result<VerifiedLogin, ApiError> {
        let body = VerifyRequest {
            phone,
            otp: otp.as_str(),
            email,
        };
        let response: VerifyResponse = self.api.post("user/verifyOTP", &body, Auth::Public).await?;

        let token = response
            .token
            .and_then(SessionToken::new)
            .ok_or_else(|| ApiError::Rejected("verification returned no token".to_string()))?;
        info!("OTP verified");

        Ok(VerifiedLogin {
            token,
            email: response.email.filter(|e| !e.is_empty()),
            message: response.message,
        })
    }

    async fn phone_request(&self, path: &str, phone: &PhoneNumber) -> Result<String, ApiError> {
        let response: MessageResponse = self
            .api
            .post(path, &PhoneRequest { phone }, Auth::Public)
            .await?;
        Ok(response.message.unwrap_or_else(|| "OTP sent".to_string()))
    }
}
