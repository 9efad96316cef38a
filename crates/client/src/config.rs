//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BAZAAR_API_URL` - Backend API base URL (e.g., <https://api.example.com/api>)
//!
//! ## Optional
//! - `BAZAAR_DATA_DIR` - Directory for the durable cart/token store (default: .bazaar)
//! - `BAZAAR_STORAGE_QUOTA_BYTES` - Byte quota for the durable store (default: unlimited)
//! - `BAZAAR_DELIVERY_FEE` - Flat delivery fee added at checkout (default: 1)
//! - `BAZAAR_CURRENCY` - ISO 4217 display currency (default: INR)
//! - `BAZAAR_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `BAZAAR_CATALOG_TTL_SECS` - Product list cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use bazaar_core::CurrencyCode;
use rust_decimal::Decimal;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend API base URL; endpoint paths are resolved relative to it
    pub api_url: Url,
    /// Directory holding the durable store
    pub data_dir: PathBuf,
    /// Optional byte quota for the durable store
    pub storage_quota_bytes: Option<u64>,
    /// Flat delivery fee, added by callers on top of the cart amount
    pub delivery_fee: Decimal,
    /// Display currency
    pub currency: CurrencyCode,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    /// How long a fetched product list is served from cache
    pub catalog_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let raw_url = env.required("BAZAAR_API_URL")?;
        let api_url = normalize_base_url(&raw_url)
            .map_err(|e| ConfigError::InvalidEnvVar("BAZAAR_API_URL".to_string(), e))?;

        let data_dir = PathBuf::from(env.or_default("BAZAAR_DATA_DIR", ".bazaar"));
        let storage_quota_bytes = env
            .optional("BAZAAR_STORAGE_QUOTA_BYTES")
            .map(|v| env.parse::<u64>("BAZAAR_STORAGE_QUOTA_BYTES", &v))
            .transpose()?;

        let delivery_fee = env.parse::<Decimal>(
            "BAZAAR_DELIVERY_FEE",
            &env.or_default("BAZAAR_DELIVERY_FEE", "1"),
        )?;
        if delivery_fee.is_sign_negative() && !delivery_fee.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "BAZAAR_DELIVERY_FEE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let currency = env
            .or_default("BAZAAR_CURRENCY", "INR")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("BAZAAR_CURRENCY".to_string(), e))?;

        let http_timeout = Duration::from_secs(env.parse::<u64>(
            "BAZAAR_HTTP_TIMEOUT_SECS",
            &env.or_default("BAZAAR_HTTP_TIMEOUT_SECS", "30"),
        )?);
        let catalog_ttl = Duration::from_secs(env.parse::<u64>(
            "BAZAAR_CATALOG_TTL_SECS",
            &env.or_default("BAZAAR_CATALOG_TTL_SECS", "300"),
        )?);

        Ok(Self {
            api_url,
            data_dir,
            storage_quota_bytes,
            delivery_fee,
            currency,
            http_timeout,
            catalog_ttl,
            sentry_dsn: env.optional("SENTRY_DSN"),
        })
    }

    /// Configuration with defaults for everything but the API URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `api_url` is not an absolute http(s) URL.
    pub fn with_api_url(api_url: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| (key == "BAZAAR_API_URL").then(|| api_url.to_string()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get a required variable; blank counts as missing.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable; blank counts as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, value: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }
}

/// Parse a base URL and make sure its path ends in `/` so relative joins
/// append to it instead of replacing the last segment.
fn normalize_base_url(raw: &str) -> Result<Url, String> {
    let mut url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme: {}", url.scheme()));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("BAZAAR_API_URL", "http://localhost:4000/api")]).unwrap();

        assert_eq!(config.api_url.as_str(), "http://localhost:4000/api/");
        assert_eq!(config.data_dir, PathBuf::from(".bazaar"));
        assert_eq!(config.delivery_fee, Decimal::ONE);
        assert_eq!(config.currency, CurrencyCode::INR);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.catalog_ttl, Duration::from_secs(300));
        assert!(config.storage_quota_bytes.is_none());
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_missing_api_url() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "BAZAAR_API_URL"));
    }

    #[test]
    fn test_blank_counts_as_missing() {
        let err = load(&[("BAZAAR_API_URL", "  ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let err = load(&[("BAZAAR_API_URL", "ftp://example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("BAZAAR_API_URL", "https://shop.example.com/api/"),
            ("BAZAAR_DATA_DIR", "/tmp/bazaar"),
            ("BAZAAR_STORAGE_QUOTA_BYTES", "5242880"),
            ("BAZAAR_DELIVERY_FEE", "49.5"),
            ("BAZAAR_CURRENCY", "usd"),
            ("BAZAAR_HTTP_TIMEOUT_SECS", "5"),
            ("SENTRY_DSN", "https://key@sentry.example.com/1"),
        ])
        .unwrap();

        assert_eq!(config.api_url.as_str(), "https://shop.example.com/api/");
        assert_eq!(config.storage_quota_bytes, Some(5_242_880));
        assert_eq!(config.delivery_fee, Decimal::new(495, 1));
        assert_eq!(config.currency, CurrencyCode::USD);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert!(config.sentry_dsn.is_some());
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(matches!(
            load(&[
                ("BAZAAR_API_URL", "http://localhost"),
                ("BAZAAR_DELIVERY_FEE", "-2")
            ]),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(matches!(
            load(&[
                ("BAZAAR_API_URL", "http://localhost"),
                ("BAZAAR_HTTP_TIMEOUT_SECS", "soon")
            ]),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_with_api_url() {
        let config = ClientConfig::with_api_url("http://127.0.0.1:9000").unwrap();
        assert_eq!(config.api_url.as_str(), "http://127.0.0.1:9000/");
    }
}
