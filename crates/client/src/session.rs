//! Session token ownership.
//!
//! The [`SessionGate`] is the only holder of the session token. It restores
//! the token from durable storage at construction, persists it on sign-in,
//! and destroys it on logout or whenever an authenticated request is
//! rejected. Local cart data is never touched here: a forced logout leaves
//! the persisted cart in place so anonymous browsing keeps its cart.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bazaar_core::UserId;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::storage::{KeyValueStore, StorageError, TOKEN_KEY};

/// Opaque session token issued by the backend after OTP verification.
///
/// `Debug` output is redacted.
#[derive(Clone)]
pub struct SessionToken(SecretString);

impl SessionToken {
    /// Wrap a token string. Returns `None` for blank input.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return None;
        }
        Some(Self(SecretString::from(token)))
    }

    /// The raw token, for request headers and persistence only.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// User id carried in the token's JWT payload (`id` or `_id` claim).
    ///
    /// The signature is not checked; the backend does that. Returns `None`
    /// for tokens that are not JWTs or carry neither claim.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        let payload = self.expose().split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
        ["id", "_id"]
            .iter()
            .filter_map(|claim| claims.get(claim).and_then(serde_json::Value::as_str))
            .find_map(|id| UserId::parse(id).ok())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

/// Whether a session token is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    SignedOut,
    SignedIn,
}

/// Owner of the session token.
///
/// Cheaply cloneable; clones share the same token.
#[derive(Clone)]
pub struct SessionGate {
    inner: Arc<SessionGateInner>,
}

struct SessionGateInner {
    store: Arc<dyn KeyValueStore>,
    token: Mutex<Option<SessionToken>>,
    status: watch::Sender<SessionStatus>,
}

impl SessionGate {
    /// Restore the session from `store`.
    ///
    /// An unreadable or blank stored token counts as signed out.
    #[must_use]
    pub fn restore(store: Arc<dyn KeyValueStore>) -> Self {
        let token = match store.get(TOKEN_KEY) {
            Ok(raw) => raw.and_then(SessionToken::new),
            Err(error) => {
                warn!(%error, "failed to read stored session token");
                None
            }
        };
        let status = if token.is_some() {
            SessionStatus::SignedIn
        } else {
            SessionStatus::SignedOut
        };

        Self {
            inner: Arc::new(SessionGateInner {
                store,
                token: Mutex::new(token),
                status: watch::Sender::new(status),
            }),
        }
    }

    /// Returns `true` while a token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.lock_token().is_some()
    }

    /// Current token, if any.
    #[must_use]
    pub fn token(&self) -> Option<SessionToken> {
        self.lock_token().clone()
    }

    /// Watch sign-in / sign-out transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    /// Adopt a freshly issued token and persist it.
    ///
    /// # Errors
    ///
    /// Returns the storage failure as a warning. The token is held in memory
    /// regardless, so the session works until the process exits.
    pub fn sign_in(&self, token: SessionToken) -> Result<(), StorageError> {
        let persisted = self.inner.store.set(TOKEN_KEY, token.expose());
        *self.lock_token() = Some(token);
        self.inner.status.send_replace(SessionStatus::SignedIn);
        info!("session started");

        persisted.inspect_err(|error| warn!(%error, "failed to persist session token"))
    }

    /// Destroy the token in memory and in durable storage.
    ///
    /// The persisted cart is left untouched.
    pub fn force_logout(&self) {
        let had_token = self.lock_token().take().is_some();
        if let Err(error) = self.inner.store.remove(TOKEN_KEY) {
            warn!(%error, "failed to delete stored session token");
        }
        self.inner.status.send_replace(SessionStatus::SignedOut);
        if had_token {
            info!("session ended");
        }
    }

    fn lock_token(&self) -> std::sync::MutexGuard<'_, Option<SessionToken>> {
        self.inner
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
