//! Command implementations.
//!
//! Commands print their results to stdout; diagnostics go through `tracing`
//! (stderr).

pub mod cart;
pub mod checkout;
pub mod login;
pub mod products;

use bazaar_client::ShopError;
use bazaar_client::api::ApiError;
use bazaar_core::{ContactError, EmailError, EmptyLabelError};
use thiserror::Error;

/// Errors a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Shop(#[from] ShopError),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid address file: {0}")]
    Address(#[from] serde_yaml::Error),
}

impl CliError {
    /// One-line message for the user.
    #[must_use]
    pub fn notice(&self) -> String {
        match self {
            Self::Shop(error) => error.notice(),
            _ => self.to_string(),
        }
    }
}

impl From<ApiError> for CliError {
    fn from(error: ApiError) -> Self {
        Self::Shop(error.into())
    }
}

impl From<ContactError> for CliError {
    fn from(error: ContactError) -> Self {
        Self::Argument(error.to_string())
    }
}

impl From<EmailError> for CliError {
    fn from(error: EmailError) -> Self {
        Self::Argument(error.to_string())
    }
}

impl From<EmptyLabelError> for CliError {
    fn from(error: EmptyLabelError) -> Self {
        Self::Argument(error.to_string())
    }
}
