//! Payment methods offered at checkout.

use serde::{Deserialize, Serialize};

/// How the customer pays for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash on delivery; the order is placed immediately.
    #[default]
    Cod,
    /// Hosted Stripe checkout; the customer is redirected to a session URL.
    Stripe,
    /// Razorpay; a gateway order is created and paid client-side.
    Razorpay,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cod => write!(f, "cod"),
            Self::Stripe => write!(f, "stripe"),
            Self::Razorpay => write!(f, "razorpay"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cod" => Ok(Self::Cod),
            "stripe" => Ok(Self::Stripe),
            "razorpay" => Ok(Self::Razorpay),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}
