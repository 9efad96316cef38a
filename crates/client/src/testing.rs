//! In-memory [`CartGateway`] that records calls and can be told to fail.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bazaar_core::{CartSnapshot, ProductId, SizeLabel};

use crate::api::{ApiError, CartGateway};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch,
    Add(String, String),
    Set(String, String, u32),
    Clear,
}

/// Failure to inject on a matching call.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    Network,
    Unauthorized,
}

impl Failure {
    fn into_error(self) -> ApiError {
        match self {
            Self::Network => ApiError::Status {
                status: 500,
                message: "boom".into(),
            },
            Self::Unauthorized => ApiError::Unauthorized("token expired".into()),
        }
    }
}

#[derive(Default)]
struct State {
    server: CartSnapshot,
    calls: Vec<Call>,
    /// One entry consumed per call; `None` means succeed.
    script: VecDeque<Option<Failure>>,
    fail_all: Option<Failure>,
    fail_sets_for: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<State>>,
    latency: Option<Duration>,
}

impl FakeGateway {
    pub fn with_server(raw: &str) -> Self {
        let gateway = Self::default();
        gateway.lock().server = CartSnapshot::from_json_str(raw).unwrap_or_default();
        gateway
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fail_all(&self, failure: Failure) {
        self.lock().fail_all = Some(failure);
    }

    pub fn fail_next(&self, failure: Failure) {
        self.lock().script.push_back(Some(failure));
    }

    pub fn succeed_next(&self) {
        self.lock().script.push_back(None);
    }

    pub fn fail_sets_for(&self, product_id: &str) {
        self.lock().fail_sets_for.push(product_id.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn server(&self) -> CartSnapshot {
        self.lock().server.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn begin(&self, call: Call) -> Result<(), ApiError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.lock();
        let scripted = state.script.pop_front().flatten();
        let targeted = match &call {
            Call::Set(product_id, _, _) if state.fail_sets_for.contains(product_id) => {
                Some(Failure::Network)
            }
            _ => None,
        };
        state.calls.push(call);
        match scripted.or(targeted).or(state.fail_all) {
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }
}

impl CartGateway for FakeGateway {
    async fn fetch_cart(&self) -> Result<CartSnapshot, ApiError> {
        self.begin(Call::Fetch).await?;
        Ok(self.server())
    }

    async fn add_item(&self, product_id: &ProductId, size: &SizeLabel) -> Result<(), ApiError> {
        self.begin(Call::Add(product_id.to_string(), size.to_string()))
            .await?;
        self.lock().server.add_one(product_id, size);
        Ok(())
    }

    async fn set_quantity(
        &self,
        product_id: &ProductId,
        size: &SizeLabel,
        quantity: u32,
    ) -> Result<(), ApiError> {
        self.begin(Call::Set(
            product_id.to_string(),
            size.to_string(),
            quantity,
        ))
        .await?;
        self.lock().server.set_quantity(product_id, size, quantity);
        Ok(())
    }

    async fn clear(&self) -> Result<(), ApiError> {
        self.begin(Call::Clear).await?;
        self.lock().server.clear();
        Ok(())
    }
}
