//! Mock provider implementation for testing.

use super::{GenerationProvider, ProviderError};
use crate::models::Part;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock provider that records every parts list it receives.
///
/// Answers with a canned response, a canned failure, or after an artificial
/// delay, so tests can drive each pipeline outcome.
#[derive(Clone, Default)]
pub struct MockProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    response: String,
    fail_with: Option<String>,
    delay: Option<Duration>,
    calls: Vec<Vec<Part>>,
}

impl MockProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                response: response.into(),
                ..Default::default()
            })),
        }
    }

    /// Provider that fails every call with an API error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                fail_with: Some(message.into()),
                ..Default::default()
            })),
        }
    }

    /// Provider that sleeps before answering.
    pub fn with_delay(response: impl Into<String>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockState {
                response: response.into(),
                delay: Some(delay),
                ..Default::default()
            })),
        }
    }

    /// Parts lists received so far, in call order.
    pub fn calls(&self) -> Vec<Vec<Part>> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn generate(&self, parts: &[Part]) -> Result<String, ProviderError> {
        let (outcome, delay) = {
            let mut state = self.inner.lock().unwrap();
            state.calls.push(parts.to_vec());

            let outcome = match &state.fail_with {
                Some(message) => Err(ProviderError::ApiError(message.clone())),
                None => Ok(state.response.clone()),
            };
            (outcome, state.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        outcome
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
