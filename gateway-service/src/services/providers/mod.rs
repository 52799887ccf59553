//! Generation provider abstractions and implementations.
//!
//! A provider receives the ordered parts list and returns the response text,
//! allowing easy swapping between backends (Gemini, mock).

pub mod gemini;
pub mod mock;

use crate::models::Part;
use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Trait for text-producing generation providers (e.g. Gemini).
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Run one generation call over the ordered parts list.
    async fn generate(&self, parts: &[Part]) -> Result<String, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
