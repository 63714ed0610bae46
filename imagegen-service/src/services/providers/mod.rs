//! Image generation provider abstraction.
//!
//! The handler never talks to a provider directly; it goes through
//! [`ImageGenerator`](crate::services::ImageGenerator), which owns the
//! credential and hands it to the provider on every call.

pub mod mock;
pub mod replicate;

use crate::models::GenerationInput;
use async_trait::async_trait;
use secrecy::Secret;
use serde_json::Value;
use thiserror::Error;

pub use mock::MockImageProvider;
pub use replicate::{ModelRef, ReplicateProvider};

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Prediction {status}: {detail}")]
    PredictionFailed { status: String, detail: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// A hosted image-generation backend.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Run `model_ref` once with `input` and return the provider's output
    /// untouched. The credential is scoped to this call only.
    async fn run(
        &self,
        model_ref: &str,
        input: &GenerationInput,
        credential: &Secret<String>,
    ) -> Result<Value, ProviderError>;
}
