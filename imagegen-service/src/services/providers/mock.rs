//! Mock provider implementation for testing.

use super::{ImageProvider, ProviderError};
use crate::models::GenerationInput;
use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use serde_json::Value;
use std::sync::Mutex;

/// One recorded call to [`MockImageProvider::run`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model_ref: String,
    pub input: GenerationInput,
    pub credential: String,
}

enum Outcome {
    Output(Value),
    Failure(String),
}

/// Mock provider returning a canned output or a canned failure.
pub struct MockImageProvider {
    outcome: Outcome,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockImageProvider {
    /// Succeed with `output` on every call.
    pub fn returning(output: Value) -> Self {
        Self {
            outcome: Outcome::Output(output),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail with an API error carrying `message` on every call.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Failure(message.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ImageProvider for MockImageProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(
        &self,
        model_ref: &str,
        input: &GenerationInput,
        credential: &Secret<String>,
    ) -> Result<Value, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                model_ref: model_ref.to_string(),
                input: input.clone(),
                credential: credential.expose_secret().clone(),
            });
        }

        match &self.outcome {
            Outcome::Output(output) => Ok(output.clone()),
            Outcome::Failure(message) => Err(ProviderError::ApiError {
                status: 502,
                message: message.clone(),
            }),
        }
    }
}
