use crate::config::GenerationConfig;
use crate::models::GenerationInput;
use crate::services::providers::{ImageProvider, ProviderError};
use secrecy::{ExposeSecret, Secret};
use serde_json::Value;
use service_core::utils::{secret_prefix, truncate_for_log};
use thiserror::Error;

const OUTPUT_LOG_LIMIT: usize = 2048;

/// Any failure while producing images, whatever the underlying cause.
#[derive(Debug, Error)]
#[error("Error generating images: {source}")]
pub struct ImageGenerationError {
    pub source: ProviderError,
}

impl From<ProviderError> for ImageGenerationError {
    fn from(source: ProviderError) -> Self {
        Self { source }
    }
}

/// Request-scoped generation client. Built fresh for every request; only the
/// generation settings and the provider handle are shared.
pub struct ImageGenerator<'a> {
    provider: &'a dyn ImageProvider,
    config: &'a GenerationConfig,
    credential: Secret<String>,
}

impl<'a> ImageGenerator<'a> {
    pub fn new(
        provider: &'a dyn ImageProvider,
        config: &'a GenerationConfig,
        credential: Secret<String>,
    ) -> Self {
        tracing::info!(
            model = %config.model,
            provider = provider.name(),
            "ImageGenerator initialized"
        );
        Self {
            provider,
            config,
            credential,
        }
    }

    /// Merge `prompt` into the fixed settings and run the configured LoRA
    /// model once. The provider output is returned as-is.
    pub async fn generate(&self, prompt: &str) -> Result<Value, ImageGenerationError> {
        tracing::debug!(prompt = %prompt, "Received prompt");
        tracing::debug!(
            credential = %secret_prefix(self.credential.expose_secret(), 5),
            "Using upstream credential"
        );

        let input = GenerationInput::new(prompt, self.config);

        tracing::info!(model_ref = %self.config.lora, "Using model");
        tracing::info!(
            parameters = %serde_json::to_string(&input).unwrap_or_default(),
            "API call parameters"
        );

        match self
            .provider
            .run(&self.config.lora, &input, &self.credential)
            .await
        {
            Ok(output) => {
                let count = output.as_array().map(Vec::len).unwrap_or(1);
                tracing::info!(outputs = count, "Images generated successfully");
                tracing::debug!(
                    response = %truncate_for_log(&output.to_string(), OUTPUT_LOG_LIMIT),
                    "API response"
                );
                Ok(output)
            }
            Err(e) => {
                let err = ImageGenerationError::from(e);
                tracing::error!(error = %err, "Image generation failed");
                Err(err)
            }
        }
    }
}
