//! Replicate predictions API client.
//!
//! A prediction is created with `Prefer: wait`, which usually returns the
//! finished result. Predictions still `starting` or `processing` are then
//! followed through their `urls.get` link until they reach a terminal state.

use super::{ImageProvider, ProviderError};
use crate::config::ReplicateConfig;
use crate::models::GenerationInput;
use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::utils::truncate_for_log;
use std::time::Duration;

const ERROR_BODY_LIMIT: usize = 512;

/// `owner/name[:version]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub owner: String,
    pub name: String,
    pub version: Option<String>,
}

impl ModelRef {
    pub fn parse(reference: &str) -> Result<Self, ProviderError> {
        let reference = reference.trim();
        let (path, version) = match reference.split_once(':') {
            Some((path, version)) => (path, Some(version)),
            None => (reference, None),
        };

        let (owner, name) = path.split_once('/').ok_or_else(|| {
            ProviderError::InvalidRequest(format!(
                "model reference '{}' must look like owner/name[:version]",
                reference
            ))
        })?;

        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(ProviderError::InvalidRequest(format!(
                "model reference '{}' must look like owner/name[:version]",
                reference
            )));
        }

        let version = match version {
            Some(v) if v.is_empty() => {
                return Err(ProviderError::InvalidRequest(format!(
                    "model reference '{}' has an empty version",
                    reference
                )));
            }
            other => other.map(str::to_string),
        };

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            version,
        })
    }
}

#[derive(Debug, Serialize)]
struct CreatePrediction<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: &'a GenerationInput,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: Option<String>,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Lower bound on the poll interval so a zero setting cannot spin.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

pub struct ReplicateProvider {
    api_base: String,
    poll_interval: Duration,
    client: Client,
}

impl ReplicateProvider {
    pub fn new(config: &ReplicateConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(
                config.poll_interval_ms.max(MIN_POLL_INTERVAL_MS),
            ),
            client,
        })
    }

    fn create_url(&self, model: &ModelRef) -> String {
        match model.version {
            Some(_) => format!("{}/predictions", self.api_base),
            None => format!(
                "{}/models/{}/{}/predictions",
                self.api_base, model.owner, model.name
            ),
        }
    }

    async fn create_prediction(
        &self,
        model: &ModelRef,
        input: &GenerationInput,
        token: &str,
    ) -> Result<Prediction, ProviderError> {
        let url = self.create_url(model);
        let body = CreatePrediction {
            version: model.version.as_deref(),
            input,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        parse_prediction(response).await
    }

    async fn fetch_prediction(&self, url: &str, token: &str) -> Result<Prediction, ProviderError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        parse_prediction(response).await
    }
}

async fn parse_prediction(response: Response) -> Result<Prediction, ProviderError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

    if !status.is_success() {
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|body| body.detail.or(body.title))
            .unwrap_or_else(|| truncate_for_log(&text, ERROR_BODY_LIMIT));
        return Err(ProviderError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&text).map_err(|e| {
        ProviderError::MalformedResponse(format!(
            "{}: {}",
            e,
            truncate_for_log(&text, ERROR_BODY_LIMIT)
        ))
    })
}

fn failure_detail(prediction: &Prediction) -> String {
    match &prediction.error {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Null) | None => "no error detail returned".to_string(),
        Some(other) => other.to_string(),
    }
}

#[async_trait]
impl ImageProvider for ReplicateProvider {
    fn name(&self) -> &str {
        "replicate"
    }

    async fn run(
        &self,
        model_ref: &str,
        input: &GenerationInput,
        credential: &Secret<String>,
    ) -> Result<Value, ProviderError> {
        let token = credential.expose_secret();
        if token.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Replicate API key is empty".to_string(),
            ));
        }

        let model = ModelRef::parse(model_ref)?;
        let mut prediction = self.create_prediction(&model, input, token).await?;

        loop {
            tracing::debug!(
                prediction_id = prediction.id.as_deref().unwrap_or("-"),
                status = %prediction.status,
                "Replicate prediction state"
            );

            match prediction.status.as_str() {
                "succeeded" => return Ok(prediction.output.take().unwrap_or(Value::Null)),
                "failed" | "canceled" | "aborted" => {
                    return Err(ProviderError::PredictionFailed {
                        detail: failure_detail(&prediction),
                        status: prediction.status,
                    });
                }
                _ => {}
            }

            let poll_url = prediction
                .urls
                .as_ref()
                .and_then(|urls| urls.get.as_deref())
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .ok_or_else(|| {
                    ProviderError::MalformedResponse(format!(
                        "prediction in state '{}' has no poll URL",
                        prediction.status
                    ))
                })?
                .to_string();

            tokio::time::sleep(self.poll_interval).await;
            prediction = self.fetch_prediction(&poll_url, token).await?;
        }
    }
}
