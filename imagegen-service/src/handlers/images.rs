use crate::models::{GenerateImagesRequest, GenerateImagesResponse};
use crate::services::ImageGenerator;
use crate::startup::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::Value;
use service_core::error::AppError;
use validator::{Validate, ValidationErrors};

fn bad_request(detail: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(anyhow::anyhow!("Error during image generation: {}", detail))
}

/// Field messages only, e.g. `Prompt is required`.
fn validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .map(|e| match &e.message {
            Some(message) => message.to_string(),
            None => e.code.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// `POST /generate-images`. Authentication has already happened in
/// [`require_api_key`](crate::middleware::require_api_key).
#[tracing::instrument(skip(state, payload))]
pub async fn generate_images(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<GenerateImagesResponse>, AppError> {
    let Json(body) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Rejected request body");
        bad_request(rejection.body_text())
    })?;

    // Serde would also accept the struct written as a sequence.
    if !body.is_object() {
        tracing::warn!("Request body is not a JSON object");
        return Err(bad_request("request body must be a JSON object"));
    }

    let request: GenerateImagesRequest = serde_json::from_value(body).map_err(|e| {
        tracing::warn!(error = %e, "Invalid request body");
        bad_request(e)
    })?;

    request.validate().map_err(|e| {
        tracing::warn!(error = %e, "Invalid generation request");
        bad_request(validation_message(&e))
    })?;

    tracing::info!(prompt = %request.prompt, "Received generation request");

    let generator = ImageGenerator::new(
        state.provider.as_ref(),
        &state.config.generation,
        state.config.replicate.api_key.clone(),
    );

    let output = generator.generate(&request.prompt).await.map_err(|e| {
        tracing::error!("Error during image generation: {}", e);
        bad_request(e)
    })?;

    Ok(Json(GenerateImagesResponse { image_urls: output }))
}
