use crate::config::GenerationConfig;
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

/// Body of `POST /generate-images`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateImagesRequest {
    #[serde(default, deserialize_with = "null_as_empty")]
    #[validate(length(min = 1, message = "Prompt is required"))]
    pub prompt: String,
}

/// `"prompt": null` is treated like a missing prompt.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize)]
pub struct GenerateImagesResponse {
    /// Provider output, passed through untouched.
    #[serde(rename = "imageUrls")]
    pub image_urls: serde_json::Value,
}

/// Input record sent to the provider: the prompt merged with the fixed
/// generation settings. The LoRA reference selects the model and is not part
/// of the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInput {
    pub prompt: String,
    pub model: String,
    pub num_outputs: u32,
    pub guidance_scale: f64,
    pub num_inference_steps: u32,
    pub output_format: String,
    pub output_quality: u32,
    pub disable_safety_checker: bool,
    pub aspect_ratio: String,
    pub lora_scale: f64,
}

impl GenerationInput {
    pub fn new(prompt: impl Into<String>, config: &GenerationConfig) -> Self {
        Self {
            prompt: prompt.into(),
            model: config.model.clone(),
            num_outputs: config.num_outputs,
            guidance_scale: config.guidance_scale,
            num_inference_steps: config.num_inference_steps,
            output_format: config.output_format.clone(),
            output_quality: config.output_quality,
            disable_safety_checker: config.disable_safety_checker,
            aspect_ratio: config.aspect_ratio.clone(),
            lora_scale: config.lora_scale,
        }
    }
}
