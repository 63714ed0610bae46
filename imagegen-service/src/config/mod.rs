use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::observability::LogSettings;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

pub const SERVICE_NAME: &str = "imagegen-service";

const DEFAULT_LORA: &str =
    "ashakoen/akv-1-flux2:c13e23ce8ac6f56a7f7c5a91cf1a6bb351d1ad5c99a916966f0218c914acd1f0";
const DEFAULT_REPLICATE_API_BASE: &str = "https://api.replicate.com/v1";

#[derive(Debug, Clone)]
pub struct ImagegenConfig {
    pub common: core_config::Config,
    pub generation: GenerationConfig,
    pub replicate: ReplicateConfig,
    pub security: SecurityConfig,
    pub logging: LogSettings,
}

/// Fixed parameters applied to every generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub model: String,
    pub num_outputs: u32,
    pub guidance_scale: f64,
    pub num_inference_steps: u32,
    pub output_format: String,
    pub output_quality: u32,
    pub disable_safety_checker: bool,
    pub lora_scale: f64,
    /// Model reference (`owner/name[:version]`) the call is made against.
    pub lora: String,
    pub aspect_ratio: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "dev".to_string(),
            num_outputs: 1,
            guidance_scale: 3.5,
            num_inference_steps: 28,
            output_format: "png".to_string(),
            output_quality: 100,
            disable_safety_checker: false,
            lora_scale: 1.0,
            lora: DEFAULT_LORA.to_string(),
            aspect_ratio: "9:16".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub api_key: Secret<String>,
    pub api_base: String,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Value callers must present in `x-api-key`.
    pub gate_key: Secret<String>,
    pub allowed_origins: Vec<String>,
}

impl ImagegenConfig {
    /// Read the process environment (after `.env`) once at startup.
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_source(common, |key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, so tests need not touch the
    /// process environment.
    pub fn from_source<F>(common: core_config::Config, source: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GenerationConfig::default();

        let generation = GenerationConfig {
            model: get_env(&source, "MODEL", Some(&defaults.model))?,
            num_outputs: get_parsed(&source, "NUM_OUTPUTS", defaults.num_outputs)?,
            guidance_scale: get_parsed(&source, "GUIDANCE_SCALE", defaults.guidance_scale)?,
            num_inference_steps: get_parsed(
                &source,
                "NUM_INFERENCE_STEPS",
                defaults.num_inference_steps,
            )?,
            output_format: get_env(&source, "OUTPUT_FORMAT", Some(&defaults.output_format))?,
            output_quality: get_parsed(&source, "OUTPUT_QUALITY", defaults.output_quality)?,
            disable_safety_checker: get_env(&source, "DISABLE_SAFETY_CHECKER", Some("false"))?
                .eq_ignore_ascii_case("true"),
            lora_scale: get_parsed(&source, "LORA_SCALE", defaults.lora_scale)?,
            lora: get_env(&source, "LORA", Some(&defaults.lora))?,
            aspect_ratio: get_env(&source, "ASPECT_RATIO", Some(&defaults.aspect_ratio))?,
        };

        let replicate = ReplicateConfig {
            api_key: Secret::new(get_env(&source, "REPLICATE_API_KEY", None)?),
            api_base: get_env(&source, "REPLICATE_API_BASE", Some(DEFAULT_REPLICATE_API_BASE))?
                .trim_end_matches('/')
                .to_string(),
            poll_interval_ms: get_parsed(&source, "REPLICATE_POLL_INTERVAL_MS", 1000)?,
            timeout_secs: get_parsed(&source, "REPLICATE_TIMEOUT_SECS", 120)?,
        };

        let security = SecurityConfig {
            gate_key: Secret::new(get_env(&source, "X_API_KEY", None)?),
            allowed_origins: get_env(&source, "CORS_ALLOWED_ORIGINS", Some("*"))?
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
        };

        let log_defaults = LogSettings::new(SERVICE_NAME);
        let logging = LogSettings {
            level: get_env(&source, "LOG_LEVEL", Some(&log_defaults.level))?,
            directory: get_env(&source, "LOG_DIR", Some(&log_defaults.directory))?,
            file_name: get_env(&source, "LOG_FILE", Some(&log_defaults.file_name))?,
            otlp_endpoint: source("OTLP_ENDPOINT").filter(|v| !v.trim().is_empty()),
        };

        Ok(ImagegenConfig {
            common,
            generation,
            replicate,
            security,
            logging,
        })
    }

    pub fn from_map(
        common: core_config::Config,
        vars: &HashMap<String, String>,
    ) -> Result<Self, AppError> {
        Self::from_source(common, |key| vars.get(key).cloned())
    }
}

fn get_env<F>(source: &F, key: &str, default: Option<&str>) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match source(key) {
        Some(val) => Ok(val),
        None => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required but not set",
                key
            ))),
        },
    }
}

fn get_parsed<F, T>(source: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match source(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
        }),
        None => Ok(default),
    }
}
