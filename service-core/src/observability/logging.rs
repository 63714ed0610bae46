use crate::error::AppError;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, runtime, trace as sdktrace};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Where and how verbosely a service writes its logs.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Default filter directive, overridden by `RUST_LOG` when set.
    pub level: String,
    /// Directory holding the rotating log files.
    pub directory: String,
    /// File name prefix; the appender adds a date suffix on rotation.
    pub file_name: String,
    /// OTLP collector endpoint. Span export is disabled when unset.
    pub otlp_endpoint: Option<String>,
}

impl LogSettings {
    pub fn new(service_name: &str) -> Self {
        Self {
            level: "info".to_string(),
            directory: "logs".to_string(),
            file_name: format!("{}.log", service_name),
            otlp_endpoint: None,
        }
    }
}

/// Rotated files kept on disk before the oldest is removed.
const MAX_LOG_FILES: usize = 7;

/// Keeps the background log writer alive. Dropping it flushes the file sink,
/// so hold it until the process exits.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file: WorkerGuard,
}

/// Install the global subscriber: JSON to stderr, JSON to a daily-rotating
/// file, and optionally OTLP span export.
pub fn init_tracing(service_name: &str, settings: &LogSettings) -> Result<LogGuard, AppError> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.level));

    let file_appender = file_appender(settings)?;
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let telemetry = match settings.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let tracer = otlp_tracer(service_name, endpoint)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(telemetry)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_file(true)
                .with_line_number(true)
                .json()
                .flatten_event(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .json()
                .flatten_event(true),
        )
        .try_init()
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to install subscriber: {}", e)))?;

    Ok(LogGuard { _file: file_guard })
}

/// Daily rotation with bounded retention. `tracing-appender` has no
/// size-based policy, so disk use is capped by file count instead.
fn file_appender(settings: &LogSettings) -> Result<RollingFileAppender, AppError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&settings.file_name)
        .max_log_files(MAX_LOG_FILES)
        .build(&settings.directory)
        .map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to open log directory '{}': {}",
                settings.directory,
                e
            ))
        })
}

fn otlp_tracer(service_name: &str, endpoint: &str) -> Result<sdktrace::Tracer, AppError> {
    let otlp_exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(otlp_exporter)
        .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", service_name.to_string()),
        ])))
        .install_batch(runtime::Tokio)
        .map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to initialize OTLP tracer for service '{}' at endpoint '{}': {}",
                service_name,
                endpoint,
                e
            ))
        })
}
