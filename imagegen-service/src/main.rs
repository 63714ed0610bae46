use imagegen_service::config::{ImagegenConfig, SERVICE_NAME};
use imagegen_service::startup::Application;
use service_core::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ImagegenConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    let _log_guard = init_tracing(SERVICE_NAME, &config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!(
        model = %config.generation.model,
        model_ref = %config.generation.lora,
        "Loaded generation defaults"
    );

    let app = Application::build(config).await.map_err(|e| {
        tracing::error!("Failed to build application: {}", e);
        anyhow::anyhow!("Startup error: {}", e)
    })?;

    app.run_until_stopped().await?;

    tracing::info!("Image generation service stopped");
    Ok(())
}
