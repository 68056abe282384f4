use mediaload_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    mediaload_api::telemetry::init_telemetry()?;
    tracing::info!("Configuration loaded and validated successfully");

    let (_state, router) = mediaload_api::setup::initialize_app(&config).await?;

    mediaload_api::setup::server::start_server(&config, router).await?;

    Ok(())
}
