use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use camux_core::logging::init_logging;
use camux_proxy::{create_router, load_config, AppState, SdmClient};

#[derive(Parser, Debug)]
#[command(name = "camux-proxy")]
#[command(about = "Camera stream-control proxy for the Smart Device Management API", long_about = None)]
struct Args {
    /// Config file (YAML/TOML)
    #[arg(long, env = "CAMUX_CONFIG_PATH")]
    config: Option<String>,

    /// Override the configured HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.http_port = port;
    }

    init_logging(&config.logging)?;
    info!("camux proxy starting...");
    info!(project_id = %config.project_id, sdm = %config.sdm_base_url, "SDM target");

    let sdm = SdmClient::new(
        &config.sdm_base_url,
        config.project_id.clone(),
        config.request_timeout(),
    )?;
    let state = AppState { sdm: Arc::new(sdm) };
    let router = create_router(state, &config.frontend_url)?;

    let address = config.http_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("HTTP server listening on {}", address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("camux proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
