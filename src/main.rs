use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use micrec::{create_router, AppState, Config, MicrophoneDevice, RecordingSession};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "micrec", about = "Single-session voice recording service", version)]
struct Cli {
    /// Config file path, without extension
    #[arg(long, default_value = "config/micrec")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the recording service (the default)
    Serve,
    /// List input devices visible to the audio host
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&cli.config).await,
        Command::Devices => list_devices(),
    }
}

async fn serve(config_path: &str) -> Result<()> {
    let cfg = Config::load(config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let device = MicrophoneDevice::new(cfg.capture.capture_config());
    let session = Arc::new(RecordingSession::new(Box::new(device)));
    let app = create_router(AppState::new(session));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

fn list_devices() -> Result<()> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .context("Failed to enumerate input devices")?;
    for device in devices {
        let name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        if Some(&name) == default_name.as_ref() {
            println!("{} (default)", name);
        } else {
            println!("{}", name);
        }
    }

    Ok(())
}
