use clap::Parser;
use snappy_web_agent::{
    config::ConfigLoader, logging, port_alloc, server, AgentState, Bridge, DeviceManager,
    ServerContext, UsbSerialSource,
};
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Streams Snappy receiver readings to local WebSocket clients.",
    long_about = "Finds the Snappy USB receiver, decrypts its serial frames and pushes the readings to clients connected on the first free port in 8436-8535. Runs until terminated; takes no arguments when started as a service."
)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let loader = ConfigLoader::load(args.config.as_deref())?;
    let config_path = loader.config_path.clone();
    let config = loader.into_config();

    logging::init(&config.logging);
    match config_path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("No configuration file found, using defaults"),
    }

    let state = AgentState::new();
    let bridge = Bridge::new(state, config.server.event_buffer);

    let server_cfg = &config.server;
    let (listener, port) =
        match port_alloc::allocate(&server_cfg.host, server_cfg.base_port, server_cfg.port_span).await {
            Ok(bound) => bound,
            Err(e) => {
                error!("{}", e);
                return Err(e.into());
            }
        };
    info!("Snappy web agent listening on {}:{}", server_cfg.host, port);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let source = UsbSerialSource::new(config.device.clone());
    let manager = DeviceManager::new(source, bridge.clone(), config.device.clone(), config.cipher.seed)
        .spawn(shutdown_rx.clone());

    let ctx = ServerContext::new(bridge, config.device.clone());
    let served = tokio::select! {
        result = server::serve(listener, ctx, shutdown_rx) => result,
        _ = shutdown_signal() => Ok(()),
    };

    // The device loop notices within one read timeout and closes the port.
    let _ = shutdown_tx.send(true);
    if let Err(e) = manager.await {
        error!("Device manager task failed: {}", e);
    }

    served?;
    info!("Snappy web agent stopped");
    Ok(())
}

// --- Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, shutting down");
}
