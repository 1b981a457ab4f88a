use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use airlock_host::config::HostConfig;
use airlock_host::driver::{DriverCommand, HostTickDriver};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = HostConfig::load();
    tracing::info!(relay = %config.relay_url, room = %config.room_code, "Airlock peer starting");

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, leaving room");
            let _ = tx.send(DriverCommand::Stop);
        }
    });

    let driver = HostTickDriver::new();
    if let Err(e) = airlock_host::run_peer(config, &driver, rx).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
