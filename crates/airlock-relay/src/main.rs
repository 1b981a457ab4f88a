use tracing_subscriber::EnvFilter;

use airlock_relay::{RelayConfig, build_app};

fn arg<T: std::str::FromStr>(name: &str) -> Option<T> {
    let prefix = format!("--{name}=");
    std::env::args()
        .skip(1)
        .find_map(|a| a.strip_prefix(&prefix).and_then(|v| v.parse().ok()))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let defaults = RelayConfig::default();
    let port: u16 = arg("port").unwrap_or(8081);
    let config = RelayConfig {
        max_rooms: arg("max-rooms").unwrap_or(defaults.max_rooms),
        max_peers: arg("max-peers").unwrap_or(defaults.max_peers),
        ..defaults
    };
    let (max_rooms, max_peers) = (config.max_rooms, config.max_peers);
    let (app, _state) = build_app(config);

    let addr = format!("0.0.0.0:{port}");
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {addr}: {e}");
            std::process::exit(1);
        },
    };

    tracing::info!(max_rooms, max_peers, "Airlock relay listening on {addr}");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Relay server error: {e}");
        std::process::exit(1);
    }
}
