//! Airlock host: the authoritative simulation an elected peer runs, the
//! tick driver that decides when it runs, and the relay link a headless
//! peer uses to join a room.

pub mod abilities;
pub mod config;
pub mod devices;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod incubation;
pub mod pet_ai;
pub mod phases;
pub mod physics;
pub mod relay_link;
pub mod roles;
pub mod simulation;
pub mod votes;
pub mod world;

use std::time::Duration;

use tokio::sync::mpsc;

use airlock_core::directory::Replica;
use airlock_core::peer::PeerProfile;

use config::HostConfig;
use driver::{DriverCommand, DriverState, HostTickDriver};
use error::HostError;
use relay_link::RelayLink;

/// Join the configured relay room and run the tick driver until `commands`
/// says stop or the connection drops.
pub async fn run_peer(
    config: HostConfig,
    driver: &HostTickDriver,
    commands: mpsc::UnboundedReceiver<DriverCommand>,
) -> Result<(), HostError> {
    config.validate()?;
    let registration = driver.register()?;

    let profile = PeerProfile {
        name: config.name.clone(),
    };
    let link = RelayLink::connect(&config.relay_url, &config.room_code, &profile).await?;
    tracing::info!(room = %link.room_code(), name = %profile.name, "Peer online");

    let tick = Duration::from_millis(config.tuning.tick_ms);
    let replica = Replica::new(link, profile, &config.room);
    let state = DriverState::new(replica, config);
    driver::run(registration, state, tick, commands).await?;
    Ok(())
}
