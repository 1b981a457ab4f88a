//! The single fixed-rate tick source of a peer process.
//!
//! Every tick pumps the replica, runs the peer-side reactions (vote reset,
//! summon), and, while this peer is the elected host, one simulation tick.
//! Only one driver may be active per process; [`HostTickDriver::register`]
//! hands out a [`DriverRegistration`] that releases the slot when dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use airlock_core::directory::{ConnectionError, PeerLink, Replica, RoomDirectory};
use airlock_core::time::{EpochMs, epoch_millis};

use crate::config::HostConfig;
use crate::error::DriverError;
use crate::simulation::{HostSimulation, TickReport};

/// Owner of the "one active driver" slot.
#[derive(Debug, Clone, Default)]
pub struct HostTickDriver {
    active: Arc<AtomicBool>,
}

impl HostTickDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the driver slot. Fails if another registration is still alive.
    pub fn register(&self) -> Result<DriverRegistration, DriverError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DriverError::AlreadyActive)?;
        Ok(DriverRegistration {
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Proof of holding the driver slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct DriverRegistration {
    active: Arc<AtomicBool>,
}

impl Drop for DriverRegistration {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Commands sent to a running driver loop.
#[derive(Debug)]
pub enum DriverCommand {
    Stop,
}

/// Replica plus the host simulation, which only exists while elected.
pub struct DriverState<L: PeerLink> {
    replica: Replica<L>,
    config: HostConfig,
    sim: Option<HostSimulation>,
    seed: Option<u64>,
}

impl<L: PeerLink> DriverState<L> {
    pub fn new(replica: Replica<L>, config: HostConfig) -> Self {
        Self {
            replica,
            config,
            sim: None,
            seed: None,
        }
    }

    /// Use a seeded RNG for every simulation this driver starts.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn replica(&self) -> &Replica<L> {
        &self.replica
    }

    pub fn replica_mut(&mut self) -> &mut Replica<L> {
        &mut self.replica
    }

    pub fn is_simulating(&self) -> bool {
        self.sim.is_some()
    }

    /// One tick at `now`. Only transport failures are returned.
    pub fn step(&mut self, now: EpochMs) -> Result<Option<TickReport>, ConnectionError> {
        self.replica.pump()?;
        self.replica.clear_vote_after_meeting();
        self.replica.follow_summon();

        let mut report = None;
        if self.replica.is_host() {
            let config = &self.config;
            let seed = self.seed;
            let sim = self.sim.get_or_insert_with(|| {
                tracing::info!("Elected host, starting simulation");
                match seed {
                    Some(seed) => HostSimulation::with_seed(config, seed),
                    None => HostSimulation::new(config),
                }
            });
            match sim.tick(self.replica.store_mut(), now) {
                Ok(r) => report = Some(r),
                Err(e) => tracing::warn!(error = %e, "Host tick could not commit"),
            }
        } else if self.sim.take().is_some() {
            tracing::info!("No longer host, simulation dropped");
        }

        self.replica.flush()?;
        Ok(report)
    }
}

/// Drive `state` at `tick` until stopped or the link closes.
pub async fn run<L: PeerLink>(
    registration: DriverRegistration,
    mut state: DriverState<L>,
    tick: Duration,
    mut commands: mpsc::UnboundedReceiver<DriverCommand>,
) -> Result<DriverState<L>, ConnectionError> {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let result = loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = state.step(epoch_millis()) {
                    break Err(e);
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(DriverCommand::Stop) | None => {
                        tracing::info!("Tick driver stopping");
                        break Ok(());
                    }
                }
            }
        }
    };
    drop(registration);
    result.map(|()| state)
}
