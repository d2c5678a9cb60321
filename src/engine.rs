//! The discovery engine and its public handle.
//!
//! All registry mutation happens in a single async task that processes
//! commands via message-passing, so reconciliation passes never interleave:
//! a trigger arriving while a cycle runs waits in the mailbox and runs
//! afterwards. The task also owns the poll timer; a background cycle and an
//! on-demand cycle are the same code path.
//!
//! [`DongleHub`] is the clonable public handle. The engine is process-wide:
//! starting a second one while the first is alive fails, and
//! [`DongleHub::instance`] hands out handles to the running engine.
//! Dropping every handle winds the engine down; [`DongleHub::shutdown`]
//! does so explicitly and releases the process slot for a later start.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use log::{debug, error, info};
use once_cell::sync::Lazy;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::BroadcastStream;

use crate::adapter::Adapter;
use crate::config::DiscoveryConfig;
use crate::driver::DriverRegistry;
use crate::error::{DongleError, Result};
use crate::events::{DongleEvent, LifecycleBroadcaster};
use crate::registry::AdapterRegistry;

/// Snapshot of the live mapping, keyed by device instance id.
pub type AdapterMap = HashMap<String, Arc<Adapter>>;

/// Commands processed by the engine task.
#[derive(Debug)]
enum EngineCommand {
    /// Run a discovery cycle now and answer with the resulting mapping.
    Reconcile {
        response: oneshot::Sender<Result<AdapterMap>>,
    },

    /// Read the current mapping without rescanning.
    Snapshot {
        response: oneshot::Sender<AdapterMap>,
    },

    /// Stop the scheduler.
    Shutdown { response: oneshot::Sender<()> },
}

impl EngineCommand {
    fn reconcile() -> (Self, oneshot::Receiver<Result<AdapterMap>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Reconcile { response: tx }, rx)
    }

    fn snapshot() -> (Self, oneshot::Receiver<AdapterMap>) {
        let (tx, rx) = oneshot::channel();
        (Self::Snapshot { response: tx }, rx)
    }

    fn shutdown() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::Shutdown { response: tx }, rx)
    }
}

/// Actor that owns the registry and runs discovery cycles.
struct DiscoveryEngine {
    drivers: DriverRegistry,
    registry: AdapterRegistry,
    broadcaster: LifecycleBroadcaster,
}

impl DiscoveryEngine {
    /// Event loop: fixed-interval ticks plus the command mailbox.
    ///
    /// The first background cycle runs one full interval after start; an
    /// immediate population is one `Reconcile` command away.
    async fn run(mut self, mut command_rx: mpsc::Receiver<EngineCommand>, poll_interval: Duration) {
        info!("Discovery engine started (poll interval {poll_interval:?})");

        let start = tokio::time::Instant::now() + poll_interval;
        let mut ticker = tokio::time::interval_at(start, poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures were already published on the event stream.
                    if let Err(err) = self.run_cycle().await {
                        debug!("Background discovery cycle failed: {err}");
                    }
                }
                command = command_rx.recv() => {
                    match command {
                        Some(EngineCommand::Reconcile { response }) => {
                            let result = self
                                .run_cycle()
                                .await
                                .map(|()| self.registry.snapshot());
                            let _ = response.send(result);
                        }

                        Some(EngineCommand::Snapshot { response }) => {
                            let _ = response.send(self.registry.snapshot());
                        }

                        Some(EngineCommand::Shutdown { response }) => {
                            info!("Discovery engine shutdown requested");
                            let _ = response.send(());
                            break;
                        }

                        None => {
                            debug!("All engine handles dropped");
                            break;
                        }
                    }
                }
            }
        }

        self.broadcaster.shutdown().await;
        info!("Discovery engine stopped ({} adapters registered)", self.registry.len());
    }

    /// One discovery cycle: enumerate, diff, publish.
    ///
    /// An enumeration failure aborts the cycle with the registry untouched.
    /// Per-device classification failures skip that device only.
    async fn run_cycle(&mut self) -> Result<()> {
        let descriptors = match self.drivers.enumerate().await {
            Ok(descriptors) => descriptors,
            Err(err) => {
                let message = format!("{err:#}");
                error!("Device enumeration failed: {message}");
                self.broadcaster
                    .emit(DongleEvent::Error(Arc::new(DongleError::Enumeration(
                        message.clone(),
                    ))));
                return Err(DongleError::Enumeration(message));
            }
        };

        let report = self.registry.reconcile(&descriptors, &self.drivers);

        // Sever forwarding before anything is announced, so a removed
        // handle cannot slip one more session event onto the stream.
        for adapter in &report.removed {
            self.broadcaster.detach(adapter.instance_id()).await;
        }
        for adapter in &report.added {
            self.broadcaster.attach(adapter);
        }

        for adapter in report.added {
            self.broadcaster.emit(DongleEvent::Added(adapter));
        }
        for adapter in report.removed {
            self.broadcaster.emit(DongleEvent::Removed(adapter));
        }
        for err in report.skipped {
            self.broadcaster
                .emit(DongleEvent::Error(Arc::new(DongleError::Classification(err))));
        }

        Ok(())
    }
}

/// Channel ends shared by every hub handle.
#[derive(Debug)]
struct HubShared {
    command_tx: mpsc::Sender<EngineCommand>,
    events_tx: broadcast::Sender<DongleEvent>,
}

/// The process-wide engine slot. Holds a weak reference so dropped handles
/// release it on their own.
static ACTIVE_ENGINE: Lazy<StdMutex<Weak<HubShared>>> = Lazy::new(|| StdMutex::new(Weak::new()));

/// The slot lock never wraps user code, so a poisoned guard is still sound.
fn slot_guard() -> MutexGuard<'static, Weak<HubShared>> {
    ACTIVE_ENGINE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn release_slot(shared: &Arc<HubShared>) {
    let mut slot = slot_guard();
    if let Some(current) = slot.upgrade() {
        if Arc::ptr_eq(&current, shared) {
            *slot = Weak::new();
        }
    }
}

/// Clonable handle to the running discovery engine.
#[derive(Debug, Clone)]
pub struct DongleHub {
    shared: Arc<HubShared>,
}

impl DongleHub {
    /// Start the process-wide engine.
    ///
    /// Must be called within a Tokio runtime. Fails with
    /// [`DongleError::EngineAlreadyRunning`] while another engine is alive.
    pub fn start(drivers: DriverRegistry, config: DiscoveryConfig) -> Result<Self> {
        config.validate()?;

        let mut slot = slot_guard();
        if slot.upgrade().is_some() {
            return Err(DongleError::EngineAlreadyRunning);
        }

        let (events_tx, _) = broadcast::channel(config.event_capacity);
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity);

        let engine = DiscoveryEngine {
            drivers,
            registry: AdapterRegistry::new(config.advisory_table()),
            broadcaster: LifecycleBroadcaster::new(events_tx.clone()),
        };

        let shared = Arc::new(HubShared {
            command_tx,
            events_tx,
        });
        *slot = Arc::downgrade(&shared);
        drop(slot);

        tokio::spawn(engine.run(command_rx, config.poll_interval));
        Ok(Self { shared })
    }

    /// Handle to the already-running engine.
    pub fn instance() -> Result<Self> {
        slot_guard()
            .upgrade()
            .map(|shared| Self { shared })
            .ok_or(DongleError::EngineNotRunning)
    }

    /// Trigger a discovery cycle and return the resulting mapping.
    ///
    /// The triggering caller gets exactly one answer: the fresh mapping, or
    /// the error that aborted the cycle.
    pub async fn adapters(&self) -> Result<AdapterMap> {
        let (command, response_rx) = EngineCommand::reconcile();
        self.shared
            .command_tx
            .send(command)
            .await
            .map_err(|_| DongleError::EngineStopped)?;
        response_rx.await.map_err(|_| DongleError::EngineStopped)?
    }

    /// Read the current mapping without rescanning.
    pub async fn snapshot(&self) -> Result<AdapterMap> {
        let (command, response_rx) = EngineCommand::snapshot();
        self.shared
            .command_tx
            .send(command)
            .await
            .map_err(|_| DongleError::EngineStopped)?;
        response_rx.await.map_err(|_| DongleError::EngineStopped)
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<DongleEvent> {
        self.shared.events_tx.subscribe()
    }

    /// Lifecycle events as a `Stream`, for `while let`-style consumers.
    pub fn event_stream(&self) -> BroadcastStream<DongleEvent> {
        BroadcastStream::new(self.subscribe())
    }

    /// Stop the engine and release the process slot.
    ///
    /// Handles kept around afterwards answer [`DongleError::EngineStopped`].
    pub async fn shutdown(&self) -> Result<()> {
        let (command, ack_rx) = EngineCommand::shutdown();
        self.shared
            .command_tx
            .send(command)
            .await
            .map_err(|_| DongleError::EngineStopped)?;
        ack_rx.await.map_err(|_| DongleError::EngineStopped)?;
        release_slot(&self.shared);
        Ok(())
    }
}
