//! Engine-level lifecycle events and the fan-out plumbing behind them.
//!
//! Subscribers see one enumerated event kind per lifecycle transition, each
//! carrying the affected handle (or the error). Per-handle open/close
//! transitions are re-emitted at engine level by a forwarding task that
//! lives exactly as long as the handle is registered: once a device is
//! removed, its forwarder is torn down first, so a stale handle can never
//! reach the engine stream again.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::adapter::{Adapter, AdapterEvent};
use crate::error::DongleError;

/// One lifecycle transition observed by the discovery engine.
#[derive(Debug, Clone)]
pub enum DongleEvent {
    /// A probe appeared and passed classification.
    Added(Arc<Adapter>),
    /// A registered probe vanished from enumeration.
    Removed(Arc<Adapter>),
    /// A registered handle's transport session opened.
    AdapterOpened(Arc<Adapter>),
    /// A registered handle's transport session closed.
    AdapterClosed(Arc<Adapter>),
    /// A cycle-level or per-device failure.
    Error(Arc<DongleError>),
}

impl DongleEvent {
    /// Short tag for logs and the scan tool.
    pub fn label(&self) -> &'static str {
        match self {
            DongleEvent::Added(_) => "added",
            DongleEvent::Removed(_) => "removed",
            DongleEvent::AdapterOpened(_) => "opened",
            DongleEvent::AdapterClosed(_) => "closed",
            DongleEvent::Error(_) => "error",
        }
    }
}

/// Owns the engine's broadcast sender and one forwarding task per
/// registered handle.
pub(crate) struct LifecycleBroadcaster {
    events_tx: broadcast::Sender<DongleEvent>,
    forwarders: HashMap<String, JoinHandle<()>>,
}

impl LifecycleBroadcaster {
    pub(crate) fn new(events_tx: broadcast::Sender<DongleEvent>) -> Self {
        Self {
            events_tx,
            forwarders: HashMap::new(),
        }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub(crate) fn emit(&self, event: DongleEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Start re-emitting `adapter`'s session transitions at engine level.
    pub(crate) fn attach(&mut self, adapter: &Arc<Adapter>) {
        let mut session_rx = adapter.subscribe();
        let events_tx = self.events_tx.clone();
        let handle_ref = Arc::clone(adapter);

        let forwarder = tokio::spawn(async move {
            loop {
                match session_rx.recv().await {
                    Ok(AdapterEvent::Opened) => {
                        let _ = events_tx.send(DongleEvent::AdapterOpened(Arc::clone(&handle_ref)));
                    }
                    Ok(AdapterEvent::Closed) => {
                        let _ = events_tx.send(DongleEvent::AdapterClosed(Arc::clone(&handle_ref)));
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(
                            "Session feed for '{}' lagged by {missed} events",
                            handle_ref.instance_id()
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        debug!("Forwarding session events for '{}'", adapter.instance_id());
        self.forwarders
            .insert(adapter.instance_id().to_string(), forwarder);
    }

    /// Stop forwarding for `instance_id` and wait until the task is gone.
    pub(crate) async fn detach(&mut self, instance_id: &str) {
        if let Some(forwarder) = self.forwarders.remove(instance_id) {
            forwarder.abort();
            let _ = forwarder.await;
            debug!("Stopped forwarding session events for '{instance_id}'");
        }
    }

    /// Tear down every forwarder, for engine shutdown.
    pub(crate) async fn shutdown(&mut self) {
        for (_, forwarder) in self.forwarders.drain() {
            forwarder.abort();
            let _ = forwarder.await;
        }
    }
}
