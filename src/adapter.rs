//! The logical adapter handle.
//!
//! One [`Adapter`] exists per attached probe, created by the registry when a
//! device first appears and dropped when it vanishes. The handle carries the
//! device's identity and classification, any platform advisory, and the
//! generation-specific transport. Identity fields never change after
//! construction; only the session state does.
//!
//! Open/close transitions are published on the handle's own broadcast
//! channel. The discovery engine taps that feed and re-emits the
//! transitions as engine-level lifecycle events while the handle is
//! registered.

use std::fmt;

use log::{debug, info};
use tokio::sync::broadcast;

use crate::driver::{DeviceDescriptor, DongleTransport, DriverGeneration};
use crate::error::{DongleError, Result};

/// Capacity of a handle's own event channel. Transitions are rare, so a
/// small buffer is plenty.
const ADAPTER_EVENT_CAPACITY: usize = 16;

/// Session transition on one adapter handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterEvent {
    Opened,
    Closed,
}

/// A discovered probe, bound to its generation's transport.
pub struct Adapter {
    instance_id: String,
    generation: DriverGeneration,
    port: Option<String>,
    serial_number: Option<String>,
    manufacturer: Option<String>,
    advisory: Option<String>,
    transport: Box<dyn DongleTransport>,
    events_tx: broadcast::Sender<AdapterEvent>,
}

impl Adapter {
    /// Build a handle for a classified device.
    pub(crate) fn new(
        instance_id: String,
        generation: DriverGeneration,
        descriptor: &DeviceDescriptor,
        advisory: Option<String>,
        transport: Box<dyn DongleTransport>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(ADAPTER_EVENT_CAPACITY);
        Self {
            instance_id,
            generation,
            port: descriptor.port.clone(),
            serial_number: descriptor.serial_number.clone(),
            manufacturer: descriptor.manufacturer.clone(),
            advisory,
            transport,
            events_tx,
        }
    }

    /// Stable identity: serial number, or port name for serial-less devices.
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// The driver generation this probe was classified into.
    pub fn generation(&self) -> DriverGeneration {
        self.generation
    }

    /// Communication-port name, when the descriptor carried one.
    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn manufacturer(&self) -> Option<&str> {
        self.manufacturer.as_deref()
    }

    /// Platform notice attached at discovery time, if any rule matched.
    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    /// Whether the transport session is currently open.
    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Subscribe to this handle's own open/close transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<AdapterEvent> {
        self.events_tx.subscribe()
    }

    /// Open the transport session at the generation's baud rate.
    ///
    /// Fails with [`DongleError::MissingPort`] when the device enumerated
    /// without a communication port, and with
    /// [`DongleError::AdapterAlreadyOpen`] on a second open.
    pub async fn open(&self) -> Result<()> {
        let port = self
            .port
            .as_deref()
            .ok_or_else(|| DongleError::MissingPort(self.instance_id.clone()))?;
        if self.transport.is_open() {
            return Err(DongleError::AdapterAlreadyOpen(self.instance_id.clone()));
        }

        let baud_rate = self.generation.default_baud_rate();
        self.transport
            .open(port, baud_rate)
            .await
            .map_err(|err| DongleError::Transport(format!("{err:#}")))?;

        info!(
            "Adapter '{}' opened on {} at {} baud",
            self.instance_id, port, baud_rate
        );
        // Send only fails with no subscribers, which is fine.
        let _ = self.events_tx.send(AdapterEvent::Opened);
        Ok(())
    }

    /// Close the transport session.
    pub async fn close(&self) -> Result<()> {
        if !self.transport.is_open() {
            return Err(DongleError::AdapterNotOpen(self.instance_id.clone()));
        }

        self.transport
            .close()
            .await
            .map_err(|err| DongleError::Transport(format!("{err:#}")))?;

        debug!("Adapter '{}' closed", self.instance_id);
        let _ = self.events_tx.send(AdapterEvent::Closed);
        Ok(())
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("instance_id", &self.instance_id)
            .field("generation", &self.generation)
            .field("port", &self.port)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockTransport;

    fn test_adapter(port: Option<&str>) -> Adapter {
        let descriptor = DeviceDescriptor {
            serial_number: Some("680123456".to_string()),
            port: port.map(str::to_owned),
            manufacturer: Some("SEGGER".to_string()),
        };
        Adapter::new(
            "680123456".to_string(),
            DriverGeneration::SdApiV2,
            &descriptor,
            None,
            Box::new(MockTransport::new()),
        )
    }

    #[tokio::test]
    async fn test_open_and_close_emit_events() {
        let adapter = test_adapter(Some("/dev/ttyACM0"));
        let mut events = adapter.subscribe();

        adapter.open().await.unwrap();
        assert!(adapter.is_open());
        assert_eq!(events.recv().await.unwrap(), AdapterEvent::Opened);

        adapter.close().await.unwrap();
        assert!(!adapter.is_open());
        assert_eq!(events.recv().await.unwrap(), AdapterEvent::Closed);
    }

    #[tokio::test]
    async fn test_open_without_port_fails() {
        let adapter = test_adapter(None);
        let err = adapter.open().await.unwrap_err();
        assert!(matches!(err, DongleError::MissingPort(_)));
        assert!(!adapter.is_open());
    }

    #[tokio::test]
    async fn test_double_open_fails() {
        let adapter = test_adapter(Some("/dev/ttyACM0"));
        adapter.open().await.unwrap();
        let err = adapter.open().await.unwrap_err();
        assert!(matches!(err, DongleError::AdapterAlreadyOpen(_)));
    }

    #[tokio::test]
    async fn test_close_when_not_open_fails() {
        let adapter = test_adapter(Some("/dev/ttyACM0"));
        let err = adapter.close().await.unwrap_err();
        assert!(matches!(err, DongleError::AdapterNotOpen(_)));
    }

    #[tokio::test]
    async fn test_open_uses_generation_baud_rate() {
        let descriptor = DeviceDescriptor::with_serial_and_port("682000001", "/dev/ttyACM1");
        let transport = MockTransport::new();
        let opens = transport.open_calls();
        let adapter = Adapter::new(
            "682000001".to_string(),
            DriverGeneration::SdApiV3,
            &descriptor,
            None,
            Box::new(transport),
        );

        adapter.open().await.unwrap();
        let calls = opens.lock().await;
        assert_eq!(calls.as_slice(), &[("/dev/ttyACM1".to_string(), 1_000_000)]);
    }
}
