//! Driver backends and the generation registry.
//!
//! The discovery engine never talks to hardware directly. It goes through
//! two trait seams:
//! - [`DongleDriver`] enumerates attached probe hardware and constructs
//!   transports for its generation.
//! - [`DongleTransport`] is the opaque per-device session an [`crate::adapter::Adapter`]
//!   opens and closes.
//!
//! [`DriverRegistry`] holds exactly one driver per [`DriverGeneration`] and
//! selects by enum variant. Backends:
//! - `serial`: real com-port enumeration via the `serialport` crate
//!   (feature `serial_enumeration`, default on).
//! - `mock`: scripted in-process backend for tests and hardware-free runs.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod mock;
#[cfg(feature = "serial_enumeration")]
pub mod serial;

/// Raw record for one enumerated device, as reported by the driver layer.
///
/// Every field is optional; identification and classification decide what to
/// make of partial records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Probe serial number, when the OS exposes one.
    pub serial_number: Option<String>,
    /// Communication-port name (e.g. `/dev/ttyACM0`, `COM7`).
    pub port: Option<String>,
    /// Manufacturer string, used for platform advisories only.
    pub manufacturer: Option<String>,
}

impl DeviceDescriptor {
    /// Descriptor with only a serial number, common in tests.
    pub fn with_serial(serial: impl Into<String>) -> Self {
        Self {
            serial_number: Some(serial.into()),
            ..Self::default()
        }
    }

    /// Descriptor with a serial number and a communication port.
    pub fn with_serial_and_port(serial: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            serial_number: Some(serial.into()),
            port: Some(port.into()),
            manufacturer: None,
        }
    }
}

/// Probe hardware generation, deciding which driver backend owns a device.
///
/// The set is closed: adding a generation is a code change here, not a
/// runtime registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverGeneration {
    /// First supported generation (SoftDevice API v2 probes).
    SdApiV2,
    /// Second supported generation (SoftDevice API v3 probes).
    SdApiV3,
}

impl DriverGeneration {
    /// Short tag used in logs and the scan tool output.
    pub fn as_str(&self) -> &'static str {
        match self {
            DriverGeneration::SdApiV2 => "v2",
            DriverGeneration::SdApiV3 => "v3",
        }
    }

    /// Conventional UART baud rate for this generation's probes.
    pub fn default_baud_rate(&self) -> u32 {
        match self {
            DriverGeneration::SdApiV2 => 115_200,
            DriverGeneration::SdApiV3 => 1_000_000,
        }
    }

    /// The newest generation, whose enumeration backend covers all probes.
    pub fn newest() -> Self {
        DriverGeneration::SdApiV3
    }
}

impl fmt::Display for DriverGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One probe-generation driver backend.
#[async_trait]
pub trait DongleDriver: Send + Sync {
    /// List currently attached devices. Resolves once with the full set;
    /// a failure here aborts the caller's discovery cycle.
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>>;

    /// Construct a fresh, unopened transport for one device of this
    /// generation.
    fn create_transport(&self) -> Box<dyn DongleTransport>;
}

/// Opaque per-device session owned by an adapter handle.
#[async_trait]
pub trait DongleTransport: Send + Sync {
    /// Open the session on `port` at `baud_rate`.
    async fn open(&self, port: &str, baud_rate: u32) -> Result<()>;

    /// Close the session. Closing an unopened session is a no-op.
    async fn close(&self) -> Result<()>;

    /// Whether the session is currently open.
    fn is_open(&self) -> bool;
}

/// Exactly one driver per generation, selected by enum variant.
#[derive(Clone)]
pub struct DriverRegistry {
    v2: Arc<dyn DongleDriver>,
    v3: Arc<dyn DongleDriver>,
}

impl DriverRegistry {
    pub fn new(v2: Arc<dyn DongleDriver>, v3: Arc<dyn DongleDriver>) -> Self {
        Self { v2, v3 }
    }

    /// Registry over the real serial-port backends.
    #[cfg(feature = "serial_enumeration")]
    pub fn serial() -> Self {
        Self::new(
            Arc::new(serial::SerialDongleDriver::new(DriverGeneration::SdApiV2)),
            Arc::new(serial::SerialDongleDriver::new(DriverGeneration::SdApiV3)),
        )
    }

    /// The driver backend owning `generation`.
    pub fn driver(&self, generation: DriverGeneration) -> Arc<dyn DongleDriver> {
        match generation {
            DriverGeneration::SdApiV2 => Arc::clone(&self.v2),
            DriverGeneration::SdApiV3 => Arc::clone(&self.v3),
        }
    }

    /// Enumerate attached devices.
    ///
    /// USB-level probe listing is generation-agnostic, so the newest
    /// generation's backend sees every probe; no merging across backends.
    pub async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        self.driver(DriverGeneration::newest()).enumerate().await
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry").finish_non_exhaustive()
    }
}
