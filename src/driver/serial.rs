//! Serial-port driver backend.
//!
//! Wraps the `serialport` crate and provides async enumeration and session
//! handling using Tokio's blocking task executor for the synchronous serial
//! operations. Only USB-attached ports are reported; PCI, Bluetooth, and
//! unidentified ports are not probe hardware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::debug;
use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use tokio::sync::Mutex;

use super::{DeviceDescriptor, DongleDriver, DongleTransport, DriverGeneration};

/// Internal read timeout for opened sessions.
const SERIAL_IO_TIMEOUT: Duration = Duration::from_millis(100);

/// Enumeration and transport construction for one probe generation.
pub struct SerialDongleDriver {
    generation: DriverGeneration,
}

impl SerialDongleDriver {
    pub fn new(generation: DriverGeneration) -> Self {
        Self { generation }
    }

    /// The generation this backend constructs transports for.
    pub fn generation(&self) -> DriverGeneration {
        self.generation
    }
}

fn descriptor_from_port(info: SerialPortInfo) -> Option<DeviceDescriptor> {
    match info.port_type {
        SerialPortType::UsbPort(usb) => Some(DeviceDescriptor {
            serial_number: usb.serial_number,
            port: Some(info.port_name),
            manufacturer: usb.manufacturer,
        }),
        _ => None,
    }
}

#[async_trait]
impl DongleDriver for SerialDongleDriver {
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        // available_ports walks the OS device tree synchronously.
        let ports = tokio::task::spawn_blocking(serialport::available_ports)
            .await
            .context("Port enumeration task panicked")?
            .context("Failed to enumerate serial ports")?;

        let descriptors: Vec<DeviceDescriptor> =
            ports.into_iter().filter_map(descriptor_from_port).collect();
        debug!(
            "Serial enumeration ({}) found {} USB ports",
            self.generation,
            descriptors.len()
        );
        Ok(descriptors)
    }

    fn create_transport(&self) -> Box<dyn DongleTransport> {
        Box::new(SerialTransport::new())
    }
}

/// Com-port session for one probe.
///
/// The port handle lives behind an async mutex; all blocking serial calls
/// run on the blocking pool with `blocking_lock`.
pub struct SerialTransport {
    port: Arc<Mutex<Option<Box<dyn SerialPort>>>>,
    open: AtomicBool,
}

impl SerialTransport {
    pub fn new() -> Self {
        Self {
            port: Arc::new(Mutex::new(None)),
            open: AtomicBool::new(false),
        }
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DongleTransport for SerialTransport {
    async fn open(&self, port: &str, baud_rate: u32) -> Result<()> {
        let port_name = port.to_string();
        let slot = Arc::clone(&self.port);

        tokio::task::spawn_blocking(move || {
            let mut guard = slot.blocking_lock();
            if guard.is_some() {
                bail!("Serial session already open");
            }

            let handle = serialport::new(&port_name, baud_rate)
                .timeout(SERIAL_IO_TIMEOUT)
                .open()
                .with_context(|| {
                    format!("Failed to open serial port '{port_name}' at {baud_rate} baud")
                })?;

            *guard = Some(handle);
            debug!("Serial port '{port_name}' opened at {baud_rate} baud");
            Ok(())
        })
        .await
        .context("Serial open task panicked")??;

        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let slot = Arc::clone(&self.port);

        tokio::task::spawn_blocking(move || {
            // Dropping the handle releases the OS port.
            if slot.blocking_lock().take().is_some() {
                debug!("Serial session closed");
            }
        })
        .await
        .context("Serial close task panicked")?;

        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::UsbPortInfo;

    #[test]
    fn test_usb_port_maps_to_descriptor() {
        let info = SerialPortInfo {
            port_name: "/dev/ttyACM0".to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x1366,
                pid: 0x1015,
                serial_number: Some("000680123456".to_string()),
                manufacturer: Some("SEGGER".to_string()),
                product: Some("J-Link".to_string()),
            }),
        };

        let descriptor = descriptor_from_port(info).unwrap();
        assert_eq!(descriptor.serial_number.as_deref(), Some("000680123456"));
        assert_eq!(descriptor.port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(descriptor.manufacturer.as_deref(), Some("SEGGER"));
    }

    #[test]
    fn test_non_usb_ports_are_skipped() {
        let info = SerialPortInfo {
            port_name: "/dev/ttyS0".to_string(),
            port_type: SerialPortType::Unknown,
        };
        assert!(descriptor_from_port(info).is_none());
    }

    #[test]
    fn test_transport_starts_closed() {
        let transport = SerialTransport::new();
        assert!(!transport.is_open());
    }
}
