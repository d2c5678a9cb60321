//! Mock driver backend.
//!
//! Provides a scripted stand-in for the serial backend so the engine and
//! its callers can be exercised without hardware. All operations are
//! async-safe and cheap.
//!
//! # Available Mocks
//!
//! - `MockDongleDriver` - Scripted device enumeration (device sets or
//!   injected failures, in order; the last set repeats once the script is
//!   drained)
//! - `MockTransport` - Session object recording open/close calls

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;

use super::{DeviceDescriptor, DongleDriver, DongleTransport};

// =============================================================================
// MockDongleDriver - Scripted Enumeration
// =============================================================================

enum ScanStep {
    Devices(Vec<DeviceDescriptor>),
    Failure(String),
}

/// Scripted enumeration backend.
///
/// Each `enumerate` call consumes the next scripted step. Device steps
/// become the new steady-state answer; once the script is drained, the most
/// recent device set repeats. Failure steps produce an error without
/// changing the steady state.
#[derive(Default)]
pub struct MockDongleDriver {
    script: Mutex<VecDeque<ScanStep>>,
    steady: Mutex<Vec<DeviceDescriptor>>,
}

impl MockDongleDriver {
    /// Driver that enumerates nothing until scripted otherwise.
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver whose every enumeration reports `devices`.
    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            steady: Mutex::new(devices),
        }
    }

    /// Queue a device set for the next enumeration.
    pub async fn push_scan(&self, devices: Vec<DeviceDescriptor>) {
        self.script.lock().await.push_back(ScanStep::Devices(devices));
    }

    /// Queue an enumeration failure.
    pub async fn push_failure(&self, message: impl Into<String>) {
        self.script
            .lock()
            .await
            .push_back(ScanStep::Failure(message.into()));
    }
}

#[async_trait]
impl DongleDriver for MockDongleDriver {
    async fn enumerate(&self) -> Result<Vec<DeviceDescriptor>> {
        let step = self.script.lock().await.pop_front();
        match step {
            Some(ScanStep::Devices(devices)) => {
                debug!("MockDongleDriver: scripted scan with {} devices", devices.len());
                *self.steady.lock().await = devices.clone();
                Ok(devices)
            }
            Some(ScanStep::Failure(message)) => {
                debug!("MockDongleDriver: scripted failure '{message}'");
                bail!(message)
            }
            None => Ok(self.steady.lock().await.clone()),
        }
    }

    fn create_transport(&self) -> Box<dyn DongleTransport> {
        Box::new(MockTransport::new())
    }
}

// =============================================================================
// MockTransport - Recording Session
// =============================================================================

/// Transport that records its open/close history.
#[derive(Default)]
pub struct MockTransport {
    open: Arc<AtomicBool>,
    open_calls: Arc<Mutex<Vec<(String, u32)>>>,
    close_count: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared record of `(port, baud_rate)` pairs passed to `open`.
    pub fn open_calls(&self) -> Arc<Mutex<Vec<(String, u32)>>> {
        Arc::clone(&self.open_calls)
    }

    /// Number of completed `close` calls.
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DongleTransport for MockTransport {
    async fn open(&self, port: &str, baud_rate: u32) -> Result<()> {
        if self.open.swap(true, Ordering::SeqCst) {
            bail!("MockTransport: already open");
        }
        self.open_calls
            .lock()
            .await
            .push((port.to_string(), baud_rate));
        debug!("MockTransport: opened {port} at {baud_rate} baud");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // Closing an unopened session is a no-op per the trait contract.
        if self.open.swap(false, Ordering::SeqCst) {
            self.close_count.fetch_add(1, Ordering::SeqCst);
            debug!("MockTransport: closed");
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
