//! Discovery and lifecycle management for USB-attached Bluetooth Low
//! Energy dongles.
//!
//! This library watches the host for supported probe hardware, classifies
//! each device by its serial number, binds it to the right driver
//! generation, and maintains an event-driven registry of the adapters
//! present right now. The [`engine::DongleHub`] handle is the front door:
//! start it once per process, then query mappings or subscribe to
//! lifecycle events.
//!
//! # Example
//!
//! Discovery over the scripted mock backend; on real hardware the serial
//! backends take its place (`DriverRegistry::serial()`):
//!
//! ```
//! use std::sync::Arc;
//!
//! use dongle_hub::driver::mock::MockDongleDriver;
//! use dongle_hub::driver::DongleDriver;
//! use dongle_hub::{DeviceDescriptor, DiscoveryConfig, DongleHub, DriverRegistry};
//!
//! # tokio_test::block_on(async {
//! let scripted = Arc::new(MockDongleDriver::new());
//! scripted
//!     .push_scan(vec![DeviceDescriptor::with_serial("680123456")])
//!     .await;
//!
//! let drivers = DriverRegistry::new(
//!     Arc::new(MockDongleDriver::new()),
//!     Arc::clone(&scripted) as Arc<dyn DongleDriver>,
//! );
//! let hub = DongleHub::start(drivers, DiscoveryConfig::default())?;
//!
//! let adapters = hub.adapters().await?;
//! assert!(adapters.contains_key("680123456"));
//!
//! hub.shutdown().await?;
//! # Ok::<(), dongle_hub::DongleError>(())
//! # }).unwrap();
//! ```

pub mod adapter;
pub mod advisory;
pub mod classify;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod events;
pub mod gatt;
pub mod registry;

pub use adapter::{Adapter, AdapterEvent};
pub use config::DiscoveryConfig;
pub use driver::{DeviceDescriptor, DriverGeneration, DriverRegistry};
pub use engine::{AdapterMap, DongleHub};
pub use error::{ClassifyError, DongleError, Result};
pub use events::DongleEvent;
