//! Error types for dongle discovery and lifecycle management.
//!
//! Two tiers of errors exist, matching how the discovery engine treats them:
//!
//! - [`ClassifyError`] is per-device and non-fatal. A probe that cannot be
//!   identified or classified is skipped for the current reconciliation pass
//!   and reported as an [`crate::events::DongleEvent::Error`] event; the rest
//!   of the pass proceeds.
//! - [`DongleError`] is the crate-level error. It covers configuration and
//!   I/O failures, driver enumeration failures (which abort one discovery
//!   cycle without touching the registry), engine lifecycle misuse (starting
//!   a second engine, asking for the engine before it exists), and adapter
//!   session misuse (opening an already open handle, opening a handle whose
//!   descriptor carried no communication port).
//!
//! `#[from]` conversions let `?` lift figment, I/O, and classification
//! errors into `DongleError` without boilerplate.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, DongleError>;

/// Per-device identification/classification failure.
///
/// These never abort a reconciliation pass; the offending device is skipped
/// and the error is surfaced on the event stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("Device has neither a serial number nor a communication port")]
    MissingInstanceId,

    #[error("Serial number '{0}' does not match any known probe vendor")]
    UnknownVendor(String),

    #[error("Probe '{instance_id}' reports unsupported hardware revision digit {digit}")]
    UnsupportedHardware {
        /// Identity of the offending device.
        instance_id: String,
        /// The revision digit captured from the serial number.
        digit: u8,
    },
}

#[derive(Error, Debug)]
pub enum DongleError {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device classification error: {0}")]
    Classification(#[from] ClassifyError),

    #[error("Device enumeration failed: {0}")]
    Enumeration(String),

    #[error("A discovery engine is already running in this process")]
    EngineAlreadyRunning,

    #[error("No discovery engine is running in this process")]
    EngineNotRunning,

    #[error("Discovery engine stopped before answering")]
    EngineStopped,

    #[error("Adapter '{0}' has no communication port to open")]
    MissingPort(String),

    #[error("Adapter '{0}' is already open")]
    AdapterAlreadyOpen(String),

    #[error("Adapter '{0}' is not open")]
    AdapterNotOpen(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
