//! Probe identification and serial-number classification.
//!
//! Pure functions over [`DeviceDescriptor`]: no I/O, no state. The engine
//! calls these once per enumerated device each reconciliation pass.
//!
//! Identity: a device's instance id is its serial number when present,
//! otherwise its communication-port name. A device with neither cannot be
//! tracked and is rejected with [`ClassifyError::MissingInstanceId`].
//!
//! Classification reads the Segger-style serial number: a `68` marker
//! followed by a revision digit and six more digits. Revision digits 0 and 1
//! are SoftDevice API v2 hardware, 2 and 3 are v3; any other digit is a
//! probe revision this crate has no driver for. Serial numbers without the
//! marker shape belong to some other vendor entirely.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::driver::{DeviceDescriptor, DriverGeneration};
use crate::error::ClassifyError;

/// Marker + revision digit + six trailing digits, anchored at the end so
/// OS-prefixed serial strings still match.
static SEGGER_SERIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.*68([0-9])[0-9]{6}$").expect("pattern is valid"));

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Stable identity for one device: serial number, falling back to the port
/// name when the OS reports no serial.
pub fn instance_id(descriptor: &DeviceDescriptor) -> Result<String, ClassifyError> {
    non_empty(&descriptor.serial_number)
        .or_else(|| non_empty(&descriptor.port))
        .map(str::to_owned)
        .ok_or(ClassifyError::MissingInstanceId)
}

/// Decide which driver generation owns `descriptor`.
///
/// Classification runs on the instance id, so port-named devices go through
/// the same table (and typically land in [`ClassifyError::UnknownVendor`]).
pub fn classify(descriptor: &DeviceDescriptor) -> Result<DriverGeneration, ClassifyError> {
    let id = instance_id(descriptor)?;

    let captures = SEGGER_SERIAL
        .captures(&id)
        .ok_or_else(|| ClassifyError::UnknownVendor(id.clone()))?;

    // Single ASCII digit by construction of the pattern.
    let digit = captures[1].as_bytes()[0] - b'0';
    match digit {
        0 | 1 => Ok(DriverGeneration::SdApiV2),
        2 | 3 => Ok(DriverGeneration::SdApiV3),
        _ => Err(ClassifyError::UnsupportedHardware {
            instance_id: id,
            digit,
        }),
    }
}
