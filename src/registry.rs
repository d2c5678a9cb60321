//! Authoritative mapping of attached probes to adapter handles.
//!
//! The registry owns the `instance id -> Arc<Adapter>` map and the diff
//! logic that keeps it in step with what enumeration reports. Only the
//! discovery engine task holds a registry mutably, so a reconciliation pass
//! never races another.
//!
//! One pass walks the enumerated descriptors exactly once:
//! 1. every currently registered id starts as a removal candidate;
//! 2. descriptors that fail identification are skipped with an error;
//! 3. descriptors matching a registered id keep their existing handle
//!    untouched (no re-classification of known devices);
//! 4. new descriptors are classified and inserted, or skipped with an
//!    error;
//! 5. ids still flagged as candidates afterwards are torn down.
//!
//! Two equal device sets in a row therefore produce an empty report, and a
//! registered id can never acquire a second live handle.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{info, warn};

use crate::adapter::Adapter;
use crate::advisory::AdvisoryTable;
use crate::classify;
use crate::driver::{DeviceDescriptor, DriverRegistry};
use crate::error::ClassifyError;

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Handles created this pass, in enumeration order.
    pub added: Vec<Arc<Adapter>>,
    /// Handles torn down this pass.
    pub removed: Vec<Arc<Adapter>>,
    /// Per-device failures; each skipped exactly one descriptor.
    pub skipped: Vec<ClassifyError>,
}

impl ReconcileReport {
    /// True when the pass changed nothing and skipped nothing.
    pub fn is_quiet(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.skipped.is_empty()
    }
}

/// The probe registry: advisory table, platform tag, and the live mapping.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<Adapter>>,
    advisories: AdvisoryTable,
    platform: String,
}

impl AdapterRegistry {
    /// Registry for the current platform.
    pub fn new(advisories: AdvisoryTable) -> Self {
        Self::with_platform(advisories, std::env::consts::OS)
    }

    /// Registry with an explicit platform tag.
    pub fn with_platform(advisories: AdvisoryTable, platform: impl Into<String>) -> Self {
        Self {
            adapters: HashMap::new(),
            advisories,
            platform: platform.into(),
        }
    }

    /// Bring the mapping in step with `descriptors`.
    pub fn reconcile(
        &mut self,
        descriptors: &[DeviceDescriptor],
        drivers: &DriverRegistry,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut vanished: HashSet<String> = self.adapters.keys().cloned().collect();

        for descriptor in descriptors {
            let id = match classify::instance_id(descriptor) {
                Ok(id) => id,
                Err(err) => {
                    warn!("Skipping unidentifiable device: {err}");
                    report.skipped.push(err);
                    continue;
                }
            };

            // Known device: keep the existing handle, no re-classification.
            if self.adapters.contains_key(&id) {
                vanished.remove(&id);
                continue;
            }

            let generation = match classify::classify(descriptor) {
                Ok(generation) => generation,
                Err(err) => {
                    warn!("Skipping device '{id}': {err}");
                    report.skipped.push(err);
                    continue;
                }
            };

            let advisory = descriptor
                .manufacturer
                .as_deref()
                .and_then(|manufacturer| self.advisories.advisory_for(&self.platform, manufacturer))
                .map(str::to_owned);
            if let Some(notice) = advisory.as_deref() {
                info!("Advisory for '{id}': {notice}");
            }

            let transport = drivers.driver(generation).create_transport();
            let adapter = Arc::new(Adapter::new(
                id.clone(),
                generation,
                descriptor,
                advisory,
                transport,
            ));

            info!("Adapter '{id}' attached ({generation})");
            self.adapters.insert(id, Arc::clone(&adapter));
            report.added.push(adapter);
        }

        for id in vanished {
            if let Some(adapter) = self.adapters.remove(&id) {
                info!("Adapter '{id}' detached");
                report.removed.push(adapter);
            }
        }

        report
    }

    /// Owned copy of the live mapping.
    pub fn snapshot(&self) -> HashMap<String, Arc<Adapter>> {
        self.adapters.clone()
    }

    pub fn get(&self, instance_id: &str) -> Option<Arc<Adapter>> {
        self.adapters.get(instance_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockDongleDriver;
    use crate::driver::DriverGeneration;

    fn mock_drivers() -> DriverRegistry {
        DriverRegistry::new(
            Arc::new(MockDongleDriver::new()),
            Arc::new(MockDongleDriver::new()),
        )
    }

    fn registry() -> AdapterRegistry {
        AdapterRegistry::with_platform(AdvisoryTable::builtin(), "linux")
    }

    #[test]
    fn test_first_pass_adds_classified_devices() {
        let drivers = mock_drivers();
        let mut registry = registry();

        let report = registry.reconcile(
            &[
                DeviceDescriptor::with_serial("680123456"),
                DeviceDescriptor::with_serial("682000001"),
            ],
            &drivers,
        );

        assert_eq!(report.added.len(), 2);
        assert!(report.removed.is_empty());
        assert!(report.skipped.is_empty());
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("680123456").unwrap().generation(),
            DriverGeneration::SdApiV2
        );
        assert_eq!(
            registry.get("682000001").unwrap().generation(),
            DriverGeneration::SdApiV3
        );
    }

    #[test]
    fn test_steady_state_is_quiet() {
        let drivers = mock_drivers();
        let mut registry = registry();
        let devices = [DeviceDescriptor::with_serial("680123456")];

        registry.reconcile(&devices, &drivers);
        let second = registry.reconcile(&devices, &drivers);

        assert!(second.is_quiet());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_mapping_matches_latest_device_set() {
        let drivers = mock_drivers();
        let mut registry = registry();

        registry.reconcile(
            &[
                DeviceDescriptor::with_serial("680123456"),
                DeviceDescriptor::with_serial("681111111"),
            ],
            &drivers,
        );
        let report = registry.reconcile(
            &[
                DeviceDescriptor::with_serial("681111111"),
                DeviceDescriptor::with_serial("682222222"),
            ],
            &drivers,
        );

        assert_eq!(report.added.len(), 1);
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.removed[0].instance_id(), "680123456");

        let mut ids: Vec<String> = registry.snapshot().into_keys().collect();
        ids.sort();
        assert_eq!(ids, vec!["681111111", "682222222"]);
    }

    #[test]
    fn test_survivor_keeps_the_same_handle() {
        let drivers = mock_drivers();
        let mut registry = registry();
        let devices = [DeviceDescriptor::with_serial("680123456")];

        registry.reconcile(&devices, &drivers);
        let before = registry.get("680123456").unwrap();
        registry.reconcile(&devices, &drivers);
        let after = registry.get("680123456").unwrap();

        assert!(Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_unclassifiable_devices_skip_without_aborting() {
        let drivers = mock_drivers();
        let mut registry = registry();

        let report = registry.reconcile(
            &[
                DeviceDescriptor::default(),
                DeviceDescriptor::with_serial("FTDI-AB12CD"),
                DeviceDescriptor::with_serial("687654321"),
                DeviceDescriptor::with_serial("680123456"),
            ],
            &drivers,
        );

        assert_eq!(report.skipped.len(), 3);
        assert!(matches!(report.skipped[0], ClassifyError::MissingInstanceId));
        assert!(matches!(report.skipped[1], ClassifyError::UnknownVendor(_)));
        assert!(matches!(
            report.skipped[2],
            ClassifyError::UnsupportedHardware { .. }
        ));
        assert_eq!(report.added.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_skips_are_not_removals() {
        let drivers = mock_drivers();
        let mut registry = registry();

        registry.reconcile(&[DeviceDescriptor::with_serial("680123456")], &drivers);
        // The registered device stays visible while a broken one shows up.
        let report = registry.reconcile(
            &[
                DeviceDescriptor::with_serial("680123456"),
                DeviceDescriptor::default(),
            ],
            &drivers,
        );

        assert_eq!(report.skipped.len(), 1);
        assert!(report.removed.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_ids_in_one_batch_create_one_handle() {
        let drivers = mock_drivers();
        let mut registry = registry();

        let report = registry.reconcile(
            &[
                DeviceDescriptor::with_serial("680123456"),
                DeviceDescriptor::with_serial_and_port("680123456", "/dev/ttyACM0"),
            ],
            &drivers,
        );

        assert_eq!(report.added.len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_advisory_attached_on_matching_platform() {
        let drivers = mock_drivers();
        let mut registry = AdapterRegistry::with_platform(AdvisoryTable::builtin(), "macos");

        registry.reconcile(
            &[DeviceDescriptor {
                serial_number: Some("680123456".to_string()),
                port: Some("/dev/cu.usbmodem1".to_string()),
                manufacturer: Some("SEGGER J-Link".to_string()),
            }],
            &drivers,
        );

        let adapter = registry.get("680123456").unwrap();
        assert!(adapter.advisory().is_some());
    }

    #[test]
    fn test_no_advisory_on_other_platform() {
        let drivers = mock_drivers();
        let mut registry = registry();

        registry.reconcile(
            &[DeviceDescriptor {
                serial_number: Some("680123456".to_string()),
                port: None,
                manufacturer: Some("SEGGER J-Link".to_string()),
            }],
            &drivers,
        );

        assert!(registry.get("680123456").unwrap().advisory().is_none());
    }
}
