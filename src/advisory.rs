//! Platform advisory messages for known-awkward probe/OS combinations.
//!
//! Some probe manufacturers need extra setup on some host platforms (driver
//! installs, kext approval). The table here maps (platform, manufacturer)
//! pairs to a human-readable notice that gets attached to the adapter
//! handle. Advisories are informational only and never block discovery.

use serde::{Deserialize, Serialize};

/// Notice shown to macOS users about Segger J-Link probes.
const MACOS_SEGGER_NOTICE: &str = "On macOS, Segger J-Link probes require the Segger \
     J-Link driver to expose a serial port. Install it from segger.com if the probe \
     does not appear.";

/// Notice shown to macOS users about mbed-flavored probes.
const MACOS_MBED_NOTICE: &str = "On macOS, mbed probes may enumerate with a read-only \
     mass-storage volume first. Wait for the serial port to settle before opening.";

/// One advisory rule: platform tag, manufacturer fragment, message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvisoryRule {
    /// Platform tag compared against `std::env::consts::OS` (`macos`,
    /// `linux`, `windows`).
    pub platform: String,
    /// Case-insensitive fragment matched against the manufacturer string.
    pub manufacturer: String,
    /// The notice attached to matching handles.
    pub message: String,
}

impl AdvisoryRule {
    fn matches(&self, platform: &str, manufacturer: &str) -> bool {
        self.platform == platform
            && manufacturer
                .to_ascii_lowercase()
                .contains(&self.manufacturer.to_ascii_lowercase())
    }
}

/// Ordered advisory rules; first match wins.
#[derive(Debug, Clone, Default)]
pub struct AdvisoryTable {
    rules: Vec<AdvisoryRule>,
}

impl AdvisoryTable {
    /// The built-in rules for combinations known to need a notice.
    pub fn builtin() -> Self {
        Self {
            rules: vec![
                AdvisoryRule {
                    platform: "macos".to_string(),
                    manufacturer: "segger".to_string(),
                    message: MACOS_SEGGER_NOTICE.to_string(),
                },
                AdvisoryRule {
                    platform: "macos".to_string(),
                    manufacturer: "mbed".to_string(),
                    message: MACOS_MBED_NOTICE.to_string(),
                },
            ],
        }
    }

    /// Table from configuration-supplied rules, replacing the built-ins.
    pub fn from_rules(rules: Vec<AdvisoryRule>) -> Self {
        Self { rules }
    }

    /// The advisory for this platform/manufacturer pair, if any rule matches.
    pub fn advisory_for(&self, platform: &str, manufacturer: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(platform, manufacturer))
            .map(|rule| rule.message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
