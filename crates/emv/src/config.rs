//! Discovery and scanner configuration

use emvscan_apdu_core::session::DEFAULT_CLA;

/// Short file identifier of the payment system directory
pub const DEFAULT_SFI: u8 = 1;

/// Settings for one discovery pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Short file identifier to read records from
    pub sfi: u8,
    /// Highest record number read before giving up
    pub max_records: u8,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            sfi: DEFAULT_SFI,
            max_records: u8::MAX,
        }
    }
}

impl DiscoveryConfig {
    /// Set the short file identifier
    pub const fn with_sfi(mut self, sfi: u8) -> Self {
        self.sfi = sfi;
        self
    }

    /// Set the record cap
    pub const fn with_max_records(mut self, max_records: u8) -> Self {
        self.max_records = max_records;
        self
    }
}

/// Settings for the background scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Class byte used by the card session
    pub cla: u8,
    /// Discovery pass settings
    pub discovery: DiscoveryConfig,
    /// Disconnect from the card once the pass is over
    pub disconnect_after: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            cla: DEFAULT_CLA,
            discovery: DiscoveryConfig::default(),
            disconnect_after: true,
        }
    }
}

impl ScanConfig {
    /// Set the class byte
    pub const fn with_class(mut self, cla: u8) -> Self {
        self.cla = cla;
        self
    }

    /// Set the discovery settings
    pub const fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }

    /// Set whether to disconnect after each pass
    pub const fn with_disconnect_after(mut self, disconnect_after: bool) -> Self {
        self.disconnect_after = disconnect_after;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.cla, 0x00);
        assert_eq!(config.discovery.sfi, 1);
        assert_eq!(config.discovery.max_records, 255);
        assert!(config.disconnect_after);
    }

    #[test]
    fn test_builders() {
        let config = ScanConfig::default()
            .with_class(0x80)
            .with_discovery(DiscoveryConfig::default().with_sfi(2).with_max_records(8))
            .with_disconnect_after(false);
        assert_eq!(config.cla, 0x80);
        assert_eq!(config.discovery.sfi, 2);
        assert_eq!(config.discovery.max_records, 8);
        assert!(!config.disconnect_after);
    }
}
