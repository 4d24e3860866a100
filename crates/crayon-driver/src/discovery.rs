//! Runtime bridge discovery
//!
//! Scans `/sys/bus/usb/devices` for FX2-LP bridges carrying the CrayOn
//! vendor/product IDs and maps each one to its usbfs node.

use crate::backends::UsbfsTransport;
use crate::error::{CrayonError, Result};
use crayon_chip::usb::{PRODUCT_ID, PRODUCT_MATCH_LEN, VENDOR_ID};
use std::path::{Path, PathBuf};

const SYSFS_USB_DEVICES: &str = "/sys/bus/usb/devices";

/// Manager for discovered bridges
#[derive(Debug)]
pub struct BridgeManager {
    bridges: Vec<BridgeInfo>,
}

/// Information about a discovered bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeInfo {
    /// USB bus number
    pub bus: u32,

    /// Device address on the bus
    pub address: u32,

    /// Product string (identifies which board the bridge fronts)
    pub product: String,

    /// usbfs node (`/dev/bus/usb/BBB/DDD`)
    pub path: PathBuf,
}

impl BridgeManager {
    /// Discover all bridges on the system
    ///
    /// # Errors
    ///
    /// Returns `CrayonError::NoDevicesFound` if no bridge is detected.
    pub fn discover() -> Result<Self> {
        Self::discover_in(Path::new(SYSFS_USB_DEVICES))
    }

    /// Discover bridges under an alternative sysfs root
    ///
    /// # Errors
    ///
    /// Returns `CrayonError::NoDevicesFound` if no bridge is detected.
    pub fn discover_in(sysfs: &Path) -> Result<Self> {
        tracing::info!("Discovering CrayOn bridges...");

        let Ok(entries) = std::fs::read_dir(sysfs) else {
            tracing::warn!("Cannot read {}", sysfs.display());
            return Err(CrayonError::NoDevicesFound);
        };

        let mut bridges: Vec<BridgeInfo> = entries
            .flatten()
            .filter_map(|entry| Self::probe(&entry.path()))
            .collect();

        if bridges.is_empty() {
            tracing::error!("No CrayOn bridge found");
            return Err(CrayonError::NoDevicesFound);
        }

        bridges.sort_by_key(|b| (b.bus, b.address));
        for bridge in &bridges {
            tracing::info!(
                "Bridge {:03}/{:03}: {:?} at {}",
                bridge.bus,
                bridge.address,
                bridge.product,
                bridge.path.display()
            );
        }

        Ok(Self { bridges })
    }

    /// Number of discovered bridges
    #[must_use]
    pub fn bridge_count(&self) -> usize {
        self.bridges.len()
    }

    /// All discovered bridges
    #[must_use]
    pub fn bridges(&self) -> &[BridgeInfo] {
        &self.bridges
    }

    /// First bridge whose product string equals `product`
    ///
    /// Only the first 16 bytes of both strings are compared.
    ///
    /// # Errors
    ///
    /// Returns `CrayonError::DeviceNotFound` if no bridge matches.
    pub fn find(&self, product: &str) -> Result<&BridgeInfo> {
        let truncate = |s: &str| s.bytes().take(PRODUCT_MATCH_LEN).collect::<Vec<_>>();
        let wanted = truncate(product);
        self.bridges
            .iter()
            .find(|b| truncate(&b.product) == wanted)
            .ok_or_else(|| CrayonError::device_not_found(product))
    }

    /// Open the first bridge matching `product`
    ///
    /// # Errors
    ///
    /// Returns an error if no bridge matches or it cannot be opened.
    pub fn open(&self, product: &str) -> Result<UsbfsTransport> {
        UsbfsTransport::open(self.find(product)?)
    }

    fn probe(device: &Path) -> Option<BridgeInfo> {
        let vendor = read_hex_sysfs(&device.join("idVendor"))?;
        let product_id = read_hex_sysfs(&device.join("idProduct"))?;
        if vendor != VENDOR_ID || product_id != PRODUCT_ID {
            return None;
        }

        let bus = read_dec_sysfs(&device.join("busnum"))?;
        let address = read_dec_sysfs(&device.join("devnum"))?;
        let product = std::fs::read_to_string(device.join("product"))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        tracing::debug!("Found bridge at {}", device.display());

        Some(BridgeInfo {
            bus,
            address,
            product,
            path: PathBuf::from(format!("/dev/bus/usb/{bus:03}/{address:03}")),
        })
    }
}

impl BridgeInfo {
    /// usbfs node path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_hex_sysfs(path: &Path) -> Option<u16> {
    let content = std::fs::read_to_string(path).ok()?;
    u16::from_str_radix(content.trim().trim_start_matches("0x"), 16).ok()
}

fn read_dec_sysfs(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_device(
        root: &Path,
        name: &str,
        vendor: &str,
        product_id: &str,
        product: &str,
        bus: u32,
        dev: u32,
    ) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("idVendor"), format!("{vendor}\n")).unwrap();
        fs::write(dir.join("idProduct"), format!("{product_id}\n")).unwrap();
        fs::write(dir.join("product"), format!("{product}\n")).unwrap();
        fs::write(dir.join("busnum"), format!("{bus}\n")).unwrap();
        fs::write(dir.join("devnum"), format!("{dev}\n")).unwrap();
    }

    #[test]
    fn test_discover_filters_and_sorts() {
        let root = tempfile::TempDir::new().unwrap();
        fake_device(root.path(), "2-1", "221a", "0100", "transceiver", 2, 7);
        fake_device(root.path(), "1-4", "221a", "0100", "transceiver-b", 1, 3);
        fake_device(root.path(), "1-2", "046d", "c52b", "Receiver", 1, 2);
        fs::create_dir_all(root.path().join("usb1")).unwrap();

        let manager = BridgeManager::discover_in(root.path()).unwrap();
        assert_eq!(manager.bridge_count(), 2);
        assert_eq!(manager.bridges()[0].path, PathBuf::from("/dev/bus/usb/001/003"));

        assert_eq!(manager.find("transceiver").unwrap().bus, 2);
        assert_eq!(manager.find("transceiver-b").unwrap().bus, 1);
        assert!(matches!(
            manager.find("other"),
            Err(CrayonError::DeviceNotFound { .. })
        ));
    }

    #[test]
    fn test_discover_empty() {
        let root = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            BridgeManager::discover_in(root.path()),
            Err(CrayonError::NoDevicesFound)
        ));
    }

    #[test]
    #[ignore] // Requires hardware
    fn test_discover_hardware() {
        let manager = BridgeManager::discover().expect("bridge present");
        println!("Found {} bridge(s)", manager.bridge_count());
    }
}
