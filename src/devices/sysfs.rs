//! Linux sysfs device sources

use super::{DeviceSource, SourceError};
use crate::constants::SYSFS_USB_VENDOR_GLOB;
use crate::models::DeviceId;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// USB devices, identified by the `idVendor`/`idProduct` files of each
/// device directory
pub struct SysfsUsb {
    vendor_glob: String,
}

impl SysfsUsb {
    pub fn new() -> Self {
        Self::with_pattern(SYSFS_USB_VENDOR_GLOB)
    }

    /// Use a custom glob matching `idVendor` files
    pub fn with_pattern(vendor_glob: &str) -> Self {
        Self {
            vendor_glob: vendor_glob.to_string(),
        }
    }
}

impl Default for SysfsUsb {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceSource for SysfsUsb {
    fn name(&self) -> &str {
        "usb"
    }

    fn read(&self) -> Result<Vec<DeviceId>, SourceError> {
        let entries = glob::glob(&self.vendor_glob).map_err(|source| SourceError::Pattern {
            pattern: self.vendor_glob.clone(),
            source,
        })?;

        let mut devices = Vec::new();
        for entry in entries {
            let vendor_path = match entry {
                Ok(path) => path,
                Err(e) => {
                    log::debug!("Skipping unreadable USB entry: {}", e);
                    continue;
                }
            };
            let Some(base) = vendor_path.parent() else {
                continue;
            };

            // A device unplugged mid-scan loses its files; it is simply absent
            match read_usb_id(base) {
                Ok(id) => devices.push(id),
                Err(e) => log::debug!("Skipping USB device {}: {}", base.display(), e),
            }
        }
        Ok(devices)
    }
}

fn read_usb_id(device_dir: &Path) -> std::io::Result<DeviceId> {
    let vendor = fs::read_to_string(device_dir.join("idVendor"))?;
    let product = fs::read_to_string(device_dir.join("idProduct"))?;
    Ok(DeviceId::usb(&vendor, &product))
}

/// Any bus whose device directory lists one entry per attached device
pub struct SysfsBus {
    bus: String,
    dir: PathBuf,
}

impl SysfsBus {
    pub fn new(bus: &str, dir: impl Into<PathBuf>) -> Self {
        Self {
            bus: bus.to_string(),
            dir: dir.into(),
        }
    }
}

impl DeviceSource for SysfsBus {
    fn name(&self) -> &str {
        &self.bus
    }

    fn read(&self) -> Result<Vec<DeviceId>, SourceError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            // Bus not present on this machine
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SourceError::Io {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut devices = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SourceError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            devices.push(DeviceId::on_bus(&self.bus, &name.to_string_lossy()));
        }
        Ok(devices)
    }
}
