//! Data models module
//!
//! Defines core data structures:
//! - DeviceId: Opaque token for one attached peripheral
//! - DeviceSet: Point-in-time snapshot of attached devices
//! - KillEvent: Decision record describing a protective-action trigger
//! - LogEntry: Human-readable record produced by the decision engine
//! - HostPlatform: Platform family selecting enumeration and kill strategies

use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of one attached device.
///
/// USB devices are identified by their `vendor:product` hex pair. Devices on
/// any other bus carry a `bus@` prefix so tokens from different buses never
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Build a USB identifier from its vendor and product ids
    pub fn usb(vendor: &str, product: &str) -> Self {
        Self(format!("{}:{}", vendor.trim(), product.trim()))
    }

    /// Build an identifier for a device on a non-USB bus
    pub fn on_bus(bus: &str, address: &str) -> Self {
        Self(format!("{}@{}", bus, address.trim()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Set of attached devices. Ordered so that log output is deterministic.
pub type DeviceSet = BTreeSet<DeviceId>;

/// Render a list of devices the way log lines show them
pub fn describe_devices<'a, I>(devices: I) -> String
where
    I: IntoIterator<Item = &'a DeviceId>,
{
    devices
        .into_iter()
        .map(DeviceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Why a kill was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillCause {
    /// A device outside the whitelist and baseline appeared while locked
    NewUnauthorizedDevice,
    /// One or more known devices disappeared while locked
    MissingDeviceWhileLocked,
    /// Operator-initiated run of the kill procedure (`--test`)
    ManualTest,
}

impl fmt::Display for KillCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            KillCause::NewUnauthorizedDevice => "new unauthorized device",
            KillCause::MissingDeviceWhileLocked => "device missing while locked",
            KillCause::ManualTest => "manual test",
        };
        f.write_str(text)
    }
}

/// A protective-action trigger
#[derive(Debug, Clone, PartialEq)]
pub struct KillEvent {
    pub cause: KillCause,
    /// Devices that caused the trigger, in a stable order
    pub devices: Vec<DeviceId>,
    /// When the decision was taken
    pub timestamp: DateTime<Local>,
}

impl KillEvent {
    pub fn new(cause: KillCause, devices: Vec<DeviceId>) -> Self {
        Self {
            cause,
            devices,
            timestamp: Local::now(),
        }
    }
}

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warning,
}

impl LogLevel {
    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
        }
    }
}

/// One human-readable record destined for the event log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Whether the logger should append a listing of visible devices
    pub attach_devices: bool,
}

impl LogEntry {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Info,
            message: message.into(),
            attach_devices: false,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: LogLevel::Warning,
            message: message.into(),
            attach_devices: false,
        }
    }

    /// Request a device listing alongside this entry
    pub fn with_devices(mut self) -> Self {
        self.attach_devices = true;
        self
    }
}

/// Host platform family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    /// macOS; can force a kernel panic
    Darwin,
    /// FreeBSD, OpenBSD, NetBSD, DragonFly
    Bsd,
    Linux,
    Other,
}

impl HostPlatform {
    /// Platform family of the running host
    pub fn current() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    pub fn from_os_name(os: &str) -> Self {
        let os = os.to_ascii_lowercase();
        if os == "macos" || os == "darwin" {
            HostPlatform::Darwin
        } else if os.ends_with("bsd") || os == "dragonfly" {
            HostPlatform::Bsd
        } else if os == "linux" {
            HostPlatform::Linux
        } else {
            HostPlatform::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usb_id_format() {
        assert_eq!(DeviceId::usb("1d6b", "0002\n").as_str(), "1d6b:0002");
    }

    #[test]
    fn test_bus_prefix_prevents_cross_bus_equality() {
        let pci = DeviceId::on_bus("pci", "0000:00:1f");
        let pcmcia = DeviceId::on_bus("pcmcia", "0000:00:1f");
        assert_ne!(pci, pcmcia);
        assert_ne!(pci, DeviceId::from("0000:00:1f"));
    }

    #[test]
    fn test_describe_devices_joins_in_order() {
        let set: DeviceSet = ["bbbb:0001", "aaaa:0001"].into_iter().map(DeviceId::from).collect();
        assert_eq!(describe_devices(&set), "aaaa:0001, bbbb:0001");
    }

    #[test]
    fn test_platform_detection() {
        assert_eq!(HostPlatform::from_os_name("macos"), HostPlatform::Darwin);
        assert_eq!(HostPlatform::from_os_name("freebsd"), HostPlatform::Bsd);
        assert_eq!(HostPlatform::from_os_name("openbsd"), HostPlatform::Bsd);
        assert_eq!(HostPlatform::from_os_name("dragonfly"), HostPlatform::Bsd);
        assert_eq!(HostPlatform::from_os_name("linux"), HostPlatform::Linux);
        assert_eq!(HostPlatform::from_os_name("windows"), HostPlatform::Other);
    }
}
