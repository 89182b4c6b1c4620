//! Global constants for usbkill
//!
//! Centralized location for application-wide constants

use std::time::Duration;

/// Settings file looked up in the working directory
pub const LOCAL_SETTINGS_FILE: &str = "./settings.toml";

/// System-wide settings file
pub const GLOBAL_SETTINGS_FILE: &str = "/etc/usbkill/settings.toml";

/// Glob matching the vendor id file of every USB device in sysfs
pub const SYSFS_USB_VENDOR_GLOB: &str = "/sys/bus/usb*/devices/*/idVendor";

/// Non-USB sysfs buses tracked on Linux, as (bus tag, device directory)
pub const SYSFS_BUS_DIRS: &[(&str, &str)] = &[
    ("pci", "/sys/bus/pci/devices"),
    ("pci_express", "/sys/bus/pci_express/devices"),
    ("firewire", "/sys/bus/firewire/devices"),
    ("pcmcia", "/sys/bus/pcmcia/devices"),
];

/// Pattern extracting the vendor:product pair from an `lsusb` line
pub const USB_LISTING_PATTERN: &str = r"^.+ID\s(?P<id>\w+:\w+)";

/// Granularity of the interruptible sleep between cycles
pub const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Two staged delays before test mode fires the kill
pub const TEST_COUNTDOWN: [Duration; 2] = [Duration::from_secs(5), Duration::from_secs(5)];

/// Signals that terminate the patrol loop
pub const TERMINATION_SIGNALS: &[i32] = &[
    signal_hook::consts::SIGINT,
    signal_hook::consts::SIGTERM,
    signal_hook::consts::SIGQUIT,
];
