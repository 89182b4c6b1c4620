//! Device sources parsed from `lsusb` and `lspci` text output
//!
//! Used where no sysfs tree is available. Lines that do not look like a
//! device are ignored.

use super::{DeviceSource, SourceError};
use crate::command::{CommandLine, SharedRunner};
use crate::constants::USB_LISTING_PATTERN;
use crate::models::DeviceId;
use regex::Regex;
use std::sync::OnceLock;

/// Command printing the USB device listing
pub fn usb_listing_command() -> CommandLine {
    CommandLine::exec("lsusb", &[])
}

/// Command printing the PCI device listing
pub fn pci_listing_command() -> CommandLine {
    CommandLine::exec("lspci", &[])
}

fn usb_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(USB_LISTING_PATTERN).expect("USB listing pattern is valid"))
}

/// Extract `vendor:product` pairs from `lsusb` output
pub fn parse_usb_listing(text: &str) -> Vec<DeviceId> {
    text.lines()
        .filter_map(|line| usb_pattern().captures(line))
        .filter_map(|caps| caps.name("id"))
        .map(|id| DeviceId::from(id.as_str()))
        .collect()
}

/// Extract bus addresses (first column) from `lspci` output
pub fn parse_pci_listing(text: &str) -> Vec<DeviceId> {
    text.lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(|address| DeviceId::on_bus("pci", address))
        .collect()
}

fn run_listing(runner: &SharedRunner, command: &CommandLine) -> Result<String, SourceError> {
    let output = runner.run(command)?;
    if !output.success {
        return Err(SourceError::CommandFailed {
            command: command.to_string(),
            code: output.code,
        });
    }
    Ok(output.stdout)
}

/// USB devices from `lsusb`
pub struct UsbListing {
    runner: SharedRunner,
}

impl UsbListing {
    pub fn new(runner: SharedRunner) -> Self {
        Self { runner }
    }
}

impl DeviceSource for UsbListing {
    fn name(&self) -> &str {
        "lsusb"
    }

    fn read(&self) -> Result<Vec<DeviceId>, SourceError> {
        run_listing(&self.runner, &usb_listing_command()).map(|text| parse_usb_listing(&text))
    }
}

/// PCI devices from `lspci`
pub struct PciListing {
    runner: SharedRunner,
}

impl PciListing {
    pub fn new(runner: SharedRunner) -> Self {
        Self { runner }
    }
}

impl DeviceSource for PciListing {
    fn name(&self) -> &str {
        "lspci"
    }

    fn read(&self) -> Result<Vec<DeviceId>, SourceError> {
        run_listing(&self.runner, &pci_listing_command()).map(|text| parse_pci_listing(&text))
    }
}
