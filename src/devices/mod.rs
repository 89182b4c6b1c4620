//! Device enumeration module
//!
//! Handles:
//! - Reading attached devices from every tracked bus
//! - Merging per-bus results into one flat snapshot
//! - Degrading an unreadable bus to "no devices" instead of failing the scan

pub mod listing;
pub mod sysfs;

use crate::command::{CommandError, SharedRunner};
use crate::constants::SYSFS_BUS_DIRS;
use crate::models::{DeviceId, DeviceSet, HostPlatform};
use std::path::PathBuf;

pub use listing::{PciListing, UsbListing};
pub use sysfs::{SysfsBus, SysfsUsb};

/// Failure to read one bus source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid device pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("`{command}` exited with status {}", exit_code(.code))]
    CommandFailed { command: String, code: Option<i32> },
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

/// One bus that can report its attached devices
pub trait DeviceSource {
    /// Short name used in diagnostics
    fn name(&self) -> &str;

    fn read(&self) -> Result<Vec<DeviceId>, SourceError>;
}

/// A source whose readability changed since the previous snapshot
#[derive(Debug)]
pub enum SourceChange {
    Failed { source: String, error: SourceError },
    Recovered { source: String },
}

/// Produces the current set of attached devices across all tracked buses
pub struct DeviceEnumerator {
    sources: Vec<Box<dyn DeviceSource>>,
    /// Whether each source failed on its last read
    failing: Vec<bool>,
}

impl DeviceEnumerator {
    pub fn new(sources: Vec<Box<dyn DeviceSource>>) -> Self {
        let failing = vec![false; sources.len()];
        Self { sources, failing }
    }

    /// Sources appropriate for the host: sysfs on Linux, `lsusb`/`lspci`
    /// listings elsewhere.
    pub fn for_host(platform: HostPlatform, runner: SharedRunner) -> Self {
        let sources: Vec<Box<dyn DeviceSource>> = match platform {
            HostPlatform::Linux => {
                let mut sources: Vec<Box<dyn DeviceSource>> = vec![Box::new(SysfsUsb::default())];
                for (bus, dir) in SYSFS_BUS_DIRS {
                    sources.push(Box::new(SysfsBus::new(bus, *dir)));
                }
                sources
            }
            _ => vec![
                Box::new(UsbListing::new(runner.clone())),
                Box::new(PciListing::new(runner)),
            ],
        };
        Self::new(sources)
    }

    /// Best-effort read of every source. A source that fails contributes
    /// nothing; the others are still read. A failing source is reported
    /// once, not on every poll.
    pub fn snapshot(&mut self) -> DeviceSet {
        let (devices, changes) = self.read_sources();
        for change in changes {
            match change {
                SourceChange::Failed { source, error } => {
                    log::warn!("Device source {} unavailable: {}", source, error)
                }
                SourceChange::Recovered { source } => {
                    log::info!("Device source {} readable again", source)
                }
            }
        }
        devices
    }

    fn read_sources(&mut self) -> (DeviceSet, Vec<SourceChange>) {
        let mut devices = DeviceSet::new();
        let mut changes = Vec::new();

        for (source, failing) in self.sources.iter().zip(self.failing.iter_mut()) {
            match source.read() {
                Ok(ids) => {
                    devices.extend(ids);
                    if std::mem::replace(failing, false) {
                        changes.push(SourceChange::Recovered {
                            source: source.name().to_string(),
                        });
                    }
                }
                Err(error) if *failing => {
                    log::debug!("Device source {} still unavailable: {}", source.name(), error);
                }
                Err(error) => {
                    *failing = true;
                    changes.push(SourceChange::Failed {
                        source: source.name().to_string(),
                        error,
                    });
                }
            }
        }

        (devices, changes)
    }
}
