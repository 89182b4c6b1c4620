//! Event log
//!
//! Every record goes to stdout and, when a log file is configured, is
//! appended to it. Entries may ask for a listing of the currently visible
//! devices, which is written to the file only.

use crate::command::SharedRunner;
use crate::devices::listing::{pci_listing_command, usb_listing_command};
use crate::models::{LogEntry, LogLevel};
use anyhow::{anyhow, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Sink for human-readable event records, shared by every component
#[derive(Clone)]
pub struct EventLogger {
    inner: Arc<LoggerInner>,
}

struct LoggerInner {
    log_file: Option<PathBuf>,
    runner: SharedRunner,
    console: bool,
    /// Serializes appends so a device listing stays next to its entry
    file_lock: Mutex<()>,
}

impl EventLogger {
    pub fn new(log_file: Option<PathBuf>, runner: SharedRunner) -> Self {
        Self::build(log_file, runner, true)
    }

    /// Logger that writes to the log file only
    pub fn file_only(log_file: PathBuf, runner: SharedRunner) -> Self {
        Self::build(Some(log_file), runner, false)
    }

    fn build(log_file: Option<PathBuf>, runner: SharedRunner, console: bool) -> Self {
        Self {
            inner: Arc::new(LoggerInner {
                log_file,
                runner,
                console,
                file_lock: Mutex::new(()),
            }),
        }
    }

    /// Route `log` facade records into this logger
    pub fn install(&self) -> Result<()> {
        log::set_boxed_logger(Box::new(LogBridge {
            logger: self.clone(),
        }))
        .map_err(|e| anyhow!("Failed to set logger: {}", e))?;
        log::set_max_level(log::LevelFilter::Info);
        Ok(())
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(&LogEntry::info(message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(&LogEntry::warning(message));
    }

    pub fn log(&self, entry: &LogEntry) {
        let line = format_line(entry.level, &entry.message);

        if self.inner.console {
            println!("{}", line);
        }

        if let Some(path) = &self.inner.log_file {
            if let Err(e) = self.append(path, &line, entry.attach_devices) {
                eprintln!("Failed to write log file {}: {}", path.display(), e);
            }
        }
    }

    fn append(&self, path: &Path, line: &str, attach_devices: bool) -> std::io::Result<()> {
        // Listing is gathered before taking the lock; it shells out
        let listing = attach_devices.then(|| self.device_listing());

        let _guard = self.inner.file_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        // Empty line separates entries
        writeln!(file)?;
        writeln!(file, "{}", line)?;
        if let Some(listing) = listing {
            writeln!(file, "Current state:")?;
            file.write_all(listing.as_bytes())?;
        }
        file.flush()
    }

    /// Output of the two listing backends, USB first
    pub fn device_listing(&self) -> String {
        let mut listing = String::new();
        for (index, command) in [usb_listing_command(), pci_listing_command()].iter().enumerate() {
            if index > 0 {
                listing.push('\n');
            }
            match self.inner.runner.run(command) {
                Ok(output) => listing.push_str(&output.stdout),
                Err(e) => {
                    listing.push_str(&format!("({})", e));
                    listing.push('\n');
                }
            }
        }
        listing
    }
}

fn format_line(level: LogLevel, message: &str) -> String {
    format!(
        "{} {}: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
        level.label(),
        message
    )
}

/// Adapter from the `log` facade
struct LogBridge {
    logger: EventLogger,
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            log::Level::Error | log::Level::Warn => LogLevel::Warning,
            _ => LogLevel::Info,
        };
        self.logger.log(&LogEntry {
            level,
            message: record.args().to_string(),
            attach_devices: false,
        });
    }

    fn flush(&self) {}
}
