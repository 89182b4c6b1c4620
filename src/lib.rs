//! usbkill - device topology kill-switch
//!
//! This library exposes device enumeration, the decision engine and the kill
//! execution used by the `usbkill` binary.

pub mod cli;
pub mod command;
pub mod config;
pub mod constants;
pub mod devices;
pub mod engine;
pub mod killer;
pub mod logging;
pub mod models;
pub mod oracle;
pub mod supervisor;
