//! CLI argument parsing module
//!
//! Handles command-line interface using clap:
//! - Test mode (`--test`)
//! - Simulation mode (`--simulate`)
//! - Settings file override (`--config`)
//! - Help and version commands

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

const LONG_ABOUT: &str = "\
usbkill has one goal: quickly shut the computer down when a device is \
inserted or removed while the machine is locked.

A whitelist of device ids may be inserted and removed freely, and an unlock \
command can report when the session is unlocked, in which case changes are \
accepted.

Powering off with the built-in method requires root. A kill_cmd from the \
settings file (for example one using `sudo`) lifts that requirement.";

/// Options selected on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    /// Run the kill test instead of patrolling
    pub test: bool,
    /// Never execute a kill
    pub simulate: bool,
    /// Settings file to use instead of the default search path
    pub config: Option<PathBuf>,
}

pub fn command() -> Command {
    Command::new("usbkill")
        .version(env!("USBKILL_VERSION"))
        .long_version(concat!(env!("USBKILL_VERSION"), " (", env!("GIT_HASH"), ")"))
        .about("Power off the machine when attached devices change while locked")
        .long_about(LONG_ABOUT)
        .arg(
            Arg::new("test")
                .long("test")
                .help("Test the kill and unlock procedures")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("simulate")
                .long("simulate")
                .help("Do everything, but don't kill the machine")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .help("Settings file (default: ./settings.toml, then /etc/usbkill/settings.toml)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

/// Parse command line arguments
pub fn parse_args() -> CliOptions {
    options_from(&command().get_matches())
}

fn options_from(matches: &ArgMatches) -> CliOptions {
    CliOptions {
        test: matches.get_flag("test"),
        simulate: matches.get_flag("simulate"),
        config: matches.get_one::<PathBuf>("config").cloned(),
    }
}
