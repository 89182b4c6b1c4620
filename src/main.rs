#![forbid(unsafe_code)]

use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use usbkill::cli;
use usbkill::command::{SharedRunner, SystemRunner};
use usbkill::config::Settings;
use usbkill::killer::{check_privilege, running_as_root};
use usbkill::logging::EventLogger;
use usbkill::models::describe_devices;
use usbkill::supervisor::{register_termination, Supervisor};

fn main() -> Result<()> {
    let options = cli::parse_args();

    // Set up termination handling before the first snapshot
    let terminate = Arc::new(AtomicBool::new(false));
    register_termination(&terminate)?;

    let (settings, settings_path) = Settings::load(options.config.as_deref())?;
    let policy = settings.policy.with_simulate(options.simulate);

    let runner: SharedRunner = Arc::new(SystemRunner);
    let logger = EventLogger::new(settings.log_file, runner.clone());
    logger.install()?;

    logger.info(format!(
        "Starting with whitelist: {}",
        describe_devices(&policy.whitelist)
    ));
    log::debug!("Settings loaded from {}", settings_path.display());
    if policy.simulate {
        logger.warning("Simulation mode enabled");
    }

    if let Err(e) = check_privilege(&policy, running_as_root()) {
        eprintln!("\n{}\n", e);
        std::process::exit(1);
    }

    let mut supervisor = Supervisor::for_host(policy, runner, logger, terminate);
    if options.test {
        supervisor.run_test();
    } else {
        supervisor.run();
    }

    Ok(())
}
