//! Kill execution
//!
//! Carries out a kill decision: nothing in simulation mode, the operator's
//! command when one is configured, otherwise a built-in strategy chosen by
//! platform family. Nothing is retried or verified; the process is not
//! expected to survive a real kill.

use crate::command::{CommandLine, SharedRunner};
use crate::config::PolicyConfig;
use crate::logging::EventLogger;
use crate::models::{describe_devices, HostPlatform, KillEvent};

/// Built-in ways to take the machine down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillStrategy {
    /// Force a kernel panic; faster than a shutdown and releases key material
    /// before any shutdown hooks run
    KernelPanic,
    /// Immediate halt and power-off
    Halt,
    /// Forced power-off skipping service shutdown
    PowerOff,
}

impl KillStrategy {
    pub fn for_platform(platform: HostPlatform) -> Self {
        match platform {
            HostPlatform::Darwin => KillStrategy::KernelPanic,
            HostPlatform::Bsd => KillStrategy::Halt,
            HostPlatform::Linux | HostPlatform::Other => KillStrategy::PowerOff,
        }
    }

    pub fn command(self) -> CommandLine {
        match self {
            KillStrategy::KernelPanic => CommandLine::exec("dtrace", &["-w", "-n", "BEGIN{ panic();}"]),
            KillStrategy::Halt => CommandLine::exec("shutdown", &["-h", "now"]),
            KillStrategy::PowerOff => CommandLine::exec("poweroff", &["-f"]),
        }
    }
}

/// Command flushing filesystem buffers
pub fn sync_command() -> CommandLine {
    CommandLine::exec("sync", &[])
}

/// Startup checks that make the process refuse to patrol
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("This program needs to run as root to use the built-in kill method.")]
    InsufficientPrivilege,
}

/// The built-in kill needs root; a delegated command or simulation does not
pub fn check_privilege(policy: &PolicyConfig, is_root: bool) -> Result<(), StartupError> {
    if is_root || policy.simulate || policy.kill_command.is_some() {
        Ok(())
    } else {
        Err(StartupError::InsufficientPrivilege)
    }
}

pub fn running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// What [`KillExecutor::execute`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    /// Simulation mode; nothing was run
    Suppressed,
    /// The configured kill command ran; `success` reflects its exit status
    Delegated { success: bool },
    /// A built-in strategy was started
    BuiltIn(KillStrategy),
}

pub struct KillExecutor {
    simulate: bool,
    kill_command: Option<CommandLine>,
    strategy: KillStrategy,
    runner: SharedRunner,
    logger: EventLogger,
}

impl KillExecutor {
    pub fn new(policy: &PolicyConfig, platform: HostPlatform, runner: SharedRunner, logger: EventLogger) -> Self {
        Self {
            simulate: policy.simulate,
            kill_command: policy.kill_command.as_deref().map(CommandLine::shell),
            strategy: KillStrategy::for_platform(platform),
            runner,
            logger,
        }
    }

    pub fn execute(&self, event: &KillEvent) -> KillOutcome {
        if self.simulate {
            self.logger.warning(format!(
                "Ignoring KILL procedure because of simulation mode ({} at {}: {})",
                event.cause,
                event.timestamp.format("%H:%M:%S%.3f"),
                describe_devices(&event.devices)
            ));
            return KillOutcome::Suppressed;
        }

        if let Some(command) = &self.kill_command {
            let success = match self.runner.run(command) {
                Ok(output) => output.success,
                Err(e) => {
                    self.logger.warning(format!("Kill command could not be started: {}", e));
                    false
                }
            };
            self.logger.info("Kill script executed...");
            return KillOutcome::Delegated { success };
        }

        // Flush first so the entry for this decision reaches the disk
        if let Err(e) = self.runner.run(&sync_command()) {
            log::warn!("sync failed: {}", e);
        }

        if let Err(e) = self.runner.run(&self.strategy.command()) {
            self.logger
                .warning(format!("Built-in kill {:?} could not be started: {}", self.strategy, e));
        }
        self.logger.info("Built-in kill executed");
        KillOutcome::BuiltIn(self.strategy)
    }
}
