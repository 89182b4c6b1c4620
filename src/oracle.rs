//! Unlock probe
//!
//! Answers whether the session is currently unlocked. Anything other than a
//! clean zero exit from the configured probe counts as locked.

use crate::command::{CommandLine, SharedRunner};
use crate::config::PolicyConfig;

pub struct UnlockOracle {
    probe: Option<CommandLine>,
    runner: SharedRunner,
}

impl UnlockOracle {
    pub fn new(policy: &PolicyConfig, runner: SharedRunner) -> Self {
        Self {
            probe: policy.unlock_command.as_deref().map(CommandLine::shell),
            runner,
        }
    }

    /// Run the probe once. Locked when no probe is configured.
    pub fn is_unlocked(&self) -> bool {
        let Some(probe) = &self.probe else {
            return false;
        };

        match self.runner.run(probe) {
            Ok(output) => output.success,
            Err(e) => {
                log::warn!("Unlock probe failed, assuming locked: {}", e);
                false
            }
        }
    }
}
