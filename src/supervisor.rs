//! Supervisor loop
//!
//! Owns the known device set and drives the patrol: baseline snapshot, then
//! sleep / snapshot / decide / kill until a termination signal arrives.
//! Also runs the manual kill test.

use crate::command::SharedRunner;
use crate::config::PolicyConfig;
use crate::constants::{SLEEP_SLICE, TERMINATION_SIGNALS, TEST_COUNTDOWN};
use crate::devices::DeviceEnumerator;
use crate::engine::{self, CycleOutcome, DeviceDiff};
use crate::killer::{KillExecutor, KillOutcome};
use crate::logging::EventLogger;
use crate::models::{DeviceSet, HostPlatform, KillCause, KillEvent, LogEntry};
use crate::oracle::UnlockOracle;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Register the termination signals.
///
/// The first signal sets `flag`, which the loop checks cooperatively. A second
/// signal while the flag is already set exits the process on the spot.
pub fn register_termination(flag: &Arc<AtomicBool>) -> Result<()> {
    for &signal in TERMINATION_SIGNALS {
        signal_hook::flag::register_conditional_shutdown(signal, 0, Arc::clone(flag))
            .with_context(|| format!("Failed to register handler for signal {}", signal))?;
        signal_hook::flag::register(signal, Arc::clone(flag))
            .with_context(|| format!("Failed to register handler for signal {}", signal))?;
    }
    Ok(())
}

/// What a single patrol cycle did
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Whether the unlock probe ran this cycle
    pub probed: bool,
    pub kills: Vec<(KillEvent, KillOutcome)>,
}

pub struct Supervisor {
    policy: PolicyConfig,
    enumerator: DeviceEnumerator,
    oracle: UnlockOracle,
    executor: KillExecutor,
    logger: EventLogger,
    terminate: Arc<AtomicBool>,
    known: DeviceSet,
    countdown: [Duration; 2],
}

impl Supervisor {
    pub fn new(
        policy: PolicyConfig,
        enumerator: DeviceEnumerator,
        oracle: UnlockOracle,
        executor: KillExecutor,
        logger: EventLogger,
        terminate: Arc<AtomicBool>,
    ) -> Self {
        Self {
            policy,
            enumerator,
            oracle,
            executor,
            logger,
            terminate,
            known: DeviceSet::new(),
            countdown: TEST_COUNTDOWN,
        }
    }

    /// Wire every component for the running host
    pub fn for_host(
        policy: PolicyConfig,
        runner: SharedRunner,
        logger: EventLogger,
        terminate: Arc<AtomicBool>,
    ) -> Self {
        let platform = HostPlatform::current();
        let enumerator = DeviceEnumerator::for_host(platform, runner.clone());
        let oracle = UnlockOracle::new(&policy, runner.clone());
        let executor = KillExecutor::new(&policy, platform, runner, logger.clone());
        Self::new(policy, enumerator, oracle, executor, logger, terminate)
    }

    /// Override the test-mode countdown
    pub fn with_countdown(mut self, countdown: [Duration; 2]) -> Self {
        self.countdown = countdown;
        self
    }

    pub fn known_devices(&self) -> &DeviceSet {
        &self.known
    }

    fn terminated(&self) -> bool {
        self.terminate.load(Ordering::SeqCst)
    }

    /// Take the baseline snapshot. Devices present now are trusted.
    pub fn start(&mut self) {
        self.known = self.enumerator.snapshot();
        self.logger.log(
            &LogEntry::info(format!(
                "Started patrolling system interfaces every {} seconds...",
                self.policy.poll_interval.as_secs_f64()
            ))
            .with_devices(),
        );
        log::debug!("Baseline holds {} devices", self.known.len());
    }

    /// Snapshot, decide, then act on each kill as soon as its warning is
    /// written
    pub fn run_cycle(&mut self) -> CycleReport {
        let current = self.enumerator.snapshot();

        // Sample the lock state at most once, and only when it matters
        let probed = DeviceDiff::between(&self.known, &current).needs_lock_state(&self.policy);
        let unlocked = probed && self.oracle.is_unlocked();

        let CycleOutcome {
            next_known,
            kills,
            entries,
            announced_at,
        } = engine::evaluate(&self.known, &current, &self.policy, unlocked);
        self.known = next_known;

        let mut pending = kills.into_iter().zip(announced_at).peekable();
        let mut executed = Vec::new();
        for (index, entry) in entries.iter().enumerate() {
            self.logger.log(entry);
            while let Some((event, _)) = pending.next_if(|(_, at)| *at == index) {
                let result = self.executor.execute(&event);
                executed.push((event, result));
            }
        }

        CycleReport {
            probed,
            kills: executed,
        }
    }

    /// Patrol until a termination signal is received
    pub fn run(&mut self) {
        self.start();
        while self.pause(self.policy.poll_interval) {
            self.run_cycle();
        }
        self.logger.info("Exiting because exit signal was received");
    }

    /// Sleep in short slices. Returns false as soon as termination is requested.
    fn pause(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.terminated() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLEEP_SLICE.min(deadline - now));
        }
    }

    /// Manual verification of the kill procedure.
    ///
    /// Reports the lock state, counts down, then executes one kill regardless
    /// of attached devices. Returns `None` if a termination signal cancelled
    /// the countdown.
    pub fn run_test(&self) -> Option<KillOutcome> {
        if self.oracle.is_unlocked() {
            self.logger
                .info("Device is currently unlocked (visible devices may change)");
        } else {
            self.logger
                .info("Device is locked (changes in visible devices cause a kill)");
        }

        let total: Duration = self.countdown.iter().sum();
        self.logger.warning(format!(
            "Executing a test of a kill procedure in {} seconds",
            total.as_secs()
        ));

        if !self.pause(self.countdown[0]) {
            return self.cancel_test();
        }
        self.logger.info(format!(
            "{} seconds left... (Ctrl-C to cancel)",
            self.countdown[1].as_secs()
        ));
        if !self.pause(self.countdown[1]) {
            return self.cancel_test();
        }

        self.logger.info("Executing a kill procedure");
        Some(self.executor.execute(&KillEvent::new(KillCause::ManualTest, Vec::new())))
    }

    fn cancel_test(&self) -> Option<KillOutcome> {
        self.logger.info("Kill test cancelled");
        self.logger.info("Exiting because exit signal was received");
        None
    }
}
