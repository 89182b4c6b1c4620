//! Decision engine
//!
//! Compares the known device set with a fresh snapshot and decides, for each
//! change, whether it is benign or requires a kill. Evaluation is pure: the
//! lock state is sampled by the caller and passed in.
//!
//! Every change in a cycle is classified even after a kill has been decided,
//! so the returned state stays consistent when the kill does not end the
//! process (simulation, or a delegated command that returns).

use crate::config::PolicyConfig;
use crate::models::{describe_devices, DeviceId, DeviceSet, KillCause, KillEvent, LogEntry};

/// Devices that appeared and disappeared between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceDiff {
    pub added: DeviceSet,
    pub removed: DeviceSet,
}

impl DeviceDiff {
    pub fn between(known: &DeviceSet, current: &DeviceSet) -> Self {
        Self {
            added: current.difference(known).cloned().collect(),
            removed: known.difference(current).cloned().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Whether classifying this diff depends on the lock state. When it does
    /// not, the unlock probe does not need to run.
    pub fn needs_lock_state(&self, policy: &PolicyConfig) -> bool {
        let unlisted_added = self.added.iter().any(|d| !policy.whitelist.contains(d));
        let guarded_removal = !self.removed.is_empty() && policy.kill_on_missing;
        unlisted_added || guarded_removal
    }
}

/// Result of evaluating one cycle
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// Known devices after this cycle's changes are applied
    pub next_known: DeviceSet,
    /// Kills to execute, in decision order
    pub kills: Vec<KillEvent>,
    pub entries: Vec<LogEntry>,
    /// For each kill, the index in `entries` of the warning announcing it
    pub announced_at: Vec<usize>,
}

impl CycleOutcome {
    fn unchanged(known: &DeviceSet) -> Self {
        Self {
            next_known: known.clone(),
            kills: Vec::new(),
            entries: Vec::new(),
            announced_at: Vec::new(),
        }
    }

    fn kill(&mut self, warning: LogEntry, event: KillEvent) {
        self.announced_at.push(self.entries.len());
        self.entries.push(warning);
        self.kills.push(event);
    }
}

/// Classify every change between `known` and `current`.
///
/// New devices are evaluated one by one, then missing devices as a single
/// batch. A new device is added to the next state even when it triggers a
/// kill, so it is never reported as new twice.
pub fn evaluate(
    known: &DeviceSet,
    current: &DeviceSet,
    policy: &PolicyConfig,
    unlocked: bool,
) -> CycleOutcome {
    let diff = DeviceDiff::between(known, current);
    if diff.is_empty() {
        return CycleOutcome::unchanged(known);
    }

    let mut outcome = CycleOutcome::unchanged(known);

    for device in &diff.added {
        evaluate_added(device, policy, unlocked, &mut outcome);
        outcome.next_known.insert(device.clone());
    }

    if !diff.removed.is_empty() {
        evaluate_removed(&diff.removed, policy, unlocked, &mut outcome);
        for device in &diff.removed {
            outcome.next_known.remove(device);
        }
    }

    outcome
}

fn evaluate_added(device: &DeviceId, policy: &PolicyConfig, unlocked: bool, outcome: &mut CycleOutcome) {
    if policy.whitelist.contains(device) {
        outcome
            .entries
            .push(LogEntry::info(format!("New whitelisted device connected {}", device)).with_devices());
    } else if unlocked {
        outcome.entries.push(
            LogEntry::info(format!("New unknown device {} connected while unlocked", device)).with_devices(),
        );
    } else {
        outcome.kill(
            LogEntry::warning(format!(
                "New not-whitelisted device {} detected - killing the computer...",
                device
            ))
            .with_devices(),
            KillEvent::new(KillCause::NewUnauthorizedDevice, vec![device.clone()]),
        );
    }
}

fn evaluate_removed(removed: &DeviceSet, policy: &PolicyConfig, unlocked: bool, outcome: &mut CycleOutcome) {
    let desc = describe_devices(removed);

    if unlocked {
        outcome
            .entries
            .push(LogEntry::info(format!("Device/s {} disconnected while unlocked", desc)));
    } else if !policy.kill_on_missing {
        outcome.entries.push(LogEntry::info(format!(
            "Device/s {} disconnected but kill_on_missing disabled",
            desc
        )));
    } else {
        outcome.kill(
            LogEntry::warning(format!(
                "Device/s {} disconnected while locked - killing the computer...",
                desc
            )),
            KillEvent::new(KillCause::MissingDeviceWhileLocked, removed.iter().cloned().collect()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogLevel;
    use std::time::Duration;

    fn ids(list: &[&str]) -> DeviceSet {
        list.iter().map(|id| DeviceId::from(*id)).collect()
    }

    fn policy(whitelist: &[&str], kill_on_missing: bool) -> PolicyConfig {
        PolicyConfig {
            poll_interval: Duration::from_millis(250),
            whitelist: ids(whitelist),
            kill_command: None,
            unlock_command: None,
            kill_on_missing,
            simulate: false,
        }
    }

    fn baseline() -> DeviceSet {
        ids(&["1234:5678", "aaaa:bbbb"])
    }

    // ==================== Concrete scenarios ====================

    #[test]
    fn test_known_device_removed_while_locked_kills() {
        let outcome = evaluate(&baseline(), &ids(&["1234:5678"]), &policy(&["1234:5678"], true), false);

        assert_eq!(outcome.kills.len(), 1);
        assert_eq!(outcome.kills[0].cause, KillCause::MissingDeviceWhileLocked);
        assert_eq!(outcome.kills[0].devices, vec![DeviceId::from("aaaa:bbbb")]);
        assert_eq!(outcome.next_known, ids(&["1234:5678"]));
    }

    #[test]
    fn test_new_device_while_unlocked_is_accepted() {
        let current = ids(&["1234:5678", "aaaa:bbbb", "cccc:dddd"]);
        let outcome = evaluate(&baseline(), &current, &policy(&["1234:5678"], true), true);

        assert!(outcome.kills.is_empty());
        assert_eq!(outcome.next_known, current);
        assert!(outcome.entries[0].message.contains("connected while unlocked"));
    }

    #[test]
    fn test_new_unlisted_device_while_locked_kills_and_is_remembered() {
        let current = ids(&["1234:5678", "aaaa:bbbb", "cccc:dddd"]);
        let outcome = evaluate(&baseline(), &current, &policy(&["1234:5678"], true), false);

        assert_eq!(outcome.kills.len(), 1);
        assert_eq!(outcome.kills[0].cause, KillCause::NewUnauthorizedDevice);
        assert_eq!(outcome.kills[0].devices, vec![DeviceId::from("cccc:dddd")]);
        assert!(outcome.next_known.contains(&DeviceId::from("cccc:dddd")));

        let entry = &outcome.entries[0];
        assert_eq!(entry.level, LogLevel::Warning);
        assert!(entry.attach_devices);

        // The same snapshot on the next cycle is not new any more
        let again = evaluate(&outcome.next_known, &current, &policy(&["1234:5678"], true), false);
        assert!(again.kills.is_empty());
    }

    #[test]
    fn test_unchanged_snapshot_is_idempotent() {
        let known = ids(&["X"]);
        let outcome = evaluate(&known, &known, &policy(&[], true), false);

        assert!(outcome.kills.is_empty());
        assert!(outcome.entries.is_empty());
        assert_eq!(outcome.next_known, known);
    }

    // ==================== Policy properties ====================

    #[test]
    fn test_whitelisted_device_never_kills() {
        let known = ids(&["aaaa:bbbb"]);
        let current = ids(&["aaaa:bbbb", "1234:5678"]);
        let outcome = evaluate(&known, &current, &policy(&["1234:5678"], true), false);

        assert!(outcome.kills.is_empty());
        assert!(outcome.next_known.contains(&DeviceId::from("1234:5678")));
        assert_eq!(outcome.entries.len(), 1);
        assert!(outcome.entries[0].message.contains("whitelisted"));
    }

    #[test]
    fn test_unlocked_never_kills_on_connect() {
        let known = ids(&[]);
        let current = ids(&["1111:1111", "2222:2222", "3333:3333"]);
        let outcome = evaluate(&known, &current, &policy(&["2222:2222"], true), true);

        assert!(outcome.kills.is_empty());
        assert_eq!(outcome.next_known, current);
    }

    #[test]
    fn test_removal_is_one_batched_kill() {
        let known = ids(&["a:1", "b:2", "c:3", "d:4"]);
        let current = ids(&["a:1"]);
        let outcome = evaluate(&known, &current, &policy(&[], true), false);

        assert_eq!(outcome.kills.len(), 1);
        assert_eq!(
            outcome.kills[0].devices,
            vec![DeviceId::from("b:2"), DeviceId::from("c:3"), DeviceId::from("d:4")]
        );
        assert_eq!(outcome.entries.len(), 1);
        assert!(outcome.entries[0].message.contains("b:2, c:3, d:4"));
        assert_eq!(outcome.next_known, current);
    }

    #[test]
    fn test_removal_with_kill_on_missing_disabled() {
        let known = ids(&["a:1", "b:2"]);
        let current = ids(&["a:1"]);
        let outcome = evaluate(&known, &current, &policy(&[], false), false);

        assert!(outcome.kills.is_empty());
        assert_eq!(outcome.next_known, current);
        assert!(outcome.entries[0].message.contains("kill_on_missing disabled"));
    }

    #[test]
    fn test_removal_while_unlocked() {
        let known = ids(&["a:1", "b:2"]);
        let outcome = evaluate(&known, &ids(&[]), &policy(&[], true), true);

        assert!(outcome.kills.is_empty());
        assert!(outcome.next_known.is_empty());
        assert!(outcome.entries[0].message.contains("disconnected while unlocked"));
    }

    #[test]
    fn test_whitelisted_baseline_device_still_guarded_on_removal() {
        let known = ids(&["1234:5678"]);
        let outcome = evaluate(&known, &ids(&[]), &policy(&["1234:5678"], true), false);
        assert_eq!(outcome.kills.len(), 1);
    }

    #[test]
    fn test_evaluation_continues_after_kill() {
        let known = ids(&["keep:0001", "gone:0001", "gone:0002"]);
        let current = ids(&["keep:0001", "new0:0001", "new0:0002", "list:0001"]);
        let outcome = evaluate(&known, &current, &policy(&["list:0001"], true), false);

        let causes: Vec<KillCause> = outcome.kills.iter().map(|k| k.cause).collect();
        assert_eq!(
            causes,
            vec![
                KillCause::NewUnauthorizedDevice,
                KillCause::NewUnauthorizedDevice,
                KillCause::MissingDeviceWhileLocked,
            ]
        );
        assert_eq!(outcome.next_known, current);
        // Missing batch is always evaluated after every new device
        assert!(outcome.entries.last().unwrap().message.contains("gone:0001, gone:0002"));
        assert_eq!(outcome.entries.len(), 4);
    }

    #[test]
    fn test_each_kill_points_at_its_warning() {
        let known = ids(&["keep:0001", "gone:0001"]);
        let current = ids(&["keep:0001", "new0:0001", "new0:0002", "list:0001"]);
        let outcome = evaluate(&known, &current, &policy(&["list:0001"], true), false);

        assert_eq!(outcome.announced_at, vec![1, 2, 3]);
        for (kill, &at) in outcome.kills.iter().zip(&outcome.announced_at) {
            let warning = &outcome.entries[at];
            assert_eq!(warning.level, LogLevel::Warning);
            assert!(warning.message.contains(kill.devices[0].as_str()));
        }
    }

    // ==================== DeviceDiff ====================

    #[test]
    fn test_diff_between() {
        let diff = DeviceDiff::between(&ids(&["a:1", "b:2"]), &ids(&["b:2", "c:3"]));
        assert_eq!(diff.added, ids(&["c:3"]));
        assert_eq!(diff.removed, ids(&["a:1"]));
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_needs_lock_state() {
        let p = policy(&["list:0001"], true);

        let whitelisted_only = DeviceDiff::between(&ids(&[]), &ids(&["list:0001"]));
        assert!(!whitelisted_only.needs_lock_state(&p));

        let unlisted = DeviceDiff::between(&ids(&[]), &ids(&["other:0001"]));
        assert!(unlisted.needs_lock_state(&p));

        let removal = DeviceDiff::between(&ids(&["a:1"]), &ids(&[]));
        assert!(removal.needs_lock_state(&p));
        assert!(!removal.needs_lock_state(&policy(&[], false)));

        assert!(!DeviceDiff::default().needs_lock_state(&p));
    }
}
