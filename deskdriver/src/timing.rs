//! Settle waits.
//!
//! The target application redraws and processes input asynchronously and offers no
//! notification when it has caught up. Every dispatch is therefore followed by a
//! fixed sleep whose length depends on the kind of work just requested.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A named step of work the application needs time to absorb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    WindowActivation,
    CellSelection,
    TextInput,
    MenuOperation,
    FileOperation,
    DialogWait,
    DialogCheckInterval,
    DialogConfirm,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::WindowActivation,
        Phase::CellSelection,
        Phase::TextInput,
        Phase::MenuOperation,
        Phase::FileOperation,
        Phase::DialogWait,
        Phase::DialogCheckInterval,
        Phase::DialogConfirm,
    ];

    fn default_millis(self) -> u64 {
        match self {
            Phase::WindowActivation => 500,
            Phase::CellSelection => 200,
            Phase::TextInput => 100,
            Phase::MenuOperation => 300,
            Phase::FileOperation => 1000,
            Phase::DialogWait => 500,
            Phase::DialogCheckInterval => 500,
            Phase::DialogConfirm => 200,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::WindowActivation => "window_activation",
            Phase::CellSelection => "cell_selection",
            Phase::TextInput => "text_input",
            Phase::MenuOperation => "menu_operation",
            Phase::FileOperation => "file_operation",
            Phase::DialogWait => "dialog_wait",
            Phase::DialogCheckInterval => "dialog_check_interval",
            Phase::DialogConfirm => "dialog_confirm",
        };
        f.write_str(name)
    }
}

/// Phase to duration lookup. Phases missing from a loaded profile use built-in defaults.
///
/// Serialized as a map of phase name to milliseconds:
///
/// ```
/// use deskdriver::timing::{Phase, TimingProfile};
/// use std::time::Duration;
///
/// let profile: TimingProfile = serde_json::from_str(r#"{"cell_selection": 50}"#).unwrap();
/// assert_eq!(profile.get(Phase::CellSelection), Duration::from_millis(50));
/// assert_eq!(profile.get(Phase::FileOperation), Duration::from_millis(1000));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Phase, u64>", into = "BTreeMap<Phase, u64>")]
pub struct TimingProfile {
    overrides: BTreeMap<Phase, Duration>,
}

impl TimingProfile {
    /// Every phase waits exactly `duration`. Mostly useful for tests and dry runs.
    pub fn uniform(duration: Duration) -> Self {
        Self {
            overrides: Phase::ALL.iter().map(|p| (*p, duration)).collect(),
        }
    }

    pub fn with(mut self, phase: Phase, duration: Duration) -> Self {
        self.overrides.insert(phase, duration);
        self
    }

    pub fn get(&self, phase: Phase) -> Duration {
        self.overrides
            .get(&phase)
            .copied()
            .unwrap_or_else(|| Duration::from_millis(phase.default_millis()))
    }
}

impl From<BTreeMap<Phase, u64>> for TimingProfile {
    fn from(map: BTreeMap<Phase, u64>) -> Self {
        Self {
            overrides: map
                .into_iter()
                .map(|(phase, ms)| (phase, Duration::from_millis(ms)))
                .collect(),
        }
    }
}

impl From<TimingProfile> for BTreeMap<Phase, u64> {
    fn from(profile: TimingProfile) -> Self {
        Phase::ALL
            .iter()
            .map(|p| (*p, profile.get(*p).as_millis() as u64))
            .collect()
    }
}

/// Performs settle waits. Swapped out in tests to observe wait order without sleeping.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Blocks the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}
