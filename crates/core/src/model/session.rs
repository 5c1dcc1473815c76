use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one attempt.
///
/// `Loading -> InProgress -> Submitting -> Completed`. `Expired` is entered
/// when a submission forced by the timer fails; answers can no longer change
/// but the submission may be re-triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Loading,
    InProgress,
    Submitting,
    Completed,
    Expired,
}

impl SessionPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Loading => "loading",
            SessionPhase::InProgress => "in_progress",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Completed => "completed",
            SessionPhase::Expired => "expired",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of advancing a `Countdown` by one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// Still running, with the seconds left.
    Running(u32),
    /// Reached zero on this tick. Reported once.
    Expired,
    /// Already expired earlier; nothing happens.
    Idle,
}

/// Seconds-resolution countdown with a one-shot expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
    expiry_reported: bool,
}

impl Countdown {
    #[must_use]
    pub fn new(limit_secs: u32) -> Self {
        Self {
            remaining: limit_secs,
            expiry_reported: false,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expiry_reported
    }

    pub fn tick(&mut self) -> CountdownTick {
        if self.expiry_reported {
            return CountdownTick::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expiry_reported = true;
            CountdownTick::Expired
        } else {
            CountdownTick::Running(self.remaining)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_down_to_a_single_expiry() {
        let mut countdown = Countdown::new(3);
        assert_eq!(countdown.tick(), CountdownTick::Running(2));
        assert_eq!(countdown.tick(), CountdownTick::Running(1));
        assert_eq!(countdown.tick(), CountdownTick::Expired);
        for _ in 0..10 {
            assert_eq!(countdown.tick(), CountdownTick::Idle);
        }
        assert_eq!(countdown.remaining(), 0);
        assert!(countdown.is_expired());
    }

    #[test]
    fn zero_limit_expires_on_first_tick() {
        let mut countdown = Countdown::new(0);
        assert_eq!(countdown.tick(), CountdownTick::Expired);
        assert_eq!(countdown.tick(), CountdownTick::Idle);
        assert_eq!(countdown.remaining(), 0);
    }

    #[test]
    fn phase_names() {
        assert_eq!(SessionPhase::InProgress.to_string(), "in_progress");
    }
}
