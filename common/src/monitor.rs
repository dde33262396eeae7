use crate::{
    detector::restart_needed,
    types::{HvacMode, Reading, Sample},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Sampling,
    FaultDetected { original_mode: HvacMode },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    /// The sample became the new baseline.
    Advance,
    /// Cycle the system off and back to `original_mode`, then report the
    /// confirmed sample through [`PollState::recovery_complete`].
    Restart { original_mode: HvacMode },
}

/// Baseline carried from one poll tick to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    pub last_is_cooling: bool,
    pub last_temperature_f: i32,
    phase: MonitorPhase,
    consecutive_read_failures: u32,
}

impl Default for PollState {
    fn default() -> Self {
        Self {
            last_is_cooling: false,
            last_temperature_f: 0,
            phase: MonitorPhase::Sampling,
            consecutive_read_failures: 0,
        }
    }
}

impl PollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn baseline(&self) -> Reading {
        Reading {
            is_cooling: self.last_is_cooling,
            temperature_f: self.last_temperature_f,
        }
    }

    pub fn observe(&mut self, sample: &Sample) -> MonitorAction {
        if restart_needed(self.baseline(), sample.reading()) {
            self.phase = MonitorPhase::FaultDetected {
                original_mode: sample.mode,
            };
            return MonitorAction::Restart {
                original_mode: sample.mode,
            };
        }

        self.accept(sample);
        MonitorAction::Advance
    }

    pub fn consecutive_read_failures(&self) -> u32 {
        self.consecutive_read_failures
    }

    /// A failed read leaves the baseline untouched.
    pub fn read_failed(&mut self) {
        self.consecutive_read_failures = self.consecutive_read_failures.saturating_add(1);
    }

    pub fn recovery_complete(&mut self, restarted: &Sample) {
        self.accept(restarted);
    }

    fn accept(&mut self, sample: &Sample) {
        self.last_is_cooling = sample.is_cooling;
        self.last_temperature_f = sample.temperature_f;
        self.phase = MonitorPhase::Sampling;
        self.consecutive_read_failures = 0;
    }
}
