//! Availability alarm latch.
//!
//! A two-state machine with hysteresis around a fixed threshold: the
//! alarm is raised when availability drops strictly below the threshold
//! and cleared once it climbs back to or above it. Inputs that do not
//! cross the threshold relative to the current state are no-ops, so a
//! flapping availability stream never produces duplicate transitions.

/// A state transition produced by the latch, carrying the availability
/// percentage that caused it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlarmTransition {
    Raised(f64),
    Cleared(f64),
}

/// Per-target alarm state. Starts cleared.
#[derive(Debug, Clone)]
pub struct AlarmLatch {
    threshold: f64,
    triggered: bool,
}

impl AlarmLatch {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            triggered: false,
        }
    }

    /// Feed one availability reading into the latch.
    ///
    /// `None` means the window has no observations yet; evaluation is
    /// skipped entirely rather than treated as 0% availability.
    pub fn evaluate(&mut self, availability: Option<f64>) -> Option<AlarmTransition> {
        let availability = availability?;

        if availability < self.threshold && !self.triggered {
            self.triggered = true;
            return Some(AlarmTransition::Raised(availability));
        }

        if availability >= self.threshold && self.triggered {
            self.triggered = false;
            return Some(AlarmTransition::Cleared(availability));
        }

        None
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }
}
