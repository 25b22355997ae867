//! Encoder acceleration tracking
//!
//! A relative encoder only reports direction, so speed is inferred from the
//! spacing of ticks: every tick arriving within [`ACCEL_WINDOW`] of the previous
//! one multiplies the step multiplier by the key's acceleration factor.

use std::time::{Duration, Instant};

/// Ticks closer together than this count as one continuous turn
pub const ACCEL_WINDOW: Duration = Duration::from_millis(100);

/// Acceleration state of one encoder binding
#[derive(Debug, Clone)]
pub struct AccelState {
    last_event: Option<Instant>,
    multiplier: f64,
    /// Set by a detent stop; swallows the next rapid tick
    parked: bool,
    /// Fractional pulses carried to the next tick
    pulse_remainder: f64,
}

impl Default for AccelState {
    fn default() -> Self {
        Self {
            last_event: None,
            multiplier: 1.0,
            parked: false,
            pulse_remainder: 0.0,
        }
    }
}

impl AccelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tick at `now` and return the multiplier to apply to it
    pub fn tick(&mut self, now: Instant, factor: f64, limit: f64) -> f64 {
        let rapid = self
            .last_event
            .is_some_and(|last| now.saturating_duration_since(last) < ACCEL_WINDOW);
        self.last_event = Some(now);

        if !rapid {
            self.parked = false;
            self.pulse_remainder = 0.0;
            self.multiplier = 1.0;
        } else if self.parked {
            self.parked = false;
            self.multiplier = 1.0;
            return 0.0;
        } else {
            self.multiplier = (self.multiplier * factor).min(limit);
        }
        self.multiplier
    }

    /// Stop at a detent: the next rapid tick does not move the control
    pub fn park(&mut self) {
        self.parked = true;
        self.multiplier = 0.0;
    }

    /// Current multiplier
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Number of pulse commands to issue for a tick with `multiplier`
    ///
    /// Always at least one; fractions accumulate across ticks.
    pub fn pulses(&mut self, multiplier: f64) -> u32 {
        let total = multiplier.max(0.0) + self.pulse_remainder;
        let count = total.floor().max(1.0);
        self.pulse_remainder = (total - count).max(0.0);
        count as u32
    }
}
