//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Guide pulse bookkeeping.
//!
//! Each equatorial axis carries at most one pulse at a time. Requesting a
//! pulse in one direction zeroes whatever was pending in the opposite
//! direction, so a correction can always be superseded.
//!

use crate::mount::{Direction, EqAxis};

/// Pulses no longer than this complete synchronously; the mount times them
/// out before a round trip is worth scheduling.
pub const SYNC_PULSE_LIMIT_MS: u32 = 20;

/// How a guide request ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PulseOutcome {
    /// Pulse was short enough to be treated as already finished.
    Complete,
    /// Pulse is running; completion arrives via timer.
    InFlight
}

/// What the caller must do with a request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestAction {
    /// Send the pulse to the mount.
    Dispatch(u32),
    /// Zero-duration request: nothing to send, any opposite pulse is wiped.
    Cancelled
}

#[derive(Default)]
struct AxisPulse {
    /// Pending durations (ms) for the two directions of the axis.
    positive: u32,
    negative: u32,
    in_flight: bool
}

/// Per-axis pulse state for one mount.
#[derive(Default)]
pub struct GuidePulses {
    ra: AxisPulse,
    dec: AxisPulse
}

impl GuidePulses {
    pub fn new() -> GuidePulses { Default::default() }

    fn axis(&mut self, axis: EqAxis) -> &mut AxisPulse {
        match axis { EqAxis::Ra => &mut self.ra, EqAxis::Dec => &mut self.dec }
    }

    /// Records a pulse request, wiping the opposite direction.
    pub fn request(&mut self, dir: Direction, duration_ms: u32) -> RequestAction {
        let pulse = self.axis(dir.axis());
        match dir {
            Direction::North | Direction::West => {
                pulse.positive = duration_ms;
                pulse.negative = 0;
            },
            Direction::South | Direction::East => {
                pulse.negative = duration_ms;
                pulse.positive = 0;
            }
        }

        if duration_ms == 0 { RequestAction::Cancelled } else { RequestAction::Dispatch(duration_ms) }
    }

    pub fn mark_in_flight(&mut self, axis: EqAxis) {
        self.axis(axis).in_flight = true;
    }

    /// Clears the axis once its pulse has timed out.
    pub fn complete(&mut self, axis: EqAxis) {
        let pulse = self.axis(axis);
        pulse.positive = 0;
        pulse.negative = 0;
        pulse.in_flight = false;
    }

    pub fn is_busy(&mut self, axis: EqAxis) -> bool {
        self.axis(axis).in_flight
    }

    /// Pending duration in the given direction (ms).
    pub fn pending(&mut self, dir: Direction) -> u32 {
        let pulse = self.axis(dir.axis());
        match dir {
            Direction::North | Direction::West => pulse.positive,
            Direction::South | Direction::East => pulse.negative
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_direction_is_zeroed() {
        let mut pulses = GuidePulses::new();
        assert_eq!(RequestAction::Dispatch(500), pulses.request(Direction::North, 500));
        assert_eq!(500, pulses.pending(Direction::North));

        assert_eq!(RequestAction::Dispatch(300), pulses.request(Direction::South, 300));
        assert_eq!(0, pulses.pending(Direction::North));
        assert_eq!(300, pulses.pending(Direction::South));
    }

    #[test]
    fn axes_are_independent() {
        let mut pulses = GuidePulses::new();
        pulses.request(Direction::North, 500);
        pulses.request(Direction::West, 200);
        assert_eq!(500, pulses.pending(Direction::North));
        assert_eq!(200, pulses.pending(Direction::West));
    }

    #[test]
    fn zero_duration_cancels() {
        let mut pulses = GuidePulses::new();
        pulses.request(Direction::East, 400);
        assert_eq!(RequestAction::Cancelled, pulses.request(Direction::East, 0));
        assert_eq!(0, pulses.pending(Direction::East));
    }

    #[test]
    fn completion_clears_the_axis() {
        let mut pulses = GuidePulses::new();
        pulses.request(Direction::North, 500);
        pulses.mark_in_flight(EqAxis::Dec);
        assert!(pulses.is_busy(EqAxis::Dec));

        pulses.complete(EqAxis::Dec);
        assert!(!pulses.is_busy(EqAxis::Dec));
        assert_eq!(0, pulses.pending(Direction::North));
    }
}
