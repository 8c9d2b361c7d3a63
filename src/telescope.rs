//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Motion state machine shared by all mount codecs.
//!
//! State changes happen in exactly two places: a command handler, or
//! `poll` reacting to a fresh status report. Mounts whose firmware cannot
//! park on its own are parked by slewing to the park position and then
//! stepping through [`ManualParkPhase`], one serial action per poll.
//!

use crate::astro::{equatorial_to_horizontal, horizontal_to_equatorial, julian_date_now, Location};
use crate::channel::ChannelError;
use crate::guiding::{GuidePulses, PulseOutcome, RequestAction, SYNC_PULSE_LIMIT_MS};
use crate::mount::{
    Direction, EqAxis, MountCodec, MountStatus, PierSide, SlewRate, SystemStatus, TrackMode,
    SIDEREAL_RATE_ARCSEC_PER_SEC
};
use crate::parking::{ManualParkPhase, ParkPosition};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// How many status polls a freshly commanded slew gets to show up as slewing.
const SLEW_CONFIRM_ATTEMPTS: u32 = 5;
const SLEW_CONFIRM_DELAY: std::time::Duration = std::time::Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("mount does not support this: {0}")]
    Capability(&'static str),

    #[error("operation not allowed now: {0}")]
    Sequence(&'static str),

    #[error("mount did not confirm the slew")]
    ConfirmationTimeout,

    #[error("operation aborted")]
    Aborted
}

/// Driver-side motion state. Coarser than [`SystemStatus`]: it also knows
/// about in-progress parking, which the firmware of some mounts does not.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum MotionState {
    Idle,
    Slewing,
    Tracking,
    Parking,
    Parked
}

/// Where a manual park stands between issuing the park slew and seeing it
/// actually run. A mount still tracking from before the slew starts must
/// not be mistaken for one that finished it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ParkingProgress {
    AwaitingSlew,
    SlewSeen
}

/// Requests an abort of a blocking slew confirmation from another thread.
#[derive(Clone)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct Telescope {
    codec: Box<dyn MountCodec>,
    location: Location,
    state: MotionState,
    parking_progress: ParkingProgress,
    manual_phase: ManualParkPhase,
    park_position: ParkPosition,
    saved_slew_rate: Option<SlewRate>,
    last_status: Option<MountStatus>,
    position: (f64, f64),
    pier: Option<PierSide>,
    pulses: GuidePulses,
    abort_pending: Arc<AtomicBool>,
    track_mode: TrackMode,
    custom_rate_offset: f64,
    dec_rate_warned: bool
}

impl Telescope {
    /// # Parameters
    ///
    /// * `assume_parked` - Whether the mount was left parked by a previous
    ///     session. Matters for mounts without native park, whose firmware
    ///     has no memory of it.
    ///
    pub fn new(
        codec: Box<dyn MountCodec>,
        location: Location,
        park_position: Option<ParkPosition>,
        assume_parked: bool
    ) -> Telescope {
        let (state, manual_phase) = if assume_parked {
            (MotionState::Parked, ManualParkPhase::Stopped)
        } else {
            (MotionState::Idle, ManualParkPhase::NotParked)
        };

        Telescope{
            codec,
            location,
            state,
            parking_progress: ParkingProgress::AwaitingSlew,
            manual_phase,
            park_position: park_position.unwrap_or(ParkPosition::default_for(location.latitude)),
            saved_slew_rate: None,
            last_status: None,
            position: (0.0, 0.0),
            pier: None,
            pulses: GuidePulses::new(),
            abort_pending: Arc::new(AtomicBool::new(false)),
            track_mode: TrackMode::Sidereal,
            custom_rate_offset: 0.0,
            dec_rate_warned: false
        }
    }

    pub fn info(&self) -> String { self.codec.info() }

    pub fn state(&self) -> MotionState { self.state }

    /// Last polled pointing position as (RA hours, Dec degrees).
    pub fn position(&self) -> (f64, f64) { self.position }

    pub fn pier_side(&self) -> Option<PierSide> { self.pier }

    pub fn last_status(&self) -> Option<MountStatus> { self.last_status }

    pub fn park_position(&self) -> ParkPosition { self.park_position }

    pub fn abort_signal(&self) -> AbortSignal {
        AbortSignal(Arc::clone(&self.abort_pending))
    }

    fn ensure_unparked(&self, what: &'static str) -> Result<(), DriverError> {
        match self.state {
            MotionState::Parked | MotionState::Parking => Err(DriverError::Sequence(what)),
            _ => Ok(())
        }
    }

    /// Commands a slew and blocks until the mount confirms it is moving.
    ///
    /// Some firmware acknowledges `:MS#` and then silently stays put (e.g.
    /// target below the horizon limit), so the acknowledgement alone proves
    /// nothing.
    fn start_slew(&mut self, ra: f64, dec: f64) -> Result<(), DriverError> {
        self.codec.set_target_ra(ra)?;
        self.codec.set_target_dec(dec)?;
        self.codec.slew_to_target()?;

        for attempt in 0..SLEW_CONFIRM_ATTEMPTS {
            if self.abort_pending.swap(false, Ordering::SeqCst) {
                self.codec.stop()?;
                self.state = MotionState::Idle;
                return Err(DriverError::Aborted);
            }

            let status = self.codec.status()?;
            if status.system.is_slewing() {
                return Ok(());
            }

            if attempt + 1 < SLEW_CONFIRM_ATTEMPTS {
                std::thread::sleep(SLEW_CONFIRM_DELAY);
            }
        }

        Err(DriverError::ConfirmationTimeout)
    }

    /// Slews to the given equatorial coordinates (RA hours, Dec degrees).
    pub fn slew_to(&mut self, ra: f64, dec: f64) -> Result<(), DriverError> {
        self.ensure_unparked("cannot slew while parked or parking")?;
        self.start_slew(ra, dec)?;
        self.state = MotionState::Slewing;
        log::info!("slewing to RA {:.4} h, Dec {:.4}\u{00B0}", ra, dec);
        Ok(())
    }

    /// Makes the mount believe it points at the given coordinates.
    pub fn sync(&mut self, ra: f64, dec: f64) -> Result<(), DriverError> {
        self.ensure_unparked("cannot sync while parked or parking")?;
        self.codec.set_target_ra(ra)?;
        self.codec.set_target_dec(dec)?;
        self.codec.sync_to_target()?;
        self.position = (ra, dec);
        Ok(())
    }

    pub fn park(&mut self) -> Result<(), DriverError> {
        if self.state == MotionState::Parked || self.state == MotionState::Parking {
            return Err(DriverError::Sequence("already parked or parking"));
        }

        if self.codec.capabilities().native_park {
            self.codec.set_park_position(self.park_position.az, self.park_position.alt)?;
            self.codec.park()?;
        } else {
            let (ra, dec) = horizontal_to_equatorial(
                self.park_position.az, self.park_position.alt, &self.location, julian_date_now()
            );
            self.start_slew(ra, dec)?;
            self.parking_progress = ParkingProgress::AwaitingSlew;
        }

        self.state = MotionState::Parking;
        log::info!(
            "parking to az {:.4}\u{00B0}, alt {:.4}\u{00B0}",
            self.park_position.az, self.park_position.alt
        );
        Ok(())
    }

    pub fn unpark(&mut self) -> Result<(), DriverError> {
        if self.state != MotionState::Parked {
            return Err(DriverError::Sequence("mount is not parked"));
        }

        if self.codec.capabilities().native_park {
            self.codec.unpark()?;
            self.state = MotionState::Idle;
            log::info!("mount unparked");
            return Ok(());
        }

        // firmware forgot everything while the motors were off; re-anchor
        // the pointing model at the park position
        let (ra, dec) = horizontal_to_equatorial(
            self.park_position.az, self.park_position.alt, &self.location, julian_date_now()
        );
        self.codec.set_target_ra(ra)?;
        self.codec.set_target_dec(dec)?;
        self.codec.sync_to_target()?;
        self.position = (ra, dec);

        if self.manual_phase == ManualParkPhase::Stopped {
            self.codec.stop_motion(EqAxis::Ra)?;
            self.manual_phase = ManualParkPhase::NeedSlew;
        } else {
            self.manual_phase = ManualParkPhase::NotParked;
            self.state = MotionState::Idle;
        }
        Ok(())
    }

    /// Stops all movement. Refused while parked; firmware of some mounts
    /// would resume tracking and silently invalidate the park.
    pub fn abort(&mut self) -> Result<(), DriverError> {
        // Consume the pending-abort signal even when the request is refused,
        // so it cannot cancel a later, unrelated slew confirmation.
        self.abort_pending.store(false, Ordering::SeqCst);
        if self.state == MotionState::Parked {
            return Err(DriverError::Sequence("cannot abort while parked"));
        }
        self.codec.stop()?;
        self.state = MotionState::Idle;
        log::info!("motion aborted");
        Ok(())
    }

    pub fn start_motion(&mut self, dir: Direction) -> Result<(), DriverError> {
        self.ensure_unparked("cannot move while parked or parking")?;
        self.codec.start_motion(dir)?;
        Ok(())
    }

    pub fn stop_motion(&mut self, axis: EqAxis) -> Result<(), DriverError> {
        self.ensure_unparked("cannot move while parked or parking")?;
        self.codec.stop_motion(axis)?;
        Ok(())
    }

    /// Fires a guide pulse. Anything at most [`SYNC_PULSE_LIMIT_MS`] long is
    /// reported complete immediately; longer pulses complete via
    /// [`Telescope::complete_guide`] once their duration elapses.
    pub fn guide(&mut self, dir: Direction, duration_ms: u32) -> Result<PulseOutcome, DriverError> {
        self.ensure_unparked("cannot guide while parked or parking")?;

        match self.pulses.request(dir, duration_ms) {
            RequestAction::Cancelled => Ok(PulseOutcome::Complete),
            RequestAction::Dispatch(ms) => {
                self.codec.guide(dir, ms)?;
                if ms <= SYNC_PULSE_LIMIT_MS {
                    self.pulses.complete(dir.axis());
                    Ok(PulseOutcome::Complete)
                } else {
                    self.pulses.mark_in_flight(dir.axis());
                    Ok(PulseOutcome::InFlight)
                }
            }
        }
    }

    pub fn complete_guide(&mut self, axis: EqAxis) {
        self.pulses.complete(axis);
    }

    pub fn guide_pulse_busy(&mut self, axis: EqAxis) -> bool {
        self.pulses.is_busy(axis)
    }

    pub fn set_track_mode(&mut self, mode: TrackMode) -> Result<(), DriverError> {
        self.codec.set_track_mode(mode)?;
        self.track_mode = mode;
        Ok(())
    }

    /// Sets the tracking rate per axis in arc seconds per second. Only the
    /// RA rate is adjustable; a non-sidereal Dec rate is ignored.
    pub fn set_track_rate(&mut self, ra_rate: f64, dec_rate: f64) -> Result<(), DriverError> {
        if dec_rate != 0.0 && !self.dec_rate_warned {
            log::warn!("custom declination tracking rate is not supported, ignoring");
            self.dec_rate_warned = true;
        }
        let offset = ra_rate - SIDEREAL_RATE_ARCSEC_PER_SEC;
        self.codec.set_custom_track_rate(offset)?;
        self.custom_rate_offset = offset;
        self.track_mode = TrackMode::Custom;
        Ok(())
    }

    pub fn set_tracking(&mut self, enabled: bool) -> Result<(), DriverError> {
        self.ensure_unparked("cannot change tracking while parked or parking")?;
        if enabled {
            // mode and rate first; enabling applies whatever is set
            self.codec.set_track_mode(self.track_mode)?;
            if self.track_mode == TrackMode::Custom {
                self.codec.set_custom_track_rate(self.custom_rate_offset)?;
            }
        }
        self.codec.set_tracking(enabled)?;
        self.state = if enabled { MotionState::Tracking } else { MotionState::Idle };
        Ok(())
    }

    pub fn set_guide_rate(&mut self, ra: f64, dec: f64) -> Result<(), DriverError> {
        if !self.codec.capabilities().guide_rate_adjustable {
            return Err(DriverError::Capability("guide rate is fixed on this mount"));
        }
        self.codec.set_guide_rate(ra, dec)?;
        Ok(())
    }

    pub fn guide_rate(&mut self) -> Result<(f64, f64), DriverError> {
        if !self.codec.capabilities().guide_rate_adjustable {
            return Err(DriverError::Capability("guide rate is fixed on this mount"));
        }
        Ok(self.codec.guide_rate()?)
    }

    pub fn find_home(&mut self) -> Result<(), DriverError> {
        if !self.codec.capabilities().native_home {
            return Err(DriverError::Capability("mount cannot search for the home index"));
        }
        self.ensure_unparked("cannot search for home while parked or parking")?;
        self.codec.find_home()?;
        self.state = MotionState::Slewing;
        Ok(())
    }

    pub fn goto_home(&mut self) -> Result<(), DriverError> {
        self.ensure_unparked("cannot go home while parked or parking")?;
        self.codec.goto_home()?;
        self.state = MotionState::Slewing;
        Ok(())
    }

    pub fn set_current_as_home(&mut self) -> Result<(), DriverError> {
        self.ensure_unparked("cannot redefine home while parked or parking")?;
        self.codec.set_current_as_home()?;
        Ok(())
    }

    pub fn set_slew_rate(&mut self, rate: SlewRate) -> Result<(), DriverError> {
        self.codec.set_slew_rate(rate)?;
        Ok(())
    }

    pub fn set_park_position(&mut self, position: ParkPosition) {
        self.park_position = position;
    }

    /// Makes the current pointing position the park position.
    pub fn set_current_as_park(&mut self) {
        let (az, alt) = equatorial_to_horizontal(
            self.position.0, self.position.1, &self.location, julian_date_now()
        );
        self.park_position = ParkPosition{ az, alt };
    }

    pub fn set_default_park(&mut self) {
        self.park_position = ParkPosition::default_for(self.location.latitude);
    }

    /// Reads the mount status and advances the state machine. Called
    /// periodically by the poll worker.
    pub fn poll(&mut self) -> Result<(), DriverError> {
        let status = self.codec.status()?;
        self.apply_status(&status);
        self.position = self.codec.position()?;
        self.pier = self.codec.pier_side()?;
        self.last_status = Some(status);

        if !self.codec.capabilities().native_park {
            self.advance_manual_park()?;
        }
        Ok(())
    }

    fn apply_status(&mut self, status: &MountStatus) {
        match status.system {
            SystemStatus::Parked => {
                if self.state != MotionState::Parked {
                    log::info!("mount parked");
                    self.state = MotionState::Parked;
                }
            },

            s if s.is_slewing() => match self.state {
                MotionState::Parking => { self.parking_progress = ParkingProgress::SlewSeen; },
                MotionState::Parked => (),
                _ => { self.state = MotionState::Slewing; }
            },

            s if s.is_tracking() => match self.state {
                MotionState::Parking => {
                    // tracking resumed after the park slew was seen running:
                    // the mount has arrived; tracking seen before that is
                    // merely what preceded the slew
                    if self.parking_progress == ParkingProgress::SlewSeen
                        && !self.codec.capabilities().native_park
                    {
                        log::info!("mount reached the park position");
                        self.state = MotionState::Parked;
                        self.manual_phase = ManualParkPhase::NotParked;
                    }
                },
                MotionState::Parked => (),
                _ => {
                    if let Some(prev) = &self.last_status {
                        match prev.system {
                            SystemStatus::Slewing => log::info!("slew complete"),
                            SystemStatus::MeridianFlipping => log::info!("meridian flip complete"),
                            _ => ()
                        }
                    }
                    self.state = MotionState::Tracking;
                }
            },

            // Stopped or Home
            _ => match self.state {
                MotionState::Parking | MotionState::Parked => (),
                _ => { self.state = MotionState::Idle; }
            }
        }
    }

    /// One step of stopping (or restarting) the motors of a mount parked
    /// without firmware support. Errors leave the phase untouched, so the
    /// step is simply retried on the next poll.
    fn advance_manual_park(&mut self) -> Result<(), DriverError> {
        match (self.state, self.manual_phase) {
            (MotionState::Parked, ManualParkPhase::NotParked) => {
                log::info!("mount at park position, stopping tracking");
                self.saved_slew_rate = self.last_status.map(|s| s.slew_rate);
                self.codec.set_slew_rate(SlewRate::S1x)?;
                self.manual_phase = ManualParkPhase::NeedAbort;
            },
            (MotionState::Parked, ManualParkPhase::NeedAbort) => {
                self.codec.stop()?;
                self.manual_phase = ManualParkPhase::NeedStop;
            },
            (MotionState::Parked, ManualParkPhase::NeedStop) => {
                // eastward drive at 1x cancels the sidereal motion
                self.codec.start_motion(Direction::East)?;
                log::info!("mount parked, motors stopped");
                self.manual_phase = ManualParkPhase::Stopped;
            },
            (MotionState::Parked, ManualParkPhase::NeedSlew) => {
                if let Some(rate) = self.saved_slew_rate {
                    self.codec.set_slew_rate(rate)?;
                    self.saved_slew_rate = None;
                }
                self.manual_phase = ManualParkPhase::NotParked;
                self.state = MotionState::Idle;
                log::info!("mount unparked");
            },
            _ => ()
        }
        Ok(())
    }

    #[cfg(test)]
    fn manual_phase(&self) -> ManualParkPhase { self.manual_phase }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::{Capabilities, SimulatorLog, SimulatorMount};

    const NATIVE: Capabilities = Capabilities{
        native_park: true, native_home: true, guide_rate_adjustable: true
    };
    const BAREBONES: Capabilities = Capabilities{
        native_park: false, native_home: false, guide_rate_adjustable: false
    };

    const LOCATION: Location = Location{ latitude: 52.2, longitude: 21.0 };

    fn telescope(
        capabilities: Capabilities,
        script: &[SystemStatus]
    ) -> (Telescope, SimulatorLog) {
        let mut sim = SimulatorMount::new(capabilities);
        for system in script { sim.push_system(*system); }
        let log = sim.log();
        (Telescope::new(Box::new(sim), LOCATION, None, false), log)
    }

    fn commands(log: &SimulatorLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn goto_is_confirmed_against_slow_status_reports() {
        use SystemStatus::*;
        let (mut tel, _) = telescope(NATIVE, &[Stopped, Stopped, Slewing, Slewing, TrackingPecOff]);

        tel.slew_to(5.0, 20.0).unwrap();
        assert_eq!(MotionState::Slewing, tel.state());

        tel.poll().unwrap();
        assert_eq!(MotionState::Slewing, tel.state());
        tel.poll().unwrap();
        assert_eq!(MotionState::Tracking, tel.state());
    }

    #[test]
    fn goto_without_motion_times_out() {
        use SystemStatus::*;
        let (mut tel, _) = telescope(NATIVE, &[Stopped]);
        assert!(matches!(tel.slew_to(5.0, 20.0), Err(DriverError::ConfirmationTimeout)));
        assert_eq!(MotionState::Idle, tel.state());
    }

    #[test]
    fn abort_request_interrupts_goto_confirmation() {
        use SystemStatus::*;
        let (mut tel, log) = telescope(NATIVE, &[Stopped]);

        tel.abort_signal().request();
        assert!(matches!(tel.slew_to(5.0, 20.0), Err(DriverError::Aborted)));
        assert_eq!(MotionState::Idle, tel.state());
        assert!(commands(&log).contains(&"stop".to_string()));
    }

    #[test]
    fn refused_abort_does_not_cancel_the_next_goto() {
        use SystemStatus::*;
        let (mut tel, log) = telescope(NATIVE, &[Slewing, Parked, Slewing]);

        tel.park().unwrap();
        tel.poll().unwrap();
        tel.poll().unwrap();
        assert_eq!(MotionState::Parked, tel.state());

        tel.abort_signal().request();
        assert!(matches!(tel.abort(), Err(DriverError::Sequence(_))));

        tel.unpark().unwrap();
        tel.slew_to(5.0, 20.0).unwrap();
        assert_eq!(MotionState::Slewing, tel.state());
        assert!(!commands(&log).contains(&"stop".to_string()));
    }

    #[test]
    fn native_park_defers_to_firmware() {
        use SystemStatus::*;
        let (mut tel, log) = telescope(NATIVE, &[Slewing, Parked]);

        tel.park().unwrap();
        assert_eq!(MotionState::Parking, tel.state());
        assert!(commands(&log).contains(&"park".to_string()));

        tel.poll().unwrap();
        tel.poll().unwrap();
        assert_eq!(MotionState::Parked, tel.state());

        tel.unpark().unwrap();
        assert_eq!(MotionState::Idle, tel.state());
        assert!(commands(&log).contains(&"unpark".to_string()));
    }

    #[test]
    fn manual_park_steps_through_motor_stop_phases() {
        use SystemStatus::*;
        let (mut tel, log) = telescope(
            BAREBONES,
            // confirmation consumes the first report
            &[Slewing, Slewing, TrackingPecOff, TrackingPecOff, TrackingPecOff, TrackingPecOff]
        );
        let park_before = tel.park_position();

        tel.park().unwrap();
        assert_eq!(MotionState::Parking, tel.state());

        tel.poll().unwrap();    // slew seen
        assert_eq!(MotionState::Parking, tel.state());
        tel.poll().unwrap();    // arrival
        assert_eq!(MotionState::Parked, tel.state());
        assert_eq!(ManualParkPhase::NeedAbort, tel.manual_phase());

        tel.poll().unwrap();
        assert_eq!(ManualParkPhase::NeedStop, tel.manual_phase());
        tel.poll().unwrap();
        assert_eq!(ManualParkPhase::Stopped, tel.manual_phase());
        assert_eq!(MotionState::Parked, tel.state());

        let cmds = commands(&log);
        assert!(cmds.contains(&"set_slew_rate S1x".to_string()));
        assert!(cmds.contains(&"stop".to_string()));
        assert!(cmds.contains(&"start_motion East".to_string()));
        assert_eq!(park_before, tel.park_position());
    }

    #[test]
    fn tracking_before_the_park_slew_does_not_end_parking() {
        use SystemStatus::*;
        let (mut tel, _) = telescope(
            BAREBONES,
            &[Slewing, TrackingPecOff, Slewing, TrackingPecOff]
        );

        tel.park().unwrap();

        // pre-slew tracking leaks into the first poll; must not count
        // as arrival because no slew was seen running yet
        tel.poll().unwrap();
        assert_eq!(MotionState::Parking, tel.state());
        tel.poll().unwrap();
        tel.poll().unwrap();
        assert_eq!(MotionState::Parked, tel.state());
    }

    #[test]
    fn stopped_report_does_not_unpark_a_manually_parked_mount() {
        use SystemStatus::*;
        let (mut tel, _) = telescope(
            BAREBONES,
            &[Slewing, Slewing, TrackingPecOff, Stopped, Stopped]
        );

        tel.park().unwrap();
        tel.poll().unwrap();
        tel.poll().unwrap();
        assert_eq!(MotionState::Parked, tel.state());

        // transient "stopped" noise from the firmware must not un-park
        tel.poll().unwrap();
        tel.poll().unwrap();
        assert_eq!(MotionState::Parked, tel.state());
    }

    #[test]
    fn manual_unpark_restores_slew_rate_and_goes_idle() {
        use SystemStatus::*;
        let (mut tel, log) = telescope(
            BAREBONES,
            &[Slewing, Slewing, TrackingPecOff, TrackingPecOff, TrackingPecOff, TrackingPecOff,
              TrackingPecOff]
        );
        let park_before = tel.park_position();

        tel.park().unwrap();
        for _ in 0..4 { tel.poll().unwrap(); }
        assert_eq!(ManualParkPhase::Stopped, tel.manual_phase());

        tel.unpark().unwrap();
        assert_eq!(ManualParkPhase::NeedSlew, tel.manual_phase());
        assert_eq!(MotionState::Parked, tel.state());
        assert!(commands(&log).contains(&"sync".to_string()));

        tel.poll().unwrap();
        assert_eq!(ManualParkPhase::NotParked, tel.manual_phase());
        assert_eq!(MotionState::Idle, tel.state());
        assert!(commands(&log).contains(&"set_slew_rate S64x".to_string()));
        assert_eq!(park_before, tel.park_position());
    }

    #[test]
    fn failed_phase_action_is_retried_on_next_poll() {
        use SystemStatus::*;
        let mut sim = SimulatorMount::new(BAREBONES);
        for s in [Slewing, Slewing, TrackingPecOff, TrackingPecOff, TrackingPecOff] {
            sim.push_system(s);
        }
        sim.fail_once("stop");
        let mut tel = Telescope::new(Box::new(sim), LOCATION, None, false);

        tel.park().unwrap();
        tel.poll().unwrap();
        tel.poll().unwrap();
        assert_eq!(ManualParkPhase::NeedAbort, tel.manual_phase());

        // the injected failure hits the abort step; phase must hold
        assert!(tel.poll().is_err());
        assert_eq!(ManualParkPhase::NeedAbort, tel.manual_phase());

        tel.poll().unwrap();
        assert_eq!(ManualParkPhase::NeedStop, tel.manual_phase());
    }

    #[test]
    fn parked_mount_refuses_motion_without_talking_to_it() {
        use SystemStatus::*;
        let (mut tel, log) = telescope(NATIVE, &[Slewing, Parked]);
        tel.park().unwrap();
        tel.poll().unwrap();
        tel.poll().unwrap();
        assert_eq!(MotionState::Parked, tel.state());

        let count_before = commands(&log).len();
        assert!(matches!(tel.slew_to(1.0, 1.0), Err(DriverError::Sequence(_))));
        for dir in <Direction as strum::IntoEnumIterator>::iter() {
            assert!(matches!(tel.start_motion(dir), Err(DriverError::Sequence(_))));
            assert!(matches!(tel.guide(dir, 100), Err(DriverError::Sequence(_))));
        }
        assert!(matches!(tel.abort(), Err(DriverError::Sequence(_))));
        assert_eq!(count_before, commands(&log).len());
    }

    #[test]
    fn short_guide_pulse_completes_synchronously() {
        let (mut tel, log) = telescope(NATIVE, &[]);
        assert_eq!(PulseOutcome::Complete, tel.guide(Direction::North, 15).unwrap());
        assert!(!tel.guide_pulse_busy(EqAxis::Dec));
        assert!(commands(&log).contains(&"guide North 15".to_string()));
    }

    #[test]
    fn long_guide_pulse_stays_in_flight_until_completed() {
        let (mut tel, _) = telescope(NATIVE, &[]);
        assert_eq!(PulseOutcome::InFlight, tel.guide(Direction::North, 500).unwrap());
        assert!(tel.guide_pulse_busy(EqAxis::Dec));

        tel.complete_guide(EqAxis::Dec);
        assert!(!tel.guide_pulse_busy(EqAxis::Dec));
    }

    #[test]
    fn capability_gated_operations_are_refused() {
        let (mut tel, log) = telescope(BAREBONES, &[]);
        assert!(matches!(tel.find_home(), Err(DriverError::Capability(_))));
        assert!(matches!(tel.set_guide_rate(0.5, 0.5), Err(DriverError::Capability(_))));
        assert!(commands(&log).is_empty());
    }

    #[test]
    fn enabling_tracking_applies_mode_before_rate() {
        let (mut tel, log) = telescope(NATIVE, &[]);
        tel.set_track_rate(SIDEREAL_RATE_ARCSEC_PER_SEC + 1.0, 0.0).unwrap();
        tel.set_tracking(true).unwrap();
        assert_eq!(MotionState::Tracking, tel.state());

        let cmds = commands(&log);
        let mode_idx = cmds.iter().rposition(|c| c == "set_track_mode Custom").unwrap();
        let rate_idx = cmds.iter().rposition(|c| c.starts_with("set_custom_track_rate")).unwrap();
        let enable_idx = cmds.iter().position(|c| c == "set_tracking true").unwrap();
        assert!(mode_idx < enable_idx && rate_idx < enable_idx);
    }

    #[test]
    fn mount_restored_as_parked_unparks_through_need_slew() {
        use SystemStatus::*;
        let mut sim = SimulatorMount::new(BAREBONES);
        sim.push_system(TrackingPecOff);
        let mut tel = Telescope::new(Box::new(sim), LOCATION, None, true);
        assert_eq!(MotionState::Parked, tel.state());

        tel.unpark().unwrap();
        assert_eq!(ManualParkPhase::NeedSlew, tel.manual_phase());
        tel.poll().unwrap();
        assert_eq!(MotionState::Idle, tel.state());
    }
}
