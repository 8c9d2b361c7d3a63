//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Simulated mount codec.
//!
//! Plays back a scripted sequence of status reports (repeating the last one
//! when the script runs out) and records every command it receives, so the
//! motion logic can be exercised without hardware.
//!

use crate::channel::ChannelError;
use crate::mount::{
    Capabilities, Direction, EqAxis, GpsStatus, Hemisphere, MountCodec, MountStatus, PierSide,
    SlewRate, SystemStatus, TimeSource, TrackMode
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Commands received by the simulator, in order.
pub type SimulatorLog = Arc<Mutex<Vec<String>>>;

pub struct SimulatorMount {
    capabilities: Capabilities,
    statuses: VecDeque<MountStatus>,
    last_status: MountStatus,
    position: (f64, f64),
    target: (f64, f64),
    guide_rate: (f64, f64),
    fail_once: Vec<String>,
    log: SimulatorLog
}

/// Status report with the given system state and unremarkable remaining fields.
pub fn status_with(system: SystemStatus) -> MountStatus {
    MountStatus{
        system,
        gps: GpsStatus::Valid,
        time_source: TimeSource::Communicated,
        hemisphere: Hemisphere::Northern,
        track_mode: TrackMode::Sidereal,
        slew_rate: SlewRate::S64x
    }
}

impl SimulatorMount {
    pub fn new(capabilities: Capabilities) -> SimulatorMount {
        SimulatorMount{
            capabilities,
            statuses: VecDeque::new(),
            last_status: status_with(SystemStatus::TrackingPecOff),
            position: (0.0, 0.0),
            target: (0.0, 0.0),
            guide_rate: (0.5, 0.5),
            fail_once: vec![],
            log: Arc::new(Mutex::new(vec![]))
        }
    }

    /// Appends a status report to the playback script.
    pub fn push_status(&mut self, status: MountStatus) {
        self.statuses.push_back(status);
    }

    pub fn push_system(&mut self, system: SystemStatus) {
        self.push_status(status_with(system));
    }

    /// Makes the next occurrence of the named command fail with a timeout.
    pub fn fail_once(&mut self, command: &str) {
        self.fail_once.push(command.to_string());
    }

    pub fn log(&self) -> SimulatorLog {
        Arc::clone(&self.log)
    }

    pub fn set_position(&mut self, ra: f64, dec: f64) {
        self.position = (ra, dec);
    }

    fn record(&mut self, command: String) -> Result<(), ChannelError> {
        let name = command.split(' ').next().unwrap_or("").to_string();
        self.log.lock().unwrap().push(command);
        if let Some(idx) = self.fail_once.iter().position(|c| *c == name) {
            self.fail_once.remove(idx);
            return Err(ChannelError::ReadTimeout);
        }
        Ok(())
    }
}

impl MountCodec for SimulatorMount {
    fn info(&self) -> String {
        "Simulator".into()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn set_target_ra(&mut self, ra: f64) -> Result<(), ChannelError> {
        self.record(format!("set_target_ra {:.6}", ra))?;
        self.target.0 = ra;
        Ok(())
    }

    fn set_target_dec(&mut self, dec: f64) -> Result<(), ChannelError> {
        self.record(format!("set_target_dec {:.6}", dec))?;
        self.target.1 = dec;
        Ok(())
    }

    fn slew_to_target(&mut self) -> Result<(), ChannelError> {
        self.record("slew".into())?;
        self.position = self.target;
        Ok(())
    }

    fn sync_to_target(&mut self) -> Result<(), ChannelError> {
        self.record("sync".into())?;
        self.position = self.target;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ChannelError> {
        self.record("stop".into())
    }

    fn start_motion(&mut self, dir: Direction) -> Result<(), ChannelError> {
        self.record(format!("start_motion {}", dir))
    }

    fn stop_motion(&mut self, axis: EqAxis) -> Result<(), ChannelError> {
        self.record(format!("stop_motion {:?}", axis))
    }

    fn guide(&mut self, dir: Direction, duration_ms: u32) -> Result<(), ChannelError> {
        self.record(format!("guide {} {}", dir, duration_ms))
    }

    fn status(&mut self) -> Result<MountStatus, ChannelError> {
        self.record("status".into())?;
        if let Some(status) = self.statuses.pop_front() {
            self.last_status = status;
        }
        Ok(self.last_status)
    }

    fn position(&mut self) -> Result<(f64, f64), ChannelError> {
        self.record("position".into())?;
        Ok(self.position)
    }

    fn pier_side(&mut self) -> Result<Option<PierSide>, ChannelError> {
        self.record("pier_side".into())?;
        Ok(Some(PierSide::West))
    }

    fn park(&mut self) -> Result<(), ChannelError> {
        self.record("park".into())
    }

    fn unpark(&mut self) -> Result<(), ChannelError> {
        self.record("unpark".into())
    }

    fn set_park_position(&mut self, az: f64, alt: f64) -> Result<(), ChannelError> {
        self.record(format!("set_park_position {:.4} {:.4}", az, alt))
    }

    fn find_home(&mut self) -> Result<(), ChannelError> {
        self.record("find_home".into())
    }

    fn set_current_as_home(&mut self) -> Result<(), ChannelError> {
        self.record("set_current_as_home".into())
    }

    fn goto_home(&mut self) -> Result<(), ChannelError> {
        self.record("goto_home".into())
    }

    fn set_slew_rate(&mut self, rate: SlewRate) -> Result<(), ChannelError> {
        self.record(format!("set_slew_rate {:?}", rate))
    }

    fn set_track_mode(&mut self, mode: TrackMode) -> Result<(), ChannelError> {
        self.record(format!("set_track_mode {}", mode))
    }

    fn set_custom_track_rate(&mut self, offset_arcsec_per_sec: f64) -> Result<(), ChannelError> {
        self.record(format!("set_custom_track_rate {:.6}", offset_arcsec_per_sec))
    }

    fn set_tracking(&mut self, enabled: bool) -> Result<(), ChannelError> {
        self.record(format!("set_tracking {}", enabled))
    }

    fn set_guide_rate(&mut self, ra: f64, dec: f64) -> Result<(), ChannelError> {
        self.record(format!("set_guide_rate {:.2} {:.2}", ra, dec))?;
        self.guide_rate = (ra, dec);
        Ok(())
    }

    fn guide_rate(&mut self) -> Result<(f64, f64), ChannelError> {
        self.record("guide_rate".into())?;
        Ok(self.guide_rate)
    }
}
