//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Mount codec interface.
//!

mod ieq;
mod simulator;

pub use ieq::IeqMount;
pub use simulator::{status_with, SimulatorMount, SimulatorLog};

use crate::channel::ChannelError;

/// Sidereal rate in arc seconds per second of time.
pub const SIDEREAL_RATE_ARCSEC_PER_SEC: f64 = 15.041067;

/// Length of the sidereal day in seconds.
pub const SECONDS_PER_DAY: f64 = 86164.09065;

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display, strum_macros::EnumIter)]
pub enum Direction {
    North,
    South,
    East,
    West
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EqAxis {
    Ra,
    Dec
}

impl Direction {
    pub fn axis(&self) -> EqAxis {
        match self {
            Direction::North | Direction::South => EqAxis::Dec,
            Direction::East | Direction::West => EqAxis::Ra
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East
        }
    }
}

/// Motion state as reported by the mount itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum SystemStatus {
    Stopped,
    Parked,
    Home,
    Slewing,
    MeridianFlipping,
    TrackingPecOff,
    TrackingPecOn,
    Guiding
}

impl SystemStatus {
    pub fn is_slewing(&self) -> bool {
        matches!(self, SystemStatus::Slewing | SystemStatus::MeridianFlipping)
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self,
            SystemStatus::TrackingPecOff | SystemStatus::TrackingPecOn | SystemStatus::Guiding
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GpsStatus {
    NotInstalled,
    NoData,
    Valid
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimeSource {
    Communicated,
    Gps,
    Controller
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Hemisphere {
    Southern,
    Northern
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum TrackMode {
    Sidereal,
    Lunar,
    Solar,
    King,
    Custom
}

/// Slewing rate as a multiple of the sidereal rate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SlewRate {
    S1x,
    S2x,
    S8x,
    S16x,
    S64x,
    S128x,
    S256x,
    S512x,
    Max
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum PierSide {
    East,
    West
}

/// Single decoded mount status report.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MountStatus {
    pub system: SystemStatus,
    pub gps: GpsStatus,
    pub time_source: TimeSource,
    pub hemisphere: Hemisphere,
    pub track_mode: TrackMode,
    pub slew_rate: SlewRate
}

/// What the connected firmware supports, probed during handshake.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Firmware can park/unpark to a stored position on its own.
    pub native_park: bool,
    /// Firmware can search for the mechanical home index.
    pub native_home: bool,
    /// Guide rate can be read and written.
    pub guide_rate_adjustable: bool
}

/// Low-level mount protocol. One implementation per wire dialect;
/// the motion logic above is shared.
pub trait MountCodec: Send {
    fn info(&self) -> String;

    fn capabilities(&self) -> Capabilities;

    /// Sets the slew/sync target right ascension (hours).
    fn set_target_ra(&mut self, ra: f64) -> Result<(), ChannelError>;

    /// Sets the slew/sync target declination (degrees).
    fn set_target_dec(&mut self, dec: f64) -> Result<(), ChannelError>;

    /// Starts a slew to the previously set target.
    fn slew_to_target(&mut self) -> Result<(), ChannelError>;

    /// Syncs the mount's position to the previously set target.
    fn sync_to_target(&mut self) -> Result<(), ChannelError>;

    /// Stops all movement (including tracking).
    fn stop(&mut self) -> Result<(), ChannelError>;

    fn start_motion(&mut self, dir: Direction) -> Result<(), ChannelError>;

    fn stop_motion(&mut self, axis: EqAxis) -> Result<(), ChannelError>;

    /// Fires a guiding pulse; the mount times it out on its own.
    fn guide(&mut self, dir: Direction, duration_ms: u32) -> Result<(), ChannelError>;

    fn status(&mut self) -> Result<MountStatus, ChannelError>;

    /// Current pointing position as (RA hours, Dec degrees).
    fn position(&mut self) -> Result<(f64, f64), ChannelError>;

    fn pier_side(&mut self) -> Result<Option<PierSide>, ChannelError>;

    fn park(&mut self) -> Result<(), ChannelError>;

    fn unpark(&mut self) -> Result<(), ChannelError>;

    /// Stores the firmware park position (azimuth, altitude; degrees).
    fn set_park_position(&mut self, az: f64, alt: f64) -> Result<(), ChannelError>;

    fn find_home(&mut self) -> Result<(), ChannelError>;

    fn set_current_as_home(&mut self) -> Result<(), ChannelError>;

    fn goto_home(&mut self) -> Result<(), ChannelError>;

    fn set_slew_rate(&mut self, rate: SlewRate) -> Result<(), ChannelError>;

    fn set_track_mode(&mut self, mode: TrackMode) -> Result<(), ChannelError>;

    /// Sets the custom RA tracking rate as an offset from sidereal
    /// (arc seconds per second).
    fn set_custom_track_rate(&mut self, offset_arcsec_per_sec: f64) -> Result<(), ChannelError>;

    fn set_tracking(&mut self, enabled: bool) -> Result<(), ChannelError>;

    /// Guide rate per axis as a fraction of sidereal, each in [0.01, 0.90].
    fn set_guide_rate(&mut self, ra: f64, dec: f64) -> Result<(), ChannelError>;

    fn guide_rate(&mut self) -> Result<(f64, f64), ChannelError>;
}
