//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Driver core for equatorial telescope mounts on a serial link: slewing,
//! tracking, guiding, and parking (with or without firmware support for it).
//!

pub mod astro;
pub mod channel;
pub mod config;
pub mod driver;
pub mod guiding;
pub mod mount;
pub mod parking;
pub mod telescope;
mod timer;

pub use astro::Location;
pub use channel::{Channel, ChannelError};
pub use config::Configuration;
pub use driver::MountDriver;
pub use guiding::{PulseOutcome, SYNC_PULSE_LIMIT_MS};
pub use mount::{Capabilities, Direction, EqAxis, IeqMount, MountCodec, SlewRate, TrackMode};
pub use parking::ParkPosition;
pub use telescope::{DriverError, MotionState, Telescope};
