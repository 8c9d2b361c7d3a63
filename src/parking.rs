//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Park position and the manual-park automaton's phases.
//!

use serde::{Deserialize, Serialize};

/// Horizontal coordinates the mount is parked at.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParkPosition {
    /// Degrees from north, increasing eastward.
    pub az: f64,
    /// Degrees above the horizon.
    pub alt: f64
}

impl ParkPosition {
    /// Default park: counterweight down, pointing at the celestial pole.
    pub fn default_for(latitude: f64) -> ParkPosition {
        ParkPosition{
            az: if latitude >= 0.0 { 0.0 } else { 180.0 },
            alt: latitude.abs()
        }
    }
}

/// Phase of parking a mount whose firmware has no park command. Each phase
/// performs one serial action and is advanced on the next status poll, so a
/// failed action can be retried without losing place.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ManualParkPhase {
    /// Not in the automaton (mount unparked, or firmware parks natively).
    NotParked,
    /// Park slew has ended; an abort must be issued to leave slewing mode.
    NeedAbort,
    /// Aborted; tracking must now be stopped.
    NeedStop,
    /// Motors stopped. Terminal phase while parked.
    Stopped,
    /// Unparking: position synced, a short eastward nudge re-engages the
    /// RA motor before tracking resumes.
    NeedSlew
}
