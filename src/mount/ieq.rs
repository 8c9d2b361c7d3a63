//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! iOptron mount direct serial connection codec.
//!
//! Based on "iOptron® Mount RS-232 Command Language". Wire units: right
//! ascension in 0.001 s of time, declination and horizontal angles in
//! 0.01 arc seconds.
//!

use crate::channel::{open_serial, Channel, ChannelError, Expect, Port};
use crate::mount::{
    Capabilities, Direction, EqAxis, GpsStatus, Hemisphere, MountCodec, MountStatus, PierSide,
    SlewRate, SystemStatus, TimeSource, TrackMode, SIDEREAL_RATE_ARCSEC_PER_SEC
};

const TIMEOUT: std::time::Duration = std::time::Duration::from_millis(500);

/// Wire representation: 0.01 arc seconds per unit.
const CENTIARCSEC_PER_DEGREE: f64 = 360_000.0;

/// Wire representation: 0.001 s of time per unit.
const MILLISECONDS_PER_HOUR: f64 = 3_600_000.0;

pub struct IeqMount<P: Port> {
    model: String,
    device: String,
    capabilities: Capabilities,
    channel: Channel<P>
}

fn model_name(code: &str) -> String {
    match code {
        "0026" => "CEM26".into(),
        "0027" => "CEM26-EC".into(),
        "0028" => "GEM28".into(),
        "0029" => "GEM28-EC".into(),
        "0035" => "iEQ35 Pro".into(),
        "0036" => "iEQ35 Pro AA".into(),
        "0040" => "CEM40(G)".into(),
        "0041" => "CEM40(G)-EC".into(),
        "0043" => "GEM45(G)".into(),
        "0044" => "GEM45(G)-EC".into(),
        "0045" => "iEQ45 Pro".into(),
        "0046" => "iEQ45 Pro AA".into(),
        "0060" => "CEM60".into(),
        "0061" => "CEM60-EC".into(),
        "0070" => "CEM70(G)".into(),
        "0071" => "CEM70(G)-EC".into(),
        "0120" => "CEM120".into(),
        "0121" => "CEM120-EC".into(),
        "0122" => "CEM120-EC2".into(),
        _ => format!("(unknown - {})", code)
    }
}

/// Firmware capabilities vary by model line; probing commands blindly would
/// move the mount, so the supported set is keyed off the model report.
fn capabilities_of(model: &str) -> Capabilities {
    const HOME_SEARCH_MODELS: [&str; 8] = [
        "CEM40(G)", "CEM40(G)-EC", "GEM45(G)", "GEM45(G)-EC",
        "CEM60", "CEM60-EC", "iEQ35 Pro", "iEQ45 Pro"
    ];

    let known = !model.starts_with("(unknown");
    let alt_az = model.ends_with("AA");

    Capabilities{
        native_park: known && !alt_az,
        native_home: HOME_SEARCH_MODELS.contains(&model),
        guide_rate_adjustable: known && !alt_az
    }
}

fn parse_int(digits: &[u8]) -> Result<i64, ChannelError> {
    std::str::from_utf8(digits).ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| ChannelError::Malformed(
            format!("expected a number, got {:?}", String::from_utf8_lossy(digits))
        ))
}

impl IeqMount<Box<dyn serialport::SerialPort>> {
    /// Connects to the mount and performs the handshake.
    ///
    /// # Parameters
    ///
    /// * `device` - System device name to use for connecting to the mount,
    ///     e.g., "COM3" on Windows or "/dev/ttyUSB0" on Linux.
    ///
    pub fn open(device: &str) -> Result<IeqMount<Box<dyn serialport::SerialPort>>, ChannelError> {
        let port = open_serial(device, 115200).map_err(|e| ChannelError::Malformed(
            format!("cannot open {}: {}", device, e)
        ))?;
        IeqMount::on_port(port, device)
    }
}

impl<P: Port> IeqMount<P> {
    pub fn on_port(port: P, device: &str) -> Result<IeqMount<P>, ChannelError> {
        let mut channel = Channel::new(port);

        let reply = channel.exchange(b":MountInfo#", Expect::ByteCount(4), TIMEOUT)?;
        let model = model_name(&String::from_utf8_lossy(&reply));
        let capabilities = capabilities_of(&model);
        log::info!("connected to iOptron {} on {}", model, device);

        Ok(IeqMount{ model, device: device.to_string(), capabilities, channel })
    }

    fn ack(&mut self, cmd: String) -> Result<(), ChannelError> {
        self.channel.exchange(cmd.as_bytes(), Expect::Ack(b"1"), TIMEOUT).map(|_| ())
    }
}

impl<P: Port> MountCodec for IeqMount<P> {
    fn info(&self) -> String {
        format!("iOptron {} on {}", self.model, self.device)
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn set_target_ra(&mut self, ra: f64) -> Result<(), ChannelError> {
        let value = (ra * MILLISECONDS_PER_HOUR).round() as i64;
        self.ack(format!(":Sr{:08}#", value))
    }

    fn set_target_dec(&mut self, dec: f64) -> Result<(), ChannelError> {
        let value = (dec * CENTIARCSEC_PER_DEGREE).round() as i64;
        self.ack(format!(":Sd{:+09}#", value))
    }

    fn slew_to_target(&mut self) -> Result<(), ChannelError> {
        self.ack(":MS#".into())
    }

    fn sync_to_target(&mut self) -> Result<(), ChannelError> {
        self.ack(":CM#".into())
    }

    fn stop(&mut self) -> Result<(), ChannelError> {
        self.ack(":qD#".into())?;
        self.ack(":qR#".into())?;
        self.ack(":Q#".into())
    }

    fn start_motion(&mut self, dir: Direction) -> Result<(), ChannelError> {
        let ch = match dir {
            Direction::North => 'n',
            Direction::South => 's',
            Direction::East => 'e',
            Direction::West => 'w'
        };
        self.channel.send(format!(":m{}#", ch).as_bytes())
    }

    fn stop_motion(&mut self, axis: EqAxis) -> Result<(), ChannelError> {
        let ch = match axis { EqAxis::Ra => 'R', EqAxis::Dec => 'D' };
        self.ack(format!(":q{}#", ch))
    }

    fn guide(&mut self, dir: Direction, duration_ms: u32) -> Result<(), ChannelError> {
        let ch = match dir {
            Direction::North => 'n',
            Direction::South => 's',
            Direction::East => 'e',
            Direction::West => 'w'
        };
        self.channel.send(format!(":M{}{:05}#", ch, duration_ms.min(99999)).as_bytes())
    }

    fn status(&mut self) -> Result<MountStatus, ChannelError> {
        let reply = self.channel.exchange(b":GAS#", Expect::Terminator(b'#'), TIMEOUT)?;
        if reply.len() != 7 {
            return Err(ChannelError::Malformed(
                format!("status reply has {} characters", reply.len())
            ));
        }
        let digit = |idx: usize| reply[idx].wrapping_sub(b'0');
        let bad = |field: &str, idx: usize| ChannelError::Malformed(
            format!("unknown {} code {}", field, reply[idx] as char)
        );

        Ok(MountStatus{
            gps: match digit(0) {
                0 => GpsStatus::NotInstalled,
                1 => GpsStatus::NoData,
                2 => GpsStatus::Valid,
                _ => return Err(bad("GPS status", 0))
            },
            system: match digit(1) {
                0 => SystemStatus::Stopped,
                1 => SystemStatus::TrackingPecOff,
                2 => SystemStatus::Slewing,
                3 => SystemStatus::Guiding,
                4 => SystemStatus::MeridianFlipping,
                5 => SystemStatus::TrackingPecOn,
                6 => SystemStatus::Parked,
                7 => SystemStatus::Home,
                _ => return Err(bad("system status", 1))
            },
            track_mode: match digit(2) {
                0 => TrackMode::Sidereal,
                1 => TrackMode::Lunar,
                2 => TrackMode::Solar,
                3 => TrackMode::King,
                4 => TrackMode::Custom,
                _ => return Err(bad("tracking rate", 2))
            },
            slew_rate: match digit(3) {
                1 => SlewRate::S1x,
                2 => SlewRate::S2x,
                3 => SlewRate::S8x,
                4 => SlewRate::S16x,
                5 => SlewRate::S64x,
                6 => SlewRate::S128x,
                7 => SlewRate::S256x,
                8 => SlewRate::S512x,
                9 => SlewRate::Max,
                _ => return Err(bad("slewing rate", 3))
            },
            time_source: match digit(4) {
                1 => TimeSource::Communicated,
                2 => TimeSource::Controller,
                3 => TimeSource::Gps,
                _ => return Err(bad("time source", 4))
            },
            hemisphere: match digit(5) {
                0 => Hemisphere::Southern,
                1 => Hemisphere::Northern,
                _ => return Err(bad("hemisphere", 5))
            }
        })
    }

    fn position(&mut self) -> Result<(f64, f64), ChannelError> {
        let reply = self.channel.exchange(b":GEC#", Expect::Terminator(b'#'), TIMEOUT)?;
        if reply.len() != 18 {
            return Err(ChannelError::Malformed(
                format!("position reply has {} characters", reply.len())
            ));
        }
        let dec = parse_int(&reply[0..9])? as f64 / CENTIARCSEC_PER_DEGREE;
        let ra = parse_int(&reply[9..17])? as f64 / MILLISECONDS_PER_HOUR;
        Ok((ra, dec))
    }

    fn pier_side(&mut self) -> Result<Option<PierSide>, ChannelError> {
        match self.channel.exchange(b":pS#", Expect::ByteCount(1), TIMEOUT) {
            Ok(reply) => Ok(match reply[0] {
                b'0' => Some(PierSide::East),
                b'1' => Some(PierSide::West),
                _ => None
            }),
            // older firmware does not implement the query
            Err(ChannelError::ReadTimeout) => Ok(None),
            Err(e) => Err(e)
        }
    }

    fn park(&mut self) -> Result<(), ChannelError> {
        self.ack(":MP1#".into())
    }

    fn unpark(&mut self) -> Result<(), ChannelError> {
        self.ack(":MP0#".into())
    }

    fn set_park_position(&mut self, az: f64, alt: f64) -> Result<(), ChannelError> {
        self.ack(format!(":SPA{:08}#", (az * CENTIARCSEC_PER_DEGREE).round() as i64))?;
        self.ack(format!(":SPH{:+09}#", (alt * CENTIARCSEC_PER_DEGREE).round() as i64))
    }

    fn find_home(&mut self) -> Result<(), ChannelError> {
        self.ack(":MSH#".into())
    }

    fn set_current_as_home(&mut self) -> Result<(), ChannelError> {
        self.ack(":SZP#".into())
    }

    fn goto_home(&mut self) -> Result<(), ChannelError> {
        self.ack(":MH#".into())
    }

    fn set_slew_rate(&mut self, rate: SlewRate) -> Result<(), ChannelError> {
        let digit = match rate {
            SlewRate::S1x => 1,
            SlewRate::S2x => 2,
            SlewRate::S8x => 3,
            SlewRate::S16x => 4,
            SlewRate::S64x => 5,
            SlewRate::S128x => 6,
            SlewRate::S256x => 7,
            SlewRate::S512x => 8,
            SlewRate::Max => 9
        };
        self.ack(format!(":SR{}#", digit))
    }

    fn set_track_mode(&mut self, mode: TrackMode) -> Result<(), ChannelError> {
        let digit = match mode {
            TrackMode::Sidereal => 0,
            TrackMode::Lunar => 1,
            TrackMode::Solar => 2,
            TrackMode::King => 3,
            TrackMode::Custom => 4
        };
        self.ack(format!(":RT{}#", digit))
    }

    fn set_custom_track_rate(&mut self, offset_arcsec_per_sec: f64) -> Result<(), ChannelError> {
        // firmware accepts 0.5x-1.5x of sidereal
        let mut multiplier = 1.0 + offset_arcsec_per_sec / SIDEREAL_RATE_ARCSEC_PER_SEC;
        if !(0.5..=1.5).contains(&multiplier) {
            log::warn!("custom tracking rate multiplier {:.4} out of range, clamping", multiplier);
            multiplier = multiplier.clamp(0.5, 1.5);
        }
        self.ack(format!(":RR{:05}#", (multiplier * 10000.0).round() as i64))
    }

    fn set_tracking(&mut self, enabled: bool) -> Result<(), ChannelError> {
        self.ack(format!(":ST{}#", if enabled { 1 } else { 0 }))
    }

    fn set_guide_rate(&mut self, ra: f64, dec: f64) -> Result<(), ChannelError> {
        let as_percent = |rate: f64| (rate.clamp(0.01, 0.90) * 100.0).round() as i64;
        self.ack(format!(":RG{:02}{:02}#", as_percent(ra), as_percent(dec)))
    }

    fn guide_rate(&mut self) -> Result<(f64, f64), ChannelError> {
        let reply = self.channel.exchange(b":AG#", Expect::Terminator(b'#'), TIMEOUT)?;
        if reply.len() != 5 {
            return Err(ChannelError::Malformed(
                format!("guide rate reply has {} characters", reply.len())
            ));
        }
        Ok((
            parse_int(&reply[0..2])? as f64 / 100.0,
            parse_int(&reply[2..4])? as f64 / 100.0
        ))
    }
}
