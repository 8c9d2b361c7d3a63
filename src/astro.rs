//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Equatorial/horizontal coordinate transforms.
//!
//! Unit convention: right ascension and hour angle in hours [0, 24),
//! all other angles in degrees. Azimuth is measured from north,
//! increasing eastward. Longitude is normalized to [0, 360) east
//! before use.
//!

/// Observer location on Earth.
#[derive(Copy, Clone, Debug)]
pub struct Location {
    /// Degrees, positive north.
    pub latitude: f64,
    /// Degrees, positive east.
    pub longitude: f64
}

/// Current Julian date from system time.
pub fn julian_date_now() -> f64 {
    julian_date(chrono::Utc::now())
}

pub fn julian_date(t: chrono::DateTime<chrono::Utc>) -> f64 {
    2440587.5 + t.timestamp_millis() as f64 / 86_400_000.0
}

fn range_degrees(mut angle: f64) -> f64 {
    angle %= 360.0;
    if angle < 0.0 { angle += 360.0; }
    angle
}

fn range_hours(mut hours: f64) -> f64 {
    hours %= 24.0;
    if hours < 0.0 { hours += 24.0; }
    hours
}

/// Greenwich mean sidereal time in degrees (Meeus, Astronomical Algorithms ch. 12).
fn gmst_degrees(julian_date: f64) -> f64 {
    let d = julian_date - 2451545.0;
    let t = d / 36525.0;
    range_degrees(
        280.46061837
        + 360.98564736629 * d
        + 0.000387933 * t * t
        - t * t * t / 38710000.0
    )
}

/// Local sidereal time in hours.
pub fn local_sidereal_time(julian_date: f64, longitude: f64) -> f64 {
    range_degrees(gmst_degrees(julian_date) + range_degrees(longitude)) / 15.0
}

/// Converts equatorial (RA in hours, Dec in degrees) to horizontal
/// (azimuth, altitude; both in degrees) for the given observer and time.
pub fn equatorial_to_horizontal(ra: f64, dec: f64, location: &Location, julian_date: f64) -> (f64, f64) {
    let lst = local_sidereal_time(julian_date, location.longitude);
    let hour_angle = (15.0 * range_hours(lst - ra)).to_radians();
    let dec = dec.to_radians();
    let lat = location.latitude.to_radians();

    let alt = (lat.sin() * dec.sin() + lat.cos() * dec.cos() * hour_angle.cos()).asin();
    let az = f64::atan2(
        -dec.cos() * hour_angle.sin(),
        dec.sin() * lat.cos() - dec.cos() * lat.sin() * hour_angle.cos()
    );

    (range_degrees(az.to_degrees()), alt.to_degrees())
}

/// Inverse of [`equatorial_to_horizontal`]; returns (RA in hours, Dec in degrees).
pub fn horizontal_to_equatorial(az: f64, alt: f64, location: &Location, julian_date: f64) -> (f64, f64) {
    let az = az.to_radians();
    let alt = alt.to_radians();
    let lat = location.latitude.to_radians();

    let dec = (alt.sin() * lat.sin() + alt.cos() * lat.cos() * az.cos()).asin();
    let hour_angle = f64::atan2(
        -alt.cos() * az.sin(),
        alt.sin() * lat.cos() - alt.cos() * lat.sin() * az.cos()
    );

    let lst = local_sidereal_time(julian_date, location.longitude);
    let ra = range_hours(lst - hour_angle.to_degrees() / 15.0);

    (ra, dec.to_degrees())
}
