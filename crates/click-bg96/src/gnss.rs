//! `+QGPSLOC:` response parsing.
//!
//! `AT+QGPSLOC=0` answers with one fixed-format line:
//!
//! ```text
//! +QGPSLOC: <UTC>,<latitude>,<longitude>,<hdop>,<altitude>,<fix>,<COG>,<spkm>,<spkn>,<date>,<nsat>
//! +QGPSLOC: 013828.0,3150.7223N,11711.9293E,0.7,62.2,2,0.00,0.0,0.0,130817,09
//! ```
//!
//! Latitude and longitude use the `(d)ddmm.mmmm` format with a trailing
//! hemisphere letter. [`dm_to_degrees`] converts the number only; applying
//! the hemisphere sign is up to the caller (see [`Hemisphere::sign`]).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use click_at::{AtError, AtResult};

/// Response marker.
pub const QGPSLOC_MARKER: &str = "+QGPSLOC:";

/// Longest `+QGPSLOC:` response accepted by the parser.
pub const GNSS_RESPONSE_MAX_LEN: usize = 200;

/// Field positions in a `+QGPSLOC:` response, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GnssField {
    Utc = 1,
    Latitude = 2,
    Longitude = 3,
    Hdop = 4,
    Altitude = 5,
    Fix = 6,
    Cog = 7,
    SpeedKmh = 8,
    SpeedKnots = 9,
    Date = 10,
    Satellites = 11,
}

/// Extract one comma-delimited field from a `+QGPSLOC:` response.
///
/// Fails with [`AtError::Fail`] if the marker is missing or the response has
/// fewer fields than requested.
pub fn get_field(response: &str, field: GnssField) -> AtResult<&str> {
    if response.len() > GNSS_RESPONSE_MAX_LEN {
        return Err(AtError::BufferOverflow {
            max: GNSS_RESPONSE_MAX_LEN,
            actual: response.len(),
        });
    }
    let start = response.find(QGPSLOC_MARKER).ok_or(AtError::Fail)?;
    let fields = response[start + QGPSLOC_MARKER.len()..]
        .lines()
        .next()
        .unwrap_or_default();
    fields
        .split(',')
        .nth(field as usize - 1)
        .map(str::trim)
        .ok_or(AtError::Fail)
}

/// Hemisphere letter trailing a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    /// +1 for north/east, -1 for south/west.
    pub fn sign(self) -> f64 {
        match self {
            Hemisphere::North | Hemisphere::East => 1.0,
            Hemisphere::South | Hemisphere::West => -1.0,
        }
    }
}

/// The hemisphere letter at the end of a raw coordinate, if any.
pub fn hemisphere(raw: &str) -> Option<Hemisphere> {
    match raw.trim().chars().last()? {
        'N' | 'n' => Some(Hemisphere::North),
        'S' | 's' => Some(Hemisphere::South),
        'E' | 'e' => Some(Hemisphere::East),
        'W' | 'w' => Some(Hemisphere::West),
        _ => None,
    }
}

/// Convert a `(d)ddmm.mmmm[NSEW]` coordinate to unsigned decimal degrees.
pub fn dm_to_degrees(raw: &str) -> AtResult<f64> {
    let number = raw
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let value: f64 = number.parse().map_err(|_| AtError::InvalidParameter)?;
    if !value.is_finite() || value < 0.0 {
        return Err(AtError::InvalidParameter);
    }
    let degrees = (value / 100.0).trunc();
    let minutes = value - degrees * 100.0;
    if minutes >= 60.0 {
        return Err(AtError::InvalidParameter);
    }
    Ok(degrees + minutes / 60.0)
}

/// A parsed GNSS fix.
#[derive(Debug, Clone, PartialEq)]
pub struct GnssPosition {
    pub time: NaiveTime,
    pub date: NaiveDate,
    /// Signed decimal degrees, north positive.
    pub latitude: f64,
    /// Signed decimal degrees, east positive.
    pub longitude: f64,
    pub hdop: f32,
    /// Metres above sea level.
    pub altitude: f32,
    /// 2 = 2D fix, 3 = 3D fix.
    pub fix: u8,
    pub course: f32,
    pub speed_kmh: f32,
    pub speed_knots: f32,
    pub satellites: u8,
}

impl GnssPosition {
    /// Parse a complete `+QGPSLOC:` response.
    pub fn parse(response: &str) -> AtResult<Self> {
        let field = |f: GnssField| get_field(response, f);
        let number = |f: GnssField| -> AtResult<f32> {
            field(f)?.parse().map_err(|_| AtError::InvalidParameter)
        };
        let integer = |f: GnssField| -> AtResult<u8> {
            field(f)?.parse().map_err(|_| AtError::InvalidParameter)
        };

        let time = NaiveTime::parse_from_str(field(GnssField::Utc)?, "%H%M%S%.f")
            .map_err(|_| AtError::InvalidParameter)?;
        let date = NaiveDate::parse_from_str(field(GnssField::Date)?, "%d%m%y")
            .map_err(|_| AtError::InvalidParameter)?;

        Ok(GnssPosition {
            time,
            date,
            latitude: signed_degrees(field(GnssField::Latitude)?)?,
            longitude: signed_degrees(field(GnssField::Longitude)?)?,
            hdop: number(GnssField::Hdop)?,
            altitude: number(GnssField::Altitude)?,
            fix: integer(GnssField::Fix)?,
            course: number(GnssField::Cog)?,
            speed_kmh: number(GnssField::SpeedKmh)?,
            speed_knots: number(GnssField::SpeedKnots)?,
            satellites: integer(GnssField::Satellites)?,
        })
    }

    /// UTC timestamp of the fix.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

fn signed_degrees(raw: &str) -> AtResult<f64> {
    let sign = hemisphere(raw).ok_or(AtError::InvalidParameter)?.sign();
    Ok(sign * dm_to_degrees(raw)?)
}
