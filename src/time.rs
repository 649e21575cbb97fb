//! # Image epochs and sidereal time
//!
//! Helpers turning the various time representations met in sky imagery into
//! [`hifitime::Epoch`] values, and the Greenwich mean sidereal time needed by the
//! horizontal-coordinate transform.
//!
//! ## Accepted time strings
//!
//! - ISO-8601 calendar dates, with `T` or a space between date and time, optional
//!   seconds (and fraction), optional trailing `Z`. Always interpreted as **UTC**.
//! - A bare number, interpreted as **Unix seconds** (the `ut1_unix` convention of
//!   high-speed camera files).
//!
//! ## See also
//! * [`crate::horizon::HorizonFrame`] – consumes the epoch and [`gmst`].
//! * [`crate::earth_orientation`] – precession/nutation at the same epoch.
use hifitime::ut1::Ut1Provider;
use hifitime::{Duration, Epoch, Unit};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{DPI, MJD, SECONDS_PER_DAY, SIDEREAL_RATE, T2000};
use crate::fits::HeaderKeys;
use crate::platescale_errors::PlateScaleError;

static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[T ](\d{1,2}):(\d{2})(?::(\d{2})(?:\.(\d+))?)?)?\s*Z?$",
    )
    .expect("static regex is valid")
});

/// Parse a user or header supplied time.
///
/// Arguments
/// ---------
/// * `text`: ISO-8601 date/time (UTC) or Unix seconds.
///
/// Return
/// ------
/// * The corresponding [`Epoch`], or [`PlateScaleError::InvalidTime`].
///
/// # Example
/// ```
/// use platescale::time::parse_time;
/// let t = parse_time("2000-01-01T00:00").unwrap();
/// assert_eq!(t.to_mjd_utc_days(), 51544.0);
/// ```
pub fn parse_time(text: &str) -> Result<Epoch, PlateScaleError> {
    let text = text.trim();

    if let Ok(unix) = text.parse::<f64>() {
        return Ok(Epoch::from_unix_seconds(unix));
    }

    let caps = ISO_DATE
        .captures(text)
        .ok_or_else(|| PlateScaleError::InvalidTime(text.to_string()))?;

    let field = |i: usize| -> Result<u32, PlateScaleError> {
        caps.get(i)
            .map_or(Ok(0), |m| m.as_str().parse::<u32>())
            .map_err(|_| PlateScaleError::InvalidTime(text.to_string()))
    };

    let year = caps[1]
        .parse::<i32>()
        .map_err(|_| PlateScaleError::InvalidTime(text.to_string()))?;
    let (month, day) = (field(2)?, field(3)?);
    let (hour, minute, second) = (field(4)?, field(5)?, field(6)?);

    // fractional seconds, right-padded to nanoseconds
    let nanos = match caps.get(7) {
        Some(frac) => {
            let digits: String = frac.as_str().chars().chain("000000000".chars()).take(9).collect();
            digits
                .parse::<u32>()
                .map_err(|_| PlateScaleError::InvalidTime(text.to_string()))?
        }
        None => 0,
    };

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) || hour > 23 || minute > 59 || second > 60
    {
        return Err(PlateScaleError::InvalidTime(text.to_string()));
    }

    Epoch::maybe_from_gregorian_utc(
        year,
        month as u8,
        day as u8,
        hour as u8,
        minute as u8,
        second as u8,
        nanos,
    )
    .map_err(|_| PlateScaleError::InvalidTime(text.to_string()))
}

/// ISO-8601 UTC string with millisecond precision, as written in `DATE-OBS`.
///
/// # Example
/// ```
/// use platescale::time::{iso_utc, parse_time};
/// let t = parse_time("2013-04-14 08:30:12.5").unwrap();
/// assert_eq!(iso_utc(&t), "2013-04-14T08:30:12.500");
/// ```
pub fn iso_utc(epoch: &Epoch) -> String {
    let (y, mo, d, h, mi, s, ns) = epoch.to_gregorian_utc();
    format!(
        "{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}.{:03}",
        ns / 1_000_000
    )
}

/// Time of an image as recorded in its primary header.
///
/// Andor Solis cameras stamp every frame with a `FRAME` card; generic writers use
/// `DATE-OBS`, then `DATE`. Returns `Ok(None)` when none of them is present.
pub fn frame_time(header: &impl HeaderKeys) -> Result<Option<Epoch>, PlateScaleError> {
    for key in ["FRAME", "DATE-OBS", "DATE"] {
        if let Some(value) = header.get_str(key) {
            log::info!("using FITS header {key} for time");
            return parse_time(&value).map(Some);
        }
    }
    Ok(None)
}

/// UT1 Modified Julian Date of an epoch.
///
/// With a provider the IERS ΔUT1 is applied; without one UTC stands in for UT1
/// (|UT1 − UTC| < 0.9 s, i.e. under 4 arcseconds of Earth rotation).
pub fn mjd_ut1(epoch: &Epoch, ut1_provider: Option<&Ut1Provider>) -> MJD {
    match ut1_provider {
        Some(provider) => epoch.to_ut1(provider).to_mjd_tai_days(),
        None => epoch.to_mjd_utc_days(),
    }
}

/// Greenwich Mean Sidereal Time (IAU 1982) in radians, in `[0, 2π)`.
///
/// Arguments
/// ---------
/// * `mjd_ut1`: Modified Julian Date in the UT1 time scale.
///
/// The sidereal time at 0h UT1 is the cubic polynomial of the IAU 1982 definition;
/// the fraction of the day is then scaled by the sidereal/solar rate ratio.
///
/// # See also
/// * [`crate::earth_orientation::equequ`] – correction to apparent sidereal time.
pub fn gmst(mjd_ut1: MJD) -> f64 {
    // seconds of sidereal time at 0h UT1
    const C0: f64 = 24110.54841;
    const C1: f64 = 8640184.812866;
    const C2: f64 = 9.3104e-2;
    const C3: f64 = -6.2e-6;

    let midnight = mjd_ut1.floor();
    let t = (midnight - T2000) / 36525.0;

    let gmst0 = (((C3 * t + C2) * t + C1) * t + C0) * DPI / SECONDS_PER_DAY;
    let day_fraction = (mjd_ut1 - midnight) * DPI;

    (gmst0 + day_fraction * SIDEREAL_RATE).rem_euclid(DPI)
}

/// `[start + i·step for i in 0..⌊(stop − start) / step⌋]`.
///
/// A non-positive step or an inverted interval yields an empty vector.
pub fn datetime_range(start: Epoch, stop: Epoch, step: Duration) -> Vec<Epoch> {
    let step_s = step.to_seconds();
    if step_s <= 0.0 {
        return Vec::new();
    }
    let span = (stop - start).to_seconds();
    let count = (span / step_s).floor().max(0.0) as usize;

    (0..count).map(|i| start + step * (i as i64)).collect()
}

/// Evenly spread `n` epochs over `[start, stop)`, one per file of a batch.
///
/// The step is `(stop − start) / n`, so the last file is stamped one step before
/// `stop`.
pub fn spread_times(start: Epoch, stop: Epoch, n: usize) -> Vec<Epoch> {
    if n == 0 {
        return Vec::new();
    }
    let step_s = (stop - start).to_seconds() / n as f64;

    (0..n)
        .map(|i| start + (step_s * i as f64) * Unit::Second)
        .collect()
}
