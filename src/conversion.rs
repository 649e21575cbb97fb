//! Sexagesimal formatting of equatorial coordinates.
use crate::constants::Degree;

/// Split a non-negative value into (units, minutes, seconds) after rounding the seconds
/// to `precision` decimals, so that `59.9999` never prints as `60`.
fn sexagesimal(value: f64, precision: usize) -> (u64, u64, f64) {
    let scale = 10f64.powi(precision as i32);
    let ticks = (value * 3600.0 * scale).round() as u64;
    let per_minute = (60.0 * scale) as u64;
    let per_unit = 60 * per_minute;

    let units = ticks / per_unit;
    let minutes = (ticks % per_unit) / per_minute;
    let seconds = (ticks % per_minute) as f64 / scale;
    (units, minutes, seconds)
}

/// Right ascension in degrees as `HH MM SS.sss`.
///
/// Arguments
/// ---------
/// * `ra`: right ascension in degrees, wrapped to `[0, 360)`.
/// * `precision`: decimals of the seconds field.
///
/// # Example
/// ```
/// use platescale::conversion::ra_to_hms;
/// assert_eq!(ra_to_hms(152.35248165, 2), "10 09 24.60");
/// ```
pub fn ra_to_hms(ra: Degree, precision: usize) -> String {
    let (h, m, s) = sexagesimal(ra.rem_euclid(360.0) / 15.0, precision);
    let width = if precision > 0 { precision + 3 } else { 2 };
    format!("{:02} {m:02} {s:0width$.precision$}", h % 24)
}

/// Declination in degrees as `±DD MM SS.ss`.
///
/// # Example
/// ```
/// use platescale::conversion::dec_to_dms;
/// assert_eq!(dec_to_dms(-0.5, 1), "-00 30 00.0");
/// ```
pub fn dec_to_dms(dec: Degree, precision: usize) -> String {
    let sign = if dec < 0.0 { '-' } else { '+' };
    let (d, m, s) = sexagesimal(dec.abs(), precision);
    let width = if precision > 0 { precision + 3 } else { 2 };
    format!("{sign}{d:02} {m:02} {s:0width$.precision$}")
}

#[cfg(test)]
mod conversion_test {
    use super::*;

    #[test]
    fn test_ra_formatting() {
        assert_eq!(ra_to_hms(0.0, 3), "00 00 00.000");
        assert_eq!(ra_to_hms(180.0, 0), "12 00 00");
        assert_eq!(ra_to_hms(-15.0, 1), "23 00 00.0");
        // 23h59m59.9999s rounds up to the next day
        assert_eq!(ra_to_hms(359.99999958, 2), "00 00 00.00");
    }

    #[test]
    fn test_dec_formatting() {
        assert_eq!(dec_to_dms(59.98073175, 2), "+59 58 50.63");
        assert_eq!(dec_to_dms(-89.99999999, 1), "-90 00 00.0");
        assert_eq!(dec_to_dms(0.0, 0), "+00 00 00");
    }
}
