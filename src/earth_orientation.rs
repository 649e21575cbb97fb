//! # Earth orientation for apparent places
//!
//! Low-precision models needed to bring a J2000 (ICRS-aligned) direction to the true
//! equator and equinox of date, where the local hour angle is measured:
//!
//! - [`obleq`] – mean obliquity of the ecliptic (IAU 1976).
//! - [`nutation`] – nutation in longitude and obliquity, dominant IAU 1980 terms.
//! - [`prec`] – IAU 1976 precession matrix J2000 → mean of date.
//! - [`rnut`] – nutation matrix mean of date → true of date.
//! - [`equequ`] – equation of the equinoxes.
//! - [`earth_velocity`] – barycentric velocity of the Earth for annual aberration.
//!
//! The truncated nutation series is accurate to about 0.5″, well below the angular
//! size of a pixel for the wide-field cameras this crate targets.
//!
//! All matrices are **active** rotations acting on column vectors:
//! `v_date = rnut(t) · prec(t) · v_J2000`.
use nalgebra::{Matrix3, Rotation3, Vector3};

use crate::constants::{ArcSec, Radian, GAUSS_GRAV, MJD, RADEG, RADSEC, T2000};

/// Julian centuries elapsed since J2000.0.
fn centuries(mjd_tt: MJD) -> f64 {
    (mjd_tt - T2000) / 36525.0
}

/// Active rotation of angle `alpha` (radians) around the coordinate axis `k`
/// (0 = x, 1 = y, 2 = z).
///
/// Indices above 2 are folded to the z axis.
pub fn rotmt(alpha: Radian, k: usize) -> Matrix3<f64> {
    let axis = match k {
        0 => Vector3::x_axis(),
        1 => Vector3::y_axis(),
        _ => Vector3::z_axis(),
    };
    Rotation3::from_axis_angle(&axis, alpha).into_inner()
}

/// Mean obliquity of the ecliptic (IAU 1976), radians.
///
/// Arguments
/// ---------
/// * `mjd_tt`: Modified Julian Date, TT scale.
pub fn obleq(mjd_tt: MJD) -> Radian {
    let t = centuries(mjd_tt);
    // ε₀ = 23°26'21.448"
    (((0.00181 * t - 0.0006) * t - 46.815) * t + 84381.448) * RADSEC
}

/// Nutation angles `(Δψ, Δε)` in arcseconds.
///
/// Keeps the four largest terms of the IAU 1980 series, driven by the longitude of the
/// lunar ascending node Ω and the mean longitudes of the Sun (L) and Moon (L′).
///
/// Arguments
/// ---------
/// * `mjd_tt`: Modified Julian Date, TT scale.
///
/// Return
/// ------
/// * `(Δψ, Δε)`: nutation in longitude and in obliquity, arcseconds.
pub fn nutation(mjd_tt: MJD) -> (ArcSec, ArcSec) {
    let t = centuries(mjd_tt);

    let node = (125.04452 - 1934.136261 * t) * RADEG;
    let sun = (280.4665 + 36000.7698 * t) * RADEG;
    let moon = (218.3165 + 481267.8813 * t) * RADEG;

    let dpsi = -17.20 * node.sin() - 1.32 * (2.0 * sun).sin() - 0.23 * (2.0 * moon).sin()
        + 0.21 * (2.0 * node).sin();
    let deps = 9.20 * node.cos() + 0.57 * (2.0 * sun).cos() + 0.10 * (2.0 * moon).cos()
        - 0.09 * (2.0 * node).cos();

    (dpsi, deps)
}

/// Nutation matrix, mean equator and equinox of date → true equator and equinox of date.
pub fn rnut(mjd_tt: MJD) -> Matrix3<f64> {
    let eps = obleq(mjd_tt);
    let (dpsi, deps) = nutation(mjd_tt);

    rotmt(eps + deps * RADSEC, 0) * rotmt(dpsi * RADSEC, 2) * rotmt(-eps, 0)
}

/// Equation of the equinoxes `Δψ·cos ε`, radians.
///
/// Difference between apparent and mean sidereal time.
pub fn equequ(mjd_tt: MJD) -> Radian {
    let (dpsi, _) = nutation(mjd_tt);
    dpsi * RADSEC * obleq(mjd_tt).cos()
}

/// IAU 1976 precession matrix, J2000 mean equator → mean equator of date.
///
/// Arguments
/// ---------
/// * `mjd_tt`: Modified Julian Date, TT scale.
///
/// Method
/// ------
/// Composition of rotations by the equatorial precession angles
///
/// ```text
/// ζ(T) = (0.6406161 + 0.0000839·T + 0.0000050·T²) · T  [deg]
/// θ(T) = (0.5567530 − 0.0001185·T − 0.0000116·T²) · T  [deg]
/// z(T) = (0.6406161 + 0.0003041·T + 0.0000051·T²) · T  [deg]
/// ```
///
/// as `P = Rz(z) · Ry(−θ) · Rz(ζ)` (active rotations).
pub fn prec(mjd_tt: MJD) -> Matrix3<f64> {
    let t = centuries(mjd_tt);

    let zeta = ((0.0000050 * t + 0.0000839) * t + 0.6406161) * t * RADEG;
    let z = ((0.0000051 * t + 0.0003041) * t + 0.6406161) * t * RADEG;
    let theta = ((-0.0000116 * t - 0.0001185) * t + 0.5567530) * t * RADEG;

    rotmt(z, 2) * rotmt(-theta, 1) * rotmt(zeta, 2)
}

/// Combined rotation J2000 → true equator and equinox of date.
pub fn j2000_to_true_of_date(mjd_tt: MJD) -> Matrix3<f64> {
    rnut(mjd_tt) * prec(mjd_tt)
}

/// Velocity of the Earth around the Sun, J2000 equatorial axes, AU/day.
///
/// Circular-orbit approximation driven by the Sun's true longitude (equation of centre
/// to second order). Good to ~2 % in magnitude, i.e. a few tenths of an arcsecond of
/// aberration.
pub fn earth_velocity(mjd_tt: MJD) -> Vector3<f64> {
    let t = centuries(mjd_tt);

    let mean_longitude = 280.46646 + 36000.76983 * t;
    let mean_anomaly = (357.52911 + 35999.05029 * t) * RADEG;
    let true_longitude = (mean_longitude
        + 1.914602 * mean_anomaly.sin()
        + 0.019993 * (2.0 * mean_anomaly).sin())
        * RADEG;

    let vx = GAUSS_GRAV * true_longitude.sin();
    let vy = -GAUSS_GRAV * true_longitude.cos();
    let eps = obleq(T2000);

    Vector3::new(vx, vy * eps.cos(), vy * eps.sin())
}
