//! # Observer site and local geodesy
//!
//! The camera site is described by WGS84 **geodetic** coordinates. This module stores it
//! in a NaN-free [`Site`] and provides the geodesy used when projecting image pixels onto
//! a thin emission layer:
//!
//! - geodetic ↔ Earth-centred Earth-fixed (ECEF) conversions on the WGS84 ellipsoid,
//! - the local East-North-Up (ENU) frame of the site,
//! - [`Site::aer_to_geodetic`]: azimuth/elevation/slant-range → geodetic point.
//!
//! ## Units
//!
//! - latitude, longitude, azimuth, elevation: **degrees** (longitude east positive,
//!   azimuth clockwise from north),
//! - altitudes and ranges: **metres**.
use nalgebra::{Matrix3, Vector3};
use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

use crate::constants::{Degree, Meter, WGS84_A, WGS84_B, WGS84_E2};
use crate::platescale_errors::PlateScaleError;

/// Camera location on the WGS84 ellipsoid.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Site {
    /// Geodetic latitude, degrees north
    pub latitude: NotNan<f64>,
    /// Longitude, degrees east
    pub longitude: NotNan<f64>,
    /// Height above the ellipsoid, metres
    pub altitude_m: NotNan<f64>,
    pub name: Option<String>,
}

impl Site {
    /// Build a site, rejecting NaN coordinates.
    ///
    /// Arguments
    /// ---------
    /// * `latitude`: geodetic latitude in degrees, north positive.
    /// * `longitude`: degrees, east positive.
    /// * `altitude_m`: height above the WGS84 ellipsoid in metres.
    /// * `name`: optional label, only used for display.
    ///
    /// Return
    /// ------
    /// * The site, or [`PlateScaleError::NaNSiteCoordinate`].
    pub fn new(
        latitude: Degree,
        longitude: Degree,
        altitude_m: Meter,
        name: Option<String>,
    ) -> Result<Self, PlateScaleError> {
        Ok(Site {
            latitude: NotNan::new(latitude)?,
            longitude: NotNan::new(longitude)?,
            altitude_m: NotNan::new(altitude_m)?,
            name,
        })
    }

    pub fn lat(&self) -> Degree {
        self.latitude.into_inner()
    }

    pub fn lon(&self) -> Degree {
        self.longitude.into_inner()
    }

    pub fn alt(&self) -> Meter {
        self.altitude_m.into_inner()
    }

    /// ECEF position of the site, metres.
    pub fn ecef(&self) -> Vector3<f64> {
        geodetic_to_ecef(self.lat(), self.lon(), self.alt())
    }

    /// Geodetic point seen from the site at azimuth `az`, elevation `el` (degrees) and
    /// slant range `slant_m` (metres).
    ///
    /// Return
    /// ------
    /// * `(latitude, longitude, altitude_m)` of the target.
    ///
    /// # See also
    /// * [`enu_to_ecef_rotation`] – local frame of the site.
    pub fn aer_to_geodetic(&self, az: Degree, el: Degree, slant_m: Meter) -> (Degree, Degree, Meter) {
        let enu = aer_to_enu(az, el, slant_m);
        let target = self.ecef() + enu_to_ecef_rotation(self.lat(), self.lon()) * enu;
        ecef_to_geodetic(&target)
    }
}

/// Local East-North-Up offset of a target at azimuth/elevation/range.
pub fn aer_to_enu(az: Degree, el: Degree, range: Meter) -> Vector3<f64> {
    let (az, el) = (az.to_radians(), el.to_radians());
    let horizontal = range * el.cos();
    Vector3::new(horizontal * az.sin(), horizontal * az.cos(), range * el.sin())
}

/// Rotation taking ENU components at `(lat, lon)` to ECEF components.
///
/// The columns are the east, north and up unit vectors expressed in ECEF.
pub fn enu_to_ecef_rotation(lat: Degree, lon: Degree) -> Matrix3<f64> {
    let (sp, cp) = lat.to_radians().sin_cos();
    let (sl, cl) = lon.to_radians().sin_cos();

    Matrix3::new(
        -sl, -sp * cl, cp * cl, //
        cl, -sp * sl, cp * sl, //
        0.0, cp, sp,
    )
}

/// WGS84 geodetic → ECEF (metres).
pub fn geodetic_to_ecef(lat: Degree, lon: Degree, alt: Meter) -> Vector3<f64> {
    let (sp, cp) = lat.to_radians().sin_cos();
    let (sl, cl) = lon.to_radians().sin_cos();

    // prime vertical radius of curvature
    let n = WGS84_A / (1.0 - WGS84_E2 * sp * sp).sqrt();

    Vector3::new(
        (n + alt) * cp * cl,
        (n + alt) * cp * sl,
        (n * (1.0 - WGS84_E2) + alt) * sp,
    )
}

/// ECEF (metres) → WGS84 geodetic `(lat, lon, alt)`.
///
/// Bowring's parametric-latitude start followed by fixed-point refinement of the
/// latitude; converges to sub-millimetre for points from the ground to far beyond the
/// ionosphere in a handful of iterations.
pub fn ecef_to_geodetic(ecef: &Vector3<f64>) -> (Degree, Degree, Meter) {
    let (x, y, z) = (ecef.x, ecef.y, ecef.z);
    let lon = y.atan2(x);
    let p = x.hypot(y);

    if p < 1e-9 {
        // on the polar axis
        let lat = if z >= 0.0 { 90.0 } else { -90.0 };
        return (lat, lon.to_degrees(), z.abs() - WGS84_B);
    }

    let ep2 = (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);
    let beta = (WGS84_A * z).atan2(WGS84_B * p);
    let (sb, cb) = beta.sin_cos();
    let mut lat = (z + ep2 * WGS84_B * sb.powi(3)).atan2(p - WGS84_E2 * WGS84_A * cb.powi(3));
    let mut alt = 0.0;

    for _ in 0..8 {
        let sp = lat.sin();
        let n = WGS84_A / (1.0 - WGS84_E2 * sp * sp).sqrt();
        alt = p / lat.cos() - n;
        let next = z.atan2(p * (1.0 - WGS84_E2 * n / (n + alt)));
        if (next - lat).abs() < 1e-14 {
            lat = next;
            break;
        }
        lat = next;
    }

    (lat.to_degrees(), lon.to_degrees(), alt)
}
