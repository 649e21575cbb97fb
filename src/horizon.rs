//! # Celestial → horizontal coordinates
//!
//! Converts J2000 (ICRS-aligned) right ascension / declination into azimuth and
//! elevation for a ground observer at a given time.
//!
//! ## Pipeline
//!
//! ```text
//! (α, δ) J2000 ──annual aberration──► apparent direction
//!              ──precession·nutation──► true equator/equinox of date
//!              ──local apparent sidereal time──► hour angle H
//!              ──site latitude──► (azimuth, elevation)
//! ```
//!
//! Every per-image quantity (rotation matrix, aberration vector, sidereal time) is
//! computed once in [`HorizonFrame::new`]; the per-pixel work is a 3×3 product and a few
//! trigonometric calls.
//!
//! ## Conventions
//!
//! - Azimuth: degrees clockwise from geographic north, in `[0, 360)`.
//! - Elevation: degrees above the geometric horizon. **No refraction** is applied and the
//!   observer is assumed to be near ground level (topocentric parallax of stars is nil).
//! - Diurnal aberration (< 0.32″) and polar motion are neglected.
//!
//! ## Accuracy
//!
//! With UTC standing in for UT1 the error budget is dominated by |UT1 − UTC| < 0.9 s,
//! i.e. under 15″ along the diurnal circle. Configure a [`Ut1Provider`] to remove it.
use hifitime::ut1::Ut1Provider;
use hifitime::Epoch;
use nalgebra::{Matrix3, Vector3};
use ndarray::{Array2, Zip};

use crate::constants::{Degree, Radian, DPI, VLIGHT_AU};
use crate::earth_orientation::{earth_velocity, equequ, j2000_to_true_of_date};
use crate::observer::Site;
use crate::platescale_errors::PlateScaleError;
use crate::time::{gmst, mjd_ut1};

/// Unit vector of a direction given in radians.
fn unit_vector(lon: Radian, lat: Radian) -> Vector3<f64> {
    let (sl, cl) = lon.sin_cos();
    let (sb, cb) = lat.sin_cos();
    Vector3::new(cb * cl, cb * sl, sb)
}

/// Horizontal frame of one observer at one instant.
#[derive(Debug, Clone)]
pub struct HorizonFrame {
    epoch: Epoch,
    /// J2000 → true equator and equinox of date
    rotation: Matrix3<f64>,
    /// Earth velocity over the speed of light
    beta: Vector3<f64>,
    /// Local apparent sidereal time, radians
    last: Radian,
    sin_lat: f64,
    cos_lat: f64,
}

impl HorizonFrame {
    /// Precompute the frame of `site` at `epoch`.
    ///
    /// Arguments
    /// ---------
    /// * `site`: observer location (WGS84).
    /// * `epoch`: observation time.
    /// * `ut1_provider`: IERS ΔUT1 table; `None` uses UTC as UT1.
    ///
    /// # See also
    /// * [`crate::earth_orientation::j2000_to_true_of_date`]
    /// * [`crate::time::gmst`]
    pub fn new(site: &Site, epoch: Epoch, ut1_provider: Option<&Ut1Provider>) -> Self {
        let mjd_tt = epoch.to_mjd_tt_days();
        let gast = gmst(mjd_ut1(&epoch, ut1_provider)) + equequ(mjd_tt);
        let (sin_lat, cos_lat) = site.lat().to_radians().sin_cos();

        HorizonFrame {
            epoch,
            rotation: j2000_to_true_of_date(mjd_tt),
            beta: earth_velocity(mjd_tt) / VLIGHT_AU,
            last: (gast + site.lon().to_radians()).rem_euclid(DPI),
            sin_lat,
            cos_lat,
        }
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Local apparent sidereal time in radians.
    pub fn local_sidereal_time(&self) -> Radian {
        self.last
    }

    /// Azimuth and elevation (degrees) of a J2000 direction.
    ///
    /// Arguments
    /// ---------
    /// * `ra`: right ascension, degrees.
    /// * `dec`: declination, degrees.
    ///
    /// Return
    /// ------
    /// * `(azimuth, elevation)` in degrees; NaN inputs propagate to NaN outputs.
    pub fn radec_to_azel(&self, ra: Degree, dec: Degree) -> (Degree, Degree) {
        let apparent = (unit_vector(ra.to_radians(), dec.to_radians()) + self.beta).normalize();
        let v = self.rotation * apparent;

        let dec_t = v.z.clamp(-1.0, 1.0).asin();
        let hour_angle = self.last - v.y.atan2(v.x);

        let (sh, ch) = hour_angle.sin_cos();
        let (sd, cd) = dec_t.sin_cos();

        let el = (self.sin_lat * sd + self.cos_lat * cd * ch).clamp(-1.0, 1.0).asin();
        let az = (-sh * cd).atan2(sd * self.cos_lat - cd * self.sin_lat * ch);

        (az.to_degrees().rem_euclid(360.0), el.to_degrees())
    }

    /// Inverse of [`HorizonFrame::radec_to_azel`]: J2000 `(ra, dec)` in degrees of the
    /// direction seen at azimuth `az` and elevation `el`.
    pub fn azel_to_radec(&self, az: Degree, el: Degree) -> (Degree, Degree) {
        let (sa, ca) = az.to_radians().sin_cos();
        let (se, ce) = el.to_radians().sin_cos();

        let sd = self.sin_lat * se + self.cos_lat * ce * ca;
        let dec_t = sd.clamp(-1.0, 1.0).asin();
        let hour_angle = (-sa * ce).atan2(se * self.cos_lat - ce * self.sin_lat * ca);

        let v = unit_vector(self.last - hour_angle, dec_t);
        let apparent = self.rotation.transpose() * v;

        // undo aberration: find s with |s·apparent − β| = 1
        let proj = apparent.dot(&self.beta);
        let s = proj + (proj * proj + 1.0 - self.beta.norm_squared()).sqrt();
        let u = s * apparent - self.beta;

        let ra = u.y.atan2(u.x).to_degrees().rem_euclid(360.0);
        let dec = u.z.clamp(-1.0, 1.0).asin().to_degrees();
        (ra, dec)
    }

    /// Per-pixel conversion of RA/Dec grids.
    ///
    /// Return
    /// ------
    /// * `(azimuth, elevation)` grids with the input shape, or
    ///   [`PlateScaleError::GridShapeMismatch`] when `ra` and `dec` differ in shape.
    pub fn radec_grid_to_azel(
        &self,
        ra: &Array2<f64>,
        dec: &Array2<f64>,
    ) -> Result<(Array2<f64>, Array2<f64>), PlateScaleError> {
        if ra.shape() != dec.shape() {
            return Err(PlateScaleError::GridShapeMismatch(
                ra.shape().to_vec(),
                dec.shape().to_vec(),
            ));
        }

        let mut az = Array2::<f64>::zeros(ra.raw_dim());
        let mut el = Array2::<f64>::zeros(ra.raw_dim());

        Zip::from(&mut az)
            .and(&mut el)
            .and(ra)
            .and(dec)
            .for_each(|a, e, &r, &d| (*a, *e) = self.radec_to_azel(r, d));

        Ok((az, el))
    }
}

#[cfg(test)]
mod horizon_test {
    use super::*;
    use crate::time::parse_time;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn frame(lat: f64, lon: f64) -> HorizonFrame {
        let site = Site::new(lat, lon, 0.0, None).unwrap();
        HorizonFrame::new(&site, parse_time("2000-01-01T00:00").unwrap(), None)
    }

    #[test]
    fn test_radec_to_azel_equator() {
        let f = frame(0.0, 0.0);
        for &(ra, dec, az, el) in &[
            (152.35248165, 59.98073175, 24.59668217, 17.78086795),
            (157.96163129, 59.20526844, 26.81546529, 15.74570897),
            (164.95871358, 59.18426375, 28.39753029, 12.50919858),
        ] {
            let (a, e) = f.radec_to_azel(ra, dec);
            assert_abs_diff_eq!(a, az, epsilon = 0.01);
            assert_abs_diff_eq!(e, el, epsilon = 0.01);
        }
    }

    #[test]
    fn test_radec_to_azel_mid_latitude() {
        let f = frame(40.0, -80.0);
        for &(ra, dec, az, el) in &[
            (152.313342, 59.982123, 22.794418, 17.359846),
            (157.988921, 59.182819, 20.788267, 15.084063),
        ] {
            let (a, e) = f.radec_to_azel(ra, dec);
            assert_abs_diff_eq!(a, az, epsilon = 0.01);
            assert_abs_diff_eq!(e, el, epsilon = 0.01);
        }
    }

    #[test]
    fn test_celestial_pole_elevation() {
        // the north celestial pole stands at the site latitude, due north
        let f = frame(65.0, -147.5);
        let (az, el) = f.radec_to_azel(0.0, 90.0);
        assert_abs_diff_eq!(el, 65.0, epsilon = 0.5);
        assert!(az < 1.0 || az > 359.0, "az = {az}");
    }

    #[test]
    fn test_azel_round_trip() {
        let f = frame(40.0, -80.0);
        for &(ra, dec) in &[(10.0, 20.0), (152.3, 59.9), (300.0, -10.0)] {
            let (az, el) = f.radec_to_azel(ra, dec);
            let (r, d) = f.azel_to_radec(az, el);
            assert_abs_diff_eq!(r, ra, epsilon = 1e-6);
            assert_abs_diff_eq!(d, dec, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_grid_matches_scalar() {
        let f = frame(0.0, 0.0);
        let ra = array![[152.35248165, 157.96163129], [164.95871358, f64::NAN]];
        let dec = array![[59.98073175, 59.20526844], [59.18426375, 0.0]];
        let (az, el) = f.radec_grid_to_azel(&ra, &dec).unwrap();

        let (a, e) = f.radec_to_azel(157.96163129, 59.20526844);
        assert_eq!(az[[0, 1]], a);
        assert_eq!(el[[0, 1]], e);
        assert!(az[[1, 1]].is_nan());
    }

    #[test]
    fn test_grid_shape_mismatch() {
        let f = frame(0.0, 0.0);
        let ra = Array2::<f64>::zeros((2, 3));
        let dec = Array2::<f64>::zeros((3, 2));
        assert_eq!(
            f.radec_grid_to_azel(&ra, &dec).unwrap_err(),
            PlateScaleError::GridShapeMismatch(vec![2, 3], vec![3, 2])
        );
    }
}
