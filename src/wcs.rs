//! # Celestial solutions written by `solve-field`
//!
//! Astrometry.net describes its solution as a gnomonic (`TAN`) projection, optionally
//! with a SIP distortion polynomial (`TAN-SIP`). The header keywords are handed to the
//! [`wcs`](::wcs) crate, which evaluates the projection; this module adds the
//! `WCSAXES` check, the pixel convention and the per-pixel grids.
//!
//! ## Pixel convention
//!
//! Pixel coordinates are **0-based** (the centre of the first pixel is `(0, 0)`), as in
//! `all_pix2world(xy, 0)`. FITS `CRPIX` values are 1-based and converted internally.
//!
//! ## Linear part
//!
//! Taken from `CDi_j` when present, else `PCi_j · CDELTi`, else `CDELTi` with the AIPS
//! `CROTA2` rotation.
use ::wcs::{ImgXY, WCSParams, WCS};
use nalgebra::Vector3;
use ndarray::Array2;
use serde_json::{Map, Value};

use crate::constants::{Degree, RADEG};
use crate::fits::HeaderKeys;
use crate::platescale_errors::PlateScaleError;

/// Optional real-valued keywords of the celestial axes.
const REAL_KEYWORDS: [&str; 18] = [
    "CRPIX1", "CRPIX2", "CRVAL1", "CRVAL2", "CDELT1", "CDELT2", "CROTA2", "CD1_1", "CD1_2",
    "CD2_1", "CD2_2", "PC1_1", "PC1_2", "PC2_1", "PC2_2", "LONPOLE", "LATPOLE", "EQUINOX",
];

/// Forward (`A`, `B`) and inverse (`AP`, `BP`) SIP polynomials.
const SIP_POLYNOMIALS: [&str; 4] = ["A", "B", "AP", "BP"];

/// Highest SIP order read from a header.
const SIP_MAX_ORDER: i64 = 9;

/// TAN / TAN-SIP celestial solution of an `nx × ny` image.
#[derive(Debug)]
pub struct WcsSolution {
    wcs: WCS,
    /// Number of WCS axes declared by the header
    pub naxes: i64,
    nx: usize,
    ny: usize,
}

/// Keywords of the two celestial axes, keyed as in the header.
fn celestial_keywords(
    header: &impl HeaderKeys,
    nx: usize,
    ny: usize,
) -> Result<Map<String, Value>, PlateScaleError> {
    let mut cards = Map::new();
    cards.insert("NAXIS".into(), 2.into());
    cards.insert("NAXIS1".into(), (nx as i64).into());
    cards.insert("NAXIS2".into(), (ny as i64).into());

    for key in ["CTYPE1", "CTYPE2"] {
        cards.insert(key.into(), header.require_str(key)?.trim().into());
    }
    if let Some(radesys) = header.get_str("RADESYS") {
        cards.insert("RADESYS".into(), radesys.trim().into());
    }
    for key in ["CRPIX1", "CRPIX2", "CRVAL1", "CRVAL2"] {
        header.require_f64(key)?;
    }
    for key in REAL_KEYWORDS {
        if let Some(value) = header.get_f64(key) {
            cards.insert(key.into(), value.into());
        }
    }

    for prefix in SIP_POLYNOMIALS {
        let order_key = format!("{prefix}_ORDER");
        let Some(order) = header.get_i64(&order_key) else {
            continue;
        };
        if !(0..=SIP_MAX_ORDER).contains(&order) {
            return Err(PlateScaleError::InvalidFits(format!("{order_key} = {order}")));
        }
        cards.insert(order_key, order.into());
        for p in 0..=order {
            for q in 0..=(order - p) {
                let key = format!("{prefix}_{p}_{q}");
                if let Some(c) = header.get_f64(&key) {
                    cards.insert(key, c.into());
                }
            }
        }
    }
    Ok(cards)
}

fn unit_vector((ra, dec): (Degree, Degree)) -> Vector3<f64> {
    let (sr, cr) = (ra * RADEG).sin_cos();
    let (sd, cd) = (dec * RADEG).sin_cos();
    Vector3::new(cd * cr, cd * sr, sd)
}

impl WcsSolution {
    /// Build the solution from a header.
    ///
    /// Arguments
    /// ---------
    /// * `header`: primary header of a `.wcs` file or of a solved `.new` image.
    /// * `nx`, `ny`: image width and height in pixels.
    /// * `source`: file name, used in error messages.
    ///
    /// Return
    /// ------
    /// * The solution, or an error if `WCSAXES` is not 2 or 3, required keywords are
    ///   missing, or the projection cannot be evaluated.
    pub fn from_header(
        header: &impl HeaderKeys,
        nx: usize,
        ny: usize,
        source: &str,
    ) -> Result<Self, PlateScaleError> {
        // greyscale solutions have 2 axes, colour images a third (spectral) one
        let naxes = header.get_i64("WCSAXES").unwrap_or(2);
        if !(2..=3).contains(&naxes) {
            return Err(PlateScaleError::InvalidWcsAxes(source.to_string(), naxes));
        }

        let cards = celestial_keywords(header, nx, ny)?;
        let params: WCSParams = serde_json::from_value(Value::Object(cards))
            .map_err(|e| PlateScaleError::WcsError(format!("{source}: {e}")))?;
        let wcs = WCS::new(&params)
            .map_err(|e| PlateScaleError::WcsError(format!("{source}: {e:?}")))?;

        Ok(WcsSolution { wcs, naxes, nx, ny })
    }

    /// Image size `(nx, ny)` the solution was built for.
    pub fn size(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    /// Sky position of a 0-based pixel.
    ///
    /// Return
    /// ------
    /// * `(ra, dec)` in degrees, RA in `[0, 360)`; NaN where the projection is undefined.
    pub fn pix2world(&self, x: f64, y: f64) -> (Degree, Degree) {
        match self.wcs.unproj(&ImgXY::new(x + 1.0, y + 1.0)) {
            Some(lonlat) => (
                (lonlat.lon() / RADEG).rem_euclid(360.0),
                lonlat.lat() / RADEG,
            ),
            None => (f64::NAN, f64::NAN),
        }
    }

    /// RA/Dec of every pixel of an `nx × ny` image.
    ///
    /// Return
    /// ------
    /// * `(ra, dec)` grids of shape `(ny, nx)`, indexed `[y, x]`.
    pub fn pixel_grid(&self, nx: usize, ny: usize) -> (Array2<f64>, Array2<f64>) {
        let mut ra = Array2::<f64>::zeros((ny, nx));
        let mut dec = Array2::<f64>::zeros((ny, nx));

        for ((y, x), r) in ra.indexed_iter_mut() {
            let (a, d) = self.pix2world(x as f64, y as f64);
            *r = a;
            dec[[y, x]] = d;
        }
        (ra, dec)
    }

    /// Pixel scale at the image centre in arcseconds per pixel.
    pub fn pixel_scale(&self) -> f64 {
        let (cx, cy) = ((self.nx / 2) as f64, (self.ny / 2) as f64);
        let centre = unit_vector(self.pix2world(cx, cy));
        let step_x = centre.angle(&unit_vector(self.pix2world(cx + 1.0, cy)));
        let step_y = centre.angle(&unit_vector(self.pix2world(cx, cy + 1.0)));
        (step_x * step_y).sqrt() / RADEG * 3600.0
    }
}
