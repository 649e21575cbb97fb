//! # Geomapping
//!
//! Auroral and airglow emission comes from a thin layer at a roughly known altitude.
//! Placing every pixel on that layer gives the geographic footprint of the image.
//! The slant range uses the flat-layer secant approximation `h / sin(el)`, which is
//! adequate away from the horizon.
use ndarray::{Array2, Zip};

use crate::constants::{Kilometer, Meter};
use crate::observer::Site;
use crate::platescale::{GeoProjection, PlateScale};
use crate::platescale_errors::PlateScaleError;

/// Project every pixel of a scale onto a layer at `projection_altitude_km`.
///
/// Arguments
/// ---------
/// * `scale`: scale with azimuth/elevation.
/// * `projection_altitude_km`: emission altitude.
/// * `observer_altitude_m`: camera height above the ellipsoid.
///
/// Return
/// ------
/// * Latitude/longitude grids of the projected pixels, NaN where the elevation is not
///   positive.
pub fn image_altitude(
    scale: &PlateScale,
    projection_altitude_km: Kilometer,
    observer_altitude_m: Meter,
) -> Result<GeoProjection, PlateScaleError> {
    let horizontal = scale.horizontal()?;
    let site = Site::new(
        horizontal.site.lat(),
        horizontal.site.lon(),
        observer_altitude_m,
        None,
    )?;

    let mut latitude = Array2::<f64>::from_elem(horizontal.elevation.raw_dim(), f64::NAN);
    let mut longitude = latitude.clone();

    Zip::from(&mut latitude)
        .and(&mut longitude)
        .and(&horizontal.azimuth)
        .and(&horizontal.elevation)
        .for_each(|lat, lon, &az, &el| {
            if el > 0.0 {
                let slant_m = projection_altitude_km * 1e3 / el.to_radians().sin();
                let (la, lo, _) = site.aer_to_geodetic(az, el, slant_m);
                (*lat, *lon) = (la, lo);
            }
        });

    log::info!("projected {} to {projection_altitude_km} km", scale.filename);
    Ok(GeoProjection {
        latitude,
        longitude,
        altitude_km: projection_altitude_km,
    })
}

/// `true` where the elevation is below `minimum_elevation` (or undefined).
pub fn elevation_mask(
    scale: &PlateScale,
    minimum_elevation: f64,
) -> Result<Array2<bool>, PlateScaleError> {
    let elevation = &scale.horizontal()?.elevation;
    Ok(elevation.mapv(|el| !(el >= minimum_elevation)))
}

/// The scale's image with pixels below `minimum_elevation` set to NaN.
pub fn masked_image(
    scale: &PlateScale,
    minimum_elevation: f64,
) -> Result<Array2<f64>, PlateScaleError> {
    let image = scale
        .image
        .as_ref()
        .ok_or_else(|| PlateScaleError::MissingScaleData("image".to_string()))?;
    let mut pixels = image.pixels.clone().into_dimensionality::<ndarray::Ix2>()?;
    let mask = elevation_mask(scale, minimum_elevation)?;
    if pixels.shape() != mask.shape() {
        return Err(PlateScaleError::GridShapeMismatch(
            pixels.shape().to_vec(),
            mask.shape().to_vec(),
        ));
    }

    Zip::from(&mut pixels).and(&mask).for_each(|p, &masked| {
        if masked {
            *p = f64::NAN;
        }
    });
    Ok(pixels)
}

#[cfg(test)]
mod projection_test {
    use super::*;
    use crate::fits::{ImageData, PixelType};
    use crate::platescale::Horizontal;
    use crate::time::parse_time;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn scale() -> PlateScale {
        let mut s = PlateScale::new(
            "sky.fits".into(),
            Array2::zeros((2, 2)),
            Array2::zeros((2, 2)),
        );
        s.horizontal = Some(Horizontal {
            azimuth: array![[0.0, 90.0], [180.0, 0.0]],
            elevation: array![[90.0, 45.0], [10.0, -5.0]],
            site: Site::new(65.0, -147.0, 0.0, None).unwrap(),
            time: parse_time("2020-01-01T00:00").unwrap(),
        });
        s.image = Some(ImageData::new(
            array![[1.0, 2.0], [3.0, 4.0]].into_dyn(),
            PixelType::U8,
        ));
        s
    }

    #[test]
    fn test_zenith_and_below_horizon() {
        let p = image_altitude(&scale(), 110.0, 0.0).unwrap();
        assert_abs_diff_eq!(p.latitude[[0, 0]], 65.0, epsilon = 1e-6);
        assert_abs_diff_eq!(p.longitude[[0, 0]], -147.0, epsilon = 1e-6);
        assert!(p.latitude[[1, 1]].is_nan());
        assert_eq!(p.altitude_km, 110.0);

        // 45° east at 110 km lands ~110 km east: about 2.3° of longitude at 65°N
        assert_abs_diff_eq!(p.latitude[[0, 1]], 65.0, epsilon = 0.05);
        assert!(p.longitude[[0, 1]] > -145.0 && p.longitude[[0, 1]] < -144.4);

        // low elevation due south lands several degrees south
        assert!(p.latitude[[1, 0]] < 60.5);
    }

    #[test]
    fn test_masks() {
        let s = scale();
        assert_eq!(
            elevation_mask(&s, 20.0).unwrap(),
            array![[false, false], [true, true]]
        );
        let img = masked_image(&s, 0.0).unwrap();
        assert_eq!(img[[1, 0]], 3.0);
        assert!(img[[1, 1]].is_nan());
    }

    #[test]
    fn test_requires_horizontal() {
        let mut s = scale();
        s.horizontal = None;
        assert_eq!(
            image_altitude(&s, 110.0, 0.0),
            Err(PlateScaleError::MissingScaleData("azimuth/elevation".into()))
        );
    }
}
