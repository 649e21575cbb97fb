mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;
use platescale::config::{PlateScaleConfig, SiteConfig};
use platescale::fits::{FitsFile, HeaderKeys};
use platescale::observer::Site;
use platescale::platescale::{fits_to_azel, fits_to_radec, PlateScaler};
use platescale::scale_io::read_scale;
use platescale::time::parse_time;
use platescale::PlateScaleError;

use crate::common::*;

fn fairbanks() -> SiteConfig {
    SiteConfig {
        latitude: 65.1,
        longitude: -147.5,
        altitude_m: 200.0,
    }
}

#[test]
fn test_plate_scale_fits_cube() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let root = utf8_dir(&dir);

    let input = root.join("aurora.fits");
    write_cube(&input, &ramp_cube(4, 30, 40), Some("2013-04-14T08:30:12"));
    write_wcs(&root.join("aurora.wcs"), 40, 30);

    let scaler = PlateScaler::new(PlateScaleConfig {
        site: Some(fairbanks()),
        frames: vec![1, 3],
        ..Default::default()
    });
    let (scale, out) = scaler.plate_scale(&input, None, None).unwrap();

    assert_eq!(out, root.join("aurora_stack_scale.fits"));
    assert!(root.join("aurora_stack.fits").is_file());
    assert_eq!(scale.shape(), (30, 40));

    // reference pixel: 0-based (20, 15)
    assert_abs_diff_eq!(scale.ra[[15, 20]], CRVAL.0, epsilon = 1e-9);
    assert_abs_diff_eq!(scale.dec[[15, 20]], CRVAL.1, epsilon = 1e-9);
    // RA increases to the left
    assert!(scale.ra[[15, 19]] > scale.ra[[15, 20]]);

    // mean of frames 1 and 2 of the ramp
    let image = scale.image.as_ref().unwrap();
    assert_eq!(image.shape(), &[30, 40]);
    assert_eq!(image.pixels[[0, 0]], 15.0);

    let h = scale.horizontal().unwrap();
    assert_eq!(h.time, parse_time("2013-04-14T08:30:12").unwrap());
    assert!(h.elevation.iter().all(|e| (-90.0..=90.0).contains(e)));

    let back = read_scale(&out).unwrap();
    assert_eq!(back.ra, scale.ra);
    assert_eq!(back.horizontal().unwrap().azimuth, h.azimuth);

    let stack = FitsFile::open(&root.join("aurora_stack.fits")).unwrap();
    assert_eq!(
        stack.primary_header().get_str("DATE-OBS").as_deref(),
        Some("2013-04-14T08:30:12.000")
    );
}

#[test]
fn test_plate_scale_with_projection_to_csv() {
    let dir = tempfile::tempdir().unwrap();
    let root = utf8_dir(&dir);
    let input = root.join("night.fits");
    write_cube(&input, &ramp_cube(2, 6, 8), None);
    write_wcs(&root.join("night.wcs"), 8, 6);

    let scaler = PlateScaler::new(PlateScaleConfig {
        site: Some(fairbanks()),
        projection_altitude_km: Some(110.0),
        ..Default::default()
    });
    let out = root.join("night.csv");
    let time = parse_time("2013-04-14T08:30:12").unwrap();
    let (scale, written) = scaler.plate_scale(&input, Some(&out), Some(time)).unwrap();
    assert_eq!(written, out);

    let p = scale.projection.as_ref().unwrap();
    let h = scale.horizontal().unwrap();
    for ((y, x), &el) in h.elevation.indexed_iter() {
        assert_eq!(el > 0.0, !p.latitude[[y, x]].is_nan());
    }

    let mut reader = csv::Reader::from_path(&out).unwrap();
    assert_eq!(reader.headers().unwrap().len(), 8);
    assert_eq!(reader.records().count(), 48);
}

#[test]
fn test_plate_scale_without_time() {
    let dir = tempfile::tempdir().unwrap();
    let root = utf8_dir(&dir);
    let input = root.join("notime.fits");
    write_cube(&input, &ramp_cube(2, 4, 4), None);
    write_wcs(&root.join("notime.wcs"), 4, 4);

    let scaler = PlateScaler::new(PlateScaleConfig {
        site: Some(fairbanks()),
        ..Default::default()
    });
    assert_eq!(
        scaler.plate_scale(&input, None, None).map(|(s, _)| s),
        Err(PlateScaleError::TimeUnavailable(
            root.join("notime_stack.fits").to_string()
        ))
    );

    // RA/Dec only without a site
    let radec_only = PlateScaler::new(PlateScaleConfig::default());
    let (scale, _) = radec_only.plate_scale(&input, None, None).unwrap();
    assert!(scale.horizontal.is_none());
}

#[test]
fn test_wcs_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let root = utf8_dir(&dir);
    let wcs = root.join("solution.wcs");
    write_wcs(&wcs, 12, 7);

    let scale = fits_to_radec(&wcs, None, "", &[]).unwrap();
    assert_eq!(scale.shape(), (7, 12));
    assert!(scale.image.is_none());

    let site = Site::new(65.1, -147.5, 0.0, None).unwrap();
    let time = parse_time("2020-02-20T12:00:00").unwrap();
    let scale = fits_to_azel(&wcs, &site, Some(time), None, "", None).unwrap();
    assert_eq!(scale.horizontal().unwrap().azimuth.dim(), (7, 12));
}

#[test]
fn test_missing_solution() {
    let dir = tempfile::tempdir().unwrap();
    let root = utf8_dir(&dir);
    let input = root.join("lonely.fits");
    write_cube(&input, &ramp_cube(1, 4, 4), None);
    assert!(matches!(
        fits_to_radec(&input, None, "", &[]),
        Err(PlateScaleError::WcsNotFound(_))
    ));
}

#[test]
fn test_batch_of_pngs() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let root = utf8_dir(&dir);

    let pixels = Array2::from_shape_fn((10, 16), |(y, x)| (x * 3 + y) as u8);
    for name in ["a", "b", "c"] {
        write_png(&root.join(format!("{name}.png")), &pixels);
        write_wcs(&root.join(format!("{name}.wcs")), 16, 10);
    }
    // no solution: logged and skipped
    write_png(&root.join("d.png"), &pixels);

    let scaler = PlateScaler::new(PlateScaleConfig {
        site: Some(fairbanks()),
        ..Default::default()
    });
    let start = parse_time("2013-04-14T06:00:00").unwrap();
    let stop = parse_time("2013-04-14T07:00:00").unwrap();
    let converted = scaler.convert_batch(&root, "*.png", start, stop).unwrap();

    assert_eq!(
        converted,
        vec![
            root.join("a_stack_scale.fits"),
            root.join("b_stack_scale.fits"),
            root.join("c_stack_scale.fits"),
        ]
    );
    let b = read_scale(&converted[1]).unwrap();
    let image = b.image.unwrap();
    assert_eq!(image.pixels[[2, 3]], 11.0);
    assert_eq!(b.horizontal.unwrap().time, parse_time("2013-04-14T06:15:00").unwrap());
}
