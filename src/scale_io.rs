//! # Scale files
//!
//! A [`PlateScale`] is saved as a multi-extension FITS file:
//!
//! | HDU         | content                                                   |
//! |-------------|-----------------------------------------------------------|
//! | primary     | no data; `FILENAME`, `OBSLAT`, `OBSLON`, `OBSALT`, `DATE-OBS`, `PROJALT` |
//! | `RA`, `DEC` | per-pixel J2000 coordinates                               |
//! | `AZIMUTH`, `ELEVATION` | when an observer was given                     |
//! | `IMAGE`     | the (stacked) image when known                            |
//! | `LAT_PROJ`, `LON_PROJ` | geomapped pixels when projected                |
//!
//! Every coordinate extension carries its units in `BUNIT`.
//!
//! An output path ending in `.csv` selects a flat per-pixel table instead:
//! `x,y,ra,dec[,azimuth,elevation][,latitude_proj,longitude_proj]`.
use camino::Utf8Path;
use ndarray::{Array2, Ix2};

use crate::fits::{FitsFile, FitsWriter, Header, HeaderKeys, ImageData, PixelType};
use crate::observer::Site;
use crate::platescale::{
    GeoProjection, Horizontal, PlateScale, AZIMUTH_UNITS, DEC_UNITS, ELEVATION_UNITS,
    LATITUDE_UNITS, LONGITUDE_UNITS, RA_UNITS,
};
use crate::platescale_errors::PlateScaleError;
use crate::time::{iso_utc, parse_time};

fn grid_image(grid: &Array2<f64>) -> ImageData {
    ImageData::new(grid.clone().into_dyn(), PixelType::F64)
}

fn units(bunit: &str) -> Header {
    let mut h = Header::new();
    h.set_str("BUNIT", bunit);
    h
}

/// Save a scale; the format follows the extension of `path`.
pub fn write_scale(scale: &PlateScale, path: &Utf8Path) -> Result<(), PlateScaleError> {
    if path.extension() == Some("csv") {
        return write_csv(scale, path);
    }

    let mut primary = Header::new();
    // full path, continued over several cards when long
    primary.set_str("FILENAME", scale.filename.as_str());
    if let Some(h) = &scale.horizontal {
        primary.set_f64("OBSLAT", h.site.lat());
        primary.set_f64("OBSLON", h.site.lon());
        primary.set_f64("OBSALT", h.site.alt());
        primary.set_str("DATE-OBS", &iso_utc(&h.time));
    }
    if let Some(p) = &scale.projection {
        primary.set_f64("PROJALT", p.altitude_km);
    }

    let mut writer = FitsWriter::new()
        .empty_primary(&primary)?
        .extension("RA", &grid_image(&scale.ra), &units(RA_UNITS))?
        .extension("DEC", &grid_image(&scale.dec), &units(DEC_UNITS))?;

    if let Some(h) = &scale.horizontal {
        writer = writer
            .extension("AZIMUTH", &grid_image(&h.azimuth), &units(AZIMUTH_UNITS))?
            .extension("ELEVATION", &grid_image(&h.elevation), &units(ELEVATION_UNITS))?;
    }
    if let Some(image) = &scale.image {
        writer = writer.extension("IMAGE", image, &Header::new())?;
    }
    if let Some(p) = &scale.projection {
        writer = writer
            .extension("LAT_PROJ", &grid_image(&p.latitude), &units(LATITUDE_UNITS))?
            .extension("LON_PROJ", &grid_image(&p.longitude), &units(LONGITUDE_UNITS))?;
    }

    writer.write(path, true)?;
    Ok(())
}

/// Per-pixel CSV export.
pub fn write_csv(scale: &PlateScale, path: &Utf8Path) -> Result<(), PlateScaleError> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["x", "y", "ra", "dec"];
    if scale.horizontal.is_some() {
        header.extend(["azimuth", "elevation"]);
    }
    if scale.projection.is_some() {
        header.extend(["latitude_proj", "longitude_proj"]);
    }
    writer.write_record(&header)?;

    for ((y, x), ra) in scale.ra.indexed_iter() {
        let mut record = vec![
            x.to_string(),
            y.to_string(),
            ra.to_string(),
            scale.dec[[y, x]].to_string(),
        ];
        if let Some(h) = &scale.horizontal {
            record.push(h.azimuth[[y, x]].to_string());
            record.push(h.elevation[[y, x]].to_string());
        }
        if let Some(p) = &scale.projection {
            record.push(p.latitude[[y, x]].to_string());
            record.push(p.longitude[[y, x]].to_string());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn read_grid(file: &FitsFile, extname: &str) -> Result<Option<Array2<f64>>, PlateScaleError> {
    file.extension_image(extname)?
        .map(|image| -> Result<Array2<f64>, PlateScaleError> {
            Ok(image.pixels.into_dimensionality::<Ix2>()?)
        })
        .transpose()
}

fn require_grid(file: &FitsFile, extname: &str) -> Result<Array2<f64>, PlateScaleError> {
    read_grid(file, extname)?.ok_or_else(|| PlateScaleError::MissingScaleData(extname.to_string()))
}

/// Load a scale file written by [`write_scale`].
pub fn read_scale(path: &Utf8Path) -> Result<PlateScale, PlateScaleError> {
    let file = FitsFile::open(path)?;
    let header = file.primary_header();

    let filename = header
        .get_str("FILENAME")
        .unwrap_or_else(|| path.to_string())
        .into();
    let mut scale = PlateScale::new(
        filename,
        require_grid(&file, "RA")?,
        require_grid(&file, "DEC")?,
    );

    if let (Some(azimuth), Some(elevation)) =
        (read_grid(&file, "AZIMUTH")?, read_grid(&file, "ELEVATION")?)
    {
        let site = Site::new(
            header.require_f64("OBSLAT")?,
            header.require_f64("OBSLON")?,
            header.get_f64("OBSALT").unwrap_or(0.0),
            None,
        )?;
        let time = parse_time(&header.require_str("DATE-OBS")?)?;
        scale.horizontal = Some(Horizontal {
            azimuth,
            elevation,
            site,
            time,
        });
    }

    scale.image = file.extension_image("IMAGE")?;

    if let (Some(latitude), Some(longitude)) =
        (read_grid(&file, "LAT_PROJ")?, read_grid(&file, "LON_PROJ")?)
    {
        scale.projection = Some(GeoProjection {
            latitude,
            longitude,
            altitude_km: header.require_f64("PROJALT")?,
        });
    }
    Ok(scale)
}

#[cfg(test)]
mod scale_io_test {
    use super::*;
    use camino::Utf8PathBuf;
    use ndarray::array;

    fn full_scale() -> PlateScale {
        let mut s = PlateScale::new(
            "aurora_stack.fits".into(),
            array![[10.0, 10.5, 11.0], [10.1, 10.6, 11.1]],
            array![[60.0, 60.1, 60.2], [59.0, 59.1, 59.2]],
        );
        s.horizontal = Some(Horizontal {
            azimuth: array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            elevation: array![[30.0, 31.0, 32.0], [-1.0, 0.0, 1.0]],
            site: Site::new(65.1, -147.5, 200.0, None).unwrap(),
            time: parse_time("2013-04-14T08:30:12.5").unwrap(),
        });
        s.image = Some(ImageData::new(
            array![[1.0, 2.0, 3.0], [4.0, 5.0, 65535.0]].into_dyn(),
            PixelType::U16,
        ));
        s.projection = Some(GeoProjection {
            latitude: array![[65.0, 65.1, 65.2], [f64::NAN, f64::NAN, 66.0]],
            longitude: array![[-147.0, -146.9, -146.8], [f64::NAN, f64::NAN, -145.0]],
            altitude_km: 110.0,
        });
        s
    }

    fn tmp(dir: &tempfile::TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap()
    }

    #[test]
    fn test_fits_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = tmp(&dir, "scale.fits");
        let scale = full_scale();
        write_scale(&scale, &path).unwrap();

        let back = read_scale(&path).unwrap();
        assert_eq!(back.filename, scale.filename);
        assert_eq!(back.ra, scale.ra);
        assert_eq!(back.image, scale.image);

        let (h, h0) = (back.horizontal().unwrap(), scale.horizontal().unwrap());
        assert_eq!(h.elevation, h0.elevation);
        assert_eq!(h.site, h0.site);
        assert_eq!(h.time, h0.time);

        let p = back.projection.unwrap();
        assert_eq!(p.altitude_km, 110.0);
        assert!(p.latitude[[1, 0]].is_nan());
        assert_eq!(p.longitude[[1, 2]], -145.0);

        let file = FitsFile::open(&path).unwrap();
        let azimuth = file.find("AZIMUTH").unwrap();
        assert_eq!(file.header(azimuth).get_str("BUNIT").as_deref(), Some(AZIMUTH_UNITS));
        assert!((0..file.hdu_count()).all(|i| file.verify_checksum(i).unwrap() == Some(true)));
    }

    #[test]
    fn test_long_filename_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = tmp(&dir, "long.fits");
        let mut scale = full_scale();
        scale.filename =
            "/mnt/archive/poker_flat/all_sky_imagers/digital_camera_565/2013-04-14/night_sky_camera/aurora_stack.fits"
                .into();
        assert!(scale.filename.as_str().len() > 100);
        write_scale(&scale, &path).unwrap();

        let back = read_scale(&path).unwrap();
        assert_eq!(back.filename, scale.filename);
        assert_eq!(back.horizontal().unwrap().time, scale.horizontal().unwrap().time);
    }

    #[test]
    fn test_radec_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = tmp(&dir, "radec.fits");
        let mut scale = full_scale();
        scale.horizontal = None;
        scale.projection = None;
        scale.image = None;
        write_scale(&scale, &path).unwrap();

        let back = read_scale(&path).unwrap();
        assert_eq!(back, scale);
        assert_eq!(FitsFile::open(&path).unwrap().hdu_count(), 3);
    }

    #[test]
    fn test_missing_radec() {
        let dir = tempfile::tempdir().unwrap();
        let path = tmp(&dir, "empty.fits");
        FitsWriter::new()
            .empty_primary(&Header::new())
            .unwrap()
            .write(&path, false)
            .unwrap();
        assert_eq!(
            read_scale(&path),
            Err(PlateScaleError::MissingScaleData("RA".into()))
        );
    }

    #[test]
    fn test_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = tmp(&dir, "scale.csv");
        write_scale(&full_scale(), &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["x", "y", "ra", "dec", "azimuth", "elevation", "latitude_proj", "longitude_proj"]
        );
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 6);
        // row-major: second row is x = 1, y = 0
        assert_eq!(&rows[1][0], "1");
        assert_eq!(&rows[1][2], "10.5");
        assert_eq!(&rows[3][6], "NaN");
    }
}
