#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use ndarray::{Array2, Array3};
use platescale::fits::{FitsWriter, Header, ImageData, PixelType};
use tempfile::TempDir;

pub const CRVAL: (f64, f64) = (150.0, 60.0);
/// Degrees per pixel.
pub const CDELT: f64 = 0.02;

pub fn utf8_dir(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()
}

/// TAN solution centred on the `nx × ny` image, as `solve-field` leaves in `.wcs`.
pub fn tan_header(nx: usize, ny: usize) -> Header {
    let mut h = Header::new();
    h.set_i64("WCSAXES", 2);
    h.set_str("CTYPE1", "RA---TAN");
    h.set_str("CTYPE2", "DEC--TAN");
    h.set_f64("CRPIX1", (nx / 2 + 1) as f64);
    h.set_f64("CRPIX2", (ny / 2 + 1) as f64);
    h.set_f64("CRVAL1", CRVAL.0);
    h.set_f64("CRVAL2", CRVAL.1);
    h.set_f64("CD1_1", -CDELT);
    h.set_f64("CD1_2", 0.0);
    h.set_f64("CD2_1", 0.0);
    h.set_f64("CD2_2", CDELT);
    h.set_i64("IMAGEW", nx as i64);
    h.set_i64("IMAGEH", ny as i64);
    h
}

pub fn write_wcs(path: &Utf8Path, nx: usize, ny: usize) {
    FitsWriter::new()
        .empty_primary(&tan_header(nx, ny))
        .unwrap()
        .write(path, true)
        .unwrap();
}

/// `frames` frames of a ramp; frame `k` is the ramp plus `10 k`.
pub fn ramp_cube(frames: usize, ny: usize, nx: usize) -> ImageData {
    let cube = Array3::from_shape_fn((frames, ny, nx), |(k, y, x)| (x + y + 10 * k) as f64);
    ImageData::new(cube.into_dyn(), PixelType::U16)
}

pub fn write_cube(path: &Utf8Path, image: &ImageData, date_obs: Option<&str>) {
    let mut header = Header::new();
    if let Some(date) = date_obs {
        header.set_str("DATE-OBS", date);
    }
    FitsWriter::new()
        .primary(image, &header)
        .unwrap()
        .write(path, true)
        .unwrap();
}

pub fn write_png(path: &Utf8Path, pixels: &Array2<u8>) {
    let (h, w) = pixels.dim();
    image::GrayImage::from_fn(w as u32, h as u32, |x, y| {
        image::Luma([pixels[[y as usize, x as usize]]])
    })
    .save(path)
    .unwrap();
}
