//! # Locating a crop in its original image
//!
//! Finds where a cropped image was cut from by normalised cross-correlation template
//! matching, for when the crop parameters were lost.
use camino::Utf8Path;
use image::{ColorType, DynamicImage};
use ndarray::{Array2, Zip};

use crate::platescale_errors::PlateScaleError;

/// RGB to luma weights (ITU-R BT.601).
pub const RGB_TO_GRAY: [f64; 3] = [0.299, 0.587, 0.114];

/// Where a crop sits in the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropMatch {
    /// Upper-left corner of the crop in the original.
    pub row: usize,
    pub col: usize,
    /// Correlation at the match, in `[-1, 1]`.
    pub score: f64,
    /// Sum over the matched region of `original - crop`, each difference wrapped to
    /// `u8`. Zero for an exact crop.
    pub diff_sum: u64,
}

/// Weighted greyscale of an RGB image, truncated to `u8`.
pub fn rgb_to_gray(image: &DynamicImage) -> Array2<u8> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    match image.color() {
        ColorType::L8 | ColorType::La8 | ColorType::L16 | ColorType::La16 => {
            let luma = image.to_luma8();
            Array2::from_shape_fn((height, width), |(y, x)| {
                luma.get_pixel(x as u32, y as u32)[0]
            })
        }
        _ => {
            let rgb = image.to_rgb8();
            Array2::from_shape_fn((height, width), |(y, x)| {
                let p = rgb.get_pixel(x as u32, y as u32);
                let gray: f64 = p.0.iter().zip(RGB_TO_GRAY).map(|(&c, w)| c as f64 * w).sum();
                gray as u8
            })
        }
    }
}

/// Greyscale `u8` pixels of an image file.
pub fn load_gray(path: &Utf8Path) -> Result<Array2<u8>, PlateScaleError> {
    if !path.is_file() {
        return Err(PlateScaleError::FileNotFound(path.to_string()));
    }
    Ok(rgb_to_gray(&image::open(path)?))
}

/// Normalised cross-correlation of `template` at every position where it fits
/// entirely inside `image`.
///
/// Return
/// ------
/// * Array of shape `(H - h + 1, W - w + 1)`; entry `(r, c)` is the correlation with
///   the template's upper-left corner at `(r, c)`. Flat windows score 0.
pub fn match_template(
    image: &Array2<f64>,
    template: &Array2<f64>,
) -> Result<Array2<f64>, PlateScaleError> {
    let (h, w) = template.dim();
    let (big_h, big_w) = image.dim();
    if h > big_h || w > big_w || h == 0 || w == 0 {
        return Err(PlateScaleError::TemplateTooLarge((h, w), (big_h, big_w)));
    }

    let t_mean = template.mean().unwrap_or(0.0);
    let t_dev = template.mapv(|v| v - t_mean);
    let t_norm = t_dev.mapv(|v| v * v).sum();

    let out = Zip::from(image.windows((h, w))).map_collect(|window| {
        let mean = window.mean().unwrap_or(0.0);
        let (num, var) = Zip::from(&window)
            .and(&t_dev)
            .fold((0.0, 0.0), |(num, var), &v, &t| {
                let d = v - mean;
                (num + d * t, var + d * d)
            });
        let denom = (var * t_norm).sqrt();
        if denom > f64::EPSILON * (h * w) as f64 {
            num / denom
        } else {
            0.0
        }
    });
    Ok(out)
}

/// Locate `crop` inside `original`.
///
/// The first maximum in row-major order wins ties.
pub fn locate_crop(original: &Array2<u8>, crop: &Array2<u8>) -> Result<CropMatch, PlateScaleError> {
    let scores = match_template(&original.mapv(f64::from), &crop.mapv(f64::from))?;

    let ((row, col), score) = scores.indexed_iter().fold(
        ((0, 0), f64::NEG_INFINITY),
        |best, (idx, &s)| if s > best.1 { (idx, s) } else { best },
    );

    let (h, w) = crop.dim();
    let roi = original.slice(ndarray::s![row..row + h, col..col + w]);
    let diff_sum = Zip::from(&roi)
        .and(crop)
        .fold(0u64, |acc, &a, &b| acc + a.wrapping_sub(b) as u64);

    Ok(CropMatch {
        row,
        col,
        score,
        diff_sum,
    })
}

/// Load both images and locate the crop.
pub fn locate_crop_files(
    original: &Utf8Path,
    crop: &Utf8Path,
) -> Result<CropMatch, PlateScaleError> {
    let m = locate_crop(&load_gray(original)?, &load_gray(crop)?)?;
    log::info!(
        "{crop} matches {original} at ({}, {}) with correlation {:.4}",
        m.row,
        m.col,
        m.score
    );
    Ok(m)
}

#[cfg(test)]
mod locate_crop_test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::{Rgb, RgbImage};
    use ndarray::s;

    fn scene() -> Array2<u8> {
        // hashed pixel index: no two windows look alike
        Array2::from_shape_fn((20, 24), |(y, x)| {
            let mut v = ((y * 24 + x) as u32).wrapping_mul(0x9E37_79B9);
            v ^= v >> 16;
            v = v.wrapping_mul(0x85EB_CA6B);
            v ^= v >> 13;
            (v >> 24) as u8
        })
    }

    #[test]
    fn test_exact_crop() {
        let original = scene();
        let crop = original.slice(s![5..12, 9..17]).to_owned();
        let m = locate_crop(&original, &crop).unwrap();
        assert_eq!((m.row, m.col), (5, 9));
        assert_abs_diff_eq!(m.score, 1.0, epsilon = 1e-9);
        assert_eq!(m.diff_sum, 0);
    }

    #[test]
    fn test_wrapped_difference() {
        let original = scene();
        let mut crop = original.slice(s![2..6, 3..8]).to_owned();
        // a single brightened pixel: v - (v + 1) wraps to 255
        crop[[0, 0]] = original[[2, 3]].wrapping_add(1);
        let m = locate_crop(&original, &crop).unwrap();
        assert_eq!((m.row, m.col), (2, 3));
        assert_eq!(m.diff_sum, 255);
    }

    #[test]
    fn test_flat_windows_score_zero() {
        let image = Array2::<f64>::zeros((4, 4));
        let template = Array2::from_shape_fn((2, 2), |(y, x)| (y + x) as f64);
        let scores = match_template(&image, &template).unwrap();
        assert_eq!(scores.dim(), (3, 3));
        assert!(scores.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_template_too_large() {
        let image = Array2::<u8>::zeros((3, 3));
        let crop = Array2::<u8>::zeros((4, 2));
        assert_eq!(
            locate_crop(&image, &crop),
            Err(PlateScaleError::TemplateTooLarge((4, 2), (3, 3)))
        );
    }

    #[test]
    fn test_gray_weights() {
        let mut rgb = RgbImage::new(2, 1);
        rgb.put_pixel(0, 0, Rgb([255, 0, 0]));
        rgb.put_pixel(1, 0, Rgb([10, 200, 30]));
        let gray = rgb_to_gray(&DynamicImage::ImageRgb8(rgb));
        // 0.299*255 = 76.2; 2.99 + 117.4 + 3.42 = 123.8
        assert_eq!(gray, ndarray::array![[76, 123]]);
    }

    #[test]
    fn test_files() {
        let dir = tempfile::tempdir().unwrap();
        let original = scene();
        let save = |a: &Array2<u8>, name: &str| {
            let (h, w) = a.dim();
            let img = image::GrayImage::from_fn(w as u32, h as u32, |x, y| {
                image::Luma([a[[y as usize, x as usize]]])
            });
            let path = camino::Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
            img.save(&path).unwrap();
            path
        };
        let big = save(&original, "original.png");
        let small = save(&original.slice(s![10..18, 0..6]).to_owned(), "crop.png");
        let m = locate_crop_files(&big, &small).unwrap();
        assert_eq!((m.row, m.col), (10, 0));
        assert_eq!(m.diff_sum, 0);
    }
}
