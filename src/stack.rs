//! # Image-stack averaging
//!
//! Collapse a stack of frames (FITS cube, animated GIF or multi-page TIFF) into a single
//! image by mean or median along the frame axis. Averaging a few frames before solving
//! improves the signal-to-noise ratio of faint stars.
//!
//! Stacks are indexed `[frame, y, x]` (optionally with a trailing colour axis); a 2-D
//! image is already a single frame and passes through unchanged.
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, ImageBuffer, Luma};
use ndarray::{Array2, Array3, ArrayD, ArrayView1, Axis, Slice};
use serde::{Deserialize, Serialize};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;

use crate::fits::{FitsFile, ImageData, PixelType};
use crate::platescale_errors::PlateScaleError;

/// Number of leading frames averaged when nothing else is asked for.
pub const DEFAULT_FRAMES: usize = 10;

/// Rec. 709 luma weights, the ones `image` uses for its greyscale conversions.
const LUMA: [f64; 3] = [0.2126, 0.7152, 0.0722];

/// Half-open selection of frames along the first axis, clamped to the stack length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: usize,
    pub stop: usize,
}

impl Default for FrameRange {
    fn default() -> Self {
        FrameRange {
            start: 0,
            stop: DEFAULT_FRAMES,
        }
    }
}

impl FrameRange {
    pub fn new(start: usize, stop: usize) -> Self {
        FrameRange { start, stop }
    }

    /// Build a range from command-line values.
    ///
    /// Arguments
    /// ---------
    /// * `values`: `[n]` for the first `n` frames, or `[start, stop]`.
    ///
    /// Return
    /// ------
    /// * The range, or [`PlateScaleError::InvalidFrameRange`] for any other count.
    pub fn from_values(values: &[usize]) -> Result<Self, PlateScaleError> {
        match *values {
            [n] => Ok(FrameRange::new(0, n)),
            [start, stop] => Ok(FrameRange::new(start, stop)),
            _ => Err(PlateScaleError::InvalidFrameRange(values.to_vec())),
        }
    }

    /// Clamp to a stack of `len` frames.
    ///
    /// Return
    /// ------
    /// * The concrete `start..stop`, or [`PlateScaleError::EmptyFrameSelection`] when
    ///   nothing is left.
    pub fn resolve(&self, len: usize) -> Result<std::ops::Range<usize>, PlateScaleError> {
        let stop = self.stop.min(len);
        let start = self.start.min(len);
        if start >= stop {
            return Err(PlateScaleError::EmptyFrameSelection(self.start, self.stop, len));
        }
        Ok(start..stop)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollapseMethod {
    #[default]
    Mean,
    Median,
}

impl FromStr for CollapseMethod {
    type Err = PlateScaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mean" => Ok(CollapseMethod::Mean),
            "median" => Ok(CollapseMethod::Median),
            _ => Err(PlateScaleError::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for CollapseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollapseMethod::Mean => write!(f, "mean"),
            CollapseMethod::Median => write!(f, "median"),
        }
    }
}

impl CollapseMethod {
    fn reduce(self, lane: ArrayView1<f64>) -> f64 {
        match self {
            CollapseMethod::Mean => lane.sum() / lane.len() as f64,
            CollapseMethod::Median => {
                if lane.iter().any(|v| v.is_nan()) {
                    return f64::NAN;
                }
                let mut values = lane.to_vec();
                values.sort_by(f64::total_cmp);
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                }
            }
        }
    }
}

/// Collapse the selected frames of a stack into one image.
///
/// Arguments
/// ---------
/// * `image`: 2-D frame, 3-D `[frame, y, x]` stack or 4-D `[frame, y, x, colour]` stack.
/// * `range`: frames to use, clamped to the stack length.
/// * `method`: mean or median along the frame axis.
///
/// Return
/// ------
/// * A 2-D image unchanged, otherwise the collapsed image cast back to the input pixel
///   type (integers truncate). Other dimensionalities give
///   [`PlateScaleError::StackDimension`].
pub fn collapse_stack(
    image: &ImageData,
    range: FrameRange,
    method: CollapseMethod,
) -> Result<ImageData, PlateScaleError> {
    match image.pixels.ndim() {
        2 => Ok(image.clone()),
        3 | 4 => {
            let frames = range.resolve(image.pixels.len_of(Axis(0)))?;
            let selected = image
                .pixels
                .slice_axis(Axis(0), Slice::from(frames));
            let collapsed = selected
                .map_axis(Axis(0), |lane| method.reduce(lane))
                .mapv(|v| image.pixel_type.cast(v));
            Ok(ImageData::new(collapsed, image.pixel_type))
        }
        n => Err(PlateScaleError::StackDimension(n)),
    }
}

/// Lower-case extension of `path`, empty when there is none.
pub(crate) fn suffix(path: &Utf8Path) -> String {
    path.extension().unwrap_or_default().to_ascii_lowercase()
}

pub(crate) fn is_fits_suffix(ext: &str) -> bool {
    matches!(ext, "fits" | "fit" | "fts" | "new")
}

/// Greyscale frame and its pixel type from any raster image `image` can decode.
fn dynamic_to_gray(img: DynamicImage) -> Result<ImageData, PlateScaleError> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let (values, pixel_type): (Vec<f64>, _) = match img {
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => (
            img.to_luma16().into_raw().into_iter().map(f64::from).collect(),
            PixelType::U16,
        ),
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => (
            img.to_luma32f().into_raw().into_iter().map(f64::from).collect(),
            PixelType::F32,
        ),
        _ => (
            img.to_luma8().into_raw().into_iter().map(f64::from).collect(),
            PixelType::U8,
        ),
    };
    let pixels = Array2::from_shape_vec((h, w), values)?.into_dyn();
    Ok(ImageData::new(pixels, pixel_type))
}

/// Read a single image.
///
/// FITS files give their primary data as stored; other raster formats are read as one
/// greyscale frame. HDF5 and MATLAB files are not handled.
pub fn load_image(path: &Utf8Path) -> Result<ImageData, PlateScaleError> {
    if !path.is_file() {
        return Err(PlateScaleError::FileNotFound(path.to_string()));
    }
    match suffix(path).as_str() {
        ext if is_fits_suffix(ext) => FitsFile::open(path)?.primary_image(),
        "h5" | "mat" => Err(PlateScaleError::UnsupportedFormat(path.to_string())),
        _ => dynamic_to_gray(image::open(path)?),
    }
}

/// Frames of an animated GIF as a `[frame, y, x]` greyscale `u8` stack.
fn load_gif(path: &Utf8Path) -> Result<ImageData, PlateScaleError> {
    let decoder = GifDecoder::new(BufReader::new(File::open(path)?))?;
    let frames = decoder.into_frames().collect_frames()?;

    let (w, h) = frames
        .first()
        .map(|f| f.buffer().dimensions())
        .ok_or_else(|| PlateScaleError::UnsupportedFormat(format!("{path}: GIF without frames")))?;

    let mut values = Vec::with_capacity(frames.len() * (w * h) as usize);
    for frame in frames.iter() {
        let gray = DynamicImage::ImageRgba8(frame.buffer().clone()).to_luma8();
        values.extend(gray.into_raw().into_iter().map(f64::from));
    }
    let pixels = Array3::from_shape_vec((frames.len(), h as usize, w as usize), values)?;
    Ok(ImageData::new(pixels.into_dyn(), PixelType::U8))
}

/// Pages of a TIFF as a `[page, y, x]` greyscale stack.
fn load_tiff(path: &Utf8Path) -> Result<ImageData, PlateScaleError> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let mut values = Vec::new();
    let mut pages = 0;
    let mut page_shape = None;
    let mut pixel_type;

    loop {
        let (w, h) = decoder.dimensions()?;
        if *page_shape.get_or_insert((w, h)) != (w, h) {
            return Err(PlateScaleError::UnsupportedFormat(format!(
                "{path}: TIFF pages of different sizes"
            )));
        }
        let channels = match decoder.colortype()? {
            ColorType::Gray(_) => 1,
            ColorType::GrayA(_) => 2,
            ColorType::RGB(_) => 3,
            ColorType::RGBA(_) => 4,
            other => {
                return Err(PlateScaleError::UnsupportedFormat(format!(
                    "{path}: TIFF colour type {other:?}"
                )))
            }
        };
        let (samples, page_type): (Vec<f64>, _) = match decoder.read_image()? {
            DecodingResult::U8(v) => (v.into_iter().map(f64::from).collect(), PixelType::U8),
            DecodingResult::U16(v) => (v.into_iter().map(f64::from).collect(), PixelType::U16),
            DecodingResult::F32(v) => (v.into_iter().map(f64::from).collect(), PixelType::F32),
            DecodingResult::F64(v) => (v, PixelType::F64),
            _ => {
                return Err(PlateScaleError::UnsupportedFormat(format!(
                    "{path}: TIFF sample format"
                )))
            }
        };
        pixel_type = page_type;

        values.extend(samples.chunks_exact(channels).map(|px| {
            if channels >= 3 {
                page_type.cast(LUMA[0] * px[0] + LUMA[1] * px[1] + LUMA[2] * px[2])
            } else {
                px[0]
            }
        }));
        pages += 1;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    let (w, h) = page_shape.unwrap_or((0, 0));
    let pixels = Array3::from_shape_vec((pages, h as usize, w as usize), values)?;
    Ok(ImageData::new(pixels.into_dyn(), pixel_type))
}

/// Read every frame of a file.
///
/// Return
/// ------
/// * FITS primary data as stored, GIF frames or TIFF pages as a `[frame, y, x]` stack,
///   any other raster image as a single-frame `[1, y, x]` stack.
pub fn load_frames(path: &Utf8Path) -> Result<ImageData, PlateScaleError> {
    if !path.is_file() {
        return Err(PlateScaleError::FileNotFound(path.to_string()));
    }
    match suffix(path).as_str() {
        "gif" => load_gif(path),
        "tif" | "tiff" => load_tiff(path),
        _ => {
            let image = load_image(path)?;
            if image.pixels.ndim() == 2 {
                let pixels = image.pixels.insert_axis(Axis(0));
                Ok(ImageData::new(pixels, image.pixel_type))
            } else {
                Ok(image)
            }
        }
    }
}

/// Average the selected frames of an image file.
///
/// FITS, GIF and TIFF stacks are collapsed; other raster images are a single
/// greyscale frame, returned unchanged.
///
/// # See also
/// * [`collapse_stack`] – the reduction itself.
pub fn mean_stack(
    path: &Utf8Path,
    range: FrameRange,
    method: CollapseMethod,
) -> Result<ImageData, PlateScaleError> {
    let ext = suffix(path);
    let image = match ext.as_str() {
        "gif" | "tif" | "tiff" => load_frames(path)?,
        _ => load_image(path)?,
    };
    log::info!("{method} of frames {}..{} of {path}", range.start, range.stop);
    collapse_stack(&image, range, method)
}

/// Frame boundaries `start, start + step, …` below `stop`.
///
/// A zero `step` is rejected with [`PlateScaleError::InvalidFrameRange`].
pub fn segment_indices(
    start: usize,
    stop: usize,
    step: usize,
) -> Result<Vec<usize>, PlateScaleError> {
    if step == 0 {
        return Err(PlateScaleError::InvalidFrameRange(vec![start, stop, step]));
    }
    Ok((start..stop).step_by(step).collect())
}

/// Collapse each window `indices[i]..indices[i + 1]` of a stack.
///
/// Return
/// ------
/// * One image per consecutive pair of `indices`.
pub fn stack_segments(
    path: &Utf8Path,
    indices: &[usize],
    method: CollapseMethod,
) -> Result<Vec<ImageData>, PlateScaleError> {
    let frames = load_frames(path)?;
    indices
        .windows(2)
        .map(|w| collapse_stack(&frames, FrameRange::new(w[0], w[1]), method))
        .collect()
}

/// `<dir>/<stem>_<i>.png` for segment `i` of `path`.
pub fn segment_png_path(path: &Utf8Path, i: usize) -> Utf8PathBuf {
    let stem = path.file_stem().unwrap_or("stack");
    path.with_file_name(format!("{stem}_{i}.png"))
}

/// Write a 2-D image as a greyscale PNG: 8-bit for `u8` data, 16-bit otherwise.
///
/// Values outside the PNG range saturate and NaN becomes zero.
pub fn write_png(image: &ImageData, path: &Utf8Path) -> Result<(), PlateScaleError> {
    let &[h, w] = image.shape() else {
        return Err(PlateScaleError::StackDimension(image.pixels.ndim()));
    };
    let shape_error = || {
        PlateScaleError::UnsupportedFormat(format!("{path}: PNG of shape {h}x{w}"))
    };

    if image.pixel_type == PixelType::U8 {
        let raw = image.pixels.iter().map(|&v| v as u8).collect();
        ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(w as u32, h as u32, raw)
            .ok_or_else(shape_error)?
            .save(path)?;
    } else {
        // float to int `as` casts saturate and send NaN to zero
        let raw = image.pixels.iter().map(|&v| v.round() as u16).collect();
        ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, raw)
            .ok_or_else(shape_error)?
            .save(path)?;
    }
    Ok(())
}

/// Frame count of a stack, `1` for a 2-D image.
pub fn frame_count(image: &ArrayD<f64>) -> usize {
    if image.ndim() > 2 {
        image.len_of(Axis(0))
    } else {
        1
    }
}
