//! # FITS images, headers and tables through cfitsio
//!
//! A thin adapter between [`fitsio`] and the pipeline's array types:
//!
//! - images decode to [`ImageData`], an `ndarray` in row-major ("C") order, i.e. axes
//!   `[NAXISn, …, NAXIS2, NAXIS1]`, so a greyscale frame is indexed `[y, x]` and a stack
//!   `[frame, y, x]`,
//! - keywords are read through [`HeaderKeys`], either from an open HDU ([`HduHeader`]) or
//!   from an in-memory [`Header`] waiting to be written,
//! - [`FitsWriter`] lays out image and binary table HDUs and stamps each one with
//!   `DATASUM`/`CHECKSUM`.
//!
//! String keywords are written and read with the long-string `CONTINUE` convention, so
//! values such as full file paths survive past the 68 characters of a single card.
//!
//! ## Example
//!
//! ```rust,no_run
//! use camino::Utf8Path;
//! use platescale::fits::FitsFile;
//!
//! let fits = FitsFile::open(Utf8Path::new("apod4.fits"))?;
//! let image = fits.primary_image()?;
//! println!("{:?} {:?}", image.pixels.shape(), image.pixel_type);
//! # Ok::<(), platescale::platescale_errors::PlateScaleError>(())
//! ```
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::{fs, ptr};

use camino::{Utf8Path, Utf8PathBuf};
use fitsio::hdu::HduInfo;
use fitsio::images::{ImageDescription, ImageType};
use fitsio::tables::{ColumnDataType, ColumnDescription};
use ndarray::{ArrayD, IxDyn};

use crate::platescale_errors::PlateScaleError;

/// Keywords cfitsio derives from the data layout; user headers never set them.
const STRUCTURAL_KEYWORDS: [&str; 11] = [
    "SIMPLE", "BITPIX", "EXTEND", "XTENSION", "PCOUNT", "GCOUNT", "EXTNAME", "BZERO",
    "BSCALE", "CHECKSUM", "DATASUM",
];

fn is_structural(key: &str) -> bool {
    STRUCTURAL_KEYWORDS.contains(&key)
        || key.starts_with("NAXIS")
        || key == "TFIELDS"
        || key.starts_with("TTYPE")
        || key.starts_with("TFORM")
}

fn check_status(status: i32, action: &str) -> Result<(), PlateScaleError> {
    if status == 0 {
        Ok(())
    } else {
        Err(PlateScaleError::FitsioError(format!(
            "{action} failed with cfitsio status {status}"
        )))
    }
}

/// Physical pixel type of an image, as cfitsio reports it once `BZERO`/`BSCALE` are
/// applied. Unsigned 16/32-bit integers are stored as signed with an offset `BZERO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    F32,
    F64,
}

impl PixelType {
    pub fn from_image_type(image_type: &ImageType) -> Self {
        match image_type {
            ImageType::UnsignedByte | ImageType::Byte => Self::U8,
            ImageType::Short => Self::I16,
            ImageType::UnsignedShort => Self::U16,
            ImageType::Long => Self::I32,
            ImageType::UnsignedLong => Self::U32,
            ImageType::LongLong => Self::I64,
            ImageType::Float => Self::F32,
            ImageType::Double => Self::F64,
        }
    }

    /// Storage type used to write this pixel type.
    pub fn image_type(self) -> ImageType {
        match self {
            Self::U8 => ImageType::UnsignedByte,
            Self::I16 => ImageType::Short,
            Self::U16 => ImageType::UnsignedShort,
            Self::I32 => ImageType::Long,
            Self::U32 => ImageType::UnsignedLong,
            Self::I64 => ImageType::LongLong,
            Self::F32 => ImageType::Float,
            Self::F64 => ImageType::Double,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, Self::F32 | Self::F64)
    }

    /// Value range of integer types.
    fn bounds(self) -> (f64, f64) {
        match self {
            Self::U8 => (0.0, u8::MAX as f64),
            Self::I16 => (i16::MIN as f64, i16::MAX as f64),
            Self::U16 => (0.0, u16::MAX as f64),
            Self::I32 => (i32::MIN as f64, i32::MAX as f64),
            Self::U32 => (0.0, u32::MAX as f64),
            Self::I64 => (i64::MIN as f64, i64::MAX as f64),
            Self::F32 => (f32::MIN as f64, f32::MAX as f64),
            Self::F64 => (f64::MIN, f64::MAX),
        }
    }

    /// Cast a value to this type, kept in an `f64`.
    ///
    /// Integers truncate toward zero and saturate at the type bounds; NaN stays NaN.
    pub fn cast(self, value: f64) -> f64 {
        match self {
            Self::F64 => value,
            Self::F32 => value as f32 as f64,
            _ if value.is_nan() => value,
            _ => {
                let (lo, hi) = self.bounds();
                value.trunc().clamp(lo, hi)
            }
        }
    }
}

/// Decoded image: physical pixel values and their type.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub pixels: ArrayD<f64>,
    pub pixel_type: PixelType,
}

impl ImageData {
    pub fn new(pixels: ArrayD<f64>, pixel_type: PixelType) -> Self {
        ImageData { pixels, pixel_type }
    }

    pub fn shape(&self) -> &[usize] {
        self.pixels.shape()
    }
}

/// Keyword value of an in-memory header.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

/// Ordered keywords to be written with an HDU.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header {
    cards: Vec<(String, Value)>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a keyword, replacing an earlier value in place.
    pub fn set(&mut self, key: &str, value: Value) {
        let key = key.to_ascii_uppercase();
        match self.cards.iter_mut().find(|(k, _)| *k == key) {
            Some(card) => card.1 = value,
            None => self.cards.push((key, value)),
        }
    }

    pub fn set_str(&mut self, key: &str, value: &str) {
        self.set(key, Value::Str(value.to_string()));
    }

    pub fn set_f64(&mut self, key: &str, value: f64) {
        self.set(key, Value::Float(value));
    }

    pub fn set_i64(&mut self, key: &str, value: i64) {
        self.set(key, Value::Int(value));
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let pos = self.cards.iter().position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.cards.remove(pos).1)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.cards
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn cards(&self) -> impl Iterator<Item = &(String, Value)> {
        self.cards.iter()
    }
}

/// Typed keyword lookup shared by file and in-memory headers.
pub trait HeaderKeys {
    fn get_str(&self, key: &str) -> Option<String>;
    fn get_f64(&self, key: &str) -> Option<f64>;
    fn get_i64(&self, key: &str) -> Option<i64>;

    fn require_str(&self, key: &str) -> Result<String, PlateScaleError> {
        self.get_str(key)
            .ok_or_else(|| PlateScaleError::MissingKeyword(key.to_string()))
    }

    fn require_f64(&self, key: &str) -> Result<f64, PlateScaleError> {
        self.get_f64(key)
            .ok_or_else(|| PlateScaleError::MissingKeyword(key.to_string()))
    }

    fn require_i64(&self, key: &str) -> Result<i64, PlateScaleError> {
        self.get_i64(key)
            .ok_or_else(|| PlateScaleError::MissingKeyword(key.to_string()))
    }
}

impl HeaderKeys for Header {
    fn get_str(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::Str(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Str(_) => None,
        }
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }
}

/// Read a string keyword, following `CONTINUE` cards.
///
/// The current HDU of `fptr` must be the one to read from.
fn read_long_string(fptr: &mut fitsio::FitsFile, key: &str) -> Option<String> {
    let name = CString::new(key).ok()?;
    let mut value: *mut c_char = ptr::null_mut();
    let mut status = 0;
    // SAFETY: on success cfitsio mallocs `value`, which is freed below
    unsafe {
        fitsio_sys::ffgkls(
            fptr.as_raw(),
            name.as_ptr(),
            &mut value,
            ptr::null_mut(),
            &mut status,
        );
    }
    if value.is_null() {
        return None;
    }
    let text = (status == 0)
        .then(|| unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned());
    unsafe { libc::free(value.cast()) };
    text
}

/// Write a string keyword, continued over several cards when longer than one.
fn write_long_string(
    fptr: &mut fitsio::FitsFile,
    key: &str,
    value: &str,
) -> Result<(), PlateScaleError> {
    let invalid = |_| PlateScaleError::InvalidFits(format!("NUL byte in keyword {key}"));
    let name = CString::new(key).map_err(invalid)?;
    let text = CString::new(value).map_err(invalid)?;
    let mut status = 0;
    unsafe {
        fitsio_sys::ffpkls(
            fptr.as_raw(),
            name.as_ptr(),
            text.as_ptr(),
            ptr::null(),
            &mut status,
        );
    }
    check_status(status, &format!("writing keyword {key}"))
}

/// Keywords of one HDU of an open file, read on demand.
pub struct HduHeader<'a> {
    file: &'a FitsFile,
    index: usize,
}

impl HduHeader<'_> {
    fn read_key<T: fitsio::headers::ReadsKey>(&self, key: &str) -> Option<T> {
        let mut fptr = self.file.fptr.borrow_mut();
        let hdu = fptr.hdu(self.index).ok()?;
        hdu.read_key::<T>(&mut fptr, key).ok()
    }
}

impl HeaderKeys for HduHeader<'_> {
    fn get_str(&self, key: &str) -> Option<String> {
        let mut fptr = self.file.fptr.borrow_mut();
        fptr.hdu(self.index).ok()?;
        read_long_string(&mut fptr, key)
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        self.read_key::<f64>(key)
    }

    fn get_i64(&self, key: &str) -> Option<i64> {
        self.read_key::<i64>(key)
    }
}

/// Scalar numeric columns of a binary table HDU.
pub struct BinTable<'a> {
    file: &'a FitsFile,
    index: usize,
    columns: Vec<String>,
    n_rows: usize,
}

impl BinTable<'_> {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    fn find(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Column lookup ignores case.
    pub fn has_column(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// All values of a column as `f64`.
    pub fn column(&self, name: &str) -> Result<Vec<f64>, PlateScaleError> {
        let column = self
            .find(name)
            .ok_or_else(|| PlateScaleError::MissingColumn(name.to_string()))?;
        let mut fptr = self.file.fptr.borrow_mut();
        let hdu = fptr.hdu(self.index)?;
        Ok(hdu.read_col::<f64>(&mut fptr, column)?)
    }
}

/// An open FITS file.
pub struct FitsFile {
    path: Utf8PathBuf,
    fptr: RefCell<fitsio::FitsFile>,
}

impl FitsFile {
    pub fn open(path: &Utf8Path) -> Result<Self, PlateScaleError> {
        if !path.is_file() {
            return Err(PlateScaleError::FileNotFound(path.to_string()));
        }
        let fptr = fitsio::FitsFile::open(path)?;
        Ok(FitsFile {
            path: path.to_path_buf(),
            fptr: RefCell::new(fptr),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn hdu_count(&self) -> usize {
        let mut fptr = self.fptr.borrow_mut();
        let mut count = 0;
        while fptr.hdu(count).is_ok() {
            count += 1;
        }
        count
    }

    pub fn header(&self, index: usize) -> HduHeader<'_> {
        HduHeader { file: self, index }
    }

    pub fn primary_header(&self) -> HduHeader<'_> {
        self.header(0)
    }

    /// Index of the extension named `extname` (case-insensitive).
    pub fn find(&self, extname: &str) -> Option<usize> {
        (1..self.hdu_count()).find(|&i| {
            self.header(i)
                .get_str("EXTNAME")
                .is_some_and(|name| name.trim().eq_ignore_ascii_case(extname))
        })
    }

    fn info(&self, index: usize) -> Result<HduInfo, PlateScaleError> {
        let mut fptr = self.fptr.borrow_mut();
        Ok(fptr.hdu(index)?.info)
    }

    /// Row-major shape of an image HDU, empty for a header-only HDU.
    pub fn shape(&self, index: usize) -> Result<Vec<usize>, PlateScaleError> {
        match self.info(index)? {
            HduInfo::ImageInfo { shape, .. } => Ok(shape),
            _ => Err(PlateScaleError::InvalidFits(format!(
                "{}: HDU {index} is not an image",
                self.path
            ))),
        }
    }

    pub fn image(&self, index: usize) -> Result<ImageData, PlateScaleError> {
        let mut fptr = self.fptr.borrow_mut();
        let hdu = fptr.hdu(index)?;
        let (shape, pixel_type) = match &hdu.info {
            HduInfo::ImageInfo { shape, image_type } if !shape.is_empty() => {
                (shape.clone(), PixelType::from_image_type(image_type))
            }
            _ => {
                return Err(PlateScaleError::InvalidFits(format!(
                    "{}: HDU {index} holds no image",
                    self.path
                )))
            }
        };
        let values: Vec<f64> = hdu.read_image(&mut fptr)?;
        let pixels = ArrayD::from_shape_vec(IxDyn(&shape), values)?;
        Ok(ImageData::new(pixels, pixel_type))
    }

    pub fn primary_image(&self) -> Result<ImageData, PlateScaleError> {
        self.image(0)
    }

    /// Image of a named extension, `None` when the file has no such extension.
    pub fn extension_image(&self, extname: &str) -> Result<Option<ImageData>, PlateScaleError> {
        self.find(extname).map(|i| self.image(i)).transpose()
    }

    /// First binary table HDU, if any.
    pub fn first_bintable(&self) -> Option<BinTable<'_>> {
        (0..self.hdu_count()).find_map(|index| match self.info(index).ok()? {
            HduInfo::TableInfo {
                column_descriptions,
                num_rows,
            } => Some(BinTable {
                file: self,
                index,
                columns: column_descriptions.into_iter().map(|c| c.name).collect(),
                n_rows: num_rows,
            }),
            _ => None,
        })
    }

    /// Check `CHECKSUM` of one HDU: `None` when the HDU carries no checksum.
    pub fn verify_checksum(&self, index: usize) -> Result<Option<bool>, PlateScaleError> {
        let mut fptr = self.fptr.borrow_mut();
        fptr.hdu(index)?;
        let (mut data_ok, mut hdu_ok, mut status) = (0, 0, 0);
        unsafe {
            fitsio_sys::ffvcks(fptr.as_raw(), &mut data_ok, &mut hdu_ok, &mut status);
        }
        check_status(status, "verifying checksum")?;
        Ok(match hdu_ok {
            0 => None,
            1 => Some(true),
            _ => Some(false),
        })
    }
}

enum PendingHdu {
    Image {
        extname: Option<String>,
        image: ImageData,
        header: Header,
    },
    Empty(Header),
    Table {
        extname: String,
        columns: Vec<(String, Vec<f64>)>,
    },
}

/// Builder collecting HDUs, written out in order by [`FitsWriter::write`].
#[derive(Default)]
pub struct FitsWriter {
    hdus: Vec<PendingHdu>,
}

fn write_header(
    fptr: &mut fitsio::FitsFile,
    index: usize,
    header: &Header,
) -> Result<(), PlateScaleError> {
    let hdu = fptr.hdu(index)?;
    for (key, value) in header.cards().filter(|(k, _)| !is_structural(k)) {
        match value {
            Value::Str(s) => write_long_string(fptr, key, s)?,
            Value::Int(v) => hdu.write_key(fptr, key, *v)?,
            Value::Float(v) => hdu.write_key(fptr, key, *v)?,
        }
    }
    Ok(())
}

fn write_checksum(fptr: &mut fitsio::FitsFile, index: usize) -> Result<(), PlateScaleError> {
    fptr.hdu(index)?;
    let mut status = 0;
    unsafe {
        fitsio_sys::ffpcks(fptr.as_raw(), &mut status);
    }
    check_status(status, "writing checksum")
}

fn pixel_values(image: &ImageData) -> Vec<f64> {
    image.pixels.iter().map(|&v| image.pixel_type.cast(v)).collect()
}

impl FitsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_first(&self, what: &str) -> Result<(), PlateScaleError> {
        if self.hdus.is_empty() {
            Ok(())
        } else {
            Err(PlateScaleError::InvalidFits(format!("{what} must be written first")))
        }
    }

    /// Primary image HDU. Must come first.
    pub fn primary(mut self, image: &ImageData, extra: &Header) -> Result<Self, PlateScaleError> {
        self.require_first("primary HDU")?;
        self.hdus.push(PendingHdu::Image {
            extname: None,
            image: image.clone(),
            header: extra.clone(),
        });
        Ok(self)
    }

    /// Header-only primary HDU (`NAXIS = 0`), typically followed by extensions.
    pub fn empty_primary(mut self, extra: &Header) -> Result<Self, PlateScaleError> {
        self.require_first("primary HDU")?;
        self.hdus.push(PendingHdu::Empty(extra.clone()));
        Ok(self)
    }

    /// `IMAGE` extension named `extname`.
    pub fn extension(
        mut self,
        extname: &str,
        image: &ImageData,
        extra: &Header,
    ) -> Result<Self, PlateScaleError> {
        if self.hdus.is_empty() {
            self = self.empty_primary(&Header::new())?;
        }
        self.hdus.push(PendingHdu::Image {
            extname: Some(extname.to_string()),
            image: image.clone(),
            header: extra.clone(),
        });
        Ok(self)
    }

    /// Binary table of `f64` columns, all of the same length.
    pub fn table(mut self, extname: &str, columns: &[(&str, &[f64])]) -> Result<Self, PlateScaleError> {
        let rows = columns.first().map_or(0, |(_, c)| c.len());
        if let Some((name, _)) = columns.iter().find(|(_, c)| c.len() != rows) {
            return Err(PlateScaleError::InvalidFits(format!(
                "column {name} length differs from {rows} rows"
            )));
        }
        if self.hdus.is_empty() {
            self = self.empty_primary(&Header::new())?;
        }
        self.hdus.push(PendingHdu::Table {
            extname: extname.to_string(),
            columns: columns
                .iter()
                .map(|(name, values)| (name.to_string(), values.to_vec()))
                .collect(),
        });
        Ok(self)
    }

    /// Write the file. An existing file is only replaced with `overwrite`.
    ///
    /// # Returns
    ///
    /// * Whether the file was written.
    pub fn write(&self, path: &Utf8Path, overwrite: bool) -> Result<bool, PlateScaleError> {
        if path.exists() {
            if !overwrite {
                log::warn!("did not overwrite existing {path}");
                return Ok(false);
            }
            fs::remove_file(path)?;
        }

        let mut fptr = match self.hdus.first() {
            Some(PendingHdu::Image { image, .. }) => {
                let description = ImageDescription {
                    data_type: image.pixel_type.image_type(),
                    dimensions: image.shape(),
                };
                fitsio::FitsFile::create(path)
                    .with_custom_primary(&description)
                    .open()?
            }
            _ => fitsio::FitsFile::create(path).open()?,
        };

        for (index, pending) in self.hdus.iter().enumerate() {
            match pending {
                PendingHdu::Image {
                    extname,
                    image,
                    header,
                } => {
                    let hdu = match extname {
                        None => fptr.primary_hdu()?,
                        Some(name) => {
                            let description = ImageDescription {
                                data_type: image.pixel_type.image_type(),
                                dimensions: image.shape(),
                            };
                            fptr.create_image(name.clone(), &description)?
                        }
                    };
                    hdu.write_image(&mut fptr, &pixel_values(image))?;
                    write_header(&mut fptr, index, header)?;
                }
                PendingHdu::Empty(header) => write_header(&mut fptr, index, header)?,
                PendingHdu::Table { extname, columns } => {
                    let descriptions = columns
                        .iter()
                        .map(|(name, _)| {
                            ColumnDescription::new(name)
                                .with_type(ColumnDataType::Double)
                                .create()
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    let hdu = fptr.create_table(extname.clone(), &descriptions)?;
                    for (name, values) in columns {
                        hdu.write_col(&mut fptr, name, values)?;
                    }
                }
            }
            write_checksum(&mut fptr, index)?;
        }
        Ok(true)
    }
}

/// Write an image as the primary HDU of a new file, never replacing an existing one.
///
/// # Arguments
///
/// * `image` - Pixels and type to store.
/// * `path` - Destination file.
///
/// # Returns
///
/// * Whether the file was written.
pub fn write_fits(image: &ImageData, path: &Utf8Path) -> Result<bool, PlateScaleError> {
    let written = FitsWriter::new()
        .primary(image, &Header::new())?
        .write(path, false)?;
    if written {
        println!("writing {path}");
    }
    Ok(written)
}
