//! # platescale
//!
//! Plate scaling of sky images: every pixel of a camera frame is mapped to J2000
//! right ascension/declination through an Astrometry.net (`solve-field`) WCS solution,
//! then to azimuth/elevation for an observer site and time, and optionally projected
//! onto an emission altitude.
//!
//! The usual entry point is [`platescale::PlateScaler`], configured by a
//! [`config::PlateScaleConfig`]. The stand-alone steps are also exposed:
//!
//! - [`stack`]: load image stacks (FITS, GIF, TIFF, PNG, ...) and collapse frames.
//! - [`solver`]: run `solve-field` and locate its `.wcs` output.
//! - [`wcs`]: TAN/TAN-SIP pixel to sky transforms.
//! - [`horizon`]: RA/Dec to azimuth/elevation.
//! - [`projection`]: geomapping to an emission altitude.
//! - [`scale_io`]: multi-extension FITS or CSV scale files.
//! - [`sources`], [`display`]: `.rdls` source lists and tables.
//! - [`locate_crop`]: find where a crop came from.
pub mod config;
pub mod constants;
pub mod conversion;
pub mod display;
pub mod earth_orientation;
pub mod fits;
pub mod horizon;
pub mod locate_crop;
pub mod observer;
pub mod platescale;
pub mod platescale_errors;
pub mod projection;
pub mod scale_io;
pub mod solver;
pub mod sources;
pub mod stack;
pub mod time;
pub mod wcs;

#[cfg(feature = "index-download")]
pub mod index_download;
#[cfg(feature = "progress")]
pub mod progress_bar;

pub use platescale::{PlateScale, PlateScaler};
pub use platescale_errors::PlateScaleError;
