//! # Plate scaling: pixel → (RA, Dec) → (azimuth, elevation)
//!
//! This module holds the [`PlateScale`] dataset, the per-pixel sky coordinates of one
//! image, and the operations producing it:
//!
//! 1. [`fits_to_radec`] – optionally run `solve-field`, read the WCS solution and map every
//!    pixel to J2000 right ascension / declination.
//! 2. [`radec_to_azel`] – for an observer and an instant, map those grids to azimuth and
//!    elevation.
//! 3. [`fits_to_azel`] – both steps at once.
//!
//! [`PlateScaler`] wires them to a [`PlateScaleConfig`]: it averages the input stack,
//! writes the FITS handed to the solver, runs the conversion and saves the scale file.
//! Resources that are expensive or fallible to set up (UT1 table, solver executable) are
//! initialised lazily, once.
//!
//! ## Typical usage
//!
//! ```rust,no_run
//! use camino::Utf8Path;
//! use platescale::config::{PlateScaleConfig, SiteConfig};
//! use platescale::platescale::PlateScaler;
//!
//! let config = PlateScaleConfig {
//!     site: Some(SiteConfig { latitude: 65.1, longitude: -147.5, altitude_m: 200.0 }),
//!     solve: true,
//!     ..Default::default()
//! };
//! let scaler = PlateScaler::new(config);
//! let (scale, path) = scaler.plate_scale(Utf8Path::new("aurora.fits"), None, None)?;
//! println!("{} pixels below the horizon, saved in {path}", scale.below_horizon());
//! # Ok::<(), platescale::platescale_errors::PlateScaleError>(())
//! ```
//!
//! ## See also
//! * [`crate::scale_io`] – scale file format.
//! * [`crate::projection`] – geomapping of a scale onto an emission altitude.
use camino::{Utf8Path, Utf8PathBuf};
use hifitime::ut1::Ut1Provider;
use hifitime::Epoch;
use ndarray::Array2;
use once_cell::sync::OnceCell;

use crate::config::PlateScaleConfig;
use crate::constants::Kilometer;
use crate::fits::{FitsFile, FitsWriter, Header, HeaderKeys, ImageData};
use crate::horizon::HorizonFrame;
use crate::observer::Site;
use crate::platescale_errors::PlateScaleError;
use crate::projection::image_altitude;
use crate::solver::{do_solve, find_wcs_file, locate_solver};
use crate::stack::{is_fits_suffix, mean_stack, suffix};
use crate::time::{frame_time, iso_utc, spread_times};
use crate::wcs::WcsSolution;

pub const RA_UNITS: &str = "Right Ascension degrees east";
pub const DEC_UNITS: &str = "Declination degrees north";
pub const AZIMUTH_UNITS: &str = "degrees clockwise from north";
pub const ELEVATION_UNITS: &str = "degrees above horizon";
pub const LATITUDE_UNITS: &str = "degrees north WGS84";
pub const LONGITUDE_UNITS: &str = "degrees east WGS84";

/// Horizontal coordinates of every pixel, for one observer at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Horizontal {
    pub azimuth: Array2<f64>,
    pub elevation: Array2<f64>,
    pub site: Site,
    pub time: Epoch,
}

/// Pixels projected onto a thin emission layer.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoProjection {
    pub latitude: Array2<f64>,
    pub longitude: Array2<f64>,
    pub altitude_km: Kilometer,
}

/// Sky coordinates of every pixel of an image. All grids are indexed `[y, x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlateScale {
    /// Image the coordinates belong to
    pub filename: Utf8PathBuf,
    pub ra: Array2<f64>,
    pub dec: Array2<f64>,
    pub image: Option<ImageData>,
    pub horizontal: Option<Horizontal>,
    pub projection: Option<GeoProjection>,
}

impl PlateScale {
    pub fn new(filename: Utf8PathBuf, ra: Array2<f64>, dec: Array2<f64>) -> Self {
        PlateScale {
            filename,
            ra,
            dec,
            image: None,
            horizontal: None,
            projection: None,
        }
    }

    /// `(ny, nx)`
    pub fn shape(&self) -> (usize, usize) {
        self.ra.dim()
    }

    /// Horizontal part, or [`PlateScaleError::MissingScaleData`].
    pub fn horizontal(&self) -> Result<&Horizontal, PlateScaleError> {
        self.horizontal
            .as_ref()
            .ok_or_else(|| PlateScaleError::MissingScaleData("azimuth/elevation".to_string()))
    }

    /// Number of pixels with a negative elevation, 0 without horizontal coordinates.
    pub fn below_horizon(&self) -> usize {
        self.horizontal
            .as_ref()
            .map_or(0, |h| h.elevation.iter().filter(|&&e| e < 0.0).count())
    }
}

/// `(ny, nx)` of the image a WCS applies to.
///
/// Taken from the last two axes of the primary HDU; a bare `.wcs` file has no data and
/// records the solved image size in `IMAGEW`/`IMAGEH` instead.
fn image_shape(
    fits: &FitsFile,
    wcs_header: &impl HeaderKeys,
) -> Result<(usize, usize), PlateScaleError> {
    let shape = fits.shape(0)?;
    if let [.., ny, nx] = shape[..] {
        return Ok((ny, nx));
    }
    match (wcs_header.get_i64("IMAGEH"), wcs_header.get_i64("IMAGEW")) {
        (Some(ny), Some(nx)) if ny > 0 && nx > 0 => Ok((ny as usize, nx as usize)),
        _ => Err(PlateScaleError::InvalidFits(format!(
            "{} has no image data to plate scale",
            fits.path()
        ))),
    }
}

/// RA/Dec of every pixel of a FITS image.
///
/// Arguments
/// ---------
/// * `fits`: image, or a `.wcs` solution on its own.
/// * `solver`: `solve-field` executable to run first, `None` to use an existing solution.
/// * `args`: extra solver arguments.
/// * `wcs_fallbacks`: solution files tried after `<stem>.wcs`.
///
/// Return
/// ------
/// * A [`PlateScale`] with `ra`/`dec` grids shaped like the last two image axes, and the
///   image itself when it is 2-D.
///
/// # See also
/// * [`crate::solver::find_wcs_file`] – solution lookup order.
pub fn fits_to_radec(
    fits: &Utf8Path,
    solver: Option<&Utf8Path>,
    args: &str,
    wcs_fallbacks: &[Utf8PathBuf],
) -> Result<PlateScale, PlateScaleError> {
    if let Some(exe) = solver {
        do_solve(exe, fits, args)?;
    }

    let file = FitsFile::open(fits)?;
    let wcs_path = find_wcs_file(fits, wcs_fallbacks)?;
    let wcs_file = FitsFile::open(&wcs_path)?;
    let wcs_header = wcs_file.primary_header();

    let (ny, nx) = image_shape(&file, &wcs_header)?;
    let wcs = WcsSolution::from_header(&wcs_header, nx, ny, wcs_path.as_str())?;
    log::info!(
        "{fits}: {nx}x{ny} pixels, {:.2} arcsec/pixel from {wcs_path}",
        wcs.pixel_scale()
    );
    let (ra, dec) = wcs.pixel_grid(nx, ny);

    let mut scale = PlateScale::new(fits.to_owned(), ra, dec);
    if file.shape(0)?.len() == 2 {
        scale.image = Some(file.primary_image()?);
    }
    Ok(scale)
}

/// Add azimuth/elevation for an observer to a RA/Dec scale.
///
/// Arguments
/// ---------
/// * `scale`: result of [`fits_to_radec`].
/// * `site`: observer, assumed near ground level.
/// * `time`: image time; `None` reads `FRAME`/`DATE-OBS`/`DATE` from the scale's FITS file.
/// * `ut1_provider`: ΔUT1 table, `None` to use UTC.
///
/// Return
/// ------
/// * The scale with its horizontal part, or [`PlateScaleError::TimeUnavailable`] when no
///   time is known. Pixels below the horizon are counted and reported at error level.
pub fn radec_to_azel(
    mut scale: PlateScale,
    site: &Site,
    time: Option<Epoch>,
    ut1_provider: Option<&Ut1Provider>,
) -> Result<PlateScale, PlateScaleError> {
    let time = match time {
        Some(t) => t,
        None => frame_time(&FitsFile::open(&scale.filename)?.primary_header())?
            .ok_or_else(|| PlateScaleError::TimeUnavailable(scale.filename.to_string()))?,
    };
    println!("image time: {}", iso_utc(&time));

    let frame = HorizonFrame::new(site, time, ut1_provider);
    let (azimuth, elevation) = frame.radec_grid_to_azel(&scale.ra, &scale.dec)?;

    scale.horizontal = Some(Horizontal {
        azimuth,
        elevation,
        site: site.clone(),
        time,
    });

    let below = scale.below_horizon();
    if below > 0 {
        log::error!(
            "{below} points were below the horizon. \
             Currently this program assumes the observer is near ground level."
        );
    }
    Ok(scale)
}

/// [`fits_to_radec`] followed by [`radec_to_azel`].
pub fn fits_to_azel(
    fits: &Utf8Path,
    site: &Site,
    time: Option<Epoch>,
    solver: Option<&Utf8Path>,
    args: &str,
    ut1_provider: Option<&Ut1Provider>,
) -> Result<PlateScale, PlateScaleError> {
    let scale = fits_to_radec(fits, solver, args, &[])?;
    radec_to_azel(scale, site, time, ut1_provider)
}

/// `<dir>/<stem><suffix>` next to `path`.
fn sibling(path: &Utf8Path, suffix: &str) -> Utf8PathBuf {
    let stem = path.file_stem().unwrap_or("image");
    path.with_file_name(format!("{stem}{suffix}"))
}

/// Configured plate-scaling pipeline.
#[derive(Debug)]
pub struct PlateScaler {
    config: PlateScaleConfig,
    ut1_provider: OnceCell<Option<Ut1Provider>>,
    solver: OnceCell<Utf8PathBuf>,
}

impl PlateScaler {
    pub fn new(config: PlateScaleConfig) -> Self {
        PlateScaler {
            config,
            ut1_provider: OnceCell::new(),
            solver: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &PlateScaleConfig {
        &self.config
    }

    /// ΔUT1 table from the configured source, loaded on first use.
    pub fn ut1_provider(&self) -> Result<Option<&Ut1Provider>, PlateScaleError> {
        self.ut1_provider
            .get_or_try_init(|| self.config.ut1.provider())
            .map(Option::as_ref)
    }

    /// `solve-field` executable, looked up on first use.
    pub fn solver(&self) -> Result<&Utf8Path, PlateScaleError> {
        self.solver
            .get_or_try_init(|| locate_solver(self.config.solver_path.as_deref()))
            .map(Utf8PathBuf::as_path)
    }

    fn solver_if_enabled(&self) -> Result<Option<&Utf8Path>, PlateScaleError> {
        if self.config.solve {
            self.solver().map(Some)
        } else {
            Ok(None)
        }
    }

    /// [`fits_to_radec`] with the configured solver settings.
    pub fn fits_to_radec(
        &self,
        fits: &Utf8Path,
        wcs_fallbacks: &[Utf8PathBuf],
    ) -> Result<PlateScale, PlateScaleError> {
        fits_to_radec(
            fits,
            self.solver_if_enabled()?,
            &self.config.solver_args,
            wcs_fallbacks,
        )
    }

    /// [`radec_to_azel`] for the configured site; a scale is returned unchanged without
    /// a site.
    pub fn radec_to_azel(
        &self,
        scale: PlateScale,
        time: Option<Epoch>,
    ) -> Result<PlateScale, PlateScaleError> {
        match self.config.site()? {
            Some(site) => radec_to_azel(scale, &site, time, self.ut1_provider()?),
            None => {
                log::warn!("no observer site configured, computing RA/Dec only");
                Ok(scale)
            }
        }
    }

    /// Scale a FITS image (or `.wcs` solution) directly, without stacking.
    pub fn fits_to_azel(
        &self,
        fits: &Utf8Path,
        time: Option<Epoch>,
    ) -> Result<PlateScale, PlateScaleError> {
        let scale = self.fits_to_radec(fits, &[])?;
        let mut scale = self.radec_to_azel(scale, time)?;
        self.project(&mut scale)?;
        Ok(scale)
    }

    /// Geomap to the configured emission altitude, when there is one and the scale has
    /// horizontal coordinates.
    fn project(&self, scale: &mut PlateScale) -> Result<(), PlateScaleError> {
        let Some(km) = self.config.projection_altitude_km else {
            return Ok(());
        };
        let Some(observer_alt) = scale.horizontal.as_ref().map(|h| h.site.alt()) else {
            return Ok(());
        };
        scale.projection = Some(image_altitude(scale, km, observer_alt)?);
        Ok(())
    }

    /// Full pipeline for one input file.
    ///
    /// 1. Average the configured frames of `input` and write `<stem>_stack.fits`
    ///    (an existing stack is kept). The stack carries `DATE-OBS` when the time is known.
    /// 2. Solve it if configured; `<input stem>.wcs` is accepted as solution too.
    /// 3. Compute RA/Dec, then azimuth/elevation when a site is configured, then the
    ///    geomapping when a projection altitude is configured.
    /// 4. Save the scale to `output`, default `<stem>_stack_scale.fits`.
    ///
    /// Arguments
    /// ---------
    /// * `time`: image time override; otherwise the input FITS header is used.
    ///
    /// Return
    /// ------
    /// * The scale and the path it was saved to.
    pub fn plate_scale(
        &self,
        input: &Utf8Path,
        output: Option<&Utf8Path>,
        time: Option<Epoch>,
    ) -> Result<(PlateScale, Utf8PathBuf), PlateScaleError> {
        if !input.is_file() {
            return Err(PlateScaleError::FileNotFound(input.to_string()));
        }

        let stack = mean_stack(input, self.config.frame_range()?, self.config.method)?;

        let time = match time {
            Some(t) => Some(t),
            None if is_fits_suffix(&suffix(input)) => {
                frame_time(&FitsFile::open(input)?.primary_header())?
            }
            None => None,
        };

        let stack_path = sibling(input, "_stack.fits");
        let mut header = Header::new();
        header.set_str("FILENAME", input.file_name().unwrap_or_default());
        if let Some(t) = &time {
            header.set_str("DATE-OBS", &iso_utc(t));
        }
        if FitsWriter::new().primary(&stack, &header)?.write(&stack_path, false)? {
            println!("writing {stack_path}");
        }

        let fallbacks = [input.with_extension("wcs")];
        let mut scale = self.fits_to_radec(&stack_path, &fallbacks)?;
        scale.image = Some(stack);
        let mut scale = self.radec_to_azel(scale, time)?;
        self.project(&mut scale)?;

        let output = output.map_or_else(|| sibling(input, "_stack_scale.fits"), Utf8Path::to_owned);
        println!("saving {output}");
        crate::scale_io::write_scale(&scale, &output)?;

        Ok((scale, output))
    }

    /// Plate scale every file of `dir` matching `pattern`, stamping them with times spread
    /// evenly from `start` to `stop`.
    ///
    /// Files that fail are logged and skipped.
    ///
    /// Return
    /// ------
    /// * Paths of the scale files written; [`PlateScaleError::NoFilesFound`] when the
    ///   pattern matches nothing.
    pub fn convert_batch(
        &self,
        dir: &Utf8Path,
        pattern: &str,
        start: Epoch,
        stop: Epoch,
    ) -> Result<Vec<Utf8PathBuf>, PlateScaleError> {
        let mut files: Vec<Utf8PathBuf> = glob::glob(dir.join(pattern).as_str())?
            .filter_map(Result::ok)
            .filter_map(|p| Utf8PathBuf::from_path_buf(p).ok())
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(PlateScaleError::NoFilesFound(
                dir.to_string(),
                pattern.to_string(),
            ));
        }
        let total = files.len();
        let times = spread_times(start, stop, total);

        #[cfg(feature = "progress")]
        let mut progress = crate::progress_bar::BatchProgress::new(total as u64);

        let mut converted = Vec::with_capacity(total);
        for (file, time) in files.iter().zip(times) {
            match self.plate_scale(file, None, Some(time)) {
                Ok((_, out)) => converted.push(out),
                Err(e) => log::error!("{file}: {e}"),
            }
            #[cfg(feature = "progress")]
            progress.tick(file.file_name().unwrap_or_default());
        }
        #[cfg(feature = "progress")]
        progress.finish();

        println!("converted {} / {total} files in {dir}", converted.len());
        Ok(converted)
    }
}

#[cfg(test)]
mod platescale_test {
    use super::*;
    use crate::fits::PixelType;
    use crate::time::parse_time;
    use ndarray::array;

    fn scale() -> PlateScale {
        PlateScale::new(
            "sky.fits".into(),
            array![[152.35248165, 157.96163129], [164.95871358, 280.0]],
            array![[59.98073175, 59.20526844], [59.18426375, -80.0]],
        )
    }

    #[test]
    fn test_radec_to_azel_with_time() {
        let site = Site::new(0.0, 0.0, 0.0, None).unwrap();
        let t = parse_time("2000-01-01T00:00").unwrap();
        let s = radec_to_azel(scale(), &site, Some(t), None).unwrap();

        let h = s.horizontal().unwrap();
        assert_eq!(h.time, t);
        assert!((h.azimuth[[0, 0]] - 24.59668217).abs() < 0.01);
        assert!((h.elevation[[1, 0]] - 12.50919858).abs() < 0.01);
        // the far southern point is below the horizon at the equator at this time
        assert_eq!(s.below_horizon(), 1);
    }

    #[test]
    fn test_radec_to_azel_without_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("sky.fits")).unwrap();
        let image = ImageData::new(Array2::zeros((2, 2)).into_dyn(), PixelType::U8);
        FitsWriter::new()
            .primary(&image, &Header::new())
            .unwrap()
            .write(&path, false)
            .unwrap();

        let mut s = scale();
        s.filename = path.clone();
        let site = Site::new(40.0, -80.0, 0.0, None).unwrap();
        assert_eq!(
            radec_to_azel(s, &site, None, None),
            Err(PlateScaleError::TimeUnavailable(path.to_string()))
        );
    }

    #[test]
    fn test_missing_horizontal() {
        assert_eq!(
            scale().horizontal(),
            Err(PlateScaleError::MissingScaleData("azimuth/elevation".into()))
        );
        assert_eq!(scale().below_horizon(), 0);
        assert_eq!(scale().shape(), (2, 2));
    }

    #[test]
    fn test_sibling_names() {
        let p = Utf8Path::new("/data/aurora.h5");
        assert_eq!(sibling(p, "_stack.fits"), Utf8PathBuf::from("/data/aurora_stack.fits"));
    }

    #[test]
    fn test_batch_without_matches() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let t = parse_time("2020-01-01T00:00").unwrap();
        let scaler = PlateScaler::new(PlateScaleConfig::default());
        assert_eq!(
            scaler.convert_batch(&root, "*.fits", t, t),
            Err(PlateScaleError::NoFilesFound(root.to_string(), "*.fits".into()))
        );
    }
}
