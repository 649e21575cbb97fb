//! # Run configuration
//!
//! [`PlateScaleConfig`] gathers every knob of the pipeline. It deserialises from a JSON
//! file where every field is optional, and the binaries then override single fields
//! from their command-line flags.
//!
//! ```json
//! {
//!   "site": { "latitude": 65.1, "longitude": -147.5, "altitude_m": 200.0 },
//!   "frames": [0, 5],
//!   "method": "median",
//!   "solve": true,
//!   "solver_args": "--downsample 2 --no-plots",
//!   "ut1": { "eop_file": "finals2000A.all" }
//! }
//! ```
use camino::{Utf8Path, Utf8PathBuf};
use hifitime::ut1::Ut1Provider;
use serde::{Deserialize, Serialize};

use crate::observer::Site;
use crate::platescale_errors::PlateScaleError;
use crate::stack::{CollapseMethod, FrameRange, DEFAULT_FRAMES};

/// JPL Earth orientation file fetched by [`Ut1Source::Jpl`].
pub const JPL_EOP_FILE: &str = "latest_eop2.long";

/// Observer location as written in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Geodetic latitude, degrees north
    pub latitude: f64,
    /// Longitude, degrees east
    pub longitude: f64,
    #[serde(default)]
    pub altitude_m: f64,
}

impl SiteConfig {
    pub fn to_site(&self) -> Result<Site, PlateScaleError> {
        Site::new(self.latitude, self.longitude, self.altitude_m, None)
    }
}

/// Where ΔUT1 comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ut1Source {
    /// UTC stands in for UT1
    #[default]
    None,
    /// Local IERS EOP file
    EopFile(Utf8PathBuf),
    /// Download [`JPL_EOP_FILE`] from JPL
    Jpl,
}

impl Ut1Source {
    /// Build the provider, `None` for [`Ut1Source::None`].
    pub fn provider(&self) -> Result<Option<Ut1Provider>, PlateScaleError> {
        let provider = match self {
            Ut1Source::None => return Ok(None),
            Ut1Source::EopFile(path) => Ut1Provider::from_eop_file(path.as_str()),
            Ut1Source::Jpl => Ut1Provider::download_from_jpl(JPL_EOP_FILE),
        };
        provider
            .map(Some)
            .map_err(|e| PlateScaleError::Ut1ProviderError(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateScaleConfig {
    /// Observer; without one only RA/Dec are computed
    pub site: Option<SiteConfig>,
    /// `[n]` or `[start, stop]` frames to average
    pub frames: Vec<usize>,
    pub method: CollapseMethod,
    /// Run `solve-field` before reading the WCS
    pub solve: bool,
    /// Extra arguments passed verbatim to `solve-field`
    pub solver_args: String,
    pub solver_path: Option<Utf8PathBuf>,
    pub ut1: Ut1Source,
    /// Elevation below which geomapped pixels are masked, degrees
    pub min_elevation: f64,
    /// Emission altitude for geomapping, kilometres
    pub projection_altitude_km: Option<f64>,
}

impl Default for PlateScaleConfig {
    fn default() -> Self {
        PlateScaleConfig {
            site: None,
            frames: vec![DEFAULT_FRAMES],
            method: CollapseMethod::Mean,
            solve: false,
            solver_args: String::new(),
            solver_path: None,
            ut1: Ut1Source::None,
            min_elevation: 0.0,
            projection_altitude_km: None,
        }
    }
}

impl PlateScaleConfig {
    /// Read a JSON configuration; missing fields take their defaults.
    pub fn from_file(path: &Utf8Path) -> Result<Self, PlateScaleError> {
        if !path.is_file() {
            return Err(PlateScaleError::FileNotFound(path.to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn frame_range(&self) -> Result<FrameRange, PlateScaleError> {
        FrameRange::from_values(&self.frames)
    }

    pub fn site(&self) -> Result<Option<Site>, PlateScaleError> {
        self.site.as_ref().map(SiteConfig::to_site).transpose()
    }
}
