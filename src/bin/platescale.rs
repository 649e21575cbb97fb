//! Plate scale image data: stack, solve, and map every pixel to RA/Dec and, with an
//! observer site, to azimuth/elevation.
//!
//! # Usage
//!
//! ```bash
//! # one file, solving it first, for a camera in Alaska
//! platescale aurora.fits -s -c 65.1 -147.5
//!
//! # every .fits of a directory, times spread over the night
//! platescale data/ -g "*.fits" -c 65.1 -147.5 -t 2013-04-14T06:00 2013-04-14T12:00
//! ```
use camino::Utf8PathBuf;
use clap::Parser;

use platescale::config::{PlateScaleConfig, SiteConfig, Ut1Source};
use platescale::display::ScaleSummary;
use platescale::platescale::PlateScaler;
use platescale::stack::CollapseMethod;
use platescale::time::parse_time;
use platescale::PlateScaleError;

#[derive(Parser)]
#[command(author, version, about = "do plate scaling for image data", long_about = None)]
struct Cli {
    /// Image data file name (FITS, GIF, TIFF, PNG...), or directory with --glob
    infn: Utf8PathBuf,

    /// Filename globbing inside INFN
    #[arg(short, long)]
    glob: Option<String>,

    /// Plate scale data path to write (.fits or .csv)
    #[arg(short, long)]
    outfn: Option<Utf8PathBuf>,

    /// WGS84 coordinates of the camera (degrees)
    #[arg(short = 'c', long, num_args = 2, value_names = ["LAT", "LON"], allow_negative_numbers = true)]
    latlon: Option<Vec<f64>>,

    /// Camera altitude (meters)
    #[arg(long)]
    altitude_m: Option<f64>,

    /// Override file time yyyy-mm-ddTHH:MM:SSZ, or start stop with --glob
    #[arg(short = 't', long, num_args = 1..=2)]
    time: Vec<String>,

    /// Number of frames, or start stop frames, to average
    #[arg(short = 'N', long, num_args = 1..=2)]
    navg: Option<Vec<usize>>,

    /// Frame collapse method: mean or median
    #[arg(long)]
    method: Option<String>,

    /// Run the solve-field step of astrometry.net
    #[arg(short, long)]
    solve: bool,

    /// Arguments to pass through to solve-field
    #[arg(short, long, allow_hyphen_values = true)]
    args: Option<String>,

    /// solve-field executable
    #[arg(long)]
    solver: Option<Utf8PathBuf>,

    /// IERS EOP file for UT1
    #[arg(long, conflicts_with = "jpl_ut1")]
    eop: Option<Utf8PathBuf>,

    /// Download UT1 data from JPL
    #[arg(long)]
    jpl_ut1: bool,

    /// Also geomap to this emission altitude (kilometers)
    #[arg(long)]
    projection_altitude_km: Option<f64>,

    /// JSON configuration; command line flags take precedence
    #[arg(long)]
    config: Option<Utf8PathBuf>,
}

impl Cli {
    fn to_config(&self) -> Result<PlateScaleConfig, PlateScaleError> {
        let mut config = match &self.config {
            Some(path) => PlateScaleConfig::from_file(path)?,
            None => PlateScaleConfig::default(),
        };

        if let Some(latlon) = &self.latlon {
            config.site = Some(SiteConfig {
                latitude: latlon[0],
                longitude: latlon[1],
                altitude_m: self.altitude_m.unwrap_or(0.0),
            });
        } else if let (Some(site), Some(alt)) = (config.site.as_mut(), self.altitude_m) {
            site.altitude_m = alt;
        }
        if let Some(navg) = &self.navg {
            config.frames = navg.clone();
        }
        if let Some(method) = &self.method {
            config.method = method.parse::<CollapseMethod>()?;
        }
        config.solve |= self.solve;
        if let Some(args) = &self.args {
            config.solver_args = args.clone();
        }
        if self.solver.is_some() {
            config.solver_path = self.solver.clone();
        }
        if let Some(eop) = &self.eop {
            config.ut1 = Ut1Source::EopFile(eop.clone());
        } else if self.jpl_ut1 {
            config.ut1 = Ut1Source::Jpl;
        }
        if self.projection_altitude_km.is_some() {
            config.projection_altitude_km = self.projection_altitude_km;
        }
        Ok(config)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let scaler = PlateScaler::new(cli.to_config()?);

    if let Some(pattern) = &cli.glob {
        let [start, stop] = cli.time.as_slice() else {
            return Err("--glob needs a start and stop --time".into());
        };
        scaler.convert_batch(&cli.infn, pattern, parse_time(start)?, parse_time(stop)?)?;
        return Ok(());
    }

    let time = cli.time.first().map(|t| parse_time(t)).transpose()?;
    let (scale, _) = scaler.plate_scale(&cli.infn, cli.outfn.as_deref(), time)?;
    println!("{}", ScaleSummary::new(&scale));
    Ok(())
}
