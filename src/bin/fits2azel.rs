//! Map the pixels of a solved FITS image, or of a bare `.wcs` solution, to azimuth and
//! elevation without any stacking.
use camino::Utf8PathBuf;
use clap::Parser;

use platescale::config::{PlateScaleConfig, SiteConfig, Ut1Source};
use platescale::display::ScaleSummary;
use platescale::platescale::PlateScaler;
use platescale::scale_io::write_scale;
use platescale::time::parse_time;

#[derive(Parser)]
#[command(author, version, about = "FITS/WCS to azimuth/elevation", long_about = None)]
struct Cli {
    /// FITS image or .wcs file
    infn: Utf8PathBuf,

    /// WGS84 coordinates of the camera (degrees)
    #[arg(short = 'c', long, num_args = 2, value_names = ["LAT", "LON"], required = true, allow_negative_numbers = true)]
    latlon: Vec<f64>,

    /// Camera altitude (meters)
    #[arg(long, default_value_t = 0.0)]
    altitude_m: f64,

    /// Image time; read from the FITS header when omitted
    #[arg(short = 't', long)]
    time: Option<String>,

    /// Scale file to write, default <stem>_scale.fits
    #[arg(short, long)]
    outfn: Option<Utf8PathBuf>,

    /// Run solve-field on the input first
    #[arg(short, long)]
    solve: bool,

    /// Arguments to pass through to solve-field
    #[arg(short, long, allow_hyphen_values = true, default_value = "")]
    args: String,

    /// IERS EOP file for UT1
    #[arg(long)]
    eop: Option<Utf8PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = PlateScaleConfig {
        site: Some(SiteConfig {
            latitude: cli.latlon[0],
            longitude: cli.latlon[1],
            altitude_m: cli.altitude_m,
        }),
        solve: cli.solve,
        solver_args: cli.args.clone(),
        ut1: cli.eop.clone().map_or(Ut1Source::None, Ut1Source::EopFile),
        ..Default::default()
    };
    let scaler = PlateScaler::new(config);

    let time = cli.time.as_deref().map(parse_time).transpose()?;
    let scale = scaler.fits_to_azel(&cli.infn, time)?;

    let outfn = cli.outfn.clone().unwrap_or_else(|| {
        let stem = cli.infn.file_stem().unwrap_or("image");
        cli.infn.with_file_name(format!("{stem}_scale.fits"))
    });
    println!("saving {outfn}");
    write_scale(&scale, &outfn)?;
    println!("{}", ScaleSummary::new(&scale));
    Ok(())
}
