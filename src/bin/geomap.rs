//! Geomap a scale file as if all photons were emitted at a single altitude.
use camino::Utf8PathBuf;
use clap::Parser;

use platescale::fits::{ImageData, PixelType};
use platescale::projection::{image_altitude, masked_image};
use platescale::scale_io::{read_scale, write_scale};

#[derive(Parser)]
#[command(author, version, about = "project a plate scale onto an emission altitude", long_about = None)]
struct Cli {
    /// Scale file written by platescale or fits2azel
    in_file: Utf8PathBuf,

    /// Altitude of emission (kilometers)
    projection_altitude_km: f64,

    /// Minimum elevation (degrees); image pixels below are blanked
    #[arg(long = "minimum_elevation", visible_alias = "minel", default_value_t = 0.0, allow_negative_numbers = true)]
    minimum_elevation: f64,

    /// Altitude of observer (meters)
    #[arg(long = "observer_altitude_m", visible_alias = "obsalt", default_value_t = 0.0)]
    observer_altitude_m: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut scale = read_scale(&cli.in_file)?;
    scale.projection = Some(image_altitude(
        &scale,
        cli.projection_altitude_km,
        cli.observer_altitude_m,
    )?);
    if scale.image.is_some() {
        let masked = masked_image(&scale, cli.minimum_elevation)?;
        scale.image = Some(ImageData::new(masked.into_dyn(), PixelType::F64));
    }

    let stem = cli.in_file.file_stem().unwrap_or("scale");
    let out_file = cli.in_file.with_file_name(format!("{stem}_proj.fits"));
    println!("Save projected data to {out_file}");
    write_scale(&scale, &out_file)?;
    Ok(())
}
