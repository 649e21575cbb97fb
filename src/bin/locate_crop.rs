//! Identify where a cropped image sits in its original, for when the crop was done by
//! eye or the cropping parameters were forgotten.
use camino::Utf8PathBuf;
use clap::Parser;

use platescale::locate_crop::locate_crop_files;

#[derive(Parser)]
#[command(author, version, about = "locate a crop in its original image", long_about = None)]
struct Cli {
    /// Original large image
    fn1: Utf8PathBuf,

    /// Cropped smaller image
    fn2: Utf8PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let m = locate_crop_files(&cli.fn1, &cli.fn2)?;
    let name = |p: &Utf8PathBuf| p.file_name().unwrap_or(p.as_str()).to_string();
    println!(
        "upper left corner of {} in {} is ({}, {})",
        name(&cli.fn2),
        name(&cli.fn1),
        m.row,
        m.col
    );
    // not exactly zero when the crop was filtered
    println!("sum(im1-im2) over ROI is: {}", m.diff_sum);
    Ok(())
}
