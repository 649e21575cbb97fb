//! Download astrometry.net star index files.
//!
//! The 2MASS series with scales 08 to 19 works well for auroral imagers with a 5 to
//! 50 degree field of view; the Tycho series covers the same range.
use camino::Utf8PathBuf;
use clap::Parser;

use platescale::index_download::{
    default_index_dir, get_index, DEFAULT_INDEX_RANGE, URL_2MASS, URL_TYCHO,
};

#[derive(Parser)]
#[command(author, version, about = "download astrometry.net index files", long_about = None)]
struct Cli {
    /// Directory to save index files, default in the user cache
    outdir: Option<Utf8PathBuf>,

    /// Index series URL
    #[arg(long, default_value = URL_2MASS, conflicts_with = "tycho")]
    source: String,

    /// Use the Tycho series instead of 2MASS
    #[arg(long)]
    tycho: bool,

    /// First and last (inclusive) index scale
    #[arg(long, num_args = 2, value_names = ["START", "STOP"])]
    indexrange: Option<Vec<u32>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let outdir = match cli.outdir {
        Some(dir) => dir,
        None => default_index_dir()?,
    };
    let source = if cli.tycho { URL_TYCHO } else { cli.source.as_str() };
    let range = match cli.indexrange.as_deref() {
        Some(&[start, stop]) => start..=stop,
        _ => DEFAULT_INDEX_RANGE,
    };

    let downloaded = get_index(&outdir, source, range).await?;
    println!("downloaded {} index files to {outdir}", downloaded.len());
    Ok(())
}
