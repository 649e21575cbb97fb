//! Average segments of a multi-image file (animated GIF, TIFF, FITS cube) into PNGs.
//!
//! `average_stack movie.gif 0 100 10` writes `movie_0.png` … `movie_8.png`, each the
//! mean of ten consecutive frames.
use camino::Utf8PathBuf;
use clap::Parser;

use platescale::stack::{segment_indices, segment_png_path, stack_segments, write_png, CollapseMethod};

#[derive(Parser)]
#[command(author, version, about = "average segments of an image stack", long_about = None)]
struct Cli {
    /// Multi-image file e.g. animated GIF, TIFF, FITS
    imgfn: Utf8PathBuf,

    /// First frame
    start: usize,

    /// Stop frame (exclusive)
    stop: usize,

    /// Frames per segment
    step: usize,

    /// Output directory, default next to the input
    #[arg(short, long)]
    outpath: Option<Utf8PathBuf>,

    /// Frame collapse method: mean or median
    #[arg(long, default_value = "mean")]
    method: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let method: CollapseMethod = cli.method.parse()?;

    let indices = segment_indices(cli.start, cli.stop, cli.step)?;
    let images = stack_segments(&cli.imgfn, &indices, method)?;

    if let Some(dir) = &cli.outpath {
        std::fs::create_dir_all(dir)?;
    }
    for (i, image) in images.iter().enumerate() {
        let mut outfn = segment_png_path(&cli.imgfn, i);
        if let (Some(dir), Some(name)) = (&cli.outpath, outfn.file_name()) {
            outfn = dir.join(name);
        }
        println!("writing {outfn}");
        write_png(image, &outfn)?;
    }
    Ok(())
}
