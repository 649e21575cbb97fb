//! Print the sources astrometry.net matched in a field (`.rdls` file).
use camino::Utf8PathBuf;
use clap::Parser;

use platescale::display::SourcesDisplay;
use platescale::sources::read_sources;

#[derive(Parser)]
#[command(author, version, about = "list .rdls sources", long_about = None)]
struct Cli {
    /// .rdls file from astrometry.net
    #[arg(value_name = "FN")]
    path: Utf8PathBuf,

    /// Keep only the N brightest sources
    #[arg(short, long)]
    brightest: Option<usize>,

    /// Also write the sources to this CSV file
    #[arg(long)]
    csv: Option<Utf8PathBuf>,

    /// Decimals of the sexagesimal seconds
    #[arg(long, default_value_t = 2)]
    precision: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut sources = read_sources(&cli.path)?;
    println!(
        "{} sources found in {} with ra,dec coordinates:",
        sources.len(),
        cli.path
    );
    if let Some(n) = cli.brightest {
        if !sources.has_magnitudes() {
            log::warn!("{} has no MAG column, keeping every source", cli.path);
        }
        sources = sources.brightest(n);
    }
    println!("{}", SourcesDisplay::new(&sources).with_seconds_precision(cli.precision));

    if let Some(csv) = &cli.csv {
        println!("writing {csv}");
        sources.write_csv(csv)?;
    }
    Ok(())
}
