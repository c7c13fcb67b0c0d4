use geolookup::config::{parse_config, DEFAULT_CONFIG_PATH};
use geolookup::lookup::{load_index, write_networks};

use clap::Parser;
use std::path::PathBuf;

/// List IPv4 networks registered to a country according to a MaxMind GeoIP database
#[derive(Parser)]
#[clap(name = "lookup", author, version, about, long_about = None)]
struct Cli {
    /// ISO 3166-1 alpha-2 code of the registered country, e.g. US
    #[clap(short, long)]
    country: String,

    /// Configuration file path, TOML or INI
    #[clap(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Local archive or .mmdb file to use instead of downloading the database
    #[clap(short, long)]
    db: Option<PathBuf>,

    /// Print debug information to stderr
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = parse_config(&cli.config)?;

    let log_level = if cli.verbose {
        log::Level::Debug
    } else {
        config.log_level
    };
    simple_logger::init_with_level(log_level)?;

    let index = load_index(&config, cli.db.as_deref())?;

    let country = cli.country.trim().to_ascii_uppercase();
    let networks = index.lookup(&country);
    log::debug!("{} networks registered to {country}", networks.len());
    write_networks(std::io::stdout().lock(), networks)?;
    Ok(())
}
