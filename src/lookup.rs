use crate::archive::{extract_database, fetch_archive, is_archive, ArchiveError, DownloadError};
use crate::config::Config;
use crate::geo::max_mind_db::looks_like_database;
use crate::geo::{CountryIndex, GeoError, MaxMindDb};

use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error(r#"Error while attempting to read "{path}": {error}"#)]
    LocalIo {
        path: PathBuf,
        error: std::io::Error,
    },
}

/// Raw bundle bytes, either from `local` or downloaded from the permalink
pub fn load_bundle(config: &Config, local: Option<&Path>) -> Result<Vec<u8>, LookupError> {
    match local {
        Some(path) => {
            log::info!(r#"reading GeoIP database from "{}""#, path.display());
            std::fs::read(path).map_err(|error| LookupError::LocalIo {
                path: path.to_owned(),
                error,
            })
        }
        None => {
            log::info!(
                r#"downloading GeoIP database from "{}" as user {}"#,
                config.permalink.host().unwrap_or("-"),
                config.credentials.user()
            );
            let body = fetch_archive(&config.permalink, &config.credentials, config.timeout)?;
            log::debug!("downloaded {} bytes", body.len());
            Ok(body.to_vec())
        }
    }
}

/// Open the database inside the bundle, a bare database file is accepted too
pub fn open_database(bundle: Vec<u8>) -> Result<MaxMindDb, LookupError> {
    let buf = if !is_archive(&bundle) && looks_like_database(&bundle) {
        bundle
    } else {
        extract_database(&bundle)?
    };
    let db = MaxMindDb::from_bytes(buf)?;
    log::info!(
        "loaded {} database built at {} (unix time), IPv{} tree",
        db.database_type(),
        db.build_epoch(),
        db.ip_version()
    );
    Ok(db)
}

pub fn build_index(db: &MaxMindDb) -> CountryIndex {
    let (index, stats) = CountryIndex::build_with_stats(db.networks());
    log::debug!(
        "skipped {} IPv6 networks, {} without registered country, {} malformed records",
        stats.ipv6,
        stats.no_country,
        stats.malformed
    );
    log::info!(
        "indexed {} IPv4 networks of {} countries",
        stats.accepted,
        index.len()
    );
    index
}

/// Fetch or read the bundle, open the database and group its networks by country
pub fn load_index(config: &Config, local: Option<&Path>) -> Result<CountryIndex, LookupError> {
    let bundle = load_bundle(config, local)?;
    let db = open_database(bundle)?;
    Ok(build_index(&db))
}

/// One network per line
pub fn write_networks<W: Write>(mut writer: W, networks: &[String]) -> std::io::Result<()> {
    for network in networks {
        writeln!(writer, "{network}")?;
    }
    writer.flush()
}
