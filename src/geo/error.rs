use maxminddb::MaxMindDBError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("cannot open GeoIP database: {0}")]
    MaxMindDBError(#[from] MaxMindDBError),
}
