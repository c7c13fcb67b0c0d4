pub use country_index::{BuildStats, CountryIndex};
pub use error::GeoError;
pub use max_mind_db::{MaxMindDb, NetworkRecord, RegisteredCountry};

mod country_index;
mod error;
pub mod max_mind_db;
