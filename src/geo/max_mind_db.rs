use crate::geo::GeoError;

use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use maxminddb::{MaxMindDBError, Within};
use serde::Deserialize;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;

/// Start of the metadata section, every MaxMind DB file carries it close to its end
const METADATA_START_MARKER: &[u8] = b"\xab\xcd\xefMaxMind.com";

/// The metadata section is never further than this from the end of the file
const METADATA_MAX_SIZE: usize = 128 * 1024;

/// Part of the per-network data we use, other fields are ignored while decoding
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkRecord {
    pub registered_country: Option<RegisteredCountry>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisteredCountry {
    pub iso_code: Option<String>,
}

pub struct MaxMindDb {
    maxminddb_reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxMindDb {
    pub fn from_bytes(buf: Vec<u8>) -> Result<Self, GeoError> {
        Ok(Self {
            maxminddb_reader: maxminddb::Reader::from_source(buf)?,
        })
    }

    pub fn from_file<P: AsRef<Path>>(filepath: P) -> Result<Self, GeoError> {
        Ok(Self {
            maxminddb_reader: maxminddb::Reader::open_readfile(filepath)?,
        })
    }

    pub fn database_type(&self) -> &str {
        &self.maxminddb_reader.metadata.database_type
    }

    pub fn build_epoch(&self) -> u64 {
        self.maxminddb_reader.metadata.build_epoch
    }

    pub fn ip_version(&self) -> u16 {
        self.maxminddb_reader.metadata.ip_version
    }

    /// Iterate over every network stored in the database.
    ///
    /// IPv6 databases are walked from `::/0`: the reader reports the `::/96` subtree as plain
    /// IPv4 networks, so each of them is yielded exactly once, and IPv6 networks are yielded as
    /// well to let the caller account for them. IPv4 databases are walked from `0.0.0.0/0`.
    /// Records which cannot be decoded as [NetworkRecord] are yielded as errors and the iteration
    /// goes on.
    pub fn networks(&self) -> Networks<'_> {
        let root = if self.ip_version() == 6 {
            IpNetwork::V6(
                Ipv6Network::new(Ipv6Addr::UNSPECIFIED, 0).expect("zero prefix is always valid"),
            )
        } else {
            IpNetwork::V4(
                Ipv4Network::new(Ipv4Addr::UNSPECIFIED, 0).expect("zero prefix is always valid"),
            )
        };
        Networks {
            maxminddb_reader: &self.maxminddb_reader,
            root: Some(root),
            current: None,
        }
    }
}

pub struct Networks<'a> {
    maxminddb_reader: &'a maxminddb::Reader<Vec<u8>>,
    root: Option<IpNetwork>,
    current: Option<Within<'a, NetworkRecord, Vec<u8>>>,
}

impl<'a> Iterator for Networks<'a> {
    type Item = Result<(IpNetwork, NetworkRecord), MaxMindDBError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(root) = self.root.take() {
            match self.maxminddb_reader.within(root) {
                Ok(within) => self.current = Some(within),
                Err(error) => return Some(Err(error)),
            }
        }
        self.current
            .as_mut()?
            .next()
            .map(|item| item.map(|item| (item.ip_net, item.info)))
    }
}

/// Check if the buffer is a bare MaxMind DB file rather than an archive holding one
pub fn looks_like_database(buf: &[u8]) -> bool {
    let tail = &buf[buf.len().saturating_sub(METADATA_MAX_SIZE)..];
    tail.windows(METADATA_START_MARKER.len())
        .any(|window| window == METADATA_START_MARKER)
}
