use crate::geo::max_mind_db::NetworkRecord;

use ipnetwork::IpNetwork;
use std::collections::HashMap;
use std::fmt::Display;

/// Number of records accepted into a [CountryIndex] and skipped for each reason
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub accepted: usize,
    pub ipv6: usize,
    pub no_country: usize,
    pub malformed: usize,
}

/// IPv4 networks grouped by the ISO code of their registered country.
///
/// Networks with a registered country but without an ISO code are kept under the `None` key.
/// Every list keeps the order in which the networks were fed to [CountryIndex::build].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CountryIndex(HashMap<Option<String>, Vec<String>>);

impl CountryIndex {
    pub fn build<I, E>(records: I) -> Self
    where
        I: IntoIterator<Item = Result<(IpNetwork, NetworkRecord), E>>,
        E: Display,
    {
        Self::build_with_stats(records).0
    }

    /// IPv6 networks, records without registered country and records failed to decode are
    /// skipped silently, they only show up in [BuildStats]
    pub fn build_with_stats<I, E>(records: I) -> (Self, BuildStats)
    where
        I: IntoIterator<Item = Result<(IpNetwork, NetworkRecord), E>>,
        E: Display,
    {
        let mut map: HashMap<Option<String>, Vec<String>> = HashMap::new();
        let mut stats = BuildStats::default();
        for result in records {
            let (network, record) = match result {
                Ok(value) => value,
                Err(error) => {
                    log::trace!("skipping record which cannot be decoded: {error}");
                    stats.malformed += 1;
                    continue;
                }
            };
            let network = match network {
                IpNetwork::V4(network) => network,
                IpNetwork::V6(_) => {
                    stats.ipv6 += 1;
                    continue;
                }
            };
            let registered_country = match record.registered_country {
                Some(registered_country) => registered_country,
                None => {
                    stats.no_country += 1;
                    continue;
                }
            };
            map.entry(registered_country.iso_code)
                .or_default()
                .push(network.to_string());
            stats.accepted += 1;
        }
        (Self(map), stats)
    }

    /// Networks registered to the country, empty if the code is unknown
    pub fn lookup(&self, iso_code: &str) -> &[String] {
        self.get(Some(iso_code))
    }

    pub fn get(&self, iso_code: Option<&str>) -> &[String] {
        self.0
            .get(&iso_code.map(str::to_owned))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn countries(&self) -> impl Iterator<Item = Option<&str>> {
        self.0.keys().map(Option::as_deref)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<Option<String>, Vec<String>>> for CountryIndex {
    fn from(map: HashMap<Option<String>, Vec<String>>) -> Self {
        Self(map)
    }
}
