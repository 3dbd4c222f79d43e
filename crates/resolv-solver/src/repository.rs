//! Repository data providers.
//!
//! The solver only needs records per channel. A provider hands them over
//! synchronously; fetching, caching and retries happen before that, for
//! example through [`HttpClient::fetch_repodata`](crate::http::HttpClient::fetch_repodata).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use resolv_spec::PackageRecord;

use crate::error::{Error, Result};
use crate::solver::Pool;

/// Source of available package records, one channel at a time
pub trait RepoDataProvider {
    /// All records the channel offers
    fn fetch_records(&self, channel: &str) -> Result<Vec<PackageRecord>>;
}

/// A repodata index:
///
/// ```json
/// {
///     "packages": {
///         "foo-1.0-0.tar.bz2": { "name": "foo", "version": "1.0", "build": "0", "depends": ["bar >=2"] }
///     }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoData {
    #[serde(default)]
    pub packages: IndexMap<String, PackageRecord>,
}

impl RepoData {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Records in file order, each tagged with `channel`
    pub fn into_records(self, channel: &str) -> Vec<PackageRecord> {
        self.packages
            .into_values()
            .map(|record| record.with_channel(channel))
            .collect()
    }
}

/// Provider backed by records held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepoData {
    channels: IndexMap<String, Vec<PackageRecord>>,
}

impl InMemoryRepoData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record to `channel`, overriding the record's own channel
    pub fn add_record(&mut self, channel: &str, record: PackageRecord) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push(record.with_channel(channel));
    }

    pub fn add_repodata(&mut self, channel: &str, repodata: RepoData) {
        let records = repodata.into_records(channel);
        self.channels.entry(channel.to_string()).or_default().extend(records);
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Add the records of `channels` to `pool`. Returns the number added.
    pub fn load_into_pool(&self, channels: &[&str], pool: &mut Pool) -> Result<usize> {
        load_channels(self, channels, pool)
    }
}

impl RepoDataProvider for InMemoryRepoData {
    fn fetch_records(&self, channel: &str) -> Result<Vec<PackageRecord>> {
        self.channels
            .get(channel)
            .cloned()
            .ok_or_else(|| Error::Repository(format!("Unknown channel '{}'", channel)))
    }
}

/// Add every record `provider` offers for `channels` to `pool`. Channel
/// priorities are registered separately, see
/// [`Config::apply_to_pool`](crate::config::Config::apply_to_pool).
pub fn load_channels<P: RepoDataProvider + ?Sized>(
    provider: &P,
    channels: &[&str],
    pool: &mut Pool,
) -> Result<usize> {
    let mut added = 0;
    for channel in channels {
        let records = provider.fetch_records(channel)?;
        log::debug!("Loaded {} records from {}", records.len(), channel);
        added += records.len();
        for record in records {
            pool.add_record(record);
        }
    }
    Ok(added)
}
