use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::match_spec::MatchSpec;
use crate::version::Version;

/// Metadata of one installable package artifact.
///
/// Field names follow repository index entries, so a record deserializes
/// directly from `{"name": .., "version": .., "build": .., "depends": [..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub build: String,
    #[serde(default)]
    pub build_number: u64,
    #[serde(default)]
    pub channel: String,
    /// Specs of packages this record needs installed alongside it.
    #[serde(default)]
    pub depends: Vec<MatchSpec>,
    /// Specs of packages that must not be installed alongside it.
    #[serde(default)]
    pub conflicts: Vec<MatchSpec>,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: Version, build: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version,
            build: build.into(),
            build_number: 0,
            channel: String::new(),
            depends: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Create a record, parsing the version text.
    pub fn parse(name: &str, version: &str, build: &str) -> Result<Self, ParseError> {
        Ok(Self::new(name, Version::parse(version)?, build))
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_build_number(mut self, build_number: u64) -> Self {
        self.build_number = build_number;
        self
    }

    pub fn with_depends(mut self, depends: Vec<MatchSpec>) -> Self {
        self.depends = depends;
        self
    }

    pub fn with_conflicts(mut self, conflicts: Vec<MatchSpec>) -> Self {
        self.conflicts = conflicts;
        self
    }

    /// Add a dependency given as match spec text.
    pub fn depends_on(mut self, spec: &str) -> Result<Self, ParseError> {
        self.depends.push(MatchSpec::parse(spec)?);
        Ok(self)
    }

    /// Add a conflict given as match spec text.
    pub fn conflicts_with(mut self, spec: &str) -> Result<Self, ParseError> {
        self.conflicts.push(MatchSpec::parse(spec)?);
        Ok(self)
    }

    /// Whether both records describe the same artifact.
    ///
    /// Compares the literal version text, so `1.0` and `1.0.0` are different
    /// artifacts even though they order equal.
    pub fn same_artifact(&self, other: &PackageRecord) -> bool {
        self.name == other.name
            && self.version.as_str() == other.version.as_str()
            && self.build == other.build
            && self.build_number == other.build_number
            && self.channel == other.channel
    }

    /// `name-version-build`, the conventional artifact label.
    pub fn pretty_string(&self) -> String {
        if self.build.is_empty() {
            format!("{}-{}", self.name, self.version)
        } else {
            format!("{}-{}-{}", self.name, self.version, self.build)
        }
    }

    /// Whether any dependency of this record names `name`.
    pub fn depends_on_name(&self, name: &str) -> bool {
        self.depends.iter().any(|spec| spec.name() == name)
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.channel.is_empty() {
            write!(f, "{}::", self.channel)?;
        }
        f.write_str(&self.pretty_string())
    }
}
