//! Version, match spec and package record primitives for the resolv solver.
//!
//! This crate provides conda-style version parsing and ordering, version range
//! expressions, and the [`MatchSpec`] matcher that selects [`PackageRecord`]s by
//! name, version, build string and channel.
//!
//! ```
//! use resolv_spec::{MatchSpec, PackageRecord};
//!
//! let spec = MatchSpec::parse("foo>=1.0,<2.0").unwrap();
//! let record = PackageRecord::parse("foo", "1.5", "py_0").unwrap();
//! assert!(spec.matches(&record));
//! assert_eq!(spec.to_string(), "foo>=1.0,<2.0");
//! ```

mod error;
mod glob;
mod match_spec;
mod operator;
mod package_record;
mod version;
mod version_spec;

pub use error::ParseError;
pub use glob::StringMatcher;
pub use match_spec::{BuildNumberSpec, MatchSpec};
pub use operator::{InvalidOperatorError, Operator};
pub use package_record::PackageRecord;
pub use version::Version;
pub use version_spec::VersionSpec;
