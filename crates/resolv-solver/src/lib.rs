//! Package action resolver.
//!
//! Turns a [`Request`] of user actions (install, remove, update, keep, freeze,
//! pin) and a [`Pool`] of installed and available [`PackageRecord`]s into an
//! ordered [`Transaction`], or explains why no consistent environment exists.
//!
//! ```
//! use resolv_solver::{PackageRecord, Pool, Request, Solver};
//!
//! let mut pool = Pool::new();
//! pool.add_record(PackageRecord::parse("foo", "1.0", "0").unwrap());
//!
//! let mut request = Request::new();
//! request.install("foo").unwrap();
//!
//! let transaction = Solver::new(&pool).solve(&request).unwrap();
//! assert_eq!(transaction.to_string(), "install foo-1.0-0");
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod repository;
pub mod solver;

pub use config::{ChannelPriority, Config, ConfigError, NetworkConfig, SolverConfig, SslVerify};
pub use error::{Error, ExhaustReason, Result, SolveError};
pub use http::{HttpClient, HttpClientConfig, HttpError};
pub use repository::{InMemoryRepoData, RepoData, RepoDataProvider};
pub use solver::{
    Flags, Job, JobKind, Operation, OperationKind, Policy, Pool, Problem, ProblemRule,
    ProblemSet, RecordId, Request, SolveBudget, Solver, SolverResult, Transaction,
    TransactionSummary,
};

pub use resolv_spec::{MatchSpec, PackageRecord, ParseError, Version, VersionSpec};
