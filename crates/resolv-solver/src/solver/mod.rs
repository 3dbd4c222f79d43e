//! SAT-based package action resolver.
//!
//! Turns a [`Request`] and a [`Pool`] into the set of records the environment
//! should contain, then into an ordered [`Transaction`].
//!
//! # Architecture
//!
//! - [`Pool`]: installed and available records, ordered by channel priority,
//!   version and build string
//! - [`Request`]: ordered jobs plus resolver-wide [`Flags`]
//! - [`RuleSet`]: clauses generated from dependencies, conflicts and jobs
//! - [`Solver`]: depth-first search with unit propagation
//! - [`Transaction`]: the diff between installed and selected records
//!
//! # Algorithm Overview
//!
//! 1. **Rule Generation**: walk the dependency closure of every installed and
//!    requested name, turning dependencies, conflicts, same-name exclusion,
//!    jobs and flags into rules
//! 2. **Assertions**: single-literal rules are decided up front
//! 3. **Unit Propagation**: rules with one open literal force it
//! 4. **Decision Making**: requirements in job order, then installed names,
//!    then open dependencies, preferring the installed record where no change
//!    is asked for
//! 5. **Backtracking**: on conflict the most recent decision is flipped
//! 6. **Explanation**: on failure the request rules are reduced to a minimal
//!    conflicting subset
//!
//! # Example
//!
//! ```
//! use resolv_solver::solver::{Pool, Request, Solver};
//! use resolv_solver::PackageRecord;
//!
//! let mut pool = Pool::new();
//! pool.add_record(PackageRecord::parse("foo", "1.0", "0").unwrap());
//! pool.add_installed(PackageRecord::parse("foo", "0.9", "0").unwrap());
//!
//! let mut request = Request::new();
//! request.update("foo").unwrap();
//!
//! match Solver::new(&pool).solve(&request) {
//!     Ok(transaction) => assert_eq!(transaction.to_string(), "upgrade foo-0.9-0 -> foo-1.0-0"),
//!     Err(err) => panic!("No solution: {}", err),
//! }
//! ```

mod pool;
mod request;
mod rule;
mod rule_set;
mod decisions;
mod watch_graph;
mod rule_generator;
mod solver;
mod problem;
mod transaction;
mod policy;

#[cfg(test)]
mod tests;

pub use pool::{Pool, RecordId};
pub use request::{Flags, Job, JobKind, Request};
pub use rule::{Rule, RuleType, Literal};
pub use rule_set::{RuleSet, RuleSetStats};
pub use decisions::{Decisions, Reason};
pub use solver::{Solver, SolveBudget, SolverResult, DEFAULT_MAX_STEPS};
pub use problem::{Problem, ProblemRule, ProblemSet};
pub use transaction::{Operation, OperationKind, Transaction, TransactionSummary};
pub use policy::Policy;
