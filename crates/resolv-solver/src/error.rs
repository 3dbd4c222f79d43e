use std::fmt;

use thiserror::Error;

use resolv_spec::ParseError;

use crate::config::ConfigError;
use crate::http::HttpError;
use crate::solver::ProblemSet;

/// Terminal outcome of a failed solve. No partial transaction accompanies it.
#[derive(Error, Debug, Clone)]
pub enum SolveError {
    #[error("Invalid spec: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid request '{job}': {reason}")]
    InvalidRequest { job: String, reason: String },

    #[error("Could not resolve the request:\n{0}")]
    Unsatisfiable(ProblemSet),

    #[error("Search exhausted after {steps} steps ({reason})")]
    Exhausted { steps: u64, reason: ExhaustReason },
}

impl SolveError {
    /// True when the request itself admits no solution, as opposed to the
    /// search giving up.
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, SolveError::Unsatisfiable(_) | SolveError::InvalidRequest { .. })
    }

    pub fn problems(&self) -> Option<&ProblemSet> {
        match self {
            SolveError::Unsatisfiable(problems) => Some(problems),
            _ => None,
        }
    }
}

/// Why a search stopped before reaching a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustReason {
    StepLimit,
    Timeout,
    Cancelled,
}

impl fmt::Display for ExhaustReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustReason::StepLimit => write!(f, "step limit reached"),
            ExhaustReason::Timeout => write!(f, "timed out"),
            ExhaustReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Errors surfaced by the crate's collaborators. Solver failures stay
/// distinguishable through [`Error::Solve`].
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Http(#[from] HttpError),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Solve(SolveError::Parse(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_converts_to_solve_error() {
        let err: SolveError = ParseError::new(3, "bad").into();
        assert!(matches!(err, SolveError::Parse(ref e) if e.position == 3));
        assert!(!err.is_unsatisfiable());
    }

    #[test]
    fn test_exhausted_display() {
        let err = SolveError::Exhausted {
            steps: 10,
            reason: ExhaustReason::Timeout,
        };
        assert_eq!(err.to_string(), "Search exhausted after 10 steps (timed out)");
        assert!(!err.is_unsatisfiable());
    }

    #[test]
    fn test_invalid_request_counts_as_unsatisfiable() {
        let err = SolveError::InvalidRequest {
            job: "pin foo".to_string(),
            reason: "no package named foo".to_string(),
        };
        assert!(err.is_unsatisfiable());
        assert!(err.problems().is_none());
    }
}
