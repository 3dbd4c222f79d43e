//! Comparison operators for version ranges

use std::fmt;
use thiserror::Error;

use crate::version::Version;

/// Operators accepted in version range expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Equal (==)
    Equal,
    /// Not equal (!=)
    NotEqual,
    /// Greater than (>)
    Greater,
    /// Greater than or equal (>=)
    GreaterEqual,
    /// Less than (<)
    Less,
    /// Less than or equal (<=)
    LessEqual,
    /// Prefix match (=1.2, 1.2.*)
    StartsWith,
    /// Negated prefix match (!=1.2.*)
    NotStartsWith,
    /// Compatible release (~=1.2.3)
    Compatible,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid operator: {0}")]
pub struct InvalidOperatorError(pub String);

impl Operator {
    /// Parse an operator symbol. A lone `=` is a prefix match.
    pub fn from_symbol(s: &str) -> Result<Self, InvalidOperatorError> {
        match s {
            "==" => Ok(Operator::Equal),
            "!=" => Ok(Operator::NotEqual),
            ">" => Ok(Operator::Greater),
            ">=" => Ok(Operator::GreaterEqual),
            "<" => Ok(Operator::Less),
            "<=" => Ok(Operator::LessEqual),
            "=" => Ok(Operator::StartsWith),
            "~=" => Ok(Operator::Compatible),
            _ => Err(InvalidOperatorError(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual | Operator::NotStartsWith => "!=",
            Operator::Greater => ">",
            Operator::GreaterEqual => ">=",
            Operator::Less => "<",
            Operator::LessEqual => "<=",
            Operator::StartsWith => "=",
            Operator::Compatible => "~=",
        }
    }

    /// Symbols in the order the range parser must try them.
    pub fn symbols() -> &'static [&'static str] {
        &["==", "!=", ">=", "<=", "~=", ">", "<", "="]
    }

    /// Check `candidate <op> reference`.
    pub fn apply(&self, candidate: &Version, reference: &Version) -> bool {
        match self {
            Operator::Equal => candidate == reference,
            Operator::NotEqual => candidate != reference,
            Operator::Greater => candidate > reference,
            Operator::GreaterEqual => candidate >= reference,
            Operator::Less => candidate < reference,
            Operator::LessEqual => candidate <= reference,
            Operator::StartsWith => candidate.starts_with(reference),
            Operator::NotStartsWith => !candidate.starts_with(reference),
            Operator::Compatible => {
                candidate >= reference
                    && reference
                        .compatible_prefix()
                        .map_or(true, |prefix| candidate.starts_with(&prefix))
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_from_symbol() {
        assert_eq!(Operator::from_symbol("=="), Ok(Operator::Equal));
        assert_eq!(Operator::from_symbol("="), Ok(Operator::StartsWith));
        assert_eq!(Operator::from_symbol("~="), Ok(Operator::Compatible));
        assert!(Operator::from_symbol("<>").is_err());
    }

    #[test]
    fn test_apply_comparisons() {
        assert!(Operator::GreaterEqual.apply(&v("1.0"), &v("1.0")));
        assert!(!Operator::Greater.apply(&v("1.0"), &v("1.0")));
        assert!(Operator::Less.apply(&v("0.9"), &v("1.0")));
        assert!(Operator::NotEqual.apply(&v("1.1"), &v("1.0")));
    }

    #[test]
    fn test_apply_compatible_release() {
        let reference = v("1.4.2");
        assert!(Operator::Compatible.apply(&v("1.4.5"), &reference));
        assert!(!Operator::Compatible.apply(&v("1.5.0"), &reference));
        assert!(!Operator::Compatible.apply(&v("1.4.1"), &reference));
    }

    #[test]
    fn test_apply_prefix() {
        assert!(Operator::StartsWith.apply(&v("1.2.7"), &v("1.2")));
        assert!(Operator::NotStartsWith.apply(&v("1.3"), &v("1.2")));
    }
}
