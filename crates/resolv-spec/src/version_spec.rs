//! Version range expressions such as `>=1.0,<2.0|==3.1`.
//!
//! `,` binds tighter than `|`, and parentheses group sub-expressions. A bare
//! version is an exact match, a trailing `*` turns it into a prefix match.
//! Parsed expressions are flattened, so printing and reparsing an expression
//! always yields an equal value.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::operator::Operator;
use crate::version::Version;

/// A parsed version range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    /// Matches every version (`*`).
    Any,
    /// A single comparison against a version.
    Predicate(Operator, Version),
    /// Every member must match (`,`).
    All(Vec<VersionSpec>),
    /// At least one member must match (`|`).
    AnyOf(Vec<VersionSpec>),
}

impl VersionSpec {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Self::parse_at(text, 0)
    }

    /// Parse `text`, reporting error positions relative to `offset`.
    pub(crate) fn parse_at(text: &str, offset: usize) -> Result<Self, ParseError> {
        let mut parser = RangeParser {
            text,
            pos: 0,
            offset,
        };

        parser.skip_whitespace();
        if parser.pos == text.len() {
            return Err(parser.error(0, "empty version range"));
        }

        let spec = parser.parse_any_of()?;
        parser.skip_whitespace();
        if let Some(c) = parser.peek() {
            return Err(parser.error(parser.pos, format!("unexpected character '{}'", c)));
        }
        Ok(spec)
    }

    pub fn is_free(&self) -> bool {
        matches!(self, VersionSpec::Any)
    }

    pub fn contains(&self, version: &Version) -> bool {
        match self {
            VersionSpec::Any => true,
            VersionSpec::Predicate(op, reference) => op.apply(version, reference),
            VersionSpec::All(items) => items.iter().all(|item| item.contains(version)),
            VersionSpec::AnyOf(items) => items.iter().any(|item| item.contains(version)),
        }
    }

    fn all_of(items: Vec<VersionSpec>) -> Self {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                VersionSpec::All(inner) => flat.extend(inner),
                VersionSpec::Any => {}
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => VersionSpec::Any,
            1 => flat.remove(0),
            _ => VersionSpec::All(flat),
        }
    }

    fn any_of(items: Vec<VersionSpec>) -> Self {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                VersionSpec::AnyOf(inner) => flat.extend(inner),
                VersionSpec::Any => return VersionSpec::Any,
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => VersionSpec::Any,
            1 => flat.remove(0),
            _ => VersionSpec::AnyOf(flat),
        }
    }
}

struct RangeParser<'a> {
    text: &'a str,
    pos: usize,
    offset: usize,
}

impl<'a> RangeParser<'a> {
    fn error(&self, at: usize, reason: impl Into<String>) -> ParseError {
        ParseError::new(self.offset + at, reason)
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn parse_any_of(&mut self) -> Result<VersionSpec, ParseError> {
        let mut items = vec![self.parse_all_of()?];
        while self.eat('|') {
            items.push(self.parse_all_of()?);
        }
        Ok(VersionSpec::any_of(items))
    }

    fn parse_all_of(&mut self) -> Result<VersionSpec, ParseError> {
        let mut items = vec![self.parse_term()?];
        while self.eat(',') {
            items.push(self.parse_term()?);
        }
        Ok(VersionSpec::all_of(items))
    }

    fn parse_term(&mut self) -> Result<VersionSpec, ParseError> {
        if self.eat('(') {
            let inner = self.parse_any_of()?;
            if !self.eat(')') {
                return Err(self.error(self.pos, "expected ')'"));
            }
            return Ok(inner);
        }

        self.skip_whitespace();
        let op_start = self.pos;
        let symbol = self.parse_operator()?;
        self.skip_whitespace();

        let token_start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, ',' | '|' | '(' | ')') {
                break;
            }
            self.pos += c.len_utf8();
        }

        let token = &self.text[token_start..self.pos];
        if token.is_empty() {
            return Err(self.error(token_start, "expected a version"));
        }
        self.build_term(symbol, op_start, token, token_start)
    }

    fn parse_operator(&mut self) -> Result<Option<&'static str>, ParseError> {
        let rest = &self.text[self.pos..];
        for &symbol in Operator::symbols() {
            if rest.starts_with(symbol) {
                self.pos += symbol.len();
                return Ok(Some(symbol));
            }
        }
        if rest.starts_with('!') || rest.starts_with('~') {
            return Err(self.error(self.pos, format!("incomplete operator '{}'", &rest[..1])));
        }
        Ok(None)
    }

    fn build_term(
        &self,
        symbol: Option<&str>,
        op_start: usize,
        token: &str,
        token_start: usize,
    ) -> Result<VersionSpec, ParseError> {
        if token == "*" {
            return match symbol {
                None | Some("=") | Some("==") => Ok(VersionSpec::Any),
                Some(other) => Err(self.error(
                    op_start,
                    format!("operator '{}' cannot be combined with '*'", other),
                )),
            };
        }

        let (text, glob) = if let Some(stripped) = token.strip_suffix(".*") {
            (stripped, true)
        } else if let Some(stripped) = token.strip_suffix('*') {
            (stripped, true)
        } else {
            (token, false)
        };

        if let Some(pos) = text.find('*') {
            return Err(self.error(
                token_start + pos,
                "wildcards are only allowed at the end of a version",
            ));
        }

        let version = Version::parse(text).map_err(|e| e.shifted(self.offset + token_start))?;

        let operator = match (symbol, glob) {
            (None, false) | (Some("=="), false) => Operator::Equal,
            (None, true) | (Some("="), _) | (Some("=="), true) => Operator::StartsWith,
            (Some("!="), false) => Operator::NotEqual,
            (Some("!="), true) => Operator::NotStartsWith,
            (Some("~="), true) => {
                return Err(self.error(op_start, "'~=' cannot be combined with a wildcard"))
            }
            (Some(other), _) => {
                Operator::from_symbol(other).map_err(|e| self.error(op_start, e.to_string()))?
            }
        };

        Ok(VersionSpec::Predicate(operator, version))
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Any => f.write_str("*"),
            VersionSpec::Predicate(Operator::StartsWith, version) => write!(f, "={}", version),
            VersionSpec::Predicate(Operator::NotStartsWith, version) => {
                write!(f, "!={}.*", version)
            }
            VersionSpec::Predicate(op, version) => write!(f, "{}{}", op, version),
            VersionSpec::All(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    match item {
                        VersionSpec::AnyOf(_) => write!(f, "({})", item)?,
                        _ => write!(f, "{}", item)?,
                    }
                }
                Ok(())
            }
            VersionSpec::AnyOf(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for VersionSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Default for VersionSpec {
    fn default() -> Self {
        VersionSpec::Any
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn spec(s: &str) -> VersionSpec {
        VersionSpec::parse(s).unwrap()
    }

    // ==================== Parsing ====================

    #[test]
    fn test_parse_bare_version_is_exact() {
        assert_eq!(spec("1.0"), VersionSpec::Predicate(Operator::Equal, v("1.0")));
    }

    #[test]
    fn test_parse_wildcards() {
        assert_eq!(spec("*"), VersionSpec::Any);
        assert_eq!(spec("1.2.*"), VersionSpec::Predicate(Operator::StartsWith, v("1.2")));
        assert_eq!(spec("=1.2"), VersionSpec::Predicate(Operator::StartsWith, v("1.2")));
        assert_eq!(
            spec("!=1.2.*"),
            VersionSpec::Predicate(Operator::NotStartsWith, v("1.2"))
        );
    }

    #[test]
    fn test_parse_flattens_groups() {
        assert_eq!(spec("(>=1,<2),!=1.5"), spec(">=1,<2,!=1.5"));
        assert_eq!(spec("(1.0)"), spec("1.0"));
        assert_eq!(spec(">=1,*"), spec(">=1"));
        assert_eq!(spec("1.0|*"), VersionSpec::Any);
    }

    #[test]
    fn test_parse_errors_carry_positions() {
        let err = VersionSpec::parse(">=1.0,").unwrap_err();
        assert_eq!(err.position, 6);

        let err = VersionSpec::parse("(>=1.0").unwrap_err();
        assert_eq!(err.position, 6);

        let err = VersionSpec::parse(">=1.0)").unwrap_err();
        assert_eq!(err.position, 5);

        let err = VersionSpec::parse("!1.0").unwrap_err();
        assert_eq!(err.position, 0);

        let err = VersionSpec::parse("1.*.2").unwrap_err();
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_parse_error_offset() {
        let err = VersionSpec::parse_at(">=1..0", 3).unwrap_err();
        assert_eq!(err.position, 3 + 4);
    }

    #[test]
    fn test_parse_rejects_bad_wildcard_operators() {
        assert!(VersionSpec::parse(">=*").is_err());
        assert!(VersionSpec::parse("~=1.*").is_err());
        assert!(VersionSpec::parse("").is_err());
    }

    // ==================== Matching ====================

    #[test]
    fn test_contains_range() {
        let range = spec(">=1.0,<2.0");
        assert!(range.contains(&v("1.0")));
        assert!(range.contains(&v("1.9.9")));
        assert!(!range.contains(&v("2.0")));
        assert!(!range.contains(&v("0.9")));
    }

    #[test]
    fn test_contains_alternatives() {
        let range = spec("<1.0|>=3.0,!=3.1");
        assert!(range.contains(&v("0.5")));
        assert!(range.contains(&v("3.2")));
        assert!(!range.contains(&v("3.1")));
        assert!(!range.contains(&v("2.0")));
    }

    // ==================== Display ====================

    #[test]
    fn test_display_canonical() {
        assert_eq!(spec("1.0").to_string(), "==1.0");
        assert_eq!(spec("1.2.*").to_string(), "=1.2");
        assert_eq!(spec(">= 1.0 , < 2.0").to_string(), ">=1.0,<2.0");
        assert_eq!(spec("(<1|>2),!=5").to_string(), "(<1|>2),!=5");
    }

    #[test]
    fn test_display_reparses_to_equal_value() {
        for text in ["1.0", "=1.2", "!=1.2.*", "~=1.4.2", "(<1|>2),!=5", ">=1|<0.5,>0.1"] {
            let parsed = spec(text);
            assert_eq!(spec(&parsed.to_string()), parsed, "{}", text);
        }
    }
}
