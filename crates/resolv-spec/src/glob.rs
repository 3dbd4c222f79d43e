//! Exact-or-glob string matching for build strings.

use std::fmt;

use regex::Regex;

use crate::error::ParseError;

/// Matches a build string either exactly or against a `*` glob.
#[derive(Debug, Clone)]
pub struct StringMatcher {
    pattern: String,
    regex: Option<Regex>,
}

impl StringMatcher {
    /// Build a matcher from `pattern`, reporting errors relative to `offset`.
    pub fn parse(pattern: &str, offset: usize) -> Result<Self, ParseError> {
        if pattern.is_empty() {
            return Err(ParseError::new(offset, "empty build string"));
        }

        if let Some((pos, c)) = pattern
            .char_indices()
            .find(|&(_, c)| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '*' | '+' | '!' | '-')))
        {
            return Err(ParseError::new(
                offset + pos,
                format!("invalid character '{}' in build string", c),
            ));
        }

        let regex = if pattern.contains('*') {
            let body = pattern
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(".*");
            let regex = Regex::new(&format!("^{}$", body))
                .map_err(|e| ParseError::new(offset, e.to_string()))?;
            Some(regex)
        } else {
            None
        };

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_glob(&self) -> bool {
        self.regex.is_some()
    }

    pub fn is_match(&self, value: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(value),
            None => self.pattern == value,
        }
    }
}

impl PartialEq for StringMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for StringMatcher {}

impl fmt::Display for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}
