//! Package match specs.
//!
//! Accepted forms:
//!
//! - `foo`, `foo>=1.0,<2.0`, `foo=1.2`, `foo==1.0`
//! - `foo 1.0 py_0`, `foo=1.0=py_0` (version then build string)
//! - `conda-forge::foo` (channel prefix)
//! - `foo[version='>=1.0,<2.0', build=py*, build_number='>=2', channel=conda-forge]`
//!
//! Anything after `#` is a comment. Printing a spec yields the compact form,
//! falling back to brackets only where the compact form would not reparse.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;
use crate::glob::StringMatcher;
use crate::operator::Operator;
use crate::package_record::PackageRecord;
use crate::version_spec::VersionSpec;

lazy_static! {
    static ref NAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").unwrap();
    static ref CHANNEL_RE: Regex = Regex::new(r"^[A-Za-z0-9_.\-/:~]+$").unwrap();
}

/// Constraint on a record's build number, e.g. `3` or `>=2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildNumberSpec {
    operator: Operator,
    value: u64,
}

impl BuildNumberSpec {
    pub fn new(operator: Operator, value: u64) -> Self {
        Self { operator, value }
    }

    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Self::parse_at(text, 0)
    }

    pub(crate) fn parse_at(text: &str, offset: usize) -> Result<Self, ParseError> {
        let lead = text.len() - text.trim_start().len();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ParseError::new(offset, "empty build number"));
        }

        let (operator, digits_start) = ["==", "!=", ">=", "<=", ">", "<", "="]
            .iter()
            .find(|symbol| trimmed.starts_with(*symbol))
            .map(|symbol| {
                let operator = match *symbol {
                    "!=" => Operator::NotEqual,
                    ">=" => Operator::GreaterEqual,
                    "<=" => Operator::LessEqual,
                    ">" => Operator::Greater,
                    "<" => Operator::Less,
                    _ => Operator::Equal,
                };
                (operator, symbol.len())
            })
            .unwrap_or((Operator::Equal, 0));

        let digits = &trimmed[digits_start..];
        let value = digits.trim().parse::<u64>().map_err(|_| {
            ParseError::new(
                offset + lead + digits_start,
                format!("invalid build number '{}'", digits),
            )
        })?;

        Ok(Self { operator, value })
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn matches(&self, build_number: u64) -> bool {
        match self.operator {
            Operator::NotEqual | Operator::NotStartsWith => build_number != self.value,
            Operator::Greater => build_number > self.value,
            Operator::GreaterEqual => build_number >= self.value,
            Operator::Less => build_number < self.value,
            Operator::LessEqual => build_number <= self.value,
            Operator::Equal | Operator::StartsWith | Operator::Compatible => {
                build_number == self.value
            }
        }
    }
}

impl fmt::Display for BuildNumberSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            Operator::Equal => write!(f, "{}", self.value),
            op => write!(f, "{}{}", op, self.value),
        }
    }
}

/// A matcher for package records: name plus optional version range, build
/// string pattern, build number and channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpec {
    name: String,
    version: VersionSpec,
    build: Option<StringMatcher>,
    build_number: Option<BuildNumberSpec>,
    channel: Option<String>,
}

impl MatchSpec {
    /// Parse a match spec.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let body = match text.find('#') {
            Some(pos) => &text[..pos],
            None => text,
        };
        let start = body.len() - body.trim_start().len();
        let mut end = body.trim_end().len();
        if start >= end {
            return Err(ParseError::new(0, "empty package spec"));
        }

        let mut bracket = None;
        if body[start..end].ends_with(']') {
            let open = body[start..end]
                .find('[')
                .ok_or_else(|| ParseError::new(end - 1, "unmatched ']'"))?
                + start;
            bracket = Some((open + 1, end - 1));
            end = start + body[start..open].trim_end().len();
        } else if let Some(pos) = body[start..end].find('[') {
            return Err(ParseError::new(start + pos, "unterminated '['"));
        }

        let mut channel = None;
        let mut cursor = start;
        if let Some(pos) = body[start..end].rfind("::") {
            let name = &body[start..start + pos];
            validate_channel(name, start)?;
            channel = Some(name.to_string());
            cursor = start + pos + 2;
        }

        let rest = &body[cursor..end];
        let name_len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '=' | '<' | '>' | '!' | '~'))
            .unwrap_or(rest.len());
        let name = &rest[..name_len];
        if name.is_empty() {
            return Err(ParseError::new(cursor, "missing package name"));
        }
        validate_name(name, cursor)?;

        let mut spec = MatchSpec {
            name: name.to_string(),
            version: VersionSpec::Any,
            build: None,
            build_number: None,
            channel,
        };

        let raw = &body[cursor + name_len..end];
        let lead = raw.len() - raw.trim_start().len();
        let version_build = raw.trim();
        if !version_build.is_empty() {
            let offset = cursor + name_len + lead;
            let (version_len, build_start) = split_version_build(version_build);
            spec.version = VersionSpec::parse_at(&version_build[..version_len], offset)?;
            if let Some(build_start) = build_start {
                spec.build = Some(StringMatcher::parse(
                    &version_build[build_start..],
                    offset + build_start,
                )?);
            }
        }

        if let Some((open, close)) = bracket {
            spec.parse_brackets(body, open, close)?;
        }

        Ok(spec)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &VersionSpec {
        &self.version
    }

    pub fn build(&self) -> Option<&StringMatcher> {
        self.build.as_ref()
    }

    pub fn build_number(&self) -> Option<BuildNumberSpec> {
        self.build_number
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    pub fn with_version(mut self, version: VersionSpec) -> Self {
        self.version = version;
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// True when the spec constrains nothing but the name.
    pub fn is_name_only(&self) -> bool {
        self.version.is_free()
            && self.build.is_none()
            && self.build_number.is_none()
            && self.channel.is_none()
    }

    /// Check whether `record` satisfies every constraint of this spec.
    pub fn matches(&self, record: &PackageRecord) -> bool {
        if record.name != self.name || !self.version.contains(&record.version) {
            return false;
        }
        if let Some(build) = &self.build {
            if !build.is_match(&record.build) {
                return false;
            }
        }
        if let Some(build_number) = &self.build_number {
            if !build_number.matches(record.build_number) {
                return false;
            }
        }
        match &self.channel {
            Some(channel) => channel_matches(channel, &record.channel),
            None => true,
        }
    }

    fn parse_brackets(&mut self, text: &str, start: usize, end: usize) -> Result<(), ParseError> {
        let bytes = text.as_bytes();
        let skip_whitespace = |mut i: usize| {
            while i < end && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            i
        };

        let mut i = start;
        loop {
            i = skip_whitespace(i);
            if i >= end {
                break;
            }

            let key_start = i;
            while i < end && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let key = &text[key_start..i];
            if key.is_empty() {
                return Err(ParseError::new(i, "expected a key inside brackets"));
            }

            i = skip_whitespace(i);
            if i >= end || bytes[i] != b'=' {
                return Err(ParseError::new(i, format!("expected '=' after '{}'", key)));
            }
            i = skip_whitespace(i + 1);

            let (value_start, value_end) = if i < end && (bytes[i] == b'\'' || bytes[i] == b'"') {
                let quote = bytes[i];
                let close = text[i + 1..end]
                    .bytes()
                    .position(|b| b == quote)
                    .ok_or_else(|| ParseError::new(i, "unterminated quote"))?
                    + i
                    + 1;
                let range = (i + 1, close);
                i = close + 1;
                range
            } else {
                let value_start = i;
                while i < end && bytes[i] != b',' {
                    i += 1;
                }
                (value_start, value_start + text[value_start..i].trim_end().len())
            };

            self.apply_bracket_value(key, key_start, &text[value_start..value_end], value_start)?;

            i = skip_whitespace(i);
            if i < end {
                if bytes[i] != b',' {
                    return Err(ParseError::new(i, "expected ',' between bracket entries"));
                }
                i += 1;
            }
        }

        Ok(())
    }

    fn apply_bracket_value(
        &mut self,
        key: &str,
        key_start: usize,
        value: &str,
        value_start: usize,
    ) -> Result<(), ParseError> {
        match key {
            "version" => self.version = VersionSpec::parse_at(value, value_start)?,
            "build" => self.build = Some(StringMatcher::parse(value, value_start)?),
            "build_number" => {
                self.build_number = Some(BuildNumberSpec::parse_at(value, value_start)?)
            }
            "channel" => {
                validate_channel(value, value_start)?;
                self.channel = Some(value.to_string());
            }
            other => {
                return Err(ParseError::new(key_start, format!("unsupported key '{}'", other)))
            }
        }
        Ok(())
    }
}

/// Split `version[ build]` / `version=build`, returning the version length and
/// the build start offset.
fn split_version_build(text: &str) -> (usize, Option<usize>) {
    let pos = match text.rfind(|c: char| c == ' ' || c == '=') {
        Some(pos) if pos > 0 => pos,
        _ => return (text.len(), None),
    };

    let separator = text.as_bytes()[pos];
    let previous = text[..pos].chars().last();
    if separator == b'='
        && matches!(previous, Some('=' | '!' | '|' | ',' | '<' | '>' | '~'))
    {
        return (text.len(), None);
    }

    let version_len = text[..pos].trim_end().len();
    let build = &text[pos + 1..];
    (version_len, Some(pos + 1 + build.len() - build.trim_start().len()))
}

fn validate_name(name: &str, offset: usize) -> Result<(), ParseError> {
    if NAME_RE.is_match(name) {
        return Ok(());
    }
    let (pos, c) = name
        .char_indices()
        .find(|&(i, c)| {
            let allowed = c.is_ascii_alphanumeric() || c == '_' || (i > 0 && matches!(c, '.' | '-'));
            !allowed
        })
        .unwrap_or((0, name.chars().next().unwrap_or(' ')));
    Err(ParseError::new(
        offset + pos,
        format!("invalid character '{}' in package name", c),
    ))
}

fn validate_channel(channel: &str, offset: usize) -> Result<(), ParseError> {
    if channel.is_empty() {
        return Err(ParseError::new(offset, "empty channel name"));
    }
    if CHANNEL_RE.is_match(channel) {
        return Ok(());
    }
    let (pos, c) = channel
        .char_indices()
        .find(|&(_, c)| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/' | ':' | '~')))
        .unwrap_or((0, ' '));
    Err(ParseError::new(
        offset + pos,
        format!("invalid character '{}' in channel", c),
    ))
}

/// A record channel matches when it is equal to the spec channel or is a URL
/// whose last path segments are the spec channel.
fn channel_matches(expected: &str, actual: &str) -> bool {
    let actual = actual.trim_end_matches('/');
    let expected = expected.trim_end_matches('/');
    actual == expected || actual.ends_with(&format!("/{}", expected))
}

impl fmt::Display for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(channel) = &self.channel {
            write!(f, "{}::", channel)?;
        }
        f.write_str(&self.name)?;

        let mut brackets = Vec::new();
        let version = if self.version.is_free() {
            None
        } else {
            Some(self.version.to_string())
        };

        match version {
            // A leading group would be read as part of the name.
            Some(version) if version.starts_with('(') => {
                brackets.push(format!("version='{}'", version));
                if let Some(build) = &self.build {
                    brackets.push(format!("build='{}'", build));
                }
            }
            version => {
                if let Some(version) = &version {
                    f.write_str(version)?;
                }
                if let Some(build) = &self.build {
                    if version.is_none() {
                        f.write_str("=*")?;
                    }
                    write!(f, "={}", build)?;
                }
            }
        }

        if let Some(build_number) = &self.build_number {
            match build_number.operator() {
                Operator::Equal => brackets.push(format!("build_number={}", build_number)),
                _ => brackets.push(format!("build_number='{}'", build_number)),
            }
        }

        if !brackets.is_empty() {
            write!(f, "[{}]", brackets.join(", "))?;
        }
        Ok(())
    }
}

impl FromStr for MatchSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for MatchSpec {
    type Error = ParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl Serialize for MatchSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MatchSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        MatchSpec::parse(&text).map_err(de::Error::custom)
    }
}
