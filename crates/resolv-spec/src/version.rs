//! Package versions with conda-style ordering.
//!
//! A version is an optional `N!` epoch, a sequence of components separated by
//! `.`, `_` or `-`, and an optional `+local` suffix. Every component is split
//! into numeric and alphabetic atoms, so `1.0rc1` is read as `[[1], [0, rc, 1]]`.
//!
//! Atoms order as `dev` < other strings < numbers < `post`. Missing components
//! and atoms compare as `0`, which makes `1.0` equal to `1.0.0` and places
//! `1.0rc1` before `1.0`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Atom {
    Number(u64),
    Text(String),
}

static ZERO: Atom = Atom::Number(0);
static ZERO_COMPONENT: [Atom; 1] = [Atom::Number(0)];

impl Atom {
    fn rank(&self) -> u8 {
        match self {
            Atom::Text(text) if text == "dev" => 0,
            Atom::Text(text) if text == "post" => 3,
            Atom::Text(_) => 1,
            Atom::Number(_) => 2,
        }
    }
}

impl Ord for Atom {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Atom::Number(a), Atom::Number(b)) => a.cmp(b),
            (Atom::Text(a), Atom::Text(b)) if self.rank() == other.rank() => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Atom {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Number(n) => write!(f, "{}", n),
            Atom::Text(t) => f.write_str(t),
        }
    }
}

/// A parsed package version.
#[derive(Debug, Clone)]
pub struct Version {
    source: String,
    epoch: u64,
    components: Vec<Vec<Atom>>,
    local: Vec<Vec<Atom>>,
}

impl Version {
    /// Parse a version string.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let lead = text.len() - text.trim_start().len();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ParseError::new(0, "empty version"));
        }

        if let Some((pos, c)) = trimmed
            .char_indices()
            .find(|&(_, c)| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+' | '!')))
        {
            return Err(ParseError::new(
                lead + pos,
                format!("invalid character '{}' in version", c),
            ));
        }

        let source = trimmed.to_ascii_lowercase();

        let (epoch, main_start) = match source.split_once('!') {
            Some((epoch, _)) => {
                let value = epoch
                    .parse::<u64>()
                    .map_err(|_| ParseError::new(lead, format!("invalid epoch '{}'", epoch)))?;
                (value, epoch.len() + 1)
            }
            None => (0, 0),
        };

        let rest = &source[main_start..];
        if let Some(pos) = rest.find('!') {
            return Err(ParseError::new(lead + main_start + pos, "duplicated epoch separator"));
        }

        let (main, local) = match rest.split_once('+') {
            Some((main, local)) => (main, Some(local)),
            None => (rest, None),
        };

        let components = parse_components(main, lead + main_start)?;
        let local = match local {
            Some(local) => {
                let local_start = lead + main_start + main.len() + 1;
                if local.contains('+') {
                    return Err(ParseError::new(local_start, "duplicated local version separator"));
                }
                parse_components(local, local_start)?
            }
            None => Vec::new(),
        };

        Ok(Self {
            source,
            epoch,
            components,
            local,
        })
    }

    /// The normalized text of this version.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Check whether this version lies under `prefix`, as used by `=1.2` and `1.2.*`.
    ///
    /// All but the last component of `prefix` must compare equal; the last one
    /// must be an atom-wise prefix, so `1.2a` starts with `1.2` but `1.20` does not.
    pub fn starts_with(&self, prefix: &Version) -> bool {
        if self.epoch != prefix.epoch {
            return false;
        }

        let last = prefix.components.len().saturating_sub(1);
        for (i, expected) in prefix.components.iter().enumerate() {
            let actual = self
                .components
                .get(i)
                .map(Vec::as_slice)
                .unwrap_or(&ZERO_COMPONENT);

            if i == last {
                if actual.len() < expected.len() {
                    return compare_atoms(actual, expected) == Ordering::Equal;
                }
                return actual[..expected.len()] == expected[..];
            }

            if compare_atoms(actual, expected) != Ordering::Equal {
                return false;
            }
        }
        true
    }

    /// The version with its last component dropped, used by `~=` ranges.
    ///
    /// Returns `None` for single-component versions.
    pub fn compatible_prefix(&self) -> Option<Version> {
        if self.components.len() < 2 {
            return None;
        }
        let components = self.components[..self.components.len() - 1].to_vec();
        let mut source = render_components(&components);
        if self.epoch != 0 {
            source = format!("{}!{}", self.epoch, source);
        }
        Some(Self {
            source,
            epoch: self.epoch,
            components,
            local: Vec::new(),
        })
    }
}

fn parse_components(text: &str, offset: usize) -> Result<Vec<Vec<Atom>>, ParseError> {
    let mut components = Vec::new();
    let mut start = 0;
    for part in text.split(|c: char| c == '.' || c == '_' || c == '-') {
        if part.is_empty() {
            return Err(ParseError::new(offset + start, "empty version component"));
        }
        components.push(split_atoms(part, offset + start)?);
        start += part.len() + 1;
    }
    Ok(components)
}

fn split_atoms(part: &str, offset: usize) -> Result<Vec<Atom>, ParseError> {
    let mut atoms = Vec::new();
    let mut chars = part.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let numeric = c.is_ascii_digit();
        let mut end = start + c.len_utf8();
        while let Some(&(i, next)) = chars.peek() {
            if next.is_ascii_digit() != numeric {
                break;
            }
            end = i + next.len_utf8();
            chars.next();
        }

        let token = &part[start..end];
        if numeric {
            let value = token
                .parse::<u64>()
                .map_err(|_| ParseError::new(offset + start, "version number out of range"))?;
            atoms.push(Atom::Number(value));
        } else {
            // Components that open with letters sort as if prefixed by zero.
            if atoms.is_empty() {
                atoms.push(Atom::Number(0));
            }
            atoms.push(Atom::Text(token.to_string()));
        }
    }

    Ok(atoms)
}

fn render_components(components: &[Vec<Atom>]) -> String {
    components
        .iter()
        .map(|atoms| atoms.iter().map(|a| a.to_string()).collect::<String>())
        .collect::<Vec<_>>()
        .join(".")
}

fn compare_atoms(a: &[Atom], b: &[Atom]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).unwrap_or(&ZERO);
        let right = b.get(i).unwrap_or(&ZERO);
        match left.cmp(right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn compare_components(a: &[Vec<Atom>], b: &[Vec<Atom>]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let left = a.get(i).map(Vec::as_slice).unwrap_or(&ZERO_COMPONENT);
        let right = b.get(i).map(Vec::as_slice).unwrap_or(&ZERO_COMPONENT);
        match compare_atoms(left, right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_components(&self.components, &other.components))
            .then_with(|| compare_components(&self.local, &other.local))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Version::parse(&text).map_err(de::Error::custom)
    }
}
