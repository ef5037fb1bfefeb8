//! Business keys: year-prefixed sequences such as `RISK-25-004`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Register prefixes that use generated keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyPrefix {
    /// Risk register entry
    Risk,
    /// Corrective/preventive action
    Capa,
}

impl KeyPrefix {
    /// Get the string representation of the prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyPrefix::Risk => "RISK",
            KeyPrefix::Capa => "CAPA",
        }
    }

    /// The `PREFIX-YY-` stem shared by every key issued in `year`
    pub fn year_stem(&self, year: i32) -> String {
        format!("{}-{:02}-", self.as_str(), year.rem_euclid(100))
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for KeyPrefix {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "RISK" => Ok(KeyPrefix::Risk),
            "CAPA" => Ok(KeyPrefix::Capa),
            _ => Err(KeyParseError::InvalidPrefix(s.to_string())),
        }
    }
}

/// A generated business key: `{PREFIX}-{YY}-{NNN}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusinessKey {
    prefix: KeyPrefix,
    year: u8,
    sequence: u32,
}

impl BusinessKey {
    pub fn new(prefix: KeyPrefix, year: i32, sequence: u32) -> Self {
        Self {
            prefix,
            year: year.rem_euclid(100) as u8,
            sequence,
        }
    }

    /// Next key for `year`: one past the highest sequence already issued
    /// under the same year stem, or 1 when there is none.
    pub fn next<'a, I>(prefix: KeyPrefix, year: i32, existing: I) -> Result<Self, KeyParseError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let stem = prefix.year_stem(year);
        let highest = existing
            .into_iter()
            .filter_map(|key| key.strip_prefix(stem.as_str()))
            .filter_map(leading_number)
            .max()
            .unwrap_or(0);

        let sequence = highest
            .checked_add(1)
            .ok_or_else(|| KeyParseError::Exhausted(stem.clone()))?;
        Ok(Self::new(prefix, year, sequence))
    }

    pub fn prefix(&self) -> KeyPrefix {
        self.prefix
    }

    /// Two-digit year
    pub fn year(&self) -> u8 {
        self.year
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn parse(s: &str) -> Result<Self, KeyParseError> {
        s.parse()
    }
}

/// Digits at the start of `s`, ignoring anything after them
fn leading_number(s: &str) -> Option<u32> {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

impl fmt::Display for BusinessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}-{:03}", self.prefix, self.year, self.sequence)
    }
}

impl FromStr for BusinessKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '-');
        let (Some(prefix), Some(year), Some(sequence)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(KeyParseError::Malformed(s.to_string()));
        };

        let prefix = prefix.parse()?;
        if year.len() != 2 {
            return Err(KeyParseError::Malformed(s.to_string()));
        }
        let year: u8 = year
            .parse()
            .map_err(|_| KeyParseError::Malformed(s.to_string()))?;
        let sequence: u32 = sequence
            .parse()
            .map_err(|_| KeyParseError::Malformed(s.to_string()))?;

        Ok(Self {
            prefix,
            year,
            sequence,
        })
    }
}

impl Serialize for BusinessKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BusinessKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur when parsing business keys
#[derive(Debug, Error)]
pub enum KeyParseError {
    #[error("invalid key prefix: '{0}' (valid: RISK, CAPA)")]
    InvalidPrefix(String),

    #[error("malformed business key: '{0}' (expected PREFIX-YY-NNN)")]
    Malformed(String),

    #[error("no sequence numbers left under '{0}'")]
    Exhausted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_key_skips_gaps() {
        let existing = ["RISK-25-001", "RISK-25-003"];
        let key = BusinessKey::next(KeyPrefix::Risk, 2025, existing).unwrap();
        assert_eq!(key.to_string(), "RISK-25-004");
    }

    #[test]
    fn test_next_key_empty_register() {
        let key = BusinessKey::next(KeyPrefix::Capa, 2025, std::iter::empty()).unwrap();
        assert_eq!(key.to_string(), "CAPA-25-001");
    }

    #[test]
    fn test_next_key_ignores_other_years_and_prefixes() {
        let existing = ["RISK-24-019", "CAPA-25-007", "RISK-25-002", "notes"];
        let key = BusinessKey::next(KeyPrefix::Risk, 2025, existing).unwrap();
        assert_eq!(key.to_string(), "RISK-25-003");
    }

    #[test]
    fn test_next_key_reads_leading_digits() {
        let existing = ["CAPA-26-012b", "CAPA-26-x"];
        let key = BusinessKey::next(KeyPrefix::Capa, 2026, existing).unwrap();
        assert_eq!(key.to_string(), "CAPA-26-013");
    }

    #[test]
    fn test_next_key_at_sequence_limit() {
        let existing = ["RISK-25-4294967295"];
        let err = BusinessKey::next(KeyPrefix::Risk, 2025, existing).unwrap_err();
        assert!(matches!(err, KeyParseError::Exhausted(ref stem) if stem == "RISK-25-"));

        let key = BusinessKey::next(KeyPrefix::Risk, 2026, existing).unwrap();
        assert_eq!(key.to_string(), "RISK-26-001");
    }

    #[test]
    fn test_sequence_beyond_three_digits() {
        let key = BusinessKey::new(KeyPrefix::Risk, 2025, 1000);
        assert_eq!(key.to_string(), "RISK-25-1000");
    }

    #[test]
    fn test_parse_roundtrip() {
        let key = BusinessKey::parse("CAPA-25-042").unwrap();
        assert_eq!(key.prefix(), KeyPrefix::Capa);
        assert_eq!(key.year(), 25);
        assert_eq!(key.sequence(), 42);
        assert_eq!(key.to_string(), "CAPA-25-042");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            BusinessKey::parse("NCR-25-001").unwrap_err(),
            KeyParseError::InvalidPrefix(_)
        ));
        assert!(matches!(
            BusinessKey::parse("RISK-2025-001").unwrap_err(),
            KeyParseError::Malformed(_)
        ));
        assert!(matches!(
            BusinessKey::parse("RISK25001").unwrap_err(),
            KeyParseError::Malformed(_)
        ));
    }
}
