// provis-common/src/model/version.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ProvisError, Result};

/// Wrapper around semver::Version for component versions.
///
/// Parsing is lenient: missing minor/patch parts are padded with zeros, a
/// `_revision` suffix is dropped and a fourth dotted segment is kept as build
/// metadata so that `1.2.3.v20240101` still orders above `1.2.3`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(semver::Version);

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version(semver::Version::new(major, minor, patch))
    }

    pub fn zero() -> Self {
        Version::new(0, 0, 0)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        semver::Version::parse(trimmed).map(Version).or_else(|_| {
            let cleaned = trimmed.split('_').next().unwrap_or(trimmed);
            let parts: Vec<&str> = cleaned.splitn(4, '.').collect();
            let padded = match parts.len() {
                1 => format!("{}.0.0", parts[0]),
                2 => format!("{}.{}.0", parts[0], parts[1]),
                3 => cleaned.to_string(),
                _ => format!("{}.{}.{}+{}", parts[0], parts[1], parts[2], parts[3]),
            };
            semver::Version::parse(&padded).map(Version).map_err(|e| {
                ProvisError::VersionError(format!(
                    "Failed to parse version '{s}' (tried '{padded}'): {e}"
                ))
            })
        })
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }
}

impl FromStr for Version {
    type Err = ProvisError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<semver::Version> for Version {
    fn from(version: semver::Version) -> Self {
        Version(version)
    }
}

impl From<Version> for semver::Version {
    fn from(version: Version) -> Self {
        version.0
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// An interval of versions with independently inclusive or exclusive bounds.
/// An absent upper bound means the range is open-ended.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionRange {
    min: Version,
    min_inclusive: bool,
    max: Option<Version>,
    max_inclusive: bool,
}

impl VersionRange {
    pub fn new(
        min: Version,
        min_inclusive: bool,
        max: Option<Version>,
        max_inclusive: bool,
    ) -> Result<Self> {
        if let Some(max) = &max {
            if *max < min {
                return Err(ProvisError::InvalidRange(
                    format!("{min},{max}"),
                    "lower bound is greater than upper bound".to_string(),
                ));
            }
            if *max == min && !(min_inclusive && max_inclusive) {
                return Err(ProvisError::InvalidRange(
                    format!("{min},{max}"),
                    "range with equal bounds must be inclusive on both ends".to_string(),
                ));
            }
        }
        Ok(Self {
            min,
            min_inclusive,
            max,
            max_inclusive,
        })
    }

    /// Every version.
    pub fn any() -> Self {
        Self::at_least(Version::zero())
    }

    /// `[version, +inf)`
    pub fn at_least(version: Version) -> Self {
        Self {
            min: version,
            min_inclusive: true,
            max: None,
            max_inclusive: false,
        }
    }

    /// The singleton range `[version, version]`.
    pub fn exact(version: Version) -> Self {
        Self {
            min: version.clone(),
            min_inclusive: true,
            max: Some(version),
            max_inclusive: true,
        }
    }

    pub fn min(&self) -> &Version {
        &self.min
    }

    pub fn max(&self) -> Option<&Version> {
        self.max.as_ref()
    }

    pub fn is_min_inclusive(&self) -> bool {
        self.min_inclusive
    }

    pub fn is_max_inclusive(&self) -> bool {
        self.max_inclusive
    }

    /// Returns the pinned version when this is a singleton range.
    pub fn as_exact(&self) -> Option<&Version> {
        match &self.max {
            Some(max) if *max == self.min => Some(max),
            _ => None,
        }
    }

    pub fn includes(&self, version: &Version) -> bool {
        let above_min = if self.min_inclusive {
            *version >= self.min
        } else {
            *version > self.min
        };
        if !above_min {
            return false;
        }
        match &self.max {
            None => true,
            Some(max) if self.max_inclusive => version <= max,
            Some(max) => version < max,
        }
    }

    /// Parses `[1.0,2.0)`, `(1.0,2.0]`, `[1.0,)` or a bare `1.0` (meaning at least 1.0).
    pub fn parse(s: &str) -> Result<Self> {
        let text = s.trim();
        if text.is_empty() {
            return Ok(Self::any());
        }
        let first = text.chars().next().unwrap_or(' ');
        if first != '[' && first != '(' {
            return Ok(Self::at_least(Version::parse(text)?));
        }
        let last = text.chars().last().unwrap_or(' ');
        if last != ']' && last != ')' {
            return Err(ProvisError::InvalidRange(
                s.to_string(),
                "missing closing bracket".to_string(),
            ));
        }
        let inner = &text[1..text.len() - 1];
        let (low, high) = inner.split_once(',').ok_or_else(|| {
            ProvisError::InvalidRange(s.to_string(), "expected 'min,max'".to_string())
        })?;
        let min = if low.trim().is_empty() {
            Version::zero()
        } else {
            Version::parse(low)?
        };
        let max = if high.trim().is_empty() {
            None
        } else {
            Some(Version::parse(high)?)
        };
        Self::new(min, first == '[', max, last == ']')
            .map_err(|e| ProvisError::InvalidRange(s.to_string(), e.to_string()))
    }
}

impl Default for VersionRange {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for VersionRange {
    type Err = ProvisError;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        VersionRange::parse(s)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.max {
            None if self.min_inclusive => write!(f, "{}", self.min),
            None => write!(f, "({},)", self.min),
            Some(max) => write!(
                f,
                "{}{},{}{}",
                if self.min_inclusive { '[' } else { '(' },
                self.min,
                max,
                if self.max_inclusive { ']' } else { ')' }
            ),
        }
    }
}

impl Serialize for VersionRange {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        VersionRange::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn lenient_parse_pads_and_keeps_qualifier() {
        assert_eq!(v("1"), Version::new(1, 0, 0));
        assert_eq!(v("1.5"), Version::new(1, 5, 0));
        assert_eq!(v("2.0.1_3"), Version::new(2, 0, 1));
        assert!(v("1.2.3.v2024") > v("1.2.3"));
        assert!(Version::parse("one.two").is_err());
    }

    #[test]
    fn half_open_range_bounds() {
        let range = VersionRange::parse("[1.0,2.0)").unwrap();
        assert!(range.includes(&v("1.0")));
        assert!(range.includes(&v("1.9.9")));
        assert!(!range.includes(&v("2.0")));
        assert!(!range.includes(&v("0.9")));

        let open_low = VersionRange::parse("(1.0,2.0]").unwrap();
        assert!(!open_low.includes(&v("1.0")));
        assert!(open_low.includes(&v("2.0")));
    }

    #[test]
    fn bare_version_means_at_least() {
        let range = VersionRange::parse("1.2").unwrap();
        assert!(range.includes(&v("1.2")));
        assert!(range.includes(&v("40.0")));
        assert!(!range.includes(&v("1.1")));
        assert_eq!(range.to_string(), "1.2.0");
    }

    #[test]
    fn singleton_range_matches_one_version() {
        let range = VersionRange::exact(v("3.1"));
        assert_eq!(range.as_exact(), Some(&v("3.1")));
        assert!(range.includes(&v("3.1")));
        assert!(!range.includes(&v("3.1.1")));
        assert_eq!(range.to_string(), "[3.1.0,3.1.0]");
    }

    #[test]
    fn inverted_or_empty_ranges_are_rejected() {
        assert!(VersionRange::parse("[2.0,1.0]").is_err());
        assert!(VersionRange::parse("[1.0,1.0)").is_err());
        assert!(VersionRange::parse("[1.0;2.0]").is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        let range = VersionRange::parse("(1.0,3.0)").unwrap();
        assert_eq!(VersionRange::parse(&range.to_string()).unwrap(), range);
    }
}
