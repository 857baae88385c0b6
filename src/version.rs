use crate::error::*;
use regex::Regex;
use semver::{BuildMetadata, Prerelease};
use std::{cmp::Ordering, fmt};

/// Semantic version to be published
///
/// Parsing accepts the loose form commonly used for image tags:
///
/// ```text
/// v?MAJOR[.MINOR[.PATCH]][-PRERELEASE][+BUILD]
/// ```
///
/// Missing minor and patch components default to zero. A leading `v` is
/// accepted but not preserved, i.e. `v1.2.3` is rendered as `1.2.3`.
///
/// The variant is a build flavor label such as `alpine`. It is appended to
/// tag names as `-<variant>` and never takes part in ordering.
///
/// ```
/// use imgpush::Version;
///
/// let v = Version::parse("v1.2").unwrap();
/// assert_eq!(v.to_string(), "1.2.0");
///
/// let v = Version::parse_with_variant("1.2.3-alpine", Some("alpine")).unwrap();
/// assert_eq!(v.to_string(), "1.2.3");
/// assert_eq!(v.label(), "1.2.3-alpine");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Prerelease,
    pub build: BuildMetadata,
    pub variant: Option<String>,
}

lazy_static::lazy_static! {
    static ref VERSION_RE: Regex = Regex::new(
        r"^v?([0-9]+)(?:\.([0-9]+))?(?:\.([0-9]+))?(?:-([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?(?:\+([0-9A-Za-z-]+(?:\.[0-9A-Za-z-]+)*))?$"
    ).unwrap();
}

impl Version {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion(input.to_string());
        let caps = VERSION_RE.captures(input).ok_or_else(invalid)?;
        let number = |i: usize| -> Result<u64> {
            match caps.get(i) {
                Some(m) => m.as_str().parse().map_err(|_| invalid()),
                None => Ok(0),
            }
        };
        let pre = match caps.get(4) {
            Some(m) => Prerelease::new(m.as_str()).map_err(|_| invalid())?,
            None => Prerelease::EMPTY,
        };
        let build = match caps.get(5) {
            Some(m) => BuildMetadata::new(m.as_str()).map_err(|_| invalid())?,
            None => BuildMetadata::EMPTY,
        };
        Ok(Version {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            pre,
            build,
            variant: None,
        })
    }

    /// Parse a tag label which carries `-<variant>` suffix
    ///
    /// When a variant is given, the suffix is required. A label of another
    /// flavor, or without any flavor, is rejected.
    pub fn parse_with_variant(input: &str, variant: Option<&str>) -> Result<Self> {
        match variant.filter(|v| !v.is_empty()) {
            Some(variant) => {
                let stripped = input
                    .strip_suffix(variant)
                    .and_then(|s| s.strip_suffix('-'))
                    .ok_or_else(|| Error::InvalidVersion(input.to_string()))?;
                let mut version = Self::parse(stripped)?;
                version.variant = Some(variant.to_string());
                Ok(version)
            }
            None => Self::parse(input),
        }
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Compare by semantic version precedence
    ///
    /// Build metadata and variant are ignored. A prerelease is lower than
    /// the release of the same `major.minor.patch`.
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }

    /// Tag label, i.e. the rendered version with `-<variant>` suffix
    pub fn label(&self) -> String {
        with_variant(self.to_string(), self.variant.as_deref())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre)?;
        }
        if !self.build.is_empty() {
            write!(f, "+{}", self.build)?;
        }
        Ok(())
    }
}

/// Append `-<variant>` to the label if a variant is set
pub fn with_variant(label: String, variant: Option<&str>) -> String {
    match variant.filter(|v| !v.is_empty()) {
        Some(variant) => format!("{}-{}", label, variant),
        None => label,
    }
}
