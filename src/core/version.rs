//! Bundle versions and version ranges.
//!
//! Bundle versions are `major.minor.micro.qualifier`. They are not semver:
//! the qualifier is compared as a plain string and may itself contain dots.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// A parsed bundle version with a total order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BundleVersion {
    pub major: u64,
    pub minor: u64,
    pub micro: u64,
    pub qualifier: String,
}

impl BundleVersion {
    /// The version assumed when a manifest declares none.
    pub fn null() -> Self {
        BundleVersion::default()
    }

    /// Parse a version string permissively.
    ///
    /// Missing numeric segments default to 0. The first segment that is not a
    /// number starts the qualifier, so `1.2.v2020` has micro 0 and qualifier
    /// `v2020`.
    pub fn parse(raw: &str) -> Self {
        let mut numbers = [0u64; 3];
        let mut segments = raw.trim().splitn(4, '.');
        let mut qualifier = String::new();

        for slot in numbers.iter_mut() {
            match segments.next() {
                Some(seg) => match seg.parse::<u64>() {
                    Ok(n) => *slot = n,
                    Err(_) => {
                        qualifier = std::iter::once(seg)
                            .chain(segments.by_ref())
                            .collect::<Vec<_>>()
                            .join(".");
                        break;
                    }
                },
                None => break,
            }
        }

        if qualifier.is_empty() {
            if let Some(rest) = segments.next() {
                qualifier = rest.to_string();
            }
        }

        BundleVersion {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier,
        }
    }
}

impl Ord for BundleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.cmp(&other.minor))
            .then_with(|| self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for BundleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BundleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

static RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*"?\s*([\[(])\s*([^,\s\])]*)\s*,\s*([^,\s\])]*)\s*([\])])\s*"?\s*$"#)
        .expect("range pattern is valid")
});

static SINGLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*"?\s*([0-9][0-9A-Za-z._-]*)\s*"?\s*$"#)
        .expect("version pattern is valid")
});

/// A version requirement attached to an import or requirement clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRange {
    /// `1.2` means "1.2 or later".
    AtLeast(BundleVersion),
    /// An interval with inclusive/exclusive bounds.
    Interval {
        min: BundleVersion,
        min_inclusive: bool,
        max: BundleVersion,
        max_inclusive: bool,
    },
    /// Text that matched neither form; kept for reporting.
    Raw(String),
}

impl VersionRange {
    pub fn parse(raw: &str) -> Self {
        if let Some(caps) = RANGE_PATTERN.captures(raw) {
            return VersionRange::Interval {
                min: BundleVersion::parse(&caps[2]),
                min_inclusive: &caps[1] == "[",
                max: BundleVersion::parse(&caps[3]),
                max_inclusive: &caps[4] == "]",
            };
        }
        if let Some(caps) = SINGLE_PATTERN.captures(raw) {
            return VersionRange::AtLeast(BundleVersion::parse(&caps[1]));
        }
        VersionRange::Raw(raw.trim().to_string())
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRange::AtLeast(v) => write!(f, "{}", v),
            VersionRange::Interval {
                min,
                min_inclusive,
                max,
                max_inclusive,
            } => write!(
                f,
                "{}{},{}{}",
                if *min_inclusive { '[' } else { '(' },
                min,
                max,
                if *max_inclusive { ']' } else { ')' }
            ),
            VersionRange::Raw(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_version() {
        let v = BundleVersion::parse("3.12.100.v20200515-1234");
        assert_eq!((v.major, v.minor, v.micro), (3, 12, 100));
        assert_eq!(v.qualifier, "v20200515-1234");
        assert_eq!(v.to_string(), "3.12.100.v20200515-1234");
    }

    #[test]
    fn test_parse_short_and_garbage() {
        assert_eq!(BundleVersion::parse("2"), BundleVersion::parse("2.0.0"));
        let v = BundleVersion::parse("1.beta.3");
        assert_eq!((v.major, v.minor), (1, 0));
        assert_eq!(v.qualifier, "beta.3");
    }

    #[test]
    fn test_ordering() {
        let mut versions: Vec<_> = ["1.10.0", "1.9.5", "1.10.0.v2", "1.10.0.v1"]
            .iter()
            .map(|s| BundleVersion::parse(s))
            .collect();
        versions.sort();
        let rendered: Vec<_> = versions.iter().map(|v| v.to_string()).collect();
        assert_eq!(rendered, vec!["1.9.5", "1.10.0", "1.10.0.v1", "1.10.0.v2"]);
    }

    #[test]
    fn test_range_interval() {
        let range = VersionRange::parse("\"[3.0.0, 4.0.0)\"");
        assert_eq!(
            range,
            VersionRange::Interval {
                min: BundleVersion::parse("3.0.0"),
                min_inclusive: true,
                max: BundleVersion::parse("4.0.0"),
                max_inclusive: false,
            }
        );
        assert_eq!(range.to_string(), "[3.0.0,4.0.0)");
    }

    #[test]
    fn test_range_single_and_raw() {
        assert_eq!(
            VersionRange::parse("1.2"),
            VersionRange::AtLeast(BundleVersion::parse("1.2"))
        );
        assert!(matches!(VersionRange::parse("latest"), VersionRange::Raw(_)));
    }
}
