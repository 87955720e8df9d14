//! Cluster platform versions ("1.29")

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// `major.minor` control-plane version
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlatformVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
}

impl PlatformVersion {
    /// Construct from parts
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// The next minor version on the same major
    pub fn next_minor(self) -> Self {
        Self::new(self.major, self.minor + 1)
    }

    /// Whether `self` trails `newest` by no more than `tolerance` minors.
    ///
    /// Versions on a different major never comply; versions ahead of
    /// `newest` always do.
    pub fn within_tolerance(self, newest: PlatformVersion, tolerance: u32) -> bool {
        self.major == newest.major && newest.minor.saturating_sub(self.minor) <= tolerance
    }
}

impl FromStr for PlatformVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('v');
        let mut parts = s.split('.');
        let parse = |part: Option<&str>| -> Result<u32, Error> {
            part.and_then(|p| p.parse().ok()).ok_or_else(|| {
                Error::validation_for_field("platform_version", format!("invalid version '{s}'"))
            })
        };
        let major = parse(parts.next())?;
        let minor = parse(parts.next())?;
        Ok(Self { major, minor })
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let v: PlatformVersion = "1.29".parse().unwrap();
        assert_eq!(v, PlatformVersion::new(1, 29));
        assert_eq!(v.to_string(), "1.29");
        assert_eq!("v1.30.2".parse::<PlatformVersion>().unwrap(), PlatformVersion::new(1, 30));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("N/A".parse::<PlatformVersion>().is_err());
        assert!("1".parse::<PlatformVersion>().is_err());
        assert!("".parse::<PlatformVersion>().is_err());
    }

    #[test]
    fn test_tolerance_window() {
        let newest = PlatformVersion::new(1, 31);
        assert!(PlatformVersion::new(1, 31).within_tolerance(newest, 2));
        assert!(PlatformVersion::new(1, 29).within_tolerance(newest, 2));
        assert!(!PlatformVersion::new(1, 28).within_tolerance(newest, 2));
        assert!(PlatformVersion::new(1, 32).within_tolerance(newest, 2));
        assert!(!PlatformVersion::new(2, 0).within_tolerance(newest, 2));
    }
}
