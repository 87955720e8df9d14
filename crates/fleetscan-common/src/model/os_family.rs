//! Node operating-system family

use std::fmt;

use serde::{Deserialize, Serialize};

/// Base OS image variant running on a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OsFamily {
    /// Amazon Linux 2023
    AmazonLinux2023,
    /// Amazon Linux 2
    AmazonLinux2,
    /// Bottlerocket (minimal container OS)
    Bottlerocket,
    /// Ubuntu
    Ubuntu,
    /// Description did not match any known family
    Unknown,
}

/// Ordered match rules. The 2023 needles must precede the AL2 ones because
/// the latter are prefixes of the former. The stock EKS AL2 image spells it
/// "AmazonLinux2" with no space.
const RULES: &[(&str, OsFamily)] = &[
    ("amazon linux 2023", OsFamily::AmazonLinux2023),
    ("amazonlinux2023", OsFamily::AmazonLinux2023),
    ("amazon linux 2", OsFamily::AmazonLinux2),
    ("amazonlinux2", OsFamily::AmazonLinux2),
    ("bottlerocket", OsFamily::Bottlerocket),
    ("ubuntu", OsFamily::Ubuntu),
];

impl OsFamily {
    /// Every family that has a recommendation catalog
    pub const KNOWN: [OsFamily; 4] = [
        OsFamily::AmazonLinux2023,
        OsFamily::AmazonLinux2,
        OsFamily::Bottlerocket,
        OsFamily::Ubuntu,
    ];

    /// Classify a free-text image description.
    ///
    /// Case-insensitive substring match; first rule wins.
    pub fn from_description(description: &str) -> Self {
        let lower = description.to_lowercase();
        RULES
            .iter()
            .find(|(needle, _)| lower.contains(needle))
            .map(|(_, family)| *family)
            .unwrap_or(OsFamily::Unknown)
    }

    /// Whether a recommendation lookup is possible for this family
    pub fn is_known(self) -> bool {
        self != OsFamily::Unknown
    }

    /// Display label used in the report
    pub fn label(self) -> &'static str {
        match self {
            OsFamily::AmazonLinux2023 => "Amazon Linux 2023",
            OsFamily::AmazonLinux2 => "Amazon Linux 2",
            OsFamily::Bottlerocket => "Bottlerocket",
            OsFamily::Ubuntu => "Ubuntu",
            OsFamily::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
