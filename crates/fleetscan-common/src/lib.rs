//! Common types for fleetscan: data model, errors, failure classification,
//! retry, credentials, report rendering and telemetry.

#![deny(missing_docs)]

pub mod classify;
pub mod credentials;
pub mod error;
pub mod model;
pub mod report;
pub mod retry;
pub mod telemetry;

pub use classify::{classify, Classification, FailureCategory};
pub use credentials::{CredentialHandle, CredentialSource, SessionSecret};
pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Placeholder rendered for any value that could not be determined
pub const NOT_AVAILABLE: &str = "N/A";

/// Image age (days) above which a node is considered patch-pending
pub const PATCH_AGE_THRESHOLD_DAYS: i64 = 30;

/// Number of minor versions a cluster may trail the newest catalog version
pub const VERSION_TOLERANCE_MINORS: u32 = 2;

/// Lifetime of a federated credential, in seconds
pub const CREDENTIAL_LIFETIME_SECS: i32 = 3600;

/// Default size of the scan worker pool
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Upper bound on the scan worker pool
pub const MAX_WORKER_COUNT: usize = 64;

/// Compliance policy applied by the enrichment engine.
///
/// Fixed for a run; never varied per call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanPolicy {
    /// Image age in days above which `patch_pending` is true
    pub patch_age_threshold_days: i64,
    /// Minor versions a cluster may trail the newest catalog version
    pub version_tolerance_minors: u32,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            patch_age_threshold_days: PATCH_AGE_THRESHOLD_DAYS,
            version_tolerance_minors: VERSION_TOLERANCE_MINORS,
        }
    }
}
