//! Failure classification
//!
//! Every external call boundary consults [`classify`] to decide whether an
//! error is worth one more attempt, and the collector uses the category to
//! decide whether a failure degrades a sub-result or ends the task.
//! Provider error codes are matched first; free-text markers in the message
//! are the fallback for errors that carry no code (dispatch failures,
//! timeouts, plain HTTP statuses from the cluster API).

use std::fmt;

use serde::Serialize;

use crate::Error;

/// Category of a classified failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FailureCategory {
    /// Base or federated session expired or is invalid
    CredentialExpired,
    /// Caller lacks permission (trust policy, IAM policy, access entry)
    AccessDenied,
    /// Resource or parameter does not exist
    ResourceNotFound,
    /// Provider rate limit hit
    Throttled,
    /// Network failure or timeout
    Network,
    /// Anything else
    Unknown,
}

impl FailureCategory {
    /// Whether this category is eligible for a single bounded retry
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureCategory::Throttled | FailureCategory::Network)
    }

    fn hint(self) -> &'static str {
        match self {
            FailureCategory::CredentialExpired => {
                "refresh the base session (SSO login or CI role) and re-run"
            }
            FailureCategory::AccessDenied => {
                "check the role trust policy and the role's IAM permissions in the tenant"
            }
            FailureCategory::ResourceNotFound => "the resource may not exist in this region",
            FailureCategory::Throttled => "provider rate limit hit; lower --workers",
            FailureCategory::Network => "check network connectivity to the provider endpoints",
            FailureCategory::Unknown => "see the provider error for details",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureCategory::CredentialExpired => "CredentialExpired",
            FailureCategory::AccessDenied => "AccessDenied",
            FailureCategory::ResourceNotFound => "ResourceNotFound",
            FailureCategory::Throttled => "Throttled",
            FailureCategory::Network => "Network/Timeout",
            FailureCategory::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Outcome of classifying an error
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// Failure category
    pub category: FailureCategory,
    /// Whether one more attempt is allowed
    pub retry: bool,
    /// The error verbatim followed by a diagnostic hint
    pub message: String,
}

const CREDENTIAL_CODES: &[&str] = &[
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "InvalidToken",
    "InvalidIdentityToken",
    "RequestExpired",
    "UnrecognizedClientException",
    "CredentialsNotLoaded",
    "NoCredentialProviders",
];

const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "UnauthorizedAccess",
    "AuthFailure",
    "Forbidden",
    "Unauthorized",
    "OptInRequired",
];

const NOT_FOUND_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "ParameterNotFound",
    "NoSuchEntity",
    "NoSuchBucket",
    "NotFound",
    "InvalidInstanceID.NotFound",
    "InvalidAMIID.NotFound",
    "InvalidAMIID.Unavailable",
];

const THROTTLE_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
    "RequestThrottled",
    "SlowDown",
    "TooManyRequests",
];

const NETWORK_CODES: &[&str] = &[
    "DispatchFailure",
    "TimeoutError",
    "RequestTimeout",
    "RequestTimeoutException",
    "ServiceUnavailable",
    "ServiceUnavailableException",
    "InternalServerError",
    "InternalFailure",
];

const NETWORK_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "connection refused",
    "connection reset",
    "dns error",
    "dispatch failure",
];

fn category_for_code(code: &str) -> Option<FailureCategory> {
    let table: [(&[&str], FailureCategory); 5] = [
        (CREDENTIAL_CODES, FailureCategory::CredentialExpired),
        (ACCESS_DENIED_CODES, FailureCategory::AccessDenied),
        (NOT_FOUND_CODES, FailureCategory::ResourceNotFound),
        (THROTTLE_CODES, FailureCategory::Throttled),
        (NETWORK_CODES, FailureCategory::Network),
    ];
    table
        .iter()
        .find(|(codes, _)| codes.contains(&code))
        .map(|(_, category)| *category)
}

fn category_for_message(message: &str) -> FailureCategory {
    let lower = message.to_ascii_lowercase();
    if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureCategory::Network
    } else {
        FailureCategory::Unknown
    }
}

fn categorize(error: &Error) -> FailureCategory {
    match error {
        Error::Api { code, message, .. } | Error::Federation { code, message, .. } => code
            .as_deref()
            .and_then(category_for_code)
            .unwrap_or_else(|| category_for_message(message)),
        Error::Timeout { .. } => FailureCategory::Network,
        Error::Io { source, .. } => match source.kind() {
            std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted => FailureCategory::Network,
            std::io::ErrorKind::NotFound => FailureCategory::ResourceNotFound,
            std::io::ErrorKind::PermissionDenied => FailureCategory::AccessDenied,
            _ => FailureCategory::Unknown,
        },
        Error::Validation { .. }
        | Error::Cancelled { .. }
        | Error::Serialization { .. }
        | Error::Sink { .. }
        | Error::Internal { .. } => FailureCategory::Unknown,
    }
}

/// Classify an error into a category, retry decision and diagnostic message
pub fn classify(error: &Error) -> Classification {
    let category = categorize(error);
    Classification {
        category,
        retry: category.is_retryable(),
        message: format!("{}: {} (hint: {})", category, error, category.hint()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(code: &str) -> Error {
        Error::api_with_code("op", code, "provider said no")
    }

    /// Story: expired sessions stop the task without retrying - another
    /// attempt with the same session cannot succeed.
    #[test]
    fn story_expired_credentials_are_terminal() {
        for code in ["ExpiredToken", "InvalidClientTokenId", "ExpiredTokenException"] {
            let c = classify(&api(code));
            assert_eq!(c.category, FailureCategory::CredentialExpired, "{code}");
            assert!(!c.retry);
            assert!(c.message.contains("refresh the base session"));
        }
    }

    /// Story: a trust-policy misconfiguration surfaces with a hint instead of
    /// being retried.
    #[test]
    fn story_access_denied_points_at_trust_policy() {
        let err = Error::federation(
            "123456789012",
            "AuditRole",
            Some("AccessDenied".to_string()),
            "not authorized",
        );
        let c = classify(&err);
        assert_eq!(c.category, FailureCategory::AccessDenied);
        assert!(!c.retry);
        assert!(c.message.contains("trust policy"));
        assert!(c.message.contains("123456789012"));
    }

    /// Story: throttling and network blips get one more attempt
    #[test]
    fn story_transient_failures_are_retryable() {
        assert!(classify(&api("ThrottlingException")).retry);
        assert!(classify(&api("RequestLimitExceeded")).retry);
        assert!(classify(&api("DispatchFailure")).retry);
        assert!(classify(&Error::timeout("k8s:ListNodes", std::time::Duration::from_secs(10))).retry);

        let c = classify(&Error::api("ec2:DescribeInstances", None, "operation timed out"));
        assert_eq!(c.category, FailureCategory::Network);
        assert!(c.retry);
    }

    #[test]
    fn test_not_found_codes() {
        let c = classify(&api("ParameterNotFound"));
        assert_eq!(c.category, FailureCategory::ResourceNotFound);
        assert!(!c.retry);
    }

    #[test]
    fn test_unknown_code_falls_back_to_unknown() {
        let c = classify(&api("SomethingNew"));
        assert_eq!(c.category, FailureCategory::Unknown);
        assert!(!c.retry);
        assert!(c.message.contains("provider said no"));
    }

    #[test]
    fn test_non_provider_errors_are_unknown() {
        assert_eq!(
            classify(&Error::validation("bad")).category,
            FailureCategory::Unknown
        );
        assert_eq!(
            classify(&Error::cancelled("executor")).category,
            FailureCategory::Unknown
        );
    }

    #[test]
    fn test_category_display() {
        assert_eq!(FailureCategory::Network.to_string(), "Network/Timeout");
        assert_eq!(FailureCategory::AccessDenied.to_string(), "AccessDenied");
    }
}
