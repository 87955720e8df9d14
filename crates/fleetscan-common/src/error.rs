//! Error types for fleetscan
//!
//! Errors are structured with fields to aid debugging of a fleet-wide run.
//! Each variant carries the context it happened in (tenant, operation,
//! provider error code) so the failure classifier can decide whether the
//! error is retryable, degrades a sub-result, or is fatal for the task.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for fleetscan operations
#[derive(Debug, Error)]
pub enum Error {
    /// A cloud provider API call failed
    #[error("api error [{operation}]{}: {message}", fmt_code(.code))]
    Api {
        /// Provider operation that failed (e.g., "eks:ListClusters")
        operation: String,
        /// Provider error code when the service returned one
        code: Option<String>,
        /// Description of what failed
        message: String,
    },

    /// Role federation into a tenant failed
    #[error("federation error for tenant {tenant} (role {role}){}: {message}", fmt_code(.code))]
    Federation {
        /// Tenant being federated into
        tenant: String,
        /// Role requested in the tenant
        role: String,
        /// Provider error code when the service returned one
        code: Option<String>,
        /// Description of what failed
        message: String,
    },

    /// An external call did not complete in time
    #[error("timeout after {after_secs}s [{operation}]")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Time budget that was exceeded
        after_secs: u64,
    },

    /// Validation error for targets or configuration
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field, when known (e.g., "tenant_id")
        field: Option<String>,
    },

    /// Work was abandoned because the run was interrupted
    #[error("cancelled [{context}]: scan interrupted before completion")]
    Cancelled {
        /// Where the cancellation was observed
        context: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The format being produced or parsed (if known)
        format: Option<String>,
    },

    /// Filesystem error
    #[error("io error [{context}]: {source}")]
    Io {
        /// What was being read or written
        context: String,
        /// The underlying io error
        #[source]
        source: std::io::Error,
    },

    /// Report sink failed to persist
    #[error("sink error [{sink}]: {message}")]
    Sink {
        /// Sink that failed (e.g., "csv-file", "s3")
        sink: String,
        /// Description of what failed
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "executor", "collector")
        context: String,
    },
}

fn fmt_code(code: &Option<String>) -> String {
    code.as_ref().map(|c| format!(" ({})", c)).unwrap_or_default()
}

impl Error {
    /// Create an API error for a provider operation
    pub fn api(
        operation: impl Into<String>,
        code: Option<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Api {
            operation: operation.into(),
            code,
            message: msg.into(),
        }
    }

    /// Create an API error carrying a provider error code
    pub fn api_with_code(
        operation: impl Into<String>,
        code: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::api(operation, Some(code.into()), msg)
    }

    /// Create a federation error for a tenant/role pair
    pub fn federation(
        tenant: impl Into<String>,
        role: impl Into<String>,
        code: Option<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Federation {
            tenant: tenant.into(),
            role: role.into(),
            code,
            message: msg.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after_secs: after.as_secs(),
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error for a specific field
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(context: impl Into<String>) -> Self {
        Self::Cancelled {
            context: context.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            format: None,
        }
    }

    /// Create a serialization error for a specific format
    pub fn serialization_for_format(format: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            format: Some(format.into()),
        }
    }

    /// Create an io error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a sink error
    pub fn sink(sink: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Sink {
            sink: sink.into(),
            message: msg.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Provider error code, if the failing service returned one
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Api { code, .. } | Error::Federation { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Tenant id, if this error is tied to a specific tenant
    pub fn tenant(&self) -> Option<&str> {
        match self {
            Error::Federation { tenant, .. } => Some(tenant),
            _ => None,
        }
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Api { operation, .. } | Error::Timeout { operation, .. } => Some(operation),
            Error::Cancelled { context }
            | Error::Io { context, .. }
            | Error::Internal { context, .. } => Some(context),
            Error::Sink { sink, .. } => Some(sink),
            _ => None,
        }
    }

    /// Check if this error is eligible for a bounded retry
    ///
    /// Delegates to the failure classifier so every call site makes the
    /// same decision.
    pub fn is_retryable(&self) -> bool {
        crate::classify::classify(self).retry
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::serialization_for_format("csv", e.to_string())
    }
}
