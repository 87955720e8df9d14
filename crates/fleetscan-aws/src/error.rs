//! Mapping SDK and cluster API errors onto [`fleetscan_common::Error`]
//!
//! Provider error codes are preserved so the failure classifier can match on
//! them. Transport failures carry synthetic codes (`DispatchFailure`,
//! `TimeoutError`).

use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use fleetscan_common::Error;

fn code_and_message<E, R>(err: &SdkError<E, R>) -> (Option<String>, String)
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let context = DisplayErrorContext(err).to_string();
    let code = match err {
        SdkError::TimeoutError(_) => Some("TimeoutError".to_string()),
        SdkError::DispatchFailure(d) if d.is_timeout() => Some("TimeoutError".to_string()),
        SdkError::DispatchFailure(_) if context.contains("credentials") => {
            Some("CredentialsNotLoaded".to_string())
        }
        SdkError::DispatchFailure(_) => Some("DispatchFailure".to_string()),
        _ => err.code().map(str::to_string),
    };
    let message = err.message().map(str::to_string).unwrap_or(context);
    (code, message)
}

/// Convert an SDK error from `operation` (e.g. "eks:ListClusters")
pub(crate) fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let (code, message) = code_and_message(&err);
    Error::api(operation, code, message)
}

/// Convert an STS AssumeRole error into a federation error
pub(crate) fn federation_error<E, R>(tenant: &str, role: &str, err: SdkError<E, R>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let (code, message) = code_and_message(&err);
    Error::federation(tenant, role, code, message)
}

/// Whether an SDK error carries the given service error code
pub(crate) fn has_code<E, R>(err: &SdkError<E, R>, code: &str) -> bool
where
    E: ProvideErrorMetadata,
{
    err.code() == Some(code)
}

/// Convert a cluster API error. HTTP 401/403 map to codes the classifier
/// treats as access denied.
pub(crate) fn kube_error(operation: &str, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(response) => {
            let code = match response.code {
                401 => "Unauthorized".to_string(),
                403 => "Forbidden".to_string(),
                404 => "NotFound".to_string(),
                429 => "TooManyRequests".to_string(),
                503 => "ServiceUnavailable".to_string(),
                other => format!("Http{other}"),
            };
            Error::api_with_code(operation, code, response.message)
        }
        other => Error::api(operation, None, other.to_string()),
    }
}
