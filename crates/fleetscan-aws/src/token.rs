//! EKS bearer tokens
//!
//! A token is a presigned `sts:GetCallerIdentity` URL bound to the cluster
//! name through the `x-k8s-aws-id` header, base64url-encoded behind the
//! `k8s-aws-v1.` prefix. It is valid for 60 seconds and derived per task from
//! that task's own credential.

use std::time::{Duration, SystemTime};

use aws_config::SdkConfig;
use aws_credential_types::provider::ProvideCredentials;
use aws_sigv4::http_request::{
    sign, SignableBody, SignableRequest, SignatureLocation, SigningSettings,
};
use aws_sigv4::sign::v4;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use fleetscan_common::{Error, Result};

const TOKEN_PREFIX: &str = "k8s-aws-v1.";
const CLUSTER_ID_HEADER: &str = "x-k8s-aws-id";
const TOKEN_LIFETIME: Duration = Duration::from_secs(60);

fn token_error(msg: impl std::fmt::Display) -> Error {
    Error::internal_with_context("eks-token", msg.to_string())
}

fn sts_url(region: &str) -> String {
    format!("https://sts.{region}.amazonaws.com/?Action=GetCallerIdentity&Version=2011-06-15")
}

/// Wrap a presigned URL into the bearer token format
pub fn encode_token(presigned_url: &str) -> String {
    format!("{TOKEN_PREFIX}{}", URL_SAFE_NO_PAD.encode(presigned_url))
}

/// Generate a bearer token for `cluster_name` using the credentials in `config`
pub async fn cluster_token(config: &SdkConfig, cluster_name: &str) -> Result<String> {
    let region = config
        .region()
        .map(|r| r.to_string())
        .ok_or_else(|| token_error("no region configured"))?;
    let provider = config
        .credentials_provider()
        .ok_or_else(|| token_error("no credentials provider configured"))?;
    let credentials = provider.provide_credentials().await.map_err(|e| {
        Error::api_with_code("eks-token", "CredentialsNotLoaded", e.to_string())
    })?;
    let identity = credentials.into();

    let mut settings = SigningSettings::default();
    settings.signature_location = SignatureLocation::QueryParams;
    settings.expires_in = Some(TOKEN_LIFETIME);

    let params = v4::SigningParams::builder()
        .identity(&identity)
        .region(&region)
        .name("sts")
        .time(SystemTime::now())
        .settings(settings)
        .build()
        .map_err(token_error)?
        .into();

    let url = sts_url(&region);
    let headers = [(CLUSTER_ID_HEADER, cluster_name)];
    let request = SignableRequest::new(
        "GET",
        &url,
        headers.iter().copied(),
        SignableBody::Bytes(&[]),
    )
    .map_err(token_error)?;
    let (instructions, _signature) = sign(request, &params).map_err(token_error)?.into_parts();

    let mut presigned = url::Url::parse(&url).map_err(token_error)?;
    {
        let mut query = presigned.query_pairs_mut();
        for (name, value) in instructions.params() {
            query.append_pair(name, value);
        }
    }
    Ok(encode_token(presigned.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_config::{BehaviorVersion, Region};
    use aws_credential_types::provider::SharedCredentialsProvider;
    use aws_credential_types::Credentials;

    #[test]
    fn test_encode_token_has_prefix_and_no_padding() {
        let token = encode_token("https://sts.us-east-1.amazonaws.com/?a=b");
        assert!(token.starts_with("k8s-aws-v1."));
        assert!(!token.ends_with('='));
        let decoded = URL_SAFE_NO_PAD
            .decode(token.trim_start_matches(TOKEN_PREFIX))
            .unwrap();
        assert_eq!(decoded, b"https://sts.us-east-1.amazonaws.com/?a=b");
    }

    /// Story: the token is a presigned identity call bound to the cluster
    #[tokio::test]
    async fn story_token_is_presigned_for_cluster() {
        let config = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-west-1"))
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                "AKIDEXAMPLE",
                "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
                None,
                None,
                "test",
            )))
            .build();

        let token = cluster_token(&config, "core").await.unwrap();
        let url = String::from_utf8(
            URL_SAFE_NO_PAD
                .decode(token.trim_start_matches(TOKEN_PREFIX))
                .unwrap(),
        )
        .unwrap();

        assert!(url.starts_with("https://sts.eu-west-1.amazonaws.com/?Action=GetCallerIdentity"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires=60"));
        assert!(url.contains("x-k8s-aws-id"));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_an_error() {
        let config = SdkConfig::builder()
            .region(Region::new("eu-west-1"))
            .build();
        assert!(cluster_token(&config, "core").await.is_err());
    }
}
