//! SDK configuration: the ambient base session and per-credential scoping
//!
//! Credentials always travel as explicit values into each client's config;
//! process environment is never touched for request scoping.

use std::time::SystemTime;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use chrono::{DateTime, Utc};

use fleetscan_common::CredentialHandle;

/// Region for base-session calls when neither the environment nor the
/// profile names one
pub const DEFAULT_HOME_REGION: &str = "us-east-1";

/// Load the base session from the default credential chain, optionally from
/// a named profile.
///
/// The region comes from the environment or profile; `home_region` only
/// fills in when neither sets one.
pub async fn load_base_config(profile: Option<&str>, home_region: &str) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(profile) = profile {
        loader = loader.profile_name(profile);
    }
    with_fallback_region(loader.load().await, home_region)
}

/// Keep the config's region, or set `fallback` when it has none
pub fn with_fallback_region(config: SdkConfig, fallback: &str) -> SdkConfig {
    if config.region().is_some() {
        return config;
    }
    config
        .to_builder()
        .region(Region::new(fallback.to_string()))
        .build()
}

/// Config for clients acting with `credential` in its region
pub fn scoped_config(base: &SdkConfig, credential: &CredentialHandle) -> SdkConfig {
    let mut builder = base
        .to_builder()
        .region(Region::new(credential.region().to_string()));
    if let Some(secret) = credential.secret() {
        let credentials = Credentials::new(
            secret.access_key_id.clone(),
            secret.secret_access_key.clone(),
            secret.session_token.clone(),
            Some(SystemTime::from(credential.expires_at())),
            "fleetscan-federation",
        );
        builder = builder.credentials_provider(SharedCredentialsProvider::new(credentials));
    }
    builder.build()
}

/// Convert an SDK timestamp
pub(crate) fn to_utc(ts: &aws_sdk_sts::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_region_is_kept() {
        let config = SdkConfig::builder()
            .region(Region::new("eu-west-1"))
            .build();
        let config = with_fallback_region(config, DEFAULT_HOME_REGION);
        assert_eq!(config.region().map(|r| r.as_ref()), Some("eu-west-1"));
    }

    #[test]
    fn test_missing_region_falls_back() {
        let config = with_fallback_region(SdkConfig::builder().build(), DEFAULT_HOME_REGION);
        assert_eq!(config.region().map(|r| r.as_ref()), Some("us-east-1"));
    }
}
