//! Role federation through STS

use async_trait::async_trait;
use aws_config::SdkConfig;
use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use fleetscan_common::{CredentialHandle, Error, Result, SessionSecret, CREDENTIAL_LIFETIME_SECS};
use fleetscan_scan::{CallerIdentity, CredentialFederator};

use crate::config::to_utc;
use crate::error::{federation_error, sdk_error};

/// Role ARN in a tenant
pub fn role_arn(tenant_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{tenant_id}:role/{role_name}")
}

/// Session name recorded in the tenant's CloudTrail
pub fn session_name(tenant_id: &str) -> String {
    format!("fleetscan-{tenant_id}")
}

/// IAM role ARN behind an assumed-role session ARN.
///
/// `arn:aws:sts::123456789012:assumed-role/Audit/session` becomes
/// `arn:aws:iam::123456789012:role/Audit`. Other ARNs are returned as-is.
pub fn base_role_arn(arn: &str) -> String {
    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    if parts.len() == 6 && parts[2] == "sts" {
        if let Some(rest) = parts[5].strip_prefix("assumed-role/") {
            if let Some(role) = rest.split('/').next() {
                return format!("arn:{}:iam::{}:role/{}", parts[1], parts[4], role);
            }
        }
    }
    arn.to_string()
}

/// Whether the base identity already is `role_name` in `tenant_id`
pub fn is_self_target(identity: &CallerIdentity, tenant_id: &str, role_name: &str) -> bool {
    identity.account == tenant_id
        && (identity.arn.contains(&format!("assumed-role/{role_name}/"))
            || identity.arn.ends_with(&format!(":role/{role_name}")))
}

/// Federates into tenants with `sts:AssumeRole`, skipping the round trip
/// when the base identity already is the target.
pub struct StsFederator {
    client: aws_sdk_sts::Client,
    identity: OnceCell<Option<CallerIdentity>>,
}

impl StsFederator {
    /// Federator using the base session in `base`
    pub fn new(base: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(base),
            identity: OnceCell::new(),
        }
    }

    /// Base identity, resolved at most once per run
    pub async fn base_identity(&self) -> Option<&CallerIdentity> {
        self.identity
            .get_or_init(|| async {
                match self.client.get_caller_identity().send().await {
                    Ok(out) => {
                        let identity = CallerIdentity {
                            account: out.account().unwrap_or_default().to_string(),
                            arn: out.arn().unwrap_or_default().to_string(),
                        };
                        info!(
                            account = %identity.account,
                            role = %base_role_arn(&identity.arn),
                            "Resolved base identity"
                        );
                        Some(identity)
                    }
                    Err(e) => {
                        let err = sdk_error("sts:GetCallerIdentity", e);
                        warn!(error = %err, "Could not resolve base identity");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }
}

#[async_trait]
impl CredentialFederator for StsFederator {
    async fn acquire(
        &self,
        tenant_id: &str,
        role_name: &str,
        region: &str,
    ) -> Result<CredentialHandle> {
        if let Some(identity) = self.base_identity().await {
            if is_self_target(identity, tenant_id, role_name) {
                debug!(tenant = %tenant_id, "Base identity is the target; skipping federation");
                return Ok(CredentialHandle::ambient(tenant_id, region, role_name, Utc::now()));
            }
        }

        let arn = role_arn(tenant_id, role_name);
        debug!(tenant = %tenant_id, role_arn = %arn, "Assuming role");
        let out = self
            .client
            .assume_role()
            .role_arn(&arn)
            .role_session_name(session_name(tenant_id))
            .duration_seconds(CREDENTIAL_LIFETIME_SECS)
            .send()
            .await
            .map_err(|e| federation_error(tenant_id, role_name, e))?;

        let credentials = out.credentials().ok_or_else(|| {
            Error::federation(tenant_id, role_name, None, "AssumeRole returned no credentials")
        })?;
        let expires_at = to_utc(credentials.expiration()).ok_or_else(|| {
            Error::federation(tenant_id, role_name, None, "AssumeRole returned an invalid expiry")
        })?;

        Ok(CredentialHandle::federated(
            tenant_id,
            region,
            role_name,
            SessionSecret {
                access_key_id: credentials.access_key_id().to_string(),
                secret_access_key: credentials.secret_access_key().to_string(),
                session_token: Some(credentials.session_token().to_string()),
            },
            expires_at,
        ))
    }
}
