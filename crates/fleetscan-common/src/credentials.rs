//! Tenant-scoped credentials
//!
//! A [`CredentialHandle`] is produced by the federator for exactly one
//! (tenant, region) task and is dropped when that task finishes. Secret
//! material is never printed: `Debug` redacts it.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::CREDENTIAL_LIFETIME_SECS;

/// Short-lived secret material returned by role federation
#[derive(Clone, PartialEq, Eq)]
pub struct SessionSecret {
    /// Access key id
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Session token for temporary credentials
    pub session_token: Option<String>,
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSecret")
            .field("access_key_id", &redact_key_id(&self.access_key_id))
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Keep the key id prefix (AKIA/ASIA) so logs still tell long-lived keys
/// from session keys.
fn redact_key_id(id: &str) -> String {
    let prefix: String = id.chars().take(4).collect();
    format!("{prefix}****")
}

/// Where the credential came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    /// The caller's own base identity already is the target tenant and role
    Ambient,
    /// A federated session in the target tenant
    Federated(SessionSecret),
}

/// Opaque, time-bounded credential for one tenant and region
#[derive(Clone)]
pub struct CredentialHandle {
    tenant_id: String,
    region: String,
    role_name: String,
    source: CredentialSource,
    expires_at: DateTime<Utc>,
}

impl CredentialHandle {
    /// Handle wrapping the ambient base identity.
    ///
    /// Ambient sessions are treated as having the same capped lifetime as a
    /// federated one so every task is bounded the same way.
    pub fn ambient(
        tenant_id: impl Into<String>,
        region: impl Into<String>,
        role_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            region: region.into(),
            role_name: role_name.into(),
            source: CredentialSource::Ambient,
            expires_at: now + chrono::Duration::seconds(i64::from(CREDENTIAL_LIFETIME_SECS)),
        }
    }

    /// Handle wrapping a federated session that expires at `expires_at`
    pub fn federated(
        tenant_id: impl Into<String>,
        region: impl Into<String>,
        role_name: impl Into<String>,
        secret: SessionSecret,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            region: region.into(),
            role_name: role_name.into(),
            source: CredentialSource::Federated(secret),
            expires_at,
        }
    }

    /// Tenant this handle is scoped to
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Region this handle is scoped to
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Role the handle acts as
    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    /// Source of the secret material
    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    /// Federated secret material, or `None` for the ambient identity
    pub fn secret(&self) -> Option<&SessionSecret> {
        match &self.source {
            CredentialSource::Federated(secret) => Some(secret),
            CredentialSource::Ambient => None,
        }
    }

    /// Expiry instant
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Lifetime left at `now`; zero once expired
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

impl fmt::Debug for CredentialHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialHandle")
            .field("tenant_id", &self.tenant_id)
            .field("region", &self.region)
            .field("role_name", &self.role_name)
            .field("source", &self.source)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
