//! Provider seams
//!
//! The engine talks to the cloud only through these traits, so collection and
//! execution can be tested with mocks while the binding crate supplies the
//! real SDK calls.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use fleetscan_common::model::{
    ClusterDescriptor, ImageMetadata, ImageRecommendation, NodeRecord, OsFamily, PlatformVersion,
    Readiness,
};
use fleetscan_common::{CredentialHandle, Result};

/// Identity the provider reports for a credential
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Tenant (account) the credential belongs to
    pub account: String,
    /// Principal ARN
    pub arn: String,
}

/// Exchanges the base credential for a tenant-scoped one
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CredentialFederator: Send + Sync {
    /// Acquire a credential for `role_name` in `tenant_id`, scoped to `region`
    async fn acquire(
        &self,
        tenant_id: &str,
        role_name: &str,
        region: &str,
    ) -> Result<CredentialHandle>;
}

/// Read-only inventory calls against one (tenant, region)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CloudInventory: Send + Sync {
    /// Identity behind the credential this inventory was built with
    async fn caller_identity(&self) -> Result<CallerIdentity>;

    /// Human-friendly tenant alias, if one is set
    async fn tenant_alias(&self) -> Result<Option<String>>;

    /// Names of all clusters in the region
    async fn list_clusters(&self) -> Result<Vec<String>>;

    /// Version and endpoint of one cluster
    async fn describe_cluster(&self, name: &str) -> Result<ClusterDescriptor>;

    /// Recommended image for a platform version and OS family.
    ///
    /// `Ok(None)` when the catalog has no entry for the pair.
    async fn recommended_image(
        &self,
        version: PlatformVersion,
        family: OsFamily,
    ) -> Result<Option<ImageRecommendation>>;

    /// Newest platform version the catalog has recommendations for,
    /// probing upward from `from`
    async fn newest_catalog_version(&self, from: PlatformVersion)
        -> Result<Option<PlatformVersion>>;

    /// Running nodes tagged as belonging to `cluster`
    async fn running_nodes(&self, cluster: &str) -> Result<Vec<NodeRecord>>;

    /// Metadata for a batch of image ids; unknown ids are omitted
    async fn describe_images(&self, image_ids: &[String]) -> Result<HashMap<String, ImageMetadata>>;

    /// Readiness per instance id, from the cluster's own API
    async fn node_readiness(&self, cluster: &ClusterDescriptor)
        -> Result<HashMap<String, Readiness>>;
}

/// Builds inventory clients bound to one credential
#[cfg_attr(test, automock)]
pub trait InventoryConnector: Send + Sync {
    /// Inventory client using `credential`; never shared across tasks
    fn connect(&self, credential: &CredentialHandle) -> Arc<dyn CloudInventory>;
}
