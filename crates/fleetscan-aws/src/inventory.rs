//! [`CloudInventory`] over the AWS SDK
//!
//! One [`AwsInventory`] is built per task from that task's scoped config; no
//! client is shared across tenants.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ec2::types::{Filter, Instance};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use fleetscan_common::model::{
    ClusterDescriptor, ClusterEndpoint, ImageMetadata, ImageRecommendation, NodeRecord, OsFamily,
    PlatformVersion, Readiness,
};
use fleetscan_common::{CredentialHandle, Result};
use fleetscan_scan::{CallerIdentity, CloudInventory, InventoryConnector};

use crate::catalog::{parameter_name, version_probes, GET_PARAMETERS_BATCH};
use crate::config::{scoped_config, to_utc};
use crate::error::{has_code, sdk_error};
use crate::readiness::{fetch_readiness, ClusterTimeouts};

/// Tag the node groups put on member instances
pub fn cluster_tag_filter(cluster: &str) -> Filter {
    Filter::builder()
        .name(format!("tag:kubernetes.io/cluster/{cluster}"))
        .values("owned")
        .values("shared")
        .build()
}

fn running_filter() -> Filter {
    Filter::builder()
        .name("instance-state-name")
        .values("running")
        .build()
}

/// Image creation dates are RFC 3339 strings
pub fn parse_creation_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn node_record(instance: &Instance) -> Option<NodeRecord> {
    let instance_id = instance.instance_id()?.to_string();
    Some(NodeRecord {
        instance_id,
        image_id: instance.image_id().map(str::to_string),
        instance_class: instance.instance_type().map(|t| t.as_str().to_string()),
        lifecycle_state: instance
            .state()
            .and_then(|s| s.name())
            .map(|n| n.as_str().to_string())
            .unwrap_or_else(|| "running".to_string()),
        launch_time: instance.launch_time().and_then(to_utc),
        image: None,
    })
}

/// Inventory for one (tenant, region) credential
pub struct AwsInventory {
    config: SdkConfig,
    sts: aws_sdk_sts::Client,
    iam: aws_sdk_iam::Client,
    eks: aws_sdk_eks::Client,
    ec2: aws_sdk_ec2::Client,
    ssm: aws_sdk_ssm::Client,
    timeouts: ClusterTimeouts,
}

impl AwsInventory {
    /// Build clients from an already scoped config
    pub fn new(config: SdkConfig, timeouts: ClusterTimeouts) -> Self {
        Self {
            sts: aws_sdk_sts::Client::new(&config),
            iam: aws_sdk_iam::Client::new(&config),
            eks: aws_sdk_eks::Client::new(&config),
            ec2: aws_sdk_ec2::Client::new(&config),
            ssm: aws_sdk_ssm::Client::new(&config),
            config,
            timeouts,
        }
    }
}

#[async_trait]
impl CloudInventory for AwsInventory {
    async fn caller_identity(&self) -> Result<CallerIdentity> {
        let out = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| sdk_error("sts:GetCallerIdentity", e))?;
        Ok(CallerIdentity {
            account: out.account().unwrap_or_default().to_string(),
            arn: out.arn().unwrap_or_default().to_string(),
        })
    }

    async fn tenant_alias(&self) -> Result<Option<String>> {
        let out = self
            .iam
            .list_account_aliases()
            .send()
            .await
            .map_err(|e| sdk_error("iam:ListAccountAliases", e))?;
        Ok(out.account_aliases().first().cloned())
    }

    async fn list_clusters(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut pages = self.eks.list_clusters().into_paginator().send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("eks:ListClusters", e))?;
            names.extend(page.clusters().iter().cloned());
        }
        Ok(names)
    }

    async fn describe_cluster(&self, name: &str) -> Result<ClusterDescriptor> {
        let out = self
            .eks
            .describe_cluster()
            .name(name)
            .send()
            .await
            .map_err(|e| sdk_error("eks:DescribeCluster", e))?;
        let Some(cluster) = out.cluster() else {
            return Ok(ClusterDescriptor::undescribed(name));
        };
        let endpoint = match (
            cluster.endpoint(),
            cluster.certificate_authority().and_then(|ca| ca.data()),
        ) {
            (Some(url), Some(ca)) => Some(ClusterEndpoint {
                url: url.to_string(),
                certificate_authority: ca.to_string(),
            }),
            _ => None,
        };
        Ok(ClusterDescriptor {
            name: name.to_string(),
            version: cluster.version().map(str::to_string),
            endpoint,
        })
    }

    async fn recommended_image(
        &self,
        version: PlatformVersion,
        family: OsFamily,
    ) -> Result<Option<ImageRecommendation>> {
        let Some(name) = parameter_name(version, family) else {
            return Ok(None);
        };
        let out = match self.ssm.get_parameter().name(&name).send().await {
            Ok(out) => out,
            Err(e) if has_code(&e, "ParameterNotFound") => {
                debug!(parameter = %name, "No catalog entry");
                return Ok(None);
            }
            Err(e) => return Err(sdk_error("ssm:GetParameter", e)),
        };
        Ok(out.parameter().and_then(|p| {
            Some(ImageRecommendation {
                image_id: p.value()?.to_string(),
                publication_date: p.last_modified_date().and_then(to_utc),
            })
        }))
    }

    async fn newest_catalog_version(
        &self,
        from: PlatformVersion,
    ) -> Result<Option<PlatformVersion>> {
        let probes = version_probes(from);
        let mut newest = None;
        for chunk in probes.chunks(GET_PARAMETERS_BATCH) {
            let names: Vec<String> = chunk.iter().map(|(name, _)| name.clone()).collect();
            let out = self
                .ssm
                .get_parameters()
                .set_names(Some(names))
                .send()
                .await
                .map_err(|e| sdk_error("ssm:GetParameters", e))?;
            for parameter in out.parameters() {
                let found = chunk
                    .iter()
                    .find(|(name, _)| Some(name.as_str()) == parameter.name())
                    .map(|(_, version)| *version);
                newest = newest.max(found);
            }
        }
        Ok(newest)
    }

    async fn running_nodes(&self, cluster: &str) -> Result<Vec<NodeRecord>> {
        let mut nodes = Vec::new();
        let mut pages = self
            .ec2
            .describe_instances()
            .filters(running_filter())
            .filters(cluster_tag_filter(cluster))
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("ec2:DescribeInstances", e))?;
            for instance in page.reservations().iter().flat_map(|r| r.instances()) {
                match node_record(instance) {
                    Some(node) => nodes.push(node),
                    None => warn!(cluster = %cluster, "Skipping instance without an id"),
                }
            }
        }
        Ok(nodes)
    }

    async fn describe_images(&self, image_ids: &[String]) -> Result<HashMap<String, ImageMetadata>> {
        if image_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let out = self
            .ec2
            .describe_images()
            .set_image_ids(Some(image_ids.to_vec()))
            .send()
            .await
            .map_err(|e| sdk_error("ec2:DescribeImages", e))?;
        Ok(out
            .images()
            .iter()
            .filter_map(|image| {
                let id = image.image_id()?.to_string();
                Some((
                    id,
                    ImageMetadata {
                        publication_date: image.creation_date().and_then(parse_creation_date),
                        description: image.description().map(str::to_string),
                    },
                ))
            })
            .collect())
    }

    async fn node_readiness(
        &self,
        cluster: &ClusterDescriptor,
    ) -> Result<HashMap<String, Readiness>> {
        fetch_readiness(&self.config, cluster, self.timeouts).await
    }
}

/// Builds an [`AwsInventory`] per credential from the base session
pub struct AwsConnector {
    base: SdkConfig,
    timeouts: ClusterTimeouts,
}

impl AwsConnector {
    /// Connector deriving per-task configs from `base`
    pub fn new(base: SdkConfig, timeouts: ClusterTimeouts) -> Self {
        Self { base, timeouts }
    }
}

impl InventoryConnector for AwsConnector {
    fn connect(&self, credential: &CredentialHandle) -> Arc<dyn CloudInventory> {
        let config = scoped_config(&self.base, credential);
        Arc::new(AwsInventory::new(config, self.timeouts))
    }
}
