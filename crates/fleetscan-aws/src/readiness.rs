//! Node readiness from the cluster's own API
//!
//! Connects with a bearer token derived from the task credential and lists
//! the cluster's nodes. Nodes are matched to instances through the last
//! segment of `spec.providerID` (`aws:///us-east-1a/i-0abc...`).

use std::collections::HashMap;
use std::time::Duration;

use aws_config::SdkConfig;
use k8s_openapi::api::core::v1::{Node, NodeCondition};
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use fleetscan_common::model::{ClusterDescriptor, Readiness};
use fleetscan_common::{Error, Result};

use crate::error::kube_error;
use crate::token::cluster_token;

/// Node condition reporting readiness
pub const CONDITION_READY: &str = "Ready";

const STATUS_TRUE: &str = "True";

/// Connect and read timeouts for cluster API clients
#[derive(Clone, Copy, Debug)]
pub struct ClusterTimeouts {
    /// TCP/TLS connect timeout
    pub connect: Duration,
    /// Per-request read timeout
    pub read: Duration,
}

impl Default for ClusterTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(10),
        }
    }
}

/// Status of the condition named `condition_type`, if the node reports it
fn condition_status<'a>(conditions: Option<&'a [NodeCondition]>, condition_type: &str) -> Option<&'a str> {
    conditions?
        .iter()
        .find(|c| c.type_ == condition_type)
        .map(|c| c.status.as_str())
}

/// Readiness of a single node
pub fn node_readiness(node: &Node) -> Readiness {
    let conditions = node.status.as_ref().and_then(|s| s.conditions.as_deref());
    match condition_status(conditions, CONDITION_READY) {
        Some(STATUS_TRUE) => Readiness::Ready,
        Some(_) => Readiness::NotReady,
        None => Readiness::Unknown,
    }
}

/// Instance id from a provider id such as `aws:///us-east-1a/i-0abc`
pub fn instance_id_from_provider_id(provider_id: &str) -> Option<&str> {
    provider_id
        .rsplit('/')
        .next()
        .filter(|id| id.starts_with("i-"))
}

/// Readiness keyed by instance id. Nodes without an AWS provider id are skipped.
pub fn readiness_by_instance(nodes: &[Node]) -> HashMap<String, Readiness> {
    nodes
        .iter()
        .filter_map(|node| {
            let provider_id = node.spec.as_ref()?.provider_id.as_deref()?;
            let instance_id = instance_id_from_provider_id(provider_id)?;
            Some((instance_id.to_string(), node_readiness(node)))
        })
        .collect()
}

fn kubeconfig_for(cluster: &ClusterDescriptor, token: &str) -> Result<Kubeconfig> {
    let endpoint = cluster.endpoint.as_ref().ok_or_else(|| {
        Error::validation_for_field("endpoint", "cluster has no API endpoint")
    })?;
    let value = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{
            "name": cluster.name,
            "cluster": {
                "server": endpoint.url,
                "certificate-authority-data": endpoint.certificate_authority,
            }
        }],
        "users": [{
            "name": "fleetscan",
            "user": { "token": token }
        }],
        "contexts": [{
            "name": cluster.name,
            "context": { "cluster": cluster.name, "user": "fleetscan" }
        }],
        "current-context": cluster.name,
    });
    serde_json::from_value(value).map_err(|e| {
        Error::internal_with_context("kubeconfig", format!("failed to build kubeconfig: {e}"))
    })
}

/// Build a cluster API client authenticated with a fresh bearer token
pub async fn cluster_client(
    sdk_config: &SdkConfig,
    cluster: &ClusterDescriptor,
    timeouts: ClusterTimeouts,
) -> Result<Client> {
    let token = cluster_token(sdk_config, &cluster.name).await?;
    let kubeconfig = kubeconfig_for(cluster, &token)?;
    let mut config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| {
            Error::internal_with_context("cluster_client", format!("failed to load kubeconfig: {e}"))
        })?;
    config.connect_timeout = Some(timeouts.connect);
    config.read_timeout = Some(timeouts.read);
    Client::try_from(config).map_err(|e| {
        Error::internal_with_context("cluster_client", format!("failed to create client: {e}"))
    })
}

/// List the cluster's nodes and map readiness by instance id
pub async fn fetch_readiness(
    sdk_config: &SdkConfig,
    cluster: &ClusterDescriptor,
    timeouts: ClusterTimeouts,
) -> Result<HashMap<String, Readiness>> {
    let client = cluster_client(sdk_config, cluster, timeouts).await?;
    let nodes: Api<Node> = Api::all(client);
    let list = nodes
        .list(&ListParams::default())
        .await
        .map_err(|e| kube_error("k8s:ListNodes", e))?;
    debug!(cluster = %cluster.name, nodes = list.items.len(), "Listed cluster nodes");
    Ok(readiness_by_instance(&list.items))
}
