//! Raw inventory gathered from the provider, before enrichment

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{OsFamily, PlatformVersion};

/// Where to reach a cluster's own API
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterEndpoint {
    /// HTTPS API server URL
    pub url: String,
    /// Base64-encoded CA bundle
    pub certificate_authority: String,
}

/// A cluster discovered in a (tenant, region)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDescriptor {
    /// Cluster name
    pub name: String,
    /// Control-plane version as reported; `None` when describe failed
    pub version: Option<String>,
    /// API endpoint, if the cluster exposes one
    pub endpoint: Option<ClusterEndpoint>,
}

impl ClusterDescriptor {
    /// Descriptor for a cluster whose details could not be fetched
    pub fn undescribed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            endpoint: None,
        }
    }

    /// Parsed platform version, if the reported version is well formed
    pub fn platform_version(&self) -> Option<PlatformVersion> {
        self.version.as_deref().and_then(|v| v.parse().ok())
    }
}

/// Image metadata resolved in one batch per cluster
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Image creation (publication) time
    pub publication_date: Option<DateTime<Utc>>,
    /// Free-text description, used for OS family matching
    pub description: Option<String>,
}

/// A running compute node belonging to a cluster
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Instance id, unique within the cluster
    pub instance_id: String,
    /// Machine image id
    pub image_id: Option<String>,
    /// Instance type
    pub instance_class: Option<String>,
    /// Lifecycle state ("running")
    pub lifecycle_state: String,
    /// Launch time
    pub launch_time: Option<DateTime<Utc>>,
    /// Image metadata, attached once the batch lookup resolves
    pub image: Option<ImageMetadata>,
}

impl NodeRecord {
    /// Time since launch at `now`; never negative
    pub fn uptime(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.launch_time
            .map(|launched| (now - launched).max(chrono::Duration::zero()))
    }

    /// OS family derived from the image description
    pub fn os_family(&self) -> OsFamily {
        self.image
            .as_ref()
            .and_then(|i| i.description.as_deref())
            .map(OsFamily::from_description)
            .unwrap_or(OsFamily::Unknown)
    }
}

/// Provider-recommended image for one (platform version, OS family)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecommendation {
    /// Recommended image id
    pub image_id: String,
    /// When the recommendation was published
    pub publication_date: Option<DateTime<Utc>>,
}

/// Everything looked up once per cluster for enrichment
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecommendationSet {
    /// Platform version the recommendations were looked up for
    pub platform_version: Option<PlatformVersion>,
    /// Recommendation per OS family; absent families had no catalog entry
    pub images: BTreeMap<OsFamily, ImageRecommendation>,
    /// Newest platform version present in the catalog
    pub newest_catalog_version: Option<PlatformVersion>,
}

impl RecommendationSet {
    /// Recommendation for a family, if one was found
    pub fn for_family(&self, family: OsFamily) -> Option<&ImageRecommendation> {
        if !family.is_known() {
            return None;
        }
        self.images.get(&family)
    }
}

/// Control-plane reported node health
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Readiness {
    /// Ready condition is True
    Ready,
    /// Ready condition present but not True
    NotReady,
    /// Node not found or control plane unreachable
    Unknown,
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Readiness::Ready => "Ready",
            Readiness::NotReady => "NotReady",
            Readiness::Unknown => "Unknown",
        })
    }
}
