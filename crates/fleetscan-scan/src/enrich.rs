//! Enrichment: join a node with its cluster, recommendation and readiness,
//! and derive compliance fields.
//!
//! Everything here is pure. The audit clock is an input, so the same inputs
//! always produce the same row.

use chrono::{DateTime, Utc};

use fleetscan_common::model::{
    ClusterDescriptor, EnrichedNodeRow, NodeRecord, PlatformVersion, Readiness, RecommendationSet,
};
use fleetscan_common::report::format_uptime;
use fleetscan_common::ScanPolicy;

/// Per-task values stamped on every row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowContext {
    /// Tenant id from the task
    pub tenant_id: String,
    /// Resolved tenant display name
    pub tenant_name: String,
    /// Region from the task
    pub region: String,
    /// Compliance policy for the run
    pub policy: ScanPolicy,
    /// Audit clock
    pub now: DateTime<Utc>,
}

/// Whole days between publication and `now`, never negative
pub fn image_age_days(published: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    published.map(|p| (now - p).num_days().max(0))
}

/// Patch is pending when the age is known and strictly above the threshold
pub fn is_patch_pending(age_days: Option<i64>, threshold_days: i64) -> bool {
    age_days.is_some_and(|age| age > threshold_days)
}

/// Version compliance against the newest catalog version.
///
/// Unknown cluster version or unknown catalog is never compliant.
pub fn is_version_compliant(
    cluster: Option<PlatformVersion>,
    newest_catalog: Option<PlatformVersion>,
    tolerance_minors: u32,
) -> bool {
    match (cluster, newest_catalog) {
        (Some(cluster), Some(newest)) => cluster.within_tolerance(newest, tolerance_minors),
        _ => false,
    }
}

fn cluster_compliance(
    cluster: &ClusterDescriptor,
    recommendations: &RecommendationSet,
    ctx: &RowContext,
) -> bool {
    is_version_compliant(
        cluster.platform_version(),
        recommendations.newest_catalog_version,
        ctx.policy.version_tolerance_minors,
    )
}

/// Build the report row for one node
pub fn enrich(
    node: &NodeRecord,
    cluster: &ClusterDescriptor,
    recommendations: &RecommendationSet,
    readiness: Readiness,
    ctx: &RowContext,
) -> EnrichedNodeRow {
    let family = node.os_family();
    let published = node.image.as_ref().and_then(|i| i.publication_date);
    let age = image_age_days(published, ctx.now);
    let latest = recommendations.for_family(family);

    EnrichedNodeRow {
        tenant_id: ctx.tenant_id.clone(),
        tenant_name: ctx.tenant_name.clone(),
        region: ctx.region.clone(),
        cluster_name: cluster.name.clone(),
        cluster_version: cluster.version.clone(),
        instance_id: Some(node.instance_id.clone()),
        current_image_id: node.image_id.clone(),
        current_image_publication_date: published.map(|p| p.date_naive()),
        image_age_days: age,
        os_family: Some(family),
        instance_class: node.instance_class.clone(),
        node_state: Some(node.lifecycle_state.clone()),
        node_uptime: node.uptime(ctx.now).map(format_uptime),
        latest_image_id: latest.map(|r| r.image_id.clone()),
        latest_image_publication_date: latest
            .and_then(|r| r.publication_date)
            .map(|p| p.date_naive()),
        patch_pending: is_patch_pending(age, ctx.policy.patch_age_threshold_days),
        node_readiness: Some(readiness),
        version_compliance: cluster_compliance(cluster, recommendations, ctx),
        audit_timestamp: ctx.now,
    }
}

/// Placeholder row for a cluster with no running nodes
pub fn empty_cluster_row(
    cluster: &ClusterDescriptor,
    recommendations: &RecommendationSet,
    ctx: &RowContext,
) -> EnrichedNodeRow {
    EnrichedNodeRow {
        tenant_id: ctx.tenant_id.clone(),
        tenant_name: ctx.tenant_name.clone(),
        region: ctx.region.clone(),
        cluster_name: cluster.name.clone(),
        cluster_version: cluster.version.clone(),
        instance_id: None,
        current_image_id: None,
        current_image_publication_date: None,
        image_age_days: None,
        os_family: None,
        instance_class: None,
        node_state: None,
        node_uptime: None,
        latest_image_id: None,
        latest_image_publication_date: None,
        patch_pending: false,
        node_readiness: None,
        version_compliance: cluster_compliance(cluster, recommendations, ctx),
        audit_timestamp: ctx.now,
    }
}
