//! Target collection: everything gathered for one (tenant, region)
//!
//! Sub-results degrade on failure (empty cluster list, `N/A` version, no
//! recommendation, `Unknown` readiness). Only a credential failure aborts the
//! task.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use fleetscan_common::model::{
    ClusterDescriptor, EnrichedNodeRow, NodeRecord, OsFamily, Readiness, RecommendationSet,
    ScanTask,
};
use fleetscan_common::retry::{retry_transient, RetryConfig};
use fleetscan_common::{classify, Error, FailureCategory, Result};

use crate::enrich::{empty_cluster_row, enrich, RowContext};
use crate::provider::CloudInventory;

/// Default budget for a cluster readiness query
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings fixed for the run
#[derive(Clone, Debug)]
pub struct CollectorSettings {
    /// Budget for one cluster readiness query
    pub readiness_timeout: Duration,
    /// Retry policy for provider calls
    pub retry: RetryConfig,
    /// Fallback display names keyed by tenant id
    pub tenant_names: HashMap<String, String>,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            retry: RetryConfig::single_retry(),
            tenant_names: HashMap::new(),
        }
    }
}

/// Collects and enriches rows for one task
#[derive(Clone, Debug, Default)]
pub struct TargetCollector {
    settings: CollectorSettings,
}

/// Turn a failed sub-result into its fallback unless the credential itself
/// is bad.
fn degrade<T>(result: Result<T>, operation: &str, fallback: T) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) => {
            let classification = classify(&e);
            if classification.category == FailureCategory::CredentialExpired {
                return Err(e);
            }
            warn!(
                operation = %operation,
                category = %classification.category,
                error = %classification.message,
                "Sub-result unavailable, continuing"
            );
            Ok(fallback)
        }
    }
}

impl TargetCollector {
    /// Create a collector
    pub fn new(settings: CollectorSettings) -> Self {
        Self { settings }
    }

    /// Settings in use
    pub fn settings(&self) -> &CollectorSettings {
        &self.settings
    }

    /// Collect every row for `task`.
    ///
    /// `ctx` carries the task identity and audit clock; its tenant name is
    /// replaced by the resolved display name.
    pub async fn collect(
        &self,
        task: &ScanTask,
        inventory: &dyn CloudInventory,
        mut ctx: RowContext,
    ) -> Result<Vec<EnrichedNodeRow>> {
        let retry = &self.settings.retry;

        let identity = retry_transient(retry, "sts:GetCallerIdentity", || {
            inventory.caller_identity()
        })
        .await?;
        debug!(account = %identity.account, arn = %identity.arn, "Verified caller identity");
        if identity.account != task.tenant_id {
            return Err(Error::federation(
                &task.tenant_id,
                &task.role_name,
                None,
                format!("credential belongs to tenant {}", identity.account),
            ));
        }

        ctx.tenant_name = self.tenant_name(task, inventory).await?;

        let clusters = degrade(
            retry_transient(retry, "eks:ListClusters", || inventory.list_clusters()).await,
            "eks:ListClusters",
            Vec::new(),
        )?;
        if clusters.is_empty() {
            info!("No clusters found");
            return Ok(Vec::new());
        }
        info!(count = clusters.len(), "Found clusters");

        let mut rows = Vec::new();
        for name in clusters {
            rows.extend(self.collect_cluster(&name, inventory, &ctx).await?);
        }
        Ok(rows)
    }

    async fn tenant_name(&self, task: &ScanTask, inventory: &dyn CloudInventory) -> Result<String> {
        let alias = degrade(
            retry_transient(&self.settings.retry, "iam:ListAccountAliases", || {
                inventory.tenant_alias()
            })
            .await,
            "iam:ListAccountAliases",
            None,
        )?;
        Ok(alias
            .or_else(|| self.settings.tenant_names.get(&task.tenant_id).cloned())
            .unwrap_or_else(|| task.tenant_id.clone()))
    }

    async fn collect_cluster(
        &self,
        name: &str,
        inventory: &dyn CloudInventory,
        ctx: &RowContext,
    ) -> Result<Vec<EnrichedNodeRow>> {
        let retry = &self.settings.retry;

        let cluster = degrade(
            retry_transient(retry, "eks:DescribeCluster", || inventory.describe_cluster(name))
                .await,
            "eks:DescribeCluster",
            ClusterDescriptor::undescribed(name),
        )?;
        info!(
            cluster = %cluster.name,
            version = cluster.version.as_deref().unwrap_or("N/A"),
            "Processing cluster"
        );

        let recommendations = self.recommendations(&cluster, inventory).await?;

        let mut nodes = degrade(
            retry_transient(retry, "ec2:DescribeInstances", || {
                inventory.running_nodes(name)
            })
            .await,
            "ec2:DescribeInstances",
            Vec::new(),
        )?;
        if nodes.is_empty() {
            info!(cluster = %cluster.name, "No running nodes found");
            return Ok(vec![empty_cluster_row(&cluster, &recommendations, ctx)]);
        }

        self.attach_image_metadata(&mut nodes, inventory).await?;
        log_os_distribution(&cluster.name, &nodes);

        let readiness = self.readiness(&cluster, inventory).await;

        Ok(nodes
            .iter()
            .map(|node| {
                let state = readiness
                    .get(&node.instance_id)
                    .copied()
                    .unwrap_or(Readiness::Unknown);
                enrich(node, &cluster, &recommendations, state, ctx)
            })
            .collect())
    }

    async fn recommendations(
        &self,
        cluster: &ClusterDescriptor,
        inventory: &dyn CloudInventory,
    ) -> Result<RecommendationSet> {
        let Some(version) = cluster.platform_version() else {
            warn!(cluster = %cluster.name, "Unknown platform version, skipping image recommendations");
            return Ok(RecommendationSet::default());
        };
        let retry = &self.settings.retry;

        let lookups = OsFamily::KNOWN.map(|family| async move {
            let found = retry_transient(retry, "ssm:GetParameter", || {
                inventory.recommended_image(version, family)
            })
            .await;
            (family, found)
        });

        let mut images = BTreeMap::new();
        for (family, found) in join_all(lookups).await {
            if let Some(rec) = degrade(found, "ssm:GetParameter", None)? {
                images.insert(family, rec);
            } else {
                debug!(cluster = %cluster.name, family = %family, "No recommended image");
            }
        }

        let newest_catalog_version = degrade(
            retry_transient(retry, "ssm:GetParameters", || {
                inventory.newest_catalog_version(version)
            })
            .await,
            "ssm:GetParameters",
            None,
        )?;

        Ok(RecommendationSet {
            platform_version: Some(version),
            images,
            newest_catalog_version,
        })
    }

    async fn attach_image_metadata(
        &self,
        nodes: &mut [NodeRecord],
        inventory: &dyn CloudInventory,
    ) -> Result<()> {
        let image_ids: Vec<String> = nodes
            .iter()
            .filter_map(|n| n.image_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if image_ids.is_empty() {
            return Ok(());
        }

        let metadata = degrade(
            retry_transient(&self.settings.retry, "ec2:DescribeImages", || {
                inventory.describe_images(&image_ids)
            })
            .await,
            "ec2:DescribeImages",
            HashMap::new(),
        )?;

        for node in nodes.iter_mut() {
            if let Some(id) = &node.image_id {
                node.image = metadata.get(id).cloned();
            }
        }
        Ok(())
    }

    async fn readiness(
        &self,
        cluster: &ClusterDescriptor,
        inventory: &dyn CloudInventory,
    ) -> HashMap<String, Readiness> {
        let budget = self.settings.readiness_timeout;
        match tokio::time::timeout(budget, inventory.node_readiness(cluster)).await {
            Ok(Ok(map)) => map,
            Ok(Err(e)) => {
                let classification = classify(&e);
                warn!(
                    cluster = %cluster.name,
                    category = %classification.category,
                    error = %classification.message,
                    "Readiness unavailable, marking nodes Unknown"
                );
                if classification.category == FailureCategory::AccessDenied {
                    warn!(
                        cluster = %cluster.name,
                        "Cluster API rejected the token; grant the scanning role an access entry or aws-auth mapping"
                    );
                }
                HashMap::new()
            }
            Err(_) => {
                warn!(
                    cluster = %cluster.name,
                    timeout_secs = budget.as_secs(),
                    "Readiness query timed out, marking nodes Unknown"
                );
                HashMap::new()
            }
        }
    }
}

fn log_os_distribution(cluster: &str, nodes: &[NodeRecord]) {
    let mut distribution: BTreeMap<OsFamily, usize> = BTreeMap::new();
    for node in nodes {
        *distribution.entry(node.os_family()).or_default() += 1;
    }
    let summary = distribution
        .iter()
        .map(|(family, count)| format!("{family}: {count}"))
        .collect::<Vec<_>>()
        .join(", ");
    info!(cluster = %cluster, nodes = nodes.len(), distribution = %summary, "OS distribution");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{CallerIdentity, MockCloudInventory};
    use chrono::{DateTime, TimeZone, Utc};
    use fleetscan_common::model::{ImageMetadata, ImageRecommendation, PlatformVersion};
    use fleetscan_common::ScanPolicy;

    const TENANT: &str = "123456789012";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn task() -> ScanTask {
        ScanTask::new(TENANT, "us-east-1", "AuditRole")
    }

    fn ctx() -> RowContext {
        RowContext {
            tenant_id: TENANT.to_string(),
            tenant_name: TENANT.to_string(),
            region: "us-east-1".to_string(),
            policy: ScanPolicy::default(),
            now: now(),
        }
    }

    fn fast_settings() -> CollectorSettings {
        CollectorSettings {
            readiness_timeout: Duration::from_millis(50),
            retry: RetryConfig {
                max_attempts: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                backoff_multiplier: 2.0,
            },
            tenant_names: HashMap::new(),
        }
    }

    fn node(id: &str, image: &str) -> NodeRecord {
        NodeRecord {
            instance_id: id.to_string(),
            image_id: Some(image.to_string()),
            instance_class: Some("m5.large".to_string()),
            lifecycle_state: "running".to_string(),
            launch_time: Some(now() - chrono::Duration::days(1)),
            image: None,
        }
    }

    /// An inventory with one 1.29 cluster named "core" and the given nodes
    fn inventory_with(nodes: Vec<NodeRecord>) -> MockCloudInventory {
        let mut inv = MockCloudInventory::new();
        inv.expect_caller_identity().returning(|| {
            Ok(CallerIdentity {
                account: TENANT.to_string(),
                arn: format!("arn:aws:sts::{TENANT}:assumed-role/AuditRole/fleetscan-{TENANT}"),
            })
        });
        inv.expect_tenant_alias()
            .returning(|| Ok(Some("payments-prod".to_string())));
        inv.expect_list_clusters()
            .returning(|| Ok(vec!["core".to_string()]));
        inv.expect_describe_cluster().returning(|name| {
            Ok(ClusterDescriptor {
                name: name.to_string(),
                version: Some("1.29".to_string()),
                endpoint: None,
            })
        });
        inv.expect_recommended_image().returning(|_, family| {
            Ok((family == OsFamily::AmazonLinux2).then(|| ImageRecommendation {
                image_id: "ami-latest".to_string(),
                publication_date: Some(now() - chrono::Duration::days(2)),
            }))
        });
        inv.expect_newest_catalog_version()
            .returning(|_| Ok(Some(PlatformVersion::new(1, 31))));
        inv.expect_running_nodes()
            .returning(move |_| Ok(nodes.clone()));
        inv.expect_describe_images().times(0..=1).returning(|ids| {
            Ok(ids
                .iter()
                .map(|id| {
                    (
                        id.clone(),
                        ImageMetadata {
                            publication_date: Some(now() - chrono::Duration::days(40)),
                            description: Some("Amazon Linux 2 EKS node".to_string()),
                        },
                    )
                })
                .collect())
        });
        inv
    }

    /// Story: two running nodes become two fully enriched rows, and the
    /// image metadata is fetched in a single batch.
    #[tokio::test]
    async fn story_cluster_nodes_become_enriched_rows() {
        let mut inv = inventory_with(vec![node("i-1", "ami-a"), node("i-2", "ami-a")]);
        inv.expect_node_readiness().returning(|_| {
            Ok(HashMap::from([
                ("i-1".to_string(), Readiness::Ready),
                ("i-2".to_string(), Readiness::NotReady),
            ]))
        });

        let rows = TargetCollector::new(fast_settings())
            .collect(&task(), &inv, ctx())
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tenant_name, "payments-prod");
        assert_eq!(rows[0].latest_image_id.as_deref(), Some("ami-latest"));
        assert_eq!(rows[0].image_age_days, Some(40));
        assert!(rows[0].patch_pending);
        assert!(rows[0].version_compliance);
        assert_eq!(rows[0].node_readiness, Some(Readiness::Ready));
        assert_eq!(rows[1].node_readiness, Some(Readiness::NotReady));
    }

    /// Story: a cluster API that never answers leaves readiness Unknown but
    /// the rows are otherwise complete.
    #[tokio::test]
    async fn story_readiness_timeout_marks_nodes_unknown() {
        let mut inv = inventory_with(vec![node("i-1", "ami-a"), node("i-2", "ami-b")]);
        inv.expect_node_readiness().returning(|_| {
            Err(Error::timeout("k8s:ListNodes", Duration::from_secs(10)))
        });

        let rows = TargetCollector::new(fast_settings())
            .collect(&task(), &inv, ctx())
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.node_readiness, Some(Readiness::Unknown));
            assert_eq!(row.latest_image_id.as_deref(), Some("ami-latest"));
            assert!(row.image_age_days.is_some());
        }
    }

    /// Story: a cluster without running nodes still appears once in the report
    #[tokio::test]
    async fn story_empty_cluster_yields_placeholder_row() {
        let inv = inventory_with(Vec::new());

        let rows = TargetCollector::new(fast_settings())
            .collect(&task(), &inv, ctx())
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_empty_cluster_row());
        assert_eq!(rows[0].cluster_name, "core");
        assert!(rows[0].version_compliance);
    }

    /// Story: describe failures degrade to N/A instead of failing the task
    #[tokio::test]
    async fn story_describe_failure_degrades_to_unknown_version() {
        let mut inv = MockCloudInventory::new();
        inv.expect_caller_identity().returning(|| {
            Ok(CallerIdentity {
                account: TENANT.to_string(),
                arn: "arn".to_string(),
            })
        });
        inv.expect_tenant_alias().returning(|| Ok(None));
        inv.expect_list_clusters()
            .returning(|| Ok(vec!["legacy".to_string()]));
        inv.expect_describe_cluster().times(1).returning(|_| {
            Err(Error::api_with_code(
                "eks:DescribeCluster",
                "AccessDeniedException",
                "denied",
            ))
        });
        inv.expect_running_nodes().returning(|_| Ok(Vec::new()));

        let mut settings = fast_settings();
        settings
            .tenant_names
            .insert(TENANT.to_string(), "from-config".to_string());
        let rows = TargetCollector::new(settings)
            .collect(&task(), &inv, ctx())
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cluster_version, None);
        assert_eq!(rows[0].tenant_name, "from-config");
        assert!(!rows[0].version_compliance);
    }

    /// Story: an expired session aborts the task instead of degrading
    #[tokio::test]
    async fn story_expired_credential_aborts_task() {
        let mut inv = MockCloudInventory::new();
        inv.expect_caller_identity().returning(|| {
            Ok(CallerIdentity {
                account: TENANT.to_string(),
                arn: "arn".to_string(),
            })
        });
        inv.expect_tenant_alias().returning(|| Ok(None));
        inv.expect_list_clusters().times(1).returning(|| {
            Err(Error::api_with_code(
                "eks:ListClusters",
                "ExpiredTokenException",
                "token expired",
            ))
        });

        let err = TargetCollector::new(fast_settings())
            .collect(&task(), &inv, ctx())
            .await
            .unwrap_err();
        assert_eq!(classify(&err).category, FailureCategory::CredentialExpired);
    }

    #[tokio::test]
    async fn test_no_clusters_is_success_with_no_rows() {
        let mut inv = MockCloudInventory::new();
        inv.expect_caller_identity().returning(|| {
            Ok(CallerIdentity {
                account: TENANT.to_string(),
                arn: "arn".to_string(),
            })
        });
        inv.expect_tenant_alias().returning(|| Ok(None));
        inv.expect_list_clusters().returning(|| Ok(Vec::new()));

        let rows = TargetCollector::new(fast_settings())
            .collect(&task(), &inv, ctx())
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_identity_in_wrong_tenant_fails() {
        let mut inv = MockCloudInventory::new();
        inv.expect_caller_identity().returning(|| {
            Ok(CallerIdentity {
                account: "999999999999".to_string(),
                arn: "arn".to_string(),
            })
        });

        let err = TargetCollector::new(fast_settings())
            .collect(&task(), &inv, ctx())
            .await
            .unwrap_err();
        assert_eq!(err.tenant(), Some(TENANT));
    }
}
